use std::collections::HashSet;

use der::Encode;
use sha1::Sha1;
use tracing::{debug, info};
use x509_cert::certificate::CertificateInner;

use crate::cert::Certificate;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtensionSet, KeyUsage, KeyUsages,
    SubjectKeyIdentifier,
};
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::error::{MtlsKitError, Result};
use crate::key::{KeyPair, PublicKey, os_random};
use crate::request::CertificateRequest;
use crate::tbs_certificate::TbsCertificate;

/// Longest validity a leaf may be issued with (CA/Browser Forum ceiling).
pub const MAX_LEAF_VALIDITY_DAYS: i64 = 825;

/// Longest validity accepted for a root (100 years).
pub const MAX_CA_VALIDITY_DAYS: i64 = 36_500;

/// Serial numbers are 128 random bits, kept positive.
pub const SERIAL_LEN: usize = 16;

/// How many fresh serials `sign` draws before giving up.
pub const MAX_SERIAL_ATTEMPTS: usize = 3;

/// SHA-1 over the subjectPublicKey bits (RFC 5280 4.2.1.2, method 1).
pub fn key_identifier(public_key: &PublicKey) -> Result<Vec<u8>> {
    let spki = public_key.to_spki()?;
    let digest = <Sha1 as sha1::Digest>::digest(spki.subject_public_key.raw_bytes());
    Ok(digest.to_vec())
}

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> &DistinguishedName;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the subject key identifier of the issuer's certificate.
    fn key_identifier(&self) -> &[u8];

    /// Encodes and signs a certificate for `subject`.
    ///
    /// The extension set is written as given, followed by the subject and
    /// authority key identifiers.
    fn issue(
        &self,
        serial_number: &[u8],
        subject: &DistinguishedName,
        subject_public_key: &PublicKey,
        extensions: &ExtensionSet,
        validity: &Validity,
    ) -> Result<Certificate> {
        let signature_algorithm = self.signing_key().signature_algorithm();

        let mut params = extensions.to_params()?;
        params.push(ExtensionParam::from_extension(
            &SubjectKeyIdentifier(key_identifier(subject_public_key)?),
            false,
        )?);
        params.push(ExtensionParam::from_extension(
            &AuthorityKeyIdentifier {
                key_identifier: self.key_identifier().to_vec(),
            },
            false,
        )?);

        let tbs_cert = TbsCertificate {
            serial_number,
            signature_algorithm,
            issuer: self.issuer_name(),
            validity,
            subject,
            subject_public_key,
            extensions: &params,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self.signing_key().sign_data(&tbs_cert_inner.to_der()?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.into(),
            signature: der::asn1::BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: &'a DistinguishedName,
    key: &'a KeyPair,
    key_identifier: &'a [u8],
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> &DistinguishedName {
        self.name
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn key_identifier(&self) -> &[u8] {
        self.key_identifier
    }
}

/// Serial numbers handed out by one CA instance.
#[derive(Debug)]
struct SerialRegistry {
    issued: HashSet<Vec<u8>>,
    generator: fn() -> Result<[u8; SERIAL_LEN]>,
}

impl SerialRegistry {
    fn new() -> Self {
        Self {
            issued: HashSet::new(),
            generator: random_serial,
        }
    }

    /// Draws until an unused serial turns up, at most
    /// [`MAX_SERIAL_ATTEMPTS`] times.
    fn allocate(&mut self) -> Result<Vec<u8>> {
        for attempt in 1..=MAX_SERIAL_ATTEMPTS {
            let serial = (self.generator)()?.to_vec();
            if self.issued.insert(serial.clone()) {
                return Ok(serial);
            }
            debug!(attempt, "serial number collision, drawing again");
        }
        Err(MtlsKitError::SerialCollision {
            attempts: MAX_SERIAL_ATTEMPTS,
        })
    }

    fn release(&mut self, serial: &[u8]) {
        self.issued.remove(serial);
    }
}

fn random_serial() -> Result<[u8; SERIAL_LEN]> {
    let mut serial: [u8; SERIAL_LEN] = os_random()?;
    serial[0] &= 0x7f;
    if serial[0] == 0 {
        serial[0] = 0x01;
    }
    Ok(serial)
}

/// A root certificate authority for one trust domain.
///
/// Owns its key pair, its self-signed certificate and the registry of serial
/// numbers it has assigned. Two instances never share any of these.
#[derive(Debug)]
pub struct CertificateAuthority {
    key: KeyPair,
    certificate: Certificate,
    name: DistinguishedName,
    key_identifier: Vec<u8>,
    serials: SerialRegistry,
}

impl CertificateAuthority {
    /// Self-signs a root certificate for `name` with `key`.
    ///
    /// The root carries `CA:TRUE` and `keyCertSign | cRLSign`, both critical.
    pub fn create_root(name: DistinguishedName, key: KeyPair, validity_days: i64) -> Result<Self> {
        name.validate()?;
        let validity = Validity::for_days(validity_days)?;
        let public_key = key.public_key();
        public_key.validate()?;
        let key_identifier = key_identifier(&public_key)?;

        let mut serials = SerialRegistry::new();
        let serial = serials.allocate()?;

        let extensions = ExtensionSet {
            basic_constraints: BasicConstraints {
                is_ca: true,
                max_path_length: None,
            },
            key_usage: KeyUsage::certificate_authority(),
            extended_key_usage: Vec::new(),
            subject_alt_names: Vec::new(),
        };

        let certificate = SelfIssuer {
            name: &name,
            key: &key,
            key_identifier: &key_identifier,
        }
        .issue(&serial, &name, &public_key, &extensions, &validity)?;

        info!(subject = %name, algorithm = %key.algorithm(), validity_days, "created root CA");

        Ok(Self {
            key,
            certificate,
            name,
            key_identifier,
            serials,
        })
    }

    /// The self-signed root certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn name(&self) -> &DistinguishedName {
        &self.name
    }

    /// Signs a leaf request.
    ///
    /// Requests asking for CA rights (basic constraints or certificate/CRL
    /// signing usages) are refused with [`MtlsKitError::ExtensionConflict`];
    /// they are never downgraded.
    pub fn sign(&mut self, request: CertificateRequest, validity_days: i64) -> Result<Certificate> {
        if request.extensions.is_ca()
            || request.extensions.key_usage.contains(KeyUsages::KeyCertSign)
            || request.extensions.key_usage.contains(KeyUsages::CRLSign)
        {
            return Err(MtlsKitError::ExtensionConflict(format!(
                "leaf request for \"{}\" asks for CA rights",
                request.subject
            )));
        }
        if validity_days > MAX_LEAF_VALIDITY_DAYS {
            return Err(MtlsKitError::InvalidInput(format!(
                "leaf validity of {validity_days} days exceeds {MAX_LEAF_VALIDITY_DAYS}"
            )));
        }
        let validity = Validity::for_days(validity_days)?;
        request.public_key.validate()?;
        request.subject.validate()?;

        let serial = self.serials.allocate()?;
        let issued = self.issue(
            &serial,
            &request.subject,
            &request.public_key,
            &request.extensions,
            &validity,
        );
        match issued {
            Ok(certificate) => {
                debug!(subject = %request.subject, issuer = %self.name, "signed leaf certificate");
                Ok(certificate)
            }
            Err(err) => {
                self.serials.release(&serial);
                Err(err)
            }
        }
    }

    /// True when this CA has already assigned `serial`.
    pub fn has_issued(&self, serial: &[u8]) -> bool {
        self.serials.issued.contains(serial)
    }
}

impl Issuer for CertificateAuthority {
    fn issuer_name(&self) -> &DistinguishedName {
        &self.name
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn key_identifier(&self) -> &[u8] {
        &self.key_identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::SanEntry;
    use crate::request::{CertificateRequestBuilder, LeafRole};

    fn ca() -> CertificateAuthority {
        let name = DistinguishedName::builder()
            .common_name("Test Root CA".to_string())
            .organization("Example Corp".to_string())
            .build();
        CertificateAuthority::create_root(name, KeyPair::generate_ecdsa_p256().unwrap(), 3650).unwrap()
    }

    fn server_request() -> CertificateRequest {
        let key = KeyPair::generate_ecdsa_p256().unwrap();
        CertificateRequestBuilder::build(
            key.public_key(),
            DistinguishedName::builder()
                .common_name("localhost".to_string())
                .build(),
            LeafRole::Server {
                subject_alt_names: vec![SanEntry::parse("DNS:localhost").unwrap()],
            },
        )
        .unwrap()
    }

    #[test]
    fn test_root_is_self_signed_ca() {
        let ca = ca();
        let root = ca.certificate();
        assert!(root.is_self_issued());
        root.verify_signed_by(root).unwrap();
        let extensions = root.extensions().unwrap();
        assert!(extensions.is_ca());
        assert!(extensions.key_usage.contains(KeyUsages::KeyCertSign));
        assert!(extensions.key_usage.contains(KeyUsages::CRLSign));
        assert_eq!(
            root.subject_key_identifier().unwrap(),
            root.authority_key_identifier().unwrap()
        );
    }

    #[test]
    fn test_signed_leaf_chains_to_root() {
        let mut ca = ca();
        let leaf = ca.sign(server_request(), 825).unwrap();
        leaf.verify_signed_by(ca.certificate()).unwrap();
        assert_eq!(leaf.issuer().unwrap(), *ca.name());
        assert_eq!(
            leaf.authority_key_identifier().unwrap(),
            ca.certificate().subject_key_identifier().unwrap()
        );
        assert!(ca.has_issued(leaf.serial_number()));
    }

    #[test]
    fn test_ca_request_is_rejected() {
        let mut ca = ca();
        let mut request = server_request();
        request.extensions.basic_constraints.is_ca = true;
        assert!(matches!(
            ca.sign(request, 30),
            Err(MtlsKitError::ExtensionConflict(_))
        ));
    }

    #[test]
    fn test_cert_sign_usage_is_rejected() {
        let mut ca = ca();
        let mut request = server_request();
        request.extensions.key_usage = KeyUsage::certificate_authority();
        assert!(matches!(
            ca.sign(request, 30),
            Err(MtlsKitError::ExtensionConflict(_))
        ));
    }

    #[test]
    fn test_leaf_validity_bounds() {
        let mut ca = ca();
        assert!(matches!(
            ca.sign(server_request(), 0),
            Err(MtlsKitError::InvalidInput(_))
        ));
        assert!(matches!(
            ca.sign(server_request(), MAX_LEAF_VALIDITY_DAYS + 1),
            Err(MtlsKitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_serials_are_unique_per_ca() {
        let mut ca = ca();
        let mut seen = HashSet::new();
        seen.insert(ca.certificate().serial_number().to_vec());
        for _ in 0..8 {
            let leaf = ca.sign(server_request(), 30).unwrap();
            assert!(seen.insert(leaf.serial_number().to_vec()));
        }
    }

    #[test]
    fn test_exhausted_serial_space_is_a_collision() {
        let mut ca = ca();
        ca.serials.generator = || Ok([0x11; SERIAL_LEN]);
        ca.sign(server_request(), 30).unwrap();
        assert_eq!(
            ca.sign(server_request(), 30).unwrap_err(),
            MtlsKitError::SerialCollision {
                attempts: MAX_SERIAL_ATTEMPTS
            }
        );
    }

    #[test]
    fn test_serial_source_failure_is_a_crypto_failure() {
        let mut ca = ca();
        ca.serials.generator = || {
            Err(MtlsKitError::CryptoFailure(
                "random source unavailable".to_string(),
            ))
        };
        assert!(matches!(
            ca.sign(server_request(), 30),
            Err(MtlsKitError::CryptoFailure(_))
        ));
    }

    #[test]
    fn test_serial_is_positive() {
        for _ in 0..32 {
            let serial = random_serial().unwrap();
            assert!(serial[0] != 0 && serial[0] < 0x80);
        }
    }
}
