//! Trust chains and the path validation used to check them.

use time::OffsetDateTime;

use crate::cert::Certificate;
use crate::cert::extensions::KeyUsages;
use crate::error::{MtlsKitError, Result};
use crate::pem_utils::certificates_to_pem;

/// An ordered certificate path: leaf first, self-signed root last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustChain {
    certificates: Vec<Certificate>,
}

impl TrustChain {
    /// Assembles `[leaf, ...intermediates, root]` without validating it.
    pub fn assemble(leaf: Certificate, intermediates: Vec<Certificate>, root: Certificate) -> Self {
        let mut certificates = Vec::with_capacity(intermediates.len() + 2);
        certificates.push(leaf);
        certificates.extend(intermediates);
        certificates.push(root);
        Self { certificates }
    }

    /// Wraps an already ordered path, e.g. one read back from a PEM bundle.
    pub fn from_certificates(certificates: Vec<Certificate>) -> Result<Self> {
        if certificates.is_empty() {
            return Err(MtlsKitError::ChainValidation("empty chain".to_string()));
        }
        Ok(Self { certificates })
    }

    pub fn leaf(&self) -> &Certificate {
        &self.certificates[0]
    }

    pub fn root(&self) -> &Certificate {
        &self.certificates[self.certificates.len() - 1]
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// The certificates a TLS endpoint sends to its peer: everything except
    /// self-signed roots, which the peer must already trust.
    pub fn presented_certificates(&self) -> Vec<&Certificate> {
        self.certificates
            .iter()
            .enumerate()
            .filter(|(depth, cert)| *depth == 0 || !cert.is_self_issued())
            .map(|(_, cert)| cert)
            .collect()
    }

    /// Validates the chain at the current time.
    pub fn validate(&self) -> Result<()> {
        self.validate_at(OffsetDateTime::now_utc())
    }

    /// Validates the chain as of `now`.
    ///
    /// Every link's issuer must equal the next certificate's subject and its
    /// signature must verify under that certificate's key; every issuer must
    /// be a CA allowed to sign certificates; the root must be self-signed; the
    /// leaf must not be a CA; every certificate must be within its validity.
    pub fn validate_at(&self, now: OffsetDateTime) -> Result<()> {
        let root = self.root();
        if !root.is_self_issued() {
            return Err(MtlsKitError::ChainValidation(format!(
                "root \"{}\" is not self-signed",
                root.subject()?
            )));
        }
        root.verify_signed_by(root)?;

        for (depth, cert) in self.certificates.iter().enumerate() {
            if !cert.validity().contains(now) {
                return Err(MtlsKitError::ChainValidation(format!(
                    "certificate at depth {depth} (\"{}\") is outside its validity period",
                    cert.subject()?
                )));
            }
        }

        for pair in self.certificates.windows(2) {
            let (child, parent) = (&pair[0], &pair[1]);
            ensure_can_sign(parent)?;
            child.verify_signed_by(parent)?;
        }

        if self.certificates.len() > 1 && self.leaf().extensions()?.is_ca() {
            return Err(MtlsKitError::ChainValidation(
                "leaf certificate is a CA".to_string(),
            ));
        }
        Ok(())
    }

    /// PEM bundle in chain order.
    pub fn to_pem(&self) -> Result<String> {
        let ders = self
            .certificates
            .iter()
            .map(Certificate::to_der)
            .collect::<Result<Vec<_>>>()?;
        Ok(certificates_to_pem(&ders))
    }
}

fn ensure_can_sign(cert: &Certificate) -> Result<()> {
    let extensions = cert.extensions()?;
    if !extensions.is_ca() || !extensions.key_usage.contains(KeyUsages::KeyCertSign) {
        return Err(MtlsKitError::ChainValidation(format!(
            "\"{}\" is not allowed to sign certificates",
            cert.subject()?
        )));
    }
    Ok(())
}

/// Verifies `leaf` against a trusted root, the way a relying party does:
/// the path `[leaf, ...intermediates, trusted_root]` must validate.
pub fn verify_leaf(
    leaf: &Certificate,
    intermediates: &[Certificate],
    trusted_root: &Certificate,
) -> Result<()> {
    TrustChain::assemble(leaf.clone(), intermediates.to_vec(), trusted_root.clone()).validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::SanEntry;
    use crate::cert::params::DistinguishedName;
    use crate::issuer::CertificateAuthority;
    use crate::key::KeyPair;
    use crate::request::{CertificateRequestBuilder, LeafRole};

    fn root(cn: &str) -> CertificateAuthority {
        CertificateAuthority::create_root(
            DistinguishedName::builder().common_name(cn.to_string()).build(),
            KeyPair::generate_ecdsa_p256().unwrap(),
            3650,
        )
        .unwrap()
    }

    fn leaf(ca: &mut CertificateAuthority) -> Certificate {
        let request = CertificateRequestBuilder::build(
            KeyPair::generate_ed25519().unwrap().public_key(),
            DistinguishedName::builder()
                .common_name("localhost".to_string())
                .build(),
            LeafRole::Server {
                subject_alt_names: vec![SanEntry::parse("localhost").unwrap()],
            },
        )
        .unwrap();
        ca.sign(request, 30).unwrap()
    }

    #[test]
    fn test_valid_chain() {
        let mut ca = root("Root A");
        let chain = TrustChain::assemble(leaf(&mut ca), vec![], ca.certificate().clone());
        chain.validate().unwrap();
        assert_eq!(chain.presented_certificates().len(), 1);
    }

    #[test]
    fn test_foreign_root_fails() {
        let mut ca = root("Root A");
        let other = root("Root B");
        let err = verify_leaf(&leaf(&mut ca), &[], other.certificate()).unwrap_err();
        assert!(matches!(err, MtlsKitError::ChainValidation(_)));
    }

    #[test]
    fn test_same_name_different_key_fails() {
        let mut ca = root("Root A");
        let impostor = root("Root A");
        let err = verify_leaf(&leaf(&mut ca), &[], impostor.certificate()).unwrap_err();
        assert!(matches!(err, MtlsKitError::ChainValidation(_)));
    }

    #[test]
    fn test_expired_chain_fails() {
        let mut ca = root("Root A");
        let chain = TrustChain::assemble(leaf(&mut ca), vec![], ca.certificate().clone());
        let later = OffsetDateTime::now_utc() + time::Duration::days(31);
        assert!(matches!(
            chain.validate_at(later),
            Err(MtlsKitError::ChainValidation(_))
        ));
    }

    #[test]
    fn test_leaf_cannot_act_as_issuer() {
        let mut ca = root("Root A");
        let server = leaf(&mut ca);
        let chain = TrustChain::from_certificates(vec![
            server.clone(),
            server,
            ca.certificate().clone(),
        ])
        .unwrap();
        assert!(chain.validate().is_err());
    }

    #[test]
    fn test_pem_bundle_keeps_order() {
        let mut ca = root("Root A");
        let chain = TrustChain::assemble(leaf(&mut ca), vec![], ca.certificate().clone());
        let pem = chain.to_pem().unwrap();
        assert_eq!(pem.matches("-----BEGIN CERTIFICATE-----").count(), 2);
        let ders = crate::pem_utils::pem_to_certificate_ders(&pem).unwrap();
        assert_eq!(Certificate::from_der(&ders[0]).unwrap(), *chain.leaf());
        assert_eq!(Certificate::from_der(&ders[1]).unwrap(), *chain.root());
    }
}
