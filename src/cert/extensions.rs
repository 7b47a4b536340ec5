use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use regex::Regex;
use x509_cert::ext::pkix::name::GeneralName;

use super::params::ExtensionParam;
use crate::error::{MtlsKitError, Result};

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use mtlskit::cert::extensions::{SanEntry, SubjectAltName, ToAndFromX509Extension};
/// let san = SubjectAltName { names: vec![SanEntry::Dns("example.com".to_string())] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

static DNS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*\.)?[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("DNS name pattern is valid")
});

/// A single subject-alternative-name entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SanEntry {
    Dns(String),
    Ip(IpAddr),
}

impl SanEntry {
    /// Parses `DNS:name`, `IP:address` or a bare value.
    ///
    /// A bare value that parses as an IP address becomes an IP entry,
    /// anything else is treated as a DNS name.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Some(name) = strip_prefix_ignore_case(input, "DNS:") {
            return Self::dns(name);
        }
        if let Some(address) = strip_prefix_ignore_case(input, "IP:") {
            return address
                .trim()
                .parse::<IpAddr>()
                .map(SanEntry::Ip)
                .map_err(|_| {
                    MtlsKitError::InvalidSubjectAltName(format!("{address:?} is not an IP address"))
                });
        }
        match input.parse::<IpAddr>() {
            Ok(address) => Ok(SanEntry::Ip(address)),
            Err(_) => Self::dns(input),
        }
    }

    /// Builds a DNS entry after checking RFC 1123 label syntax.
    pub fn dns(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() || name.len() > 253 || !DNS_NAME.is_match(name) {
            return Err(MtlsKitError::InvalidSubjectAltName(format!(
                "{name:?} is not a valid DNS name"
            )));
        }
        Ok(SanEntry::Dns(name.to_string()))
    }

    /// True when this entry names `identity` (a hostname or IP literal).
    pub fn matches(&self, identity: &str) -> bool {
        match self {
            SanEntry::Dns(name) => name.eq_ignore_ascii_case(identity),
            SanEntry::Ip(address) => identity
                .parse::<IpAddr>()
                .is_ok_and(|candidate| candidate == *address),
        }
    }

    fn to_general_name(&self) -> Result<GeneralName> {
        match self {
            SanEntry::Dns(name) => Ia5String::new(name)
                .map(GeneralName::DnsName)
                .map_err(|e| MtlsKitError::InvalidSubjectAltName(e.to_string())),
            SanEntry::Ip(IpAddr::V4(address)) => {
                Ok(GeneralName::IpAddress(OctetString::new(address.octets().to_vec())?))
            }
            SanEntry::Ip(IpAddr::V6(address)) => {
                Ok(GeneralName::IpAddress(OctetString::new(address.octets().to_vec())?))
            }
        }
    }

    fn from_general_name(name: &GeneralName) -> Result<Self> {
        match name {
            GeneralName::DnsName(dns) => Ok(SanEntry::Dns(dns.to_string())),
            GeneralName::IpAddress(octets) => match octets.as_bytes().len() {
                4 => {
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(octets.as_bytes());
                    Ok(SanEntry::Ip(IpAddr::from(raw)))
                }
                16 => {
                    let mut raw = [0u8; 16];
                    raw.copy_from_slice(octets.as_bytes());
                    Ok(SanEntry::Ip(IpAddr::from(raw)))
                }
                len => Err(MtlsKitError::DecodingError(format!(
                    "IP address entry of {len} bytes"
                ))),
            },
            _ => Err(MtlsKitError::DecodingError(
                "Unsupported general name type".to_string(),
            )),
        }
    }
}

impl fmt::Display for SanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanEntry::Dns(name) => write!(f, "DNS:{name}"),
            SanEntry::Ip(address) => write!(f, "IP:{address}"),
        }
    }
}

fn strip_prefix_ignore_case<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    let head = input.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &input[prefix.len()..])
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// # Fields
/// * `names` - DNS names and IP addresses, in the order they are encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<SanEntry>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(SanEntry::to_general_name)
                .collect::<Result<Vec<_>>>()?,
        );

        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .map(SanEntry::from_general_name)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { names })
    }
}

/// Represents the Basic Constraints extension.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl KeyUsage {
    /// keyCertSign + cRLSign, carried by every root.
    pub fn certificate_authority() -> Self {
        Self(KeyUsages::KeyCertSign | KeyUsages::CRLSign)
    }

    /// digitalSignature + keyEncipherment, carried by every leaf.
    pub fn end_entity() -> Self {
        Self(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment)
    }

    pub fn contains(&self, usage: KeyUsages) -> bool {
        self.0.contains(usage)
    }
}

impl Default for KeyUsage {
    fn default() -> Self {
        Self(FlagSet::default())
    }
}

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
///
/// This extension indicates purposes for which the public key may be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let oids: Vec<ObjectIdentifier> = self.usage.iter().map(|v| (*v).into()).collect();
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(oids);
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku
            .0
            .iter()
            .map(|v| match *v {
                const_oid::db::rfc5912::ID_KP_SERVER_AUTH => Ok(ExtendedKeyUsageOption::ServerAuth),
                const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => Ok(ExtendedKeyUsageOption::ClientAuth),
                other => Err(MtlsKitError::DecodingError(format!(
                    "Unsupported extended key usage option {other}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { usage })
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    ServerAuth,
    ClientAuth,
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
        }
    }
}

/// Represents the Subject Key Identifier (SKI) extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.as_slice())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// Only the `keyIdentifier` form is written; it equals the issuing CA's
/// subject key identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;
        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }
}

/// The extension profile that decides a certificate's role.
///
/// Key identifiers are not part of the set: the issuing CA derives them when
/// it signs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    pub basic_constraints: BasicConstraints,
    pub key_usage: KeyUsage,
    pub extended_key_usage: Vec<ExtendedKeyUsageOption>,
    pub subject_alt_names: Vec<SanEntry>,
}

impl ExtensionSet {
    pub fn is_ca(&self) -> bool {
        self.basic_constraints.is_ca
    }

    /// Encodes the set as certificate extensions.
    pub fn to_params(&self) -> Result<Vec<ExtensionParam>> {
        let mut params = vec![ExtensionParam::from_extension(&self.basic_constraints, true)?];
        if !self.key_usage.0.is_empty() {
            params.push(ExtensionParam::from_extension(&self.key_usage, true)?);
        }
        if !self.extended_key_usage.is_empty() {
            let eku = ExtendedKeyUsage {
                usage: self.extended_key_usage.clone(),
            };
            params.push(ExtensionParam::from_extension(&eku, false)?);
        }
        if !self.subject_alt_names.is_empty() {
            let san = SubjectAltName {
                names: self.subject_alt_names.clone(),
            };
            params.push(ExtensionParam::from_extension(&san, false)?);
        }
        Ok(params)
    }

    /// Rebuilds the set from decoded certificate extensions.
    ///
    /// Extensions outside the set (key identifiers, unknown OIDs) are skipped.
    pub fn from_params(params: &[ExtensionParam]) -> Result<Self> {
        let mut set = ExtensionSet::default();
        for param in params {
            match param.oid {
                oid if oid == BasicConstraints::OID => {
                    set.basic_constraints = param.to_extension()?;
                }
                oid if oid == KeyUsage::OID => set.key_usage = param.to_extension()?,
                oid if oid == ExtendedKeyUsage::OID => {
                    set.extended_key_usage = param.to_extension::<ExtendedKeyUsage>()?.usage;
                }
                oid if oid == SubjectAltName::OID => {
                    set.subject_alt_names = param.to_extension::<SubjectAltName>()?.names;
                }
                _ => {}
            }
        }
        Ok(set)
    }
}
