//! Unsigned certificate requests for the two leaf roles of an mTLS pair.

use tracing::debug;

use crate::cert::extensions::{
    BasicConstraints, ExtendedKeyUsageOption, ExtensionSet, KeyUsage, SanEntry,
};
use crate::cert::params::DistinguishedName;
use crate::error::{MtlsKitError, Result};
use crate::key::PublicKey;

/// What a leaf certificate is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafRole {
    /// TLS server identity; at least one SAN must name the subject CN.
    Server { subject_alt_names: Vec<SanEntry> },
    /// TLS client identity; the OU is the authorization tag a relying
    /// server checks.
    Client { organizational_unit: String },
}

/// A certificate request: public key, subject and the extensions the issued
/// certificate will carry.
///
/// Requests are consumed by [`crate::issuer::CertificateAuthority::sign`].
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateRequest {
    pub public_key: PublicKey,
    pub subject: DistinguishedName,
    pub extensions: ExtensionSet,
}

/// Builds role-specific [`CertificateRequest`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateRequestBuilder;

impl CertificateRequestBuilder {
    pub fn build(
        public_key: PublicKey,
        subject: DistinguishedName,
        role: LeafRole,
    ) -> Result<CertificateRequest> {
        let mut subject = subject;
        let extensions = match role {
            LeafRole::Server { subject_alt_names } => {
                Self::check_server_sans(&subject, &subject_alt_names)?;
                ExtensionSet {
                    basic_constraints: BasicConstraints::default(),
                    key_usage: KeyUsage::end_entity(),
                    extended_key_usage: vec![ExtendedKeyUsageOption::ServerAuth],
                    subject_alt_names,
                }
            }
            LeafRole::Client {
                organizational_unit,
            } => {
                if organizational_unit.trim().is_empty() {
                    return Err(MtlsKitError::InvalidDistinguishedName(
                        "client certificates need an organizational unit".to_string(),
                    ));
                }
                subject.organization_unit = Some(organizational_unit);
                ExtensionSet {
                    basic_constraints: BasicConstraints::default(),
                    key_usage: KeyUsage::end_entity(),
                    extended_key_usage: vec![ExtendedKeyUsageOption::ClientAuth],
                    subject_alt_names: Vec::new(),
                }
            }
        };
        subject.validate()?;
        debug!(subject = %subject, "built certificate request");
        Ok(CertificateRequest {
            public_key,
            subject,
            extensions,
        })
    }

    fn check_server_sans(subject: &DistinguishedName, names: &[SanEntry]) -> Result<()> {
        if names.is_empty() {
            return Err(MtlsKitError::InvalidSubjectAltName(
                "server certificates need at least one subject alternative name".to_string(),
            ));
        }
        // Entries built by hand bypass SanEntry::parse, so re-check DNS syntax.
        for name in names {
            if let SanEntry::Dns(dns) = name {
                SanEntry::dns(dns)?;
            }
        }
        if !names.iter().any(|name| name.matches(&subject.common_name)) {
            return Err(MtlsKitError::InvalidSubjectAltName(format!(
                "no subject alternative name matches the server identity {:?}",
                subject.common_name
            )));
        }
        Ok(())
    }
}
