use bon::Builder;

use crate::cert::extensions::SanEntry;
use crate::cert::params::DistinguishedName;
use crate::error::{MtlsKitError, Result};
use crate::issuer::{MAX_CA_VALIDITY_DAYS, MAX_LEAF_VALIDITY_DAYS};
use crate::key::KeyAlgorithm;

pub const DEFAULT_ORGANIZATION: &str = "mtlskit";
pub const DEFAULT_CA_VALIDITY_DAYS: i64 = 3650;
pub const DEFAULT_LEAF_VALIDITY_DAYS: i64 = MAX_LEAF_VALIDITY_DAYS;

/// Everything one issuance run needs.
///
/// ```
/// use mtlskit::config::IssuanceConfig;
/// let config = IssuanceConfig::builder()
///     .server_identity("localhost".to_string())
///     .client_common_name("client1".to_string())
///     .client_organizational_unit("TrustedDevices".to_string())
///     .build();
/// assert_eq!(config.ca_validity_days, 3650);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct IssuanceConfig {
    /// Hostname or IP literal the server answers on; becomes the server CN
    /// and its first SAN.
    pub server_identity: String,
    pub client_common_name: String,
    /// Authorization tag written into the client subject, case preserved.
    pub client_organizational_unit: String,
    #[builder(default = DEFAULT_ORGANIZATION.to_string())]
    pub organization: String,
    pub country: Option<String>,
    #[builder(default)]
    pub extra_server_sans: Vec<SanEntry>,
    #[builder(default = DEFAULT_CA_VALIDITY_DAYS)]
    pub ca_validity_days: i64,
    #[builder(default = DEFAULT_LEAF_VALIDITY_DAYS)]
    pub leaf_validity_days: i64,
    #[builder(default = KeyAlgorithm::CA_DEFAULT)]
    pub ca_key: KeyAlgorithm,
    #[builder(default = KeyAlgorithm::LEAF_DEFAULT)]
    pub leaf_key: KeyAlgorithm,
}

impl IssuanceConfig {
    /// Rejects unusable settings before any key is generated.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CA_VALIDITY_DAYS).contains(&self.ca_validity_days) {
            return Err(MtlsKitError::InvalidInput(format!(
                "CA validity must be between 1 and {MAX_CA_VALIDITY_DAYS} days, got {}",
                self.ca_validity_days
            )));
        }
        if !(1..=MAX_LEAF_VALIDITY_DAYS).contains(&self.leaf_validity_days) {
            return Err(MtlsKitError::InvalidInput(format!(
                "leaf validity must be between 1 and {MAX_LEAF_VALIDITY_DAYS} days, got {}",
                self.leaf_validity_days
            )));
        }
        if self.server_identity.trim().is_empty() {
            return Err(MtlsKitError::InvalidSubjectAltName(
                "server identity must not be empty".to_string(),
            ));
        }
        self.server_sans()?;
        self.server_ca_name().validate()?;
        self.client_subject().validate()?;
        if self.client_organizational_unit.trim().is_empty() {
            return Err(MtlsKitError::InvalidDistinguishedName(
                "client organizational unit must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The server identity first, loopback addresses for `localhost`, then
    /// any extra names; duplicates dropped.
    pub fn server_sans(&self) -> Result<Vec<SanEntry>> {
        let identity = SanEntry::parse(&self.server_identity)?;
        let mut names = vec![identity.clone()];
        if matches!(&identity, SanEntry::Dns(_)) && identity.matches("localhost") {
            names.push(SanEntry::parse("IP:127.0.0.1")?);
            names.push(SanEntry::parse("IP:::1")?);
        }
        for extra in &self.extra_server_sans {
            if !names.contains(extra) {
                names.push(extra.clone());
            }
        }
        Ok(names)
    }

    pub fn server_ca_name(&self) -> DistinguishedName {
        self.name(format!("{} Server Root CA", self.organization))
    }

    pub fn client_ca_name(&self) -> DistinguishedName {
        self.name(format!("{} Client Root CA", self.organization))
    }

    pub fn server_subject(&self) -> DistinguishedName {
        self.name(self.server_identity.trim().to_string())
    }

    /// Client subject before the request builder adds the OU.
    pub fn client_subject(&self) -> DistinguishedName {
        self.name(self.client_common_name.clone())
    }

    fn name(&self, common_name: String) -> DistinguishedName {
        DistinguishedName {
            common_name,
            country: self.country.clone(),
            organization: Some(self.organization.clone()),
            organization_unit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IssuanceConfig {
        IssuanceConfig::builder()
            .server_identity("localhost".to_string())
            .client_common_name("client1".to_string())
            .client_organizational_unit("TrustedDevices".to_string())
            .build()
    }

    #[test]
    fn test_localhost_gets_loopback_sans() {
        let rendered: Vec<String> = config()
            .server_sans()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(rendered, ["DNS:localhost", "IP:127.0.0.1", "IP:::1"]);
    }

    #[test]
    fn test_extra_sans_are_deduplicated() {
        let config = IssuanceConfig {
            extra_server_sans: vec![
                SanEntry::parse("IP:127.0.0.1").unwrap(),
                SanEntry::parse("DNS:api.internal").unwrap(),
            ],
            ..config()
        };
        assert_eq!(config.server_sans().unwrap().len(), 4);
    }

    #[test]
    fn test_zero_leaf_validity_is_rejected() {
        let config = IssuanceConfig {
            leaf_validity_days: 0,
            ..config()
        };
        assert!(matches!(
            config.validate(),
            Err(MtlsKitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_oversized_ca_validity_is_rejected() {
        for days in [3_000_000, i64::MAX] {
            let config = IssuanceConfig {
                ca_validity_days: days,
                ..config()
            };
            assert!(matches!(
                config.validate(),
                Err(MtlsKitError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_mixed_case_localhost_gets_loopback_sans() {
        let config = IssuanceConfig {
            server_identity: "LocalHost".to_string(),
            ..config()
        };
        let rendered: Vec<String> = config
            .server_sans()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(rendered, ["DNS:LocalHost", "IP:127.0.0.1", "IP:::1"]);
    }

    #[test]
    fn test_malformed_identity_is_rejected() {
        let config = IssuanceConfig {
            server_identity: "not a host".to_string(),
            ..config()
        };
        assert!(matches!(
            config.validate(),
            Err(MtlsKitError::InvalidSubjectAltName(_))
        ));
    }
}
