//! The client-certificate check a relying mTLS server applies to the
//! artifacts this crate produces.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::cert::Certificate;
use crate::chain::verify_leaf;
use crate::error::{MtlsKitError, Result};

/// OU accepted by default.
pub const TRUSTED_DEVICES: &str = "TrustedDevices";

/// Accepts a client when its leaf chains to the trusted client root and the
/// leaf subject carries one of the allowed organizational units.
///
/// The OU comparison is exact and case-sensitive. It is applied to the leaf
/// only; CA certificates in the path are never checked for an OU.
#[derive(Debug, Clone)]
pub struct ClientAuthorizationPolicy {
    trusted_root: Certificate,
    allowed_units: BTreeSet<String>,
}

impl ClientAuthorizationPolicy {
    pub fn new(trusted_root: Certificate) -> Self {
        Self::with_units(trusted_root, [TRUSTED_DEVICES])
    }

    pub fn with_units<I, S>(trusted_root: Certificate, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trusted_root,
            allowed_units: units.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowed_units(&self) -> impl Iterator<Item = &str> {
        self.allowed_units.iter().map(String::as_str)
    }

    /// Checks a presented client chain, leaf first. A trailing copy of the
    /// trusted root is tolerated and ignored.
    pub fn authorize(&self, presented: &[Certificate]) -> Result<()> {
        let Some((leaf, rest)) = presented.split_first() else {
            return Err(MtlsKitError::ChainValidation(
                "no client certificate presented".to_string(),
            ));
        };
        let intermediates: Vec<Certificate> = rest
            .iter()
            .filter(|cert| **cert != self.trusted_root)
            .cloned()
            .collect();

        for (depth, cert) in presented.iter().enumerate() {
            debug!(depth, subject = %cert.subject()?, "client chain");
        }

        verify_leaf(leaf, &intermediates, &self.trusted_root)?;

        let subject = leaf.subject()?;
        match subject.organization_unit.as_deref() {
            Some(unit) if self.allowed_units.contains(unit) => {
                debug!(subject = %subject, "client authorized");
                Ok(())
            }
            _ => {
                warn!(subject = %subject, "rejecting client: organizational unit not allowed");
                Err(MtlsKitError::Unauthorized(format!(
                    "client \"{subject}\" lacks an allowed organizational unit"
                )))
            }
        }
    }
}
