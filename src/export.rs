//! Encoded output artifacts handed to file emission and packaging.

use std::fmt;

use crate::engine::IssuedHierarchy;
use crate::error::{MtlsKitError, Result};

pub const SERVER_KEY_FILE: &str = "key.pem";
pub const SERVER_CHAIN_FILE: &str = "cert.pem";
pub const SERVER_CA_FILE: &str = "server-ca.pem";
pub const CLIENT_CA_FILE: &str = "client-ca.pem";
pub const CLIENT_KEY_FILE: &str = "client-key.pem";
pub const CLIENT_CERT_FILE: &str = "client-cert.pem";
pub const CLIENT_CHAIN_FILE: &str = "client-chain.pem";

/// PEM-encoded artifacts of one run.
///
/// The server side needs `server_key`, `server_chain` and `client_ca` (its
/// trusted client root); clients need `server_ca`, their key and chain.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub server_key: String,
    pub server_chain: String,
    pub server_ca: String,
    pub client_ca: String,
    pub client_key: String,
    pub client_cert: String,
    pub client_chain: String,
}

impl fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifacts")
            .field("server_chain", &self.server_chain)
            .field("server_ca", &self.server_ca)
            .field("client_ca", &self.client_ca)
            .field("client_cert", &self.client_cert)
            .field("client_chain", &self.client_chain)
            .finish_non_exhaustive()
    }
}

impl Artifacts {
    pub fn from_hierarchy(hierarchy: &IssuedHierarchy) -> Result<Self> {
        Ok(Self {
            server_key: hierarchy.server_key.to_pkcs8_pem()?,
            server_chain: hierarchy.server_chain.to_pem()?,
            server_ca: hierarchy.server_ca.to_pem()?,
            client_ca: hierarchy.client_ca.to_pem()?,
            client_key: hierarchy.client_key.to_pkcs8_pem()?,
            client_cert: hierarchy.client_leaf.to_pem()?,
            client_chain: hierarchy.client_chain.to_pem()?,
        })
    }

    /// File name and contents for every artifact.
    pub fn files(&self) -> [(&'static str, &str); 7] {
        [
            (SERVER_KEY_FILE, self.server_key.as_str()),
            (SERVER_CHAIN_FILE, self.server_chain.as_str()),
            (SERVER_CA_FILE, self.server_ca.as_str()),
            (CLIENT_CA_FILE, self.client_ca.as_str()),
            (CLIENT_KEY_FILE, self.client_key.as_str()),
            (CLIENT_CERT_FILE, self.client_cert.as_str()),
            (CLIENT_CHAIN_FILE, self.client_chain.as_str()),
        ]
    }

    /// True for files holding private keys.
    pub fn is_secret(file_name: &str) -> bool {
        matches!(file_name, SERVER_KEY_FILE | CLIENT_KEY_FILE)
    }
}

/// Inputs for a password-protected interoperability bundle (PKCS#12 or
/// similar), built by an external packager.
#[derive(Clone, PartialEq, Eq)]
pub struct ExportBundle {
    pub certificate_der: Vec<u8>,
    pub private_key_der: Vec<u8>,
    pub ca_certificates_der: Vec<Vec<u8>>,
    pub friendly_name: String,
    pub password: String,
}

impl fmt::Debug for ExportBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportBundle")
            .field("friendly_name", &self.friendly_name)
            .field("ca_certificates", &self.ca_certificates_der.len())
            .finish_non_exhaustive()
    }
}

impl ExportBundle {
    /// Bundle inputs for the client leaf. The password has no default.
    pub fn for_client(
        hierarchy: &IssuedHierarchy,
        friendly_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let friendly_name = friendly_name.into();
        let password = password.into();
        if friendly_name.trim().is_empty() {
            return Err(MtlsKitError::InvalidInput(
                "export bundle needs a friendly name".to_string(),
            ));
        }
        if password.is_empty() {
            return Err(MtlsKitError::InvalidInput(
                "export bundle needs a caller-supplied password".to_string(),
            ));
        }
        Ok(Self {
            certificate_der: hierarchy.client_leaf.to_der()?,
            private_key_der: hierarchy.client_key.to_pkcs8_der()?,
            ca_certificates_der: vec![hierarchy.client_ca.to_der()?],
            friendly_name,
            password,
        })
    }
}
