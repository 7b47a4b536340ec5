use mtlskit::config::IssuanceConfig;
use mtlskit::key::KeyAlgorithm;

/// The localhost / client1 / TrustedDevices run with fast P-256 keys.
pub fn localhost_config() -> IssuanceConfig {
    IssuanceConfig::builder()
        .server_identity("localhost".to_string())
        .client_common_name("client1".to_string())
        .client_organizational_unit("TrustedDevices".to_string())
        .ca_key(KeyAlgorithm::EcdsaP256)
        .leaf_key(KeyAlgorithm::EcdsaP256)
        .build()
}
