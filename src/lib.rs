//! # mtlskit - mutual-TLS certificate hierarchies in pure Rust
//!
//! mtlskit generates everything a mutual-TLS deployment needs in one run,
//! built entirely with rustcrypto libraries:
//!
//! - a **server root CA** and a server leaf certificate whose
//!   subject-alternative-names carry the server identity;
//! - a separate **client root CA** and a client leaf certificate whose subject
//!   carries an organizational unit (OU) the relying server uses to authorize
//!   classes of clients;
//! - full chains (leaf + issuing CA) for both leaves, validated before they
//!   are returned.
//!
//! The two trust domains never cross-sign: a client leaf does not verify
//! against the server root and vice versa.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048 bits and up (4096 is the CA default, 2048 the leaf default)
//! - **ECDSA**: P-256 and P-384
//! - **Ed25519**
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mtlskit::{config::IssuanceConfig, engine::issue, export::Artifacts};
//!
//! # fn main() -> Result<(), mtlskit::error::MtlsKitError> {
//! let config = IssuanceConfig::builder()
//!     .server_identity("localhost".to_string())
//!     .client_common_name("client1".to_string())
//!     .client_organizational_unit("TrustedDevices".to_string())
//!     .build();
//!
//! let hierarchy = issue(config)?;
//! let artifacts = Artifacts::from_hierarchy(&hierarchy)?;
//! println!("{}", artifacts.server_chain);
//! # Ok(())
//! # }
//! ```
//!
//! ### Authorizing a Client
//!
//! ```rust,no_run
//! use mtlskit::{config::IssuanceConfig, engine::issue, policy::ClientAuthorizationPolicy};
//!
//! # fn main() -> Result<(), mtlskit::error::MtlsKitError> {
//! # let config = IssuanceConfig::builder()
//! #     .server_identity("localhost".to_string())
//! #     .client_common_name("client1".to_string())
//! #     .client_organizational_unit("TrustedDevices".to_string())
//! #     .build();
//! let hierarchy = issue(config)?;
//! let policy = ClientAuthorizationPolicy::new(hierarchy.client_ca.clone());
//! policy.authorize(hierarchy.client_chain.certificates())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`error::MtlsKitError`]. Input defects
//! (`InvalidSubjectAltName`, `InvalidDistinguishedName`, `InvalidInput`) are
//! reported before any key is generated; `ExtensionConflict` marks a leaf
//! request that asked for CA rights; `InternalInconsistency` means a freshly
//! issued chain failed its own checks.
//!
//! ## Module Organization
//!
//! - [`key`]: Key generation, signing and verification
//! - [`cert`]: Certificate encoding, names and extensions
//! - [`request`]: Role-specific certificate requests
//! - [`issuer`]: Root creation and leaf signing
//! - [`chain`]: Trust chains and path validation
//! - [`policy`]: OU-based client authorization
//! - [`engine`]: The one-shot issuance run
//! - [`export`]: PEM artifacts and export bundle inputs
//! - [`config`]: Run configuration
//! - [`error`]: Error types

pub mod cert;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod issuer;
pub mod key;
pub mod pem_utils;
pub mod policy;
pub mod request;
pub mod tbs_certificate;
