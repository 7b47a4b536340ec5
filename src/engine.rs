//! One-shot issuance of the full mTLS hierarchy.
//!
//! The run is a fixed sequence of steps. Any failure aborts it and the caller
//! receives the originating error; nothing partially issued is returned.

use std::fmt;

use tracing::{debug, info, info_span};

use crate::cert::Certificate;
use crate::chain::TrustChain;
use crate::config::IssuanceConfig;
use crate::error::{MtlsKitError, Result};
use crate::issuer::CertificateAuthority;
use crate::key::KeyPair;
use crate::request::{CertificateRequestBuilder, LeafRole};

/// Progress of an [`IssuanceEngine`] run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssuanceState {
    Start,
    ServerCAReady,
    ClientCAReady,
    ServerLeafIssued,
    ServerChainAssembled,
    ClientLeafIssued,
    ClientChainAssembled,
    Done,
}

impl fmt::Display for IssuanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Everything a run produces. CA private keys are not part of it: they are
/// dropped with the engine's CA instances.
#[derive(Debug)]
pub struct IssuedHierarchy {
    pub server_ca: Certificate,
    pub client_ca: Certificate,
    pub server_leaf: Certificate,
    pub server_key: KeyPair,
    pub server_chain: TrustChain,
    pub client_leaf: Certificate,
    pub client_key: KeyPair,
    pub client_chain: TrustChain,
}

/// Drives key generation, CA creation, leaf issuance and chain assembly.
#[derive(Debug)]
pub struct IssuanceEngine {
    config: IssuanceConfig,
    state: IssuanceState,
}

impl IssuanceEngine {
    pub fn new(config: IssuanceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: IssuanceState::Start,
        })
    }

    /// The last step that completed.
    pub fn state(&self) -> IssuanceState {
        self.state
    }

    fn advance(&mut self, next: IssuanceState) {
        debug!(from = %self.state, to = %next, "issuance step complete");
        self.state = next;
    }

    /// Runs every step once. An engine runs at most once; build a new one to
    /// issue another hierarchy.
    pub fn run(&mut self) -> Result<IssuedHierarchy> {
        if self.state != IssuanceState::Start {
            return Err(MtlsKitError::InvalidInput(format!(
                "engine already ran (state {})",
                self.state
            )));
        }
        let span = info_span!("issuance", server = %self.config.server_identity);
        let _guard = span.enter();

        let config = self.config.clone();

        let mut server_ca = CertificateAuthority::create_root(
            config.server_ca_name(),
            KeyPair::generate(config.ca_key)?,
            config.ca_validity_days,
        )?;
        self.advance(IssuanceState::ServerCAReady);

        let mut client_ca = CertificateAuthority::create_root(
            config.client_ca_name(),
            KeyPair::generate(config.ca_key)?,
            config.ca_validity_days,
        )?;
        self.advance(IssuanceState::ClientCAReady);

        let server_key = KeyPair::generate(config.leaf_key)?;
        let server_request = CertificateRequestBuilder::build(
            server_key.public_key(),
            config.server_subject(),
            LeafRole::Server {
                subject_alt_names: config.server_sans()?,
            },
        )?;
        let server_leaf = server_ca.sign(server_request, config.leaf_validity_days)?;
        self.advance(IssuanceState::ServerLeafIssued);

        let server_chain =
            TrustChain::assemble(server_leaf.clone(), vec![], server_ca.certificate().clone());
        check_chain("server", &server_chain)?;
        self.advance(IssuanceState::ServerChainAssembled);

        let client_key = KeyPair::generate(config.leaf_key)?;
        let client_request = CertificateRequestBuilder::build(
            client_key.public_key(),
            config.client_subject(),
            LeafRole::Client {
                organizational_unit: config.client_organizational_unit.clone(),
            },
        )?;
        let client_leaf = client_ca.sign(client_request, config.leaf_validity_days)?;
        self.advance(IssuanceState::ClientLeafIssued);

        let client_chain =
            TrustChain::assemble(client_leaf.clone(), vec![], client_ca.certificate().clone());
        check_chain("client", &client_chain)?;
        self.advance(IssuanceState::ClientChainAssembled);

        check_leaves(&config, &server_leaf, &client_leaf, &server_ca, &client_ca)?;

        let hierarchy = IssuedHierarchy {
            server_ca: server_ca.certificate().clone(),
            client_ca: client_ca.certificate().clone(),
            server_leaf,
            server_key,
            server_chain,
            client_leaf,
            client_key,
            client_chain,
        };
        self.advance(IssuanceState::Done);
        info!(
            server_ca = %server_ca.name(),
            client_ca = %client_ca.name(),
            "issued mTLS hierarchy"
        );
        Ok(hierarchy)
    }
}

/// Convenience wrapper: validate `config`, run once, return the hierarchy.
pub fn issue(config: IssuanceConfig) -> Result<IssuedHierarchy> {
    IssuanceEngine::new(config)?.run()
}

fn check_chain(label: &str, chain: &TrustChain) -> Result<()> {
    chain.validate().map_err(|err| {
        MtlsKitError::InternalInconsistency(format!("freshly issued {label} chain is invalid: {err}"))
    })
}

fn inconsistency(err: MtlsKitError) -> MtlsKitError {
    match err {
        MtlsKitError::InternalInconsistency(_) => err,
        other => MtlsKitError::InternalInconsistency(other.to_string()),
    }
}

/// Post-issuance checks on what the two leaves actually carry.
fn check_leaves(
    config: &IssuanceConfig,
    server_leaf: &Certificate,
    client_leaf: &Certificate,
    server_ca: &CertificateAuthority,
    client_ca: &CertificateAuthority,
) -> Result<()> {
    let server_sans = server_leaf.extensions().map_err(inconsistency)?.subject_alt_names;
    if !server_sans
        .iter()
        .any(|name| name.matches(&config.server_identity))
    {
        return Err(MtlsKitError::InternalInconsistency(
            "server leaf does not name the configured identity".to_string(),
        ));
    }

    let client_subject = client_leaf.subject().map_err(inconsistency)?;
    if client_subject.organization_unit.as_deref() != Some(config.client_organizational_unit.as_str()) {
        return Err(MtlsKitError::InternalInconsistency(format!(
            "client leaf OU {:?} differs from configured {:?}",
            client_subject.organization_unit, config.client_organizational_unit
        )));
    }

    // The two trust domains must stay disjoint.
    if client_leaf.verify_signed_by(server_ca.certificate()).is_ok()
        || server_leaf.verify_signed_by(client_ca.certificate()).is_ok()
    {
        return Err(MtlsKitError::InternalInconsistency(
            "a leaf verifies under the other domain's CA".to_string(),
        ));
    }
    Ok(())
}
