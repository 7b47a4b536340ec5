//! mtlskit CLI.
//!
//! `generate` writes a complete mTLS hierarchy into a directory; `verify`
//! checks a leaf certificate against a root the way a relying party would.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mtlskit::cert::Certificate;
use mtlskit::cert::extensions::SanEntry;
use mtlskit::chain::verify_leaf;
use mtlskit::config::{
    DEFAULT_CA_VALIDITY_DAYS, DEFAULT_LEAF_VALIDITY_DAYS, DEFAULT_ORGANIZATION, IssuanceConfig,
};
use mtlskit::engine::issue;
use mtlskit::export::{
    Artifacts, CLIENT_CA_FILE, CLIENT_CERT_FILE, CLIENT_CHAIN_FILE, SERVER_CA_FILE,
    SERVER_CHAIN_FILE,
};
use mtlskit::key::KeyAlgorithm;
use mtlskit::pem_utils::pem_to_certificate_ders;
use mtlskit::policy::ClientAuthorizationPolicy;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mtlskit")]
#[command(about = "Generate and check mutual-TLS certificate hierarchies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue server and client CAs, leaves and chains
    Generate {
        /// Hostname or IP the server answers on
        #[arg(long, default_value = "localhost")]
        server: String,

        /// Client certificate common name
        #[arg(long, default_value = "client1")]
        client_cn: String,

        /// Client organizational unit (authorization tag)
        #[arg(long, default_value = mtlskit::policy::TRUSTED_DEVICES)]
        client_ou: String,

        /// Organization written into every subject
        #[arg(long, default_value = DEFAULT_ORGANIZATION)]
        organization: String,

        /// Two-letter country code written into every subject
        #[arg(long)]
        country: Option<String>,

        /// Extra server SANs (`DNS:name`, `IP:addr` or bare)
        #[arg(long = "san")]
        sans: Vec<String>,

        #[arg(long, default_value_t = DEFAULT_CA_VALIDITY_DAYS)]
        ca_days: i64,

        #[arg(long, default_value_t = DEFAULT_LEAF_VALIDITY_DAYS)]
        leaf_days: i64,

        /// CA key algorithm (rsa4096, rsa2048, p256, p384, ed25519)
        #[arg(long, default_value = "rsa4096")]
        ca_key: KeyAlgorithm,

        /// Leaf key algorithm
        #[arg(long, default_value = "rsa2048")]
        leaf_key: KeyAlgorithm,

        /// Output directory
        #[arg(long, short, default_value = ".")]
        out: PathBuf,
    },

    /// Verify a leaf (or chain) PEM against a trusted root PEM
    Verify {
        /// Leaf certificate, optionally followed by intermediates
        #[arg(long)]
        cert: PathBuf,

        /// Trusted root certificate
        #[arg(long)]
        ca: PathBuf,

        /// Also require one of these organizational units on the leaf
        #[arg(long = "require-ou")]
        require_ou: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            server,
            client_cn,
            client_ou,
            organization,
            country,
            sans,
            ca_days,
            leaf_days,
            ca_key,
            leaf_key,
            out,
        } => {
            let extra_server_sans = sans
                .iter()
                .map(|san| SanEntry::parse(san))
                .collect::<Result<Vec<_>, _>>()
                .context("parsing --san")?;
            let config = IssuanceConfig::builder()
                .server_identity(server)
                .client_common_name(client_cn)
                .client_organizational_unit(client_ou)
                .organization(organization)
                .maybe_country(country)
                .extra_server_sans(extra_server_sans)
                .ca_validity_days(ca_days)
                .leaf_validity_days(leaf_days)
                .ca_key(ca_key)
                .leaf_key(leaf_key)
                .build();
            handle_generate(config, &out)
        }
        Commands::Verify {
            cert,
            ca,
            require_ou,
        } => handle_verify(&cert, &ca, require_ou),
    }
}

fn handle_generate(config: IssuanceConfig, out: &Path) -> Result<()> {
    let hierarchy = issue(config).context("issuing certificate hierarchy")?;
    let artifacts = Artifacts::from_hierarchy(&hierarchy).context("encoding artifacts")?;

    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    for (name, contents) in artifacts.files() {
        let path = out.join(name);
        write_artifact(&path, contents, Artifacts::is_secret(name))?;
        info!(path = %path.display(), "wrote artifact");
    }

    let dir = out.display();
    println!("Verify the server chain:");
    println!("  openssl verify -CAfile {dir}/{SERVER_CA_FILE} {dir}/{SERVER_CHAIN_FILE}");
    println!("Verify the client certificate:");
    println!("  openssl verify -CAfile {dir}/{CLIENT_CA_FILE} {dir}/{CLIENT_CERT_FILE}");
    println!("Inspect the client subject (OU is the authorization tag):");
    println!("  openssl x509 -in {dir}/{CLIENT_CHAIN_FILE} -noout -subject");
    Ok(())
}

fn write_artifact(path: &Path, contents: &str, secret: bool) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if secret {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = secret;

    let mut file = options
        .open(path)
        .with_context(|| format!("creating {}", path.display()))?;
    // The creation mode does not apply to a file that already existed.
    #[cfg(unix)]
    if secret {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restricting {}", path.display()))?;
    }
    file.write_all(contents.as_bytes())
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn read_certificates(path: &Path) -> Result<Vec<Certificate>> {
    let pem = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    pem_to_certificate_ders(&pem)
        .with_context(|| format!("parsing {}", path.display()))?
        .iter()
        .map(|der| Certificate::from_der(der).with_context(|| format!("decoding {}", path.display())))
        .collect()
}

fn handle_verify(cert: &Path, ca: &Path, require_ou: Vec<String>) -> Result<()> {
    let presented = read_certificates(cert)?;
    let root = read_certificates(ca)?
        .into_iter()
        .next()
        .context("no root certificate")?;

    if require_ou.is_empty() {
        let (leaf, rest) = presented
            .split_first()
            .context("no leaf certificate")?;
        let intermediates: Vec<Certificate> =
            rest.iter().filter(|c| **c != root).cloned().collect();
        verify_leaf(leaf, &intermediates, &root).context("chain validation")?;
    } else {
        ClientAuthorizationPolicy::with_units(root, require_ou)
            .authorize(&presented)
            .context("client authorization")?;
    }
    println!("{}: OK", cert.display());
    Ok(())
}
