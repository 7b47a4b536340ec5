use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use mtlskit::export::{
    CLIENT_CA_FILE, CLIENT_CERT_FILE, CLIENT_CHAIN_FILE, CLIENT_KEY_FILE, SERVER_CA_FILE,
    SERVER_CHAIN_FILE, SERVER_KEY_FILE,
};

fn mtlskit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mtlskit"))
        .args(args)
        .output()
        .expect("Failed to execute mtlskit")
}

fn generate(dir: &Path) -> Output {
    mtlskit(&[
        "generate",
        "--ca-key",
        "p256",
        "--leaf-key",
        "p256",
        "--out",
        dir.to_str().unwrap(),
    ])
}

fn verify(cert: &Path, ca: &Path, extra: &[&str]) -> Output {
    let mut args = vec![
        "verify",
        "--cert",
        cert.to_str().unwrap(),
        "--ca",
        ca.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    mtlskit(&args)
}

#[test]
fn test_generate_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let output = generate(dir.path());
    assert!(
        output.status.success(),
        "generate failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    for name in [
        SERVER_KEY_FILE,
        SERVER_CHAIN_FILE,
        SERVER_CA_FILE,
        CLIENT_CA_FILE,
        CLIENT_KEY_FILE,
        CLIENT_CERT_FILE,
        CLIENT_CHAIN_FILE,
    ] {
        let contents = fs::read_to_string(dir.path().join(name)).unwrap();
        assert!(contents.starts_with("-----BEGIN "), "{name} is not PEM");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let server_ca = dir.path().join(SERVER_CA_FILE);
    let server_chain = dir.path().join(SERVER_CHAIN_FILE);
    assert!(stdout.contains(&format!(
        "openssl verify -CAfile {} {}",
        server_ca.display(),
        server_chain.display()
    )));
}

#[cfg(unix)]
#[test]
fn test_generate_restricts_key_files() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    // A stale, world-readable key must be tightened on overwrite.
    let stale = dir.path().join(SERVER_KEY_FILE);
    fs::write(&stale, "old").unwrap();
    fs::set_permissions(&stale, fs::Permissions::from_mode(0o644)).unwrap();

    assert!(generate(dir.path()).status.success());

    for name in [SERVER_KEY_FILE, CLIENT_KEY_FILE] {
        let mode = fs::metadata(dir.path().join(name)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600, "{name} has mode {mode:o}");
    }
}

#[test]
fn test_verify_checks_trust_domain() {
    let dir = tempfile::tempdir().unwrap();
    assert!(generate(dir.path()).status.success());
    let path = |name: &str| dir.path().join(name);

    assert!(verify(&path(SERVER_CHAIN_FILE), &path(SERVER_CA_FILE), &[]).status.success());
    assert!(verify(&path(CLIENT_CERT_FILE), &path(CLIENT_CA_FILE), &[]).status.success());
    assert!(!verify(&path(CLIENT_CERT_FILE), &path(SERVER_CA_FILE), &[]).status.success());
    assert!(!verify(&path(SERVER_CHAIN_FILE), &path(CLIENT_CA_FILE), &[]).status.success());
}

#[test]
fn test_verify_require_ou() {
    let dir = tempfile::tempdir().unwrap();
    assert!(generate(dir.path()).status.success());
    let chain = dir.path().join(CLIENT_CHAIN_FILE);
    let ca = dir.path().join(CLIENT_CA_FILE);

    let accepted = verify(&chain, &ca, &["--require-ou", "TrustedDevices"]);
    assert!(
        accepted.status.success(),
        "verify failed: {}",
        String::from_utf8_lossy(&accepted.stderr)
    );
    assert!(String::from_utf8_lossy(&accepted.stdout).contains("OK"));

    let rejected = verify(&chain, &ca, &["--require-ou", "Guests"]);
    assert!(!rejected.status.success());
    assert!(String::from_utf8_lossy(&rejected.stderr).contains("Unauthorized"));
}

#[test]
fn test_generate_rejects_out_of_range_validity() {
    let dir = tempfile::tempdir().unwrap();
    let output = mtlskit(&[
        "generate",
        "--ca-key",
        "p256",
        "--leaf-key",
        "p256",
        "--ca-days",
        "3000000",
        "--out",
        dir.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid input"), "unexpected stderr: {stderr}");
    assert!(!stderr.contains("panicked"));
    assert!(!dir.path().join(SERVER_KEY_FILE).exists());
}
