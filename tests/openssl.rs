mod util;

use std::fs;
use std::process::Command;

use mtlskit::engine::issue;
use mtlskit::export::{Artifacts, CLIENT_CA_FILE, CLIENT_CERT_FILE, SERVER_CA_FILE, SERVER_CHAIN_FILE};
use openssl::nid::Nid;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509, X509StoreContext};
use regex::Regex;

fn verifies(leaf_pem: &str, root_pem: &str) -> bool {
    let leaf = X509::from_pem(leaf_pem.as_bytes()).expect("Failed to parse leaf PEM");
    let root = X509::from_pem(root_pem.as_bytes()).expect("Failed to parse root PEM");

    let mut builder = X509StoreBuilder::new().unwrap();
    builder.add_cert(root).unwrap();
    let store = builder.build();

    let chain = Stack::new().unwrap();
    let mut context = X509StoreContext::new().unwrap();
    context
        .init(&store, &leaf, &chain, |c| c.verify_cert())
        .unwrap()
}

fn entry(name: &openssl::x509::X509NameRef, nid: Nid) -> String {
    name.entries_by_nid(nid)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap()
        .to_string()
}

#[test]
fn test_openssl_crate_accepts_hierarchy() {
    let hierarchy = issue(util::localhost_config()).unwrap();
    let artifacts = Artifacts::from_hierarchy(&hierarchy).unwrap();

    assert!(verifies(&artifacts.server_chain, &artifacts.server_ca));
    assert!(verifies(&artifacts.client_cert, &artifacts.client_ca));
    assert!(!verifies(&artifacts.client_cert, &artifacts.server_ca));
    assert!(!verifies(&artifacts.server_chain, &artifacts.client_ca));
}

#[test]
fn test_openssl_crate_reads_fields() {
    let hierarchy = issue(util::localhost_config()).unwrap();
    let artifacts = Artifacts::from_hierarchy(&hierarchy).unwrap();

    let client = X509::from_pem(artifacts.client_cert.as_bytes()).unwrap();
    assert_eq!(entry(client.subject_name(), Nid::COMMONNAME), "client1");
    assert_eq!(
        entry(client.subject_name(), Nid::ORGANIZATIONALUNITNAME),
        "TrustedDevices"
    );
    assert_eq!(
        entry(client.issuer_name(), Nid::COMMONNAME),
        "mtlskit Client Root CA"
    );
    assert_eq!(client.version(), 2, "X509 version should be 3 (0-based index)");
    assert_eq!(
        client.signature_algorithm().object().nid(),
        Nid::ECDSA_WITH_SHA256
    );

    let server = X509::from_pem(artifacts.server_chain.as_bytes()).unwrap();
    let sans = server.subject_alt_names().expect("server leaf has SANs");
    assert!(sans.iter().any(|name| name.dnsname() == Some("localhost")));
    assert!(
        sans.iter()
            .any(|name| name.ipaddress() == Some(&[127, 0, 0, 1][..]))
    );

    let key = openssl::pkey::PKey::private_key_from_pem(artifacts.server_key.as_bytes())
        .expect("PKCS#8 key readable by OpenSSL");
    assert!(server.public_key().unwrap().public_eq(&key));
}

#[test]
fn test_openssl_cli_verifies_written_files() {
    let hierarchy = issue(util::localhost_config()).unwrap();
    let artifacts = Artifacts::from_hierarchy(&hierarchy).unwrap();

    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in artifacts.files() {
        fs::write(dir.path().join(name), contents).expect("Failed to write artifact");
    }

    for (ca, cert) in [
        (SERVER_CA_FILE, SERVER_CHAIN_FILE),
        (CLIENT_CA_FILE, CLIENT_CERT_FILE),
    ] {
        let output = Command::new("openssl")
            .arg("verify")
            .arg("-CAfile")
            .arg(dir.path().join(ca))
            .arg(dir.path().join(cert))
            .output()
            .expect("Failed to execute OpenSSL command");
        assert!(
            output.status.success(),
            "OpenSSL verify failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let output = Command::new("openssl")
        .arg("x509")
        .arg("-in")
        .arg(dir.path().join(CLIENT_CERT_FILE))
        .arg("-noout")
        .arg("-text")
        .output()
        .expect("Failed to execute OpenSSL command");
    assert!(output.status.success());

    let output_text = String::from_utf8_lossy(&output.stdout);
    let subject_regex = Regex::new(r"Subject: .*OU\s?=\s?TrustedDevices.*CN\s?=\s?client1").unwrap();
    assert!(
        subject_regex.is_match(&output_text),
        "Subject field is incorrect: {output_text}"
    );
    assert!(output_text.contains("TLS Web Client Authentication"));
    assert!(output_text.contains("CA:FALSE"));
}
