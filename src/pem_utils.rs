use crate::error::{MtlsKitError, Result};

/// Label used for X.509 certificate PEM blocks.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(&pem, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF))
}

/// Concatenate several DER certificates into one PEM bundle, in order.
pub fn certificates_to_pem(ders: &[Vec<u8>]) -> String {
    let blocks: Vec<pem::Pem> = ders
        .iter()
        .map(|der| pem::Pem::new(CERTIFICATE_LABEL, der.as_slice()))
        .collect();
    pem::encode_many_config(&blocks, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF))
}

/// Convert a PEM‑encoded string to DER‑encoded bytes.
pub fn pem_to_der(pem_str: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str)?;
    Ok(pem.contents().to_vec())
}

/// Extract every `CERTIFICATE` block from a PEM bundle.
pub fn pem_to_certificate_ders(pem_str: &str) -> Result<Vec<Vec<u8>>> {
    let ders: Vec<Vec<u8>> = pem::parse_many(pem_str)?
        .into_iter()
        .filter(|block| block.tag() == CERTIFICATE_LABEL)
        .map(|block| block.into_contents())
        .collect();
    if ders.is_empty() {
        return Err(MtlsKitError::DecodingError(
            "no CERTIFICATE block found".to_string(),
        ));
    }
    Ok(ders)
}
