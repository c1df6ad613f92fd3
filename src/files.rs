use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use uuid::Uuid;

/// Decoded payment proofs are capped at 5 MiB.
pub const MAX_PROOF_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "application/pdf"];
const SAFE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "pdf"];

#[derive(Debug, Clone)]
pub struct ProofFile {
    /// Object name inside the bucket, unique per request.
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Validate and decode a payment-proof attachment.
///
/// The declared MIME type is checked before decoding; the size cap applies to
/// the decoded length. Errors are client-visible messages.
pub fn process_proof(
    base64_payload: &str,
    declared_filename: Option<&str>,
    declared_type: Option<&str>,
) -> Result<ProofFile, String> {
    let content_type = declared_type.unwrap_or_default().trim().to_ascii_lowercase();
    if !ALLOWED_TYPES.contains(&content_type.as_str()) {
        return Err("Invalid payment proof file type".to_string());
    }

    // Clients sometimes send the whole data URL instead of the bare payload.
    let raw = match base64_payload.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => base64_payload,
    };
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|_| "Invalid payment proof encoding".to_string())?;

    if bytes.len() > MAX_PROOF_BYTES {
        return Err("Payment proof file too large (max 5MB)".to_string());
    }

    let name = derive_object_name(declared_filename.unwrap_or_default());
    Ok(ProofFile {
        name,
        bytes,
        content_type,
    })
}

/// Coarse timestamp plus a random token; the extension comes from the declared
/// filename only when it is in the safe set, so a hostile filename can never
/// influence the stored name beyond a known-good suffix.
fn derive_object_name(declared_filename: &str) -> String {
    let ext = declared_filename
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .filter(|e| SAFE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or_else(|| "bin".to_string());
    format!("{}-{}.{}", Utc::now().timestamp_millis(), Uuid::new_v4(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    #[test]
    fn rejects_disallowed_type_before_decoding() {
        // Payload is not even valid base64; the type check must fire first.
        let err = process_proof("%%%", Some("a.zip"), Some("application/zip")).unwrap_err();
        assert_eq!(err, "Invalid payment proof file type");
    }

    #[test]
    fn size_cap_is_exact() {
        let at_cap = vec![0u8; MAX_PROOF_BYTES];
        assert!(process_proof(&b64(&at_cap), Some("a.png"), Some("image/png")).is_ok());

        let over = vec![0u8; MAX_PROOF_BYTES + 1];
        let err = process_proof(&b64(&over), Some("a.png"), Some("image/png")).unwrap_err();
        assert_eq!(err, "Payment proof file too large (max 5MB)");
    }

    #[test]
    fn decodes_data_url_payloads() {
        let payload = format!("data:image/png;base64,{}", b64(b"png-bytes"));
        let proof = process_proof(&payload, Some("a.png"), Some("image/png")).unwrap();
        assert_eq!(proof.bytes, b"png-bytes");
    }

    #[test]
    fn invalid_base64_is_a_client_error() {
        let err = process_proof("not base64!!!", Some("a.png"), Some("image/png")).unwrap_err();
        assert_eq!(err, "Invalid payment proof encoding");
    }

    #[test]
    fn unsafe_extensions_fall_back_to_bin() {
        assert!(derive_object_name("proof.PDF").ends_with(".pdf"));
        assert!(derive_object_name("proof.jpeg").ends_with(".jpeg"));
        assert!(derive_object_name("../../etc/passwd").ends_with(".bin"));
        assert!(derive_object_name("proof.png.exe").ends_with(".bin"));
        assert!(derive_object_name("").ends_with(".bin"));
    }

    #[test]
    fn derived_names_are_unique() {
        let a = derive_object_name("a.png");
        let b = derive_object_name("a.png");
        assert_ne!(a, b);
    }

    #[test]
    fn declared_type_is_case_insensitive() {
        let proof = process_proof(&b64(b"x"), Some("a.webp"), Some("Image/WebP")).unwrap();
        assert_eq!(proof.content_type, "image/webp");
    }
}
