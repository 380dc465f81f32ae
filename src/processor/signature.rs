//! Webhook signature verification.
//!
//! Mercado Pago signs notifications with an `x-signature` header of the form
//! `ts=<unix-ts>,v1=<hmac-hex>`. The HMAC-SHA256 is computed over a manifest
//! string `id:<data.id>;request-id:<x-request-id>;ts:<ts>;` where segments
//! with no value are omitted, and the `id` segment is lower-cased.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

/// Parse `ts=...,v1=...`. Order of parts does not matter; unknown keys are
/// ignored. Returns None when either required part is missing.
pub fn parse_signature_header(header: &str) -> Option<SignatureHeader> {
    let mut ts = None;
    let mut v1 = None;
    for part in header.split(',') {
        let mut kv = part.splitn(2, '=');
        let key = kv.next()?.trim();
        let value = kv.next()?.trim();
        match key {
            "ts" => ts = Some(value.to_string()),
            "v1" => v1 = Some(value.to_string()),
            _ => {}
        }
    }
    Some(SignatureHeader { ts: ts?, v1: v1? })
}

/// Build the signed manifest for a notification.
pub fn build_manifest(resource_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut manifest = String::new();
    if let Some(id) = resource_id.filter(|v| !v.is_empty()) {
        manifest.push_str(&format!("id:{};", id.to_lowercase()));
    }
    if let Some(rid) = request_id.filter(|v| !v.is_empty()) {
        manifest.push_str(&format!("request-id:{};", rid));
    }
    manifest.push_str(&format!("ts:{};", ts));
    manifest
}

/// Verify a notification signature against the shared webhook secret.
pub fn verify_signature(
    secret: &str,
    signature_header: &str,
    resource_id: Option<&str>,
    request_id: Option<&str>,
) -> bool {
    let Some(parsed) = parse_signature_header(signature_header) else {
        return false;
    };

    let manifest = build_manifest(resource_id, request_id, &parsed.ts);

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(manifest.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    secure_eq(computed.as_bytes(), parsed.v1.trim().as_bytes())
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, manifest: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(manifest.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn parses_well_formed_header() {
        let parsed = parse_signature_header("ts=1704908010,v1=abcdef0123").unwrap();
        assert_eq!(parsed.ts, "1704908010");
        assert_eq!(parsed.v1, "abcdef0123");
    }

    #[test]
    fn parses_header_with_extra_keys_and_spaces() {
        let parsed = parse_signature_header("v1=deadbeef, ts=42, alg=hs256").unwrap();
        assert_eq!(parsed.ts, "42");
        assert_eq!(parsed.v1, "deadbeef");
    }

    #[test]
    fn rejects_header_missing_v1() {
        assert!(parse_signature_header("ts=1704908010").is_none());
    }

    #[test]
    fn manifest_omits_absent_segments() {
        assert_eq!(
            build_manifest(Some("PAY123"), Some("req-1"), "42"),
            "id:pay123;request-id:req-1;ts:42;"
        );
        assert_eq!(build_manifest(None, None, "42"), "ts:42;");
        assert_eq!(build_manifest(Some(""), None, "42"), "ts:42;");
    }

    #[test]
    fn accepts_valid_signature() {
        let secret = "whsec_test";
        let manifest = build_manifest(Some("12345"), Some("req-abc"), "1704908010");
        let v1 = sign(secret, &manifest);
        let header = format!("ts=1704908010,v1={}", v1);
        assert!(verify_signature(
            secret,
            &header,
            Some("12345"),
            Some("req-abc")
        ));
    }

    #[test]
    fn rejects_tampered_resource_id() {
        let secret = "whsec_test";
        let manifest = build_manifest(Some("12345"), None, "1704908010");
        let v1 = sign(secret, &manifest);
        let header = format!("ts=1704908010,v1={}", v1);
        assert!(!verify_signature(secret, &header, Some("99999"), None));
    }

    #[test]
    fn rejects_wrong_secret() {
        let manifest = build_manifest(Some("12345"), None, "1704908010");
        let v1 = sign("whsec_other", &manifest);
        let header = format!("ts=1704908010,v1={}", v1);
        assert!(!verify_signature("whsec_test", &header, Some("12345"), None));
    }

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }
}
