use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// The size of a control word in bytes (128-bit).
const CONTROL_WORD_SIZE: usize = 16;
/// The size of a bearer token in bytes.
const TOKEN_SIZE: usize = 16;

fn hmac_sha256(secret: &[u8], data: &str) -> Option<Vec<u8>> {
    // HMAC accepts keys of any length, so construction only fails on a
    // broken build of the underlying crate.
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(data.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

/// Computes the hex HMAC-SHA256 signature of `data` under `secret`.
///
/// Clients sign `hwid + token` for authenticate calls and the bare token
/// for stream-info calls.
pub fn sign(secret: &[u8], data: &str) -> String {
    hmac_sha256(secret, data).map(hex::encode).unwrap_or_default()
}

/// Verifies a hex-encoded signature in constant time.
///
/// A missing, malformed, or mismatched signature is rejected without
/// revealing which; the comparison never short-circuits on a prefix match.
pub fn verify_signature(secret: &[u8], data: &str, provided: &str) -> bool {
    let Some(expected) = hmac_sha256(secret, data) else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    expected.ct_eq(&provided).into()
}

/// Constant-time check of the `Authorization: Bearer <master key>` header.
pub fn verify_master_key(expected: &str, header: Option<&str>) -> bool {
    let Some(value) = header else {
        return false;
    };
    let Some(provided) = value.strip_prefix("Bearer ") else {
        return false;
    };
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Generates a fresh 128-bit control word, hex encoded.
pub fn generate_control_word() -> String {
    random_hex(CONTROL_WORD_SIZE)
}

/// Generates a new bearer token.
pub fn generate_token() -> String {
    random_hex(TOKEN_SIZE)
}

fn random_hex(len: usize) -> String {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"supersecretapikey123";

    #[test]
    fn test_sign_and_verify_round_trip() {
        let signature = sign(SECRET, "HW1T1");
        assert!(verify_signature(SECRET, "HW1T1", &signature));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let signature = sign(SECRET, "HW1T1");
        assert!(!verify_signature(SECRET, "HW1T2", &signature));
        assert!(!verify_signature(SECRET, "hW1T1", &signature));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let signature = sign(b"someothersecret", "HW1T1");
        assert!(!verify_signature(SECRET, "HW1T1", &signature));
    }

    #[test]
    fn test_malformed_signature_fails() {
        assert!(!verify_signature(SECRET, "HW1T1", ""));
        assert!(!verify_signature(SECRET, "HW1T1", "not-hex"));
        // Truncated but otherwise correct prefix.
        let signature = sign(SECRET, "HW1T1");
        assert!(!verify_signature(SECRET, "HW1T1", &signature[..32]));
    }

    #[test]
    fn test_master_key_check() {
        assert!(verify_master_key("master", Some("Bearer master")));
        assert!(!verify_master_key("master", Some("Bearer masterX")));
        assert!(!verify_master_key("master", Some("master")));
        assert!(!verify_master_key("master", None));
    }

    #[test]
    fn test_control_words_are_128_bit_and_unique() {
        let a = generate_control_word();
        let b = generate_control_word();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
