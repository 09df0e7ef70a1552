//! HMAC-SHA256 signatures for outbound webhooks.
//!
//! The signed message is `"{timestamp}.{body}"` and the header value is
//! `sha256=<hex digest>`.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    // HMAC accepts keys of any length, new_from_slice cannot fail here.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_payload(secret: &str, timestamp: i64, body: &[u8], signature: &str) -> bool {
    let Some(hex_sig) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Random signing secret shown once to the webhook owner.
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    format!("whsec_{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let body = br#"{"event":"lead.created"}"#;
        let sig = sign_payload("secret", 1_700_000_000, body);
        assert!(sig.starts_with("sha256="));
        assert!(verify_payload("secret", 1_700_000_000, body, &sig));
    }

    #[test]
    fn test_tampering_detected() {
        let body = br#"{"event":"lead.created"}"#;
        let sig = sign_payload("secret", 1_700_000_000, body);
        assert!(!verify_payload("secret", 1_700_000_001, body, &sig));
        assert!(!verify_payload("other", 1_700_000_000, body, &sig));
        assert!(!verify_payload("secret", 1_700_000_000, b"{}", &sig));
        assert!(!verify_payload("secret", 1_700_000_000, body, "md5=abc"));
    }

    #[test]
    fn test_generate_secret_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert!(a.starts_with("whsec_"));
        assert_eq!(a.len(), "whsec_".len() + 64);
        assert_ne!(a, b);
    }
}
