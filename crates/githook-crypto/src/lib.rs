use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<sha1::Sha1>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,
    #[error("malformed signature header")]
    Malformed,
    #[error("signature does not match")]
    Mismatch,
}

/// Which digest a provider's signature header prefix selects (spec §4.6,
/// §9 "header parsing must accept case-insensitive prefixes").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgo {
    Sha256,
    Sha1,
}

/// Parse a provider signature header value of the form `sha256=<hex>` or
/// `sha1=<hex>`, accepting a case-insensitive prefix.
pub fn parse_prefixed_signature(header_value: &str) -> Result<(SignatureAlgo, Vec<u8>), SignatureError> {
    let trimmed = header_value.trim();
    let lower = trimmed.to_ascii_lowercase();
    let (algo, hex_part) = if let Some(rest) = lower.strip_prefix("sha256=") {
        (SignatureAlgo::Sha256, &trimmed[trimmed.len() - rest.len()..])
    } else if let Some(rest) = lower.strip_prefix("sha1=") {
        (SignatureAlgo::Sha1, &trimmed[trimmed.len() - rest.len()..])
    } else {
        return Err(SignatureError::Malformed);
    };
    let bytes = hex::decode(hex_part).map_err(|_| SignatureError::Malformed)?;
    Ok((algo, bytes))
}

/// Verify an HMAC signature in constant time with respect to the compared
/// bytes (spec §8 property 8, §9 "Constant-time comparison is mandatory").
pub fn verify_hmac(
    algo: SignatureAlgo,
    secret: &[u8],
    body: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    match algo {
        SignatureAlgo::Sha256 => {
            let mut mac =
                HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Malformed)?;
            mac.update(body);
            mac.verify_slice(signature).map_err(|_| SignatureError::Mismatch)
        }
        SignatureAlgo::Sha1 => {
            let mut mac =
                HmacSha1::new_from_slice(secret).map_err(|_| SignatureError::Malformed)?;
            mac.update(body);
            mac.verify_slice(signature).map_err(|_| SignatureError::Mismatch)
        }
    }
}

/// Verify a raw header value (`sha256=<hex>` / `sha1=<hex>`) against a body
/// with a provider secret (spec §4.6 GitHub `X-Hub-Signature-256` /
/// `X-Hub-Signature`).
pub fn verify_prefixed_signature(
    header_value: &str,
    secret: &[u8],
    body: &[u8],
) -> Result<(), SignatureError> {
    let (algo, signature) = parse_prefixed_signature(header_value)?;
    verify_hmac(algo, secret, body, &signature)
}

/// Constant-time equality for header-token style verification (spec §4.6
/// GitLab "header token equality"). Mismatched lengths short-circuit —
/// length is not considered secret here, only content.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && a.ct_eq(b).into()
}

/// SHA-256 over arbitrary bytes, hex-encoded (spec §4.5 `body_hash`).
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Generate a 32-byte cryptographically random identifier, hex-encoded to
/// 64 characters (spec §3 `ProviderInstanceRecord.hash`).
pub fn random_hex_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_case_insensitive_sha256_prefix() {
        let secret = b"shhh";
        let body = b"{\"action\":\"opened\"}";
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        let header = format!("SHA256={sig}");
        assert!(verify_prefixed_signature(&header, secret, body).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let secret = b"shhh";
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(b"original");
        let sig = hex::encode(mac.finalize().into_bytes());
        let header = format!("sha256={sig}");
        assert!(verify_prefixed_signature(&header, secret, b"tampered").is_err());
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(matches!(
            parse_prefixed_signature("not-a-signature"),
            Err(SignatureError::Malformed)
        ));
    }

    #[test]
    fn random_hex_id_is_64_chars_and_varies() {
        let a = random_hex_id();
        let b = random_hex_id();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn constant_time_eq_matches_string_equality() {
        assert!(constant_time_eq("token-123", "token-123"));
        assert!(!constant_time_eq("token-123", "token-124"));
        assert!(!constant_time_eq("short", "longer-string"));
    }
}
