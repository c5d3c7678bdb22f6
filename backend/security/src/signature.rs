//! Detached request signatures.
//!
//! A device signs the exact request body with its RSA private key
//! (PKCS#1 v1.5 over SHA-256) and sends the standard-base64 signature out of
//! band. Verification fails closed: an unusable key, a signature that is not
//! base64, or a digest mismatch all come back as `false`.

use anyhow::{Context, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{crypto, Algorithm, DecodingKey, EncodingKey};
use tracing::debug;

const ALGORITHM: Algorithm = Algorithm::RS256;

/// Whether `pem` is an RSA public key we could verify against at all.
pub fn public_key_is_valid(pem: &str) -> bool {
    DecodingKey::from_rsa_pem(pem.as_bytes()).is_ok()
}

/// Check `signature` over `body` against the PEM public key.
pub fn verify_signature(body: &[u8], public_key_pem: &str, signature: &str) -> bool {
    let key = match DecodingKey::from_rsa_pem(public_key_pem.as_bytes()) {
        Ok(k) => k,
        Err(e) => {
            debug!(error = %e, "Unusable public key");
            return false;
        }
    };
    let raw = match STANDARD.decode(signature.trim()) {
        Ok(b) if !b.is_empty() => b,
        _ => {
            debug!("Signature is not valid base64");
            return false;
        }
    };
    // jsonwebtoken expects the JWS (url-safe, unpadded) encoding
    let encoded = URL_SAFE_NO_PAD.encode(raw);
    crypto::verify(&encoded, body, &key, ALGORITHM).unwrap_or(false)
}

/// Produce the signature a device sends alongside `body`.
pub fn sign_request(body: &[u8], private_key_pem: &str) -> Result<String> {
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .context("Failed to parse RSA private key")?;
    let encoded = crypto::sign(body, &key, ALGORITHM).context("Failed to sign request body")?;
    let raw = URL_SAFE_NO_PAD
        .decode(encoded)
        .context("Signer produced a malformed signature")?;
    Ok(STANDARD.encode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_PRIVATE: &str = include_str!("../../../testdata/device_private.pem");
    const DEVICE_PUBLIC: &str = include_str!("../../../testdata/device_public.pem");
    const OTHER_PUBLIC: &str = include_str!("../../../testdata/device_other_public.pem");

    const BODY: &[u8] = br#"{"id_data":"id-0001","pubkey":"...","tenant_token":"t1"}"#;

    #[test]
    fn accepts_matching_signature() {
        let sig = sign_request(BODY, DEVICE_PRIVATE).unwrap();
        assert!(verify_signature(BODY, DEVICE_PUBLIC, &sig));
    }

    #[test]
    fn rejects_other_key() {
        let sig = sign_request(BODY, DEVICE_PRIVATE).unwrap();
        assert!(!verify_signature(BODY, OTHER_PUBLIC, &sig));
    }

    #[test]
    fn rejects_tampered_body() {
        let sig = sign_request(BODY, DEVICE_PRIVATE).unwrap();
        let mut tampered = BODY.to_vec();
        tampered[3] = b'X';
        assert!(!verify_signature(&tampered, DEVICE_PUBLIC, &sig));
    }

    #[test]
    fn malformed_inputs_fail_closed() {
        assert!(!verify_signature(BODY, DEVICE_PUBLIC, "invalidsignature"));
        assert!(!verify_signature(BODY, DEVICE_PUBLIC, ""));
        assert!(!verify_signature(BODY, "not a pem", "aGVsbG8="));
    }

    #[test]
    fn key_validity() {
        assert!(public_key_is_valid(DEVICE_PUBLIC));
        assert!(!public_key_is_valid("foobar"));
    }
}
