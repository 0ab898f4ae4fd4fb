//! Response authenticity: verifies the detached signature the routing service
//! attaches to a response body.
//!
//! Verification runs on the untouched body bytes, before any JSON parsing.
//! It is opt-in: without a [`TrustAnchor`] nothing is checked.

use log::warn;
use starknet_core::crypto::{ecdsa_verify, Signature};
use thiserror::Error;

use crate::keypair::{response_hash, TrustAnchor};
use crate::numeric;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("No server signature on response")]
    MissingSignature,
    #[error("Malformed server signature header: {0}")]
    MalformedSignature(String),
    #[error("Invalid server signature")]
    InvalidSignature,
}

/// Check `body` against the `r,s` signature header under `trust_anchor`.
pub fn verify_response(
    body: &[u8],
    signature_header: Option<&str>,
    trust_anchor: Option<&TrustAnchor>,
) -> Result<(), IntegrityError> {
    let Some(anchor) = trust_anchor else {
        return Ok(());
    };
    let header = signature_header.ok_or(IntegrityError::MissingSignature)?;
    let signature = parse_signature_header(header)?;

    let hash = response_hash(body);
    match ecdsa_verify(anchor.public_key(), &hash, &signature) {
        Ok(true) => Ok(()),
        Ok(false) => {
            warn!("Response signature does not match trust anchor {}", anchor);
            Err(IntegrityError::InvalidSignature)
        }
        Err(e) => {
            warn!("Response signature rejected by verifier: {}", e);
            Err(IntegrityError::InvalidSignature)
        }
    }
}

fn parse_signature_header(header: &str) -> Result<Signature, IntegrityError> {
    let malformed = || IntegrityError::MalformedSignature(header.to_string());
    let mut parts = header.split(',');
    let (Some(r), Some(s), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let r = numeric::parse_felt(r).map_err(|_| malformed())?;
    let s = numeric::parse_felt(s).map_err(|_| malformed())?;
    Ok(Signature { r, s })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::ResponseSigningKey;

    const SECRET: &str = "0x1b9f0a3c5d7e2f4a6b8c0d1e3f5a7b9c2d4e6f8a0b1c3d5e7f9a2b4c6d8e0f1";
    const BODY: &[u8] = br#"{"quoteId":"q-1","sellAmount":"0xde0b6b3a7640000"}"#;

    fn signer() -> ResponseSigningKey {
        ResponseSigningKey::from_secret_hex(SECRET).unwrap()
    }

    #[test]
    fn test_valid_signature_accepted() {
        let key = signer();
        let header = key.sign_body(BODY).unwrap();
        assert_eq!(
            verify_response(BODY, Some(&header), Some(&key.trust_anchor())),
            Ok(())
        );
    }

    #[test]
    fn test_decimal_header_accepted() {
        let key = signer();
        let header = key.sign_body(BODY).unwrap();
        let decimal: Vec<String> = header
            .split(',')
            .map(|p| numeric::parse_felt(p).unwrap().to_biguint().to_string())
            .collect();
        let header = format!("{}, {}", decimal[0], decimal[1]);
        assert!(verify_response(BODY, Some(&header), Some(&key.trust_anchor())).is_ok());
    }

    #[test]
    fn test_flipped_byte_rejected() {
        let key = signer();
        let header = key.sign_body(BODY).unwrap();
        let mut tampered = BODY.to_vec();
        tampered[5] ^= 0x01;
        assert_eq!(
            verify_response(&tampered, Some(&header), Some(&key.trust_anchor())),
            Err(IntegrityError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_anchor_rejected() {
        let key = signer();
        let other = ResponseSigningKey::from_secret_hex("0x2f").unwrap();
        let header = key.sign_body(BODY).unwrap();
        assert_eq!(
            verify_response(BODY, Some(&header), Some(&other.trust_anchor())),
            Err(IntegrityError::InvalidSignature)
        );
    }

    #[test]
    fn test_missing_header_rejected() {
        let key = signer();
        assert_eq!(
            verify_response(BODY, None, Some(&key.trust_anchor())),
            Err(IntegrityError::MissingSignature)
        );
    }

    #[test]
    fn test_malformed_header_rejected() {
        let anchor = signer().trust_anchor();
        for header in ["", "0x1", "0x1,0x2,0x3", "abc,0x2"] {
            assert!(matches!(
                verify_response(BODY, Some(header), Some(&anchor)),
                Err(IntegrityError::MalformedSignature(_))
            ));
        }
    }

    #[test]
    fn test_no_anchor_skips_verification() {
        assert_eq!(verify_response(BODY, None, None), Ok(()));
        assert_eq!(verify_response(b"anything", Some("garbage"), None), Ok(()));
    }
}
