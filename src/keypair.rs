//! Stark-curve keys for signed API responses: the trust anchor a client pins,
//! and the signing key that produces response signatures.

use starknet_core::crypto::{compute_hash_on_elements, ecdsa_sign};
use starknet_core::types::Felt;
use starknet_core::utils::starknet_keccak;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::numeric;

#[derive(Error, Debug)]
pub enum KeypairError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid key format: {0}")]
    Format(String),
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Public key of the routing service. When supplied with a request, the
/// response must carry a valid signature under this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustAnchor(Felt);

impl TrustAnchor {
    pub fn new(public_key: Felt) -> Self {
        Self(public_key)
    }

    /// Parse a `0x` hex or decimal public key.
    pub fn from_hex(input: &str) -> Result<Self, KeypairError> {
        numeric::parse_felt(input)
            .map(Self)
            .map_err(|e| KeypairError::Format(e.to_string()))
    }

    pub fn public_key(&self) -> &Felt {
        &self.0
    }
}

impl FromStr for TrustAnchor {
    type Err = KeypairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&numeric::felt_to_fixed_hex(&self.0))
    }
}

/// Hash that response signatures commit to: the Pedersen hash-on-elements of
/// the 250-bit keccak of the exact body bytes.
pub fn response_hash(body: &[u8]) -> Felt {
    compute_hash_on_elements(&[starknet_keccak(body)])
}

/// Secret key used to sign response bodies.
///
/// The key file holds the scalar as hex, with or without a `0x` prefix.
pub struct ResponseSigningKey {
    secret: Felt,
}

impl ResponseSigningKey {
    /// Create from a hex-encoded secret scalar.
    pub fn from_secret_hex(hex_str: &str) -> Result<Self, KeypairError> {
        let secret =
            numeric::parse_felt(hex_str).map_err(|e| KeypairError::Format(e.to_string()))?;
        if secret == Felt::ZERO {
            return Err(KeypairError::Format("secret scalar must be non-zero".into()));
        }
        Ok(Self { secret })
    }

    /// Load from a hex-encoded secret key file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KeypairError> {
        let contents = std::fs::read_to_string(path)?;
        let trimmed = contents.trim();
        let normalized = if trimmed.starts_with("0x") {
            trimmed.to_string()
        } else {
            format!("0x{}", trimmed)
        };
        Self::from_secret_hex(&normalized)
    }

    /// Save secret key as hex to a file (chmod 600 on Unix).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), KeypairError> {
        let hex_str = numeric::felt_to_fixed_hex(&self.secret);
        std::fs::write(&path, &hex_str)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// The matching public key, as a client would pin it.
    pub fn trust_anchor(&self) -> TrustAnchor {
        TrustAnchor(starknet_crypto::get_public_key(&self.secret))
    }

    /// Sign a response body, returning the `r,s` header value.
    pub fn sign_body(&self, body: &[u8]) -> Result<String, KeypairError> {
        let hash = response_hash(body);
        let signature =
            ecdsa_sign(&self.secret, &hash).map_err(|e| KeypairError::Signing(e.to_string()))?;
        Ok(format!(
            "{},{}",
            numeric::felt_to_fixed_hex(&signature.r),
            numeric::felt_to_fixed_hex(&signature.s)
        ))
    }
}
