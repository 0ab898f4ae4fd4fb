//! Values shared by every execution path: calls, typed data, signatures, results.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::numeric::{self, felt_to_fixed_hex};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature has no components")]
    Empty,
    #[error("Invalid signature component: {0}")]
    InvalidComponent(String),
}

/// A single contract invocation. Order inside a call list is significant:
/// an approval must precede the call that spends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub contract_address: String,
    pub entrypoint: String,
    #[serde(default)]
    pub calldata: Vec<String>,
}

impl Call {
    pub fn new(contract_address: &str, entrypoint: &str, calldata: Vec<String>) -> Self {
        Self {
            contract_address: contract_address.to_string(),
            entrypoint: entrypoint.to_string(),
            calldata,
        }
    }
}

/// Domain-separated signable payload proposed by the server or a paymaster.
/// Opaque here: it is the thing the account signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypedData(pub serde_json::Value);

impl TypedData {
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Signature exactly as an account returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSignature {
    Array(Vec<String>),
    Rs { r: String, s: String },
}

impl RawSignature {
    /// Resolve either shape into the canonical ordered form.
    pub fn normalize(&self) -> Result<CanonicalSignature, SignatureError> {
        let components: Vec<&str> = match self {
            RawSignature::Array(items) => items.iter().map(String::as_str).collect(),
            RawSignature::Rs { r, s } => vec![r.as_str(), s.as_str()],
        };
        if components.is_empty() {
            return Err(SignatureError::Empty);
        }
        components
            .into_iter()
            .map(|c| {
                numeric::parse_felt(c)
                    .map(|felt| felt_to_fixed_hex(&felt))
                    .map_err(|_| SignatureError::InvalidComponent(c.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(CanonicalSignature)
    }
}

/// Ordered sequence of fixed-width (`0x` + 64 hex) signature components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalSignature(Vec<String>);

impl CanonicalSignature {
    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn into_raw(self) -> RawSignature {
        RawSignature::Array(self.0)
    }
}

/// Typed data together with the account's canonical signature over it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPaymasterTransaction {
    pub typed_data: TypedData,
    pub signature: CanonicalSignature,
}

/// Outcome of any execution path, direct or relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub transaction_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_token_address: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::numeric::option_hex_u128"
    )]
    pub gas_token_amount: Option<u128>,
}

impl ExecutionResult {
    pub fn from_hash(transaction_hash: String) -> Self {
        Self {
            transaction_hash,
            gas_token_address: None,
            gas_token_amount: None,
        }
    }
}
