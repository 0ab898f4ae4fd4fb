//! The caller's account, as the SDK sees it.
//!
//! Wallet connectors and local signers live outside this crate; they plug in by
//! implementing [`Account`].

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Call, RawSignature, SignatureError, TypedData};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("User rejected the request: {0}")]
    Rejected(String),
    #[error("Account returned a malformed signature: {0}")]
    MalformedSignature(#[from] SignatureError),
    #[error("Account call failed: {0}")]
    Failed(String),
}

/// A connected, signing account.
#[async_trait]
pub trait Account: Send + Sync {
    /// Account contract address (hex).
    fn address(&self) -> String;

    /// Chain the account is currently connected to.
    async fn chain_id(&self) -> Result<String, AccountError>;

    /// Sign typed data off-chain. May block on user interaction.
    async fn sign_message(&self, typed_data: &TypedData) -> Result<RawSignature, AccountError>;

    /// Submit calls through the account's multicall entrypoint; returns the tx hash.
    async fn execute(&self, calls: &[Call]) -> Result<String, AccountError>;
}
