//! Crate-wide error type.
//!
//! Nothing in the SDK retries. Every failure reaches the caller with enough
//! structure to tell a server problem from a declined signature from a revert.

use thiserror::Error;

use crate::account::AccountError;
use crate::gateway::TransportError;
use crate::integrity::IntegrityError;
use crate::numeric::CodecError;
use crate::paymaster::PaymasterError;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Response integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    /// HTTP 400; carries the first message the server returned.
    #[error("Request rejected: {0}")]
    Request(String),

    /// HTTP 500 caused by an on-chain revert.
    #[error("Contract error: {message}")]
    Contract {
        message: String,
        revert_error: String,
    },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Chain mismatch: action targets {expected}, account is on {actual}")]
    ChainMismatch { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Paymaster(#[from] PaymasterError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Request aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, SdkError>;
