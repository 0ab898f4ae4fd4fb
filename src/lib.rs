//! # StarkX SDK
//!
//! Client toolkit for the StarkX routing API on Starknet:
//!
//! - **Quotes**: ranked swap quotes and liquidity sources
//! - **Calls**: swap, staking and DCA actions turned into ordered chain calls
//! - **Execution**: direct multicall from the caller's account, or relayed
//!   through a paymaster (build → sign → execute)
//! - **Integrity**: Stark-curve signature check of every API response against
//!   a pinned service key

// Wire types and codecs
pub mod numeric;
pub mod types;

// Response integrity
pub mod keypair;
pub mod integrity;

// API access
pub mod error;
pub mod gateway;
pub mod quotes;
pub mod calls;

// Execution
pub mod account;
pub mod direct;
pub mod paymaster;
pub mod executor;

pub mod config;

#[cfg(test)]
mod testing;

pub use account::{Account, AccountError};
pub use calls::{
    calculate_max_spend_amount, calculate_min_received_amount, CreateDcaOrder, PricingStrategy,
};
pub use config::SdkConfig;
pub use error::{Result, SdkError};
pub use executor::{
    CancelDcaOrderAction, ClaimRewardsAction, CreateDcaOrderAction, DcaGasMode, ExecuteOptions,
    Executor, InitiateUnstakeAction, StakeAction, UnstakeAction,
};
pub use gateway::{AbortController, AbortSignal, Gateway, RequestOptions, Transport};
pub use integrity::{verify_response, IntegrityError};
pub use keypair::{ResponseSigningKey, TrustAnchor};
pub use paymaster::{
    ExecutionParameters, FeeMode, PaymasterConfig, PaymasterError, PaymasterFlow,
    PaymasterProvider, RpcPaymasterProvider,
};
pub use quotes::{fetch_quotes, fetch_sources, Quote, QuoteRequest, Route};
pub use types::{Call, CanonicalSignature, ExecutionResult, RawSignature, TypedData};
