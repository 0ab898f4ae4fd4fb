//! Self-paid execution: the account submits the calls as one multicall.

use log::info;

use crate::account::Account;
use crate::error::{Result, SdkError};
use crate::types::{Call, ExecutionResult};

/// Submit `calls` through the account's own multicall. Nothing is retried.
pub async fn execute(account: &dyn Account, calls: &[Call]) -> Result<ExecutionResult> {
    if calls.is_empty() {
        return Err(SdkError::InvalidArgument("no calls to execute".into()));
    }
    let transaction_hash = account.execute(calls).await?;
    info!(
        "Submitted {} calls from {} in {}",
        calls.len(),
        account.address(),
        transaction_hash
    );
    Ok(ExecutionResult::from_hash(transaction_hash))
}
