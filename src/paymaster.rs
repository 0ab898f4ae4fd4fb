//! Paymaster-relayed execution: build → sign → execute.
//!
//! The paymaster proposes typed data for an invoke, the account signs it
//! locally, and the paymaster relays the signed payload on-chain. Each step's
//! failure is reported as that step's failure and passed through unchanged.
//!
//! ```ignore
//! let flow = PaymasterFlow::new(provider.as_ref(), &params);
//! let result = flow.run_all(&account, &calls).await?;
//! ```

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use starknet_core::utils::get_selector_from_name;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::account::{Account, AccountError};
use crate::error::SdkError;
use crate::gateway::{Gateway, RequestOptions};
use crate::numeric;
use crate::types::{
    CanonicalSignature, Call, ExecutionResult, RawSignature, SignatureError,
    SignedPaymasterTransaction, TypedData,
};

/// Error reported by a paymaster provider. Not interpreted by the SDK.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    pub code: Option<i64>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Wrap a gateway failure, keeping the HTTP status as the code when there is one.
    pub fn from_gateway(error: &SdkError) -> Self {
        let code = match error {
            SdkError::Request(_) => Some(400),
            SdkError::Contract { .. } => Some(500),
            SdkError::Http { status, .. } => Some(i64::from(*status)),
            _ => None,
        };
        Self {
            message: error.to_string(),
            code,
        }
    }
}

/// Step-scoped failure of a paymaster flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymasterError {
    #[error("Paymaster build failed: {0}")]
    Build(#[source] ProviderError),
    #[error("Typed data signing failed: {0}")]
    Sign(#[source] AccountError),
    #[error("Paymaster execution failed: {0}")]
    Execute(#[source] ProviderError),
}

/// Who pays gas, and in what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FeeMode {
    /// A sponsor covers gas entirely.
    Sponsored,
    /// The user pays gas in `gas_token`.
    Default { gas_token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub execute_after: u64,
    pub execute_before: u64,
}

/// Provider-specific execution parameters; opaque to the flow itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionParameters {
    pub version: String,
    pub fee_mode: FeeMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_bounds: Option<TimeBounds>,
}

impl ExecutionParameters {
    pub fn sponsored() -> Self {
        Self {
            version: "0x1".into(),
            fee_mode: FeeMode::Sponsored,
            time_bounds: None,
        }
    }

    pub fn gas_token(gas_token: &str) -> Self {
        Self {
            version: "0x1".into(),
            fee_mode: FeeMode::Default {
                gas_token: gas_token.to_string(),
            },
            time_bounds: None,
        }
    }

    fn gas_token_address(&self) -> Option<String> {
        match &self.fee_mode {
            FeeMode::Default { gas_token } => Some(gas_token.clone()),
            FeeMode::Sponsored => None,
        }
    }
}

impl Default for ExecutionParameters {
    fn default() -> Self {
        Self::sponsored()
    }
}

/// Invoke to be wrapped into typed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvokeDescriptor {
    pub user_address: String,
    pub calls: Vec<Call>,
}

/// Signed typed data ready for relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedInvoke {
    pub user_address: String,
    pub typed_data: TypedData,
    pub signature: Vec<String>,
}

/// A paymaster service.
#[async_trait]
pub trait PaymasterProvider: Send + Sync {
    async fn build_transaction(
        &self,
        invoke: &InvokeDescriptor,
        params: &ExecutionParameters,
    ) -> Result<TypedData, ProviderError>;

    /// Relay the signed invoke; returns the transaction hash.
    async fn execute_transaction(
        &self,
        invoke: &SignedInvoke,
        params: &ExecutionParameters,
    ) -> Result<String, ProviderError>;
}

/// Paymaster selection for an execution. Inactive configs fall back to direct execution.
#[derive(Clone)]
pub struct PaymasterConfig {
    pub active: bool,
    pub provider: Arc<dyn PaymasterProvider>,
    pub params: ExecutionParameters,
}

impl PaymasterConfig {
    pub fn new(provider: Arc<dyn PaymasterProvider>, params: ExecutionParameters) -> Self {
        Self {
            active: true,
            provider,
            params,
        }
    }
}

impl fmt::Debug for PaymasterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymasterConfig")
            .field("active", &self.active)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Resolve either wallet signature shape to fixed-width hex components.
pub fn normalize_signature(raw: &RawSignature) -> Result<CanonicalSignature, SignatureError> {
    raw.normalize()
}

/// Ask `account` to sign `typed_data` and resolve the result to canonical form.
pub async fn sign_typed_data(
    account: &dyn Account,
    typed_data: TypedData,
) -> Result<SignedPaymasterTransaction, AccountError> {
    let raw = account.sign_message(&typed_data).await?;
    let signature = normalize_signature(&raw)?;
    Ok(SignedPaymasterTransaction {
        typed_data,
        signature,
    })
}

/// One build → sign → execute sequence against a provider.
pub struct PaymasterFlow<'a> {
    provider: &'a dyn PaymasterProvider,
    params: &'a ExecutionParameters,
}

impl<'a> PaymasterFlow<'a> {
    pub fn new(provider: &'a dyn PaymasterProvider, params: &'a ExecutionParameters) -> Self {
        Self { provider, params }
    }

    pub fn from_config(config: &'a PaymasterConfig) -> Self {
        Self::new(config.provider.as_ref(), &config.params)
    }

    /// Ask the paymaster for typed data covering `calls` on behalf of `user_address`.
    pub async fn build(
        &self,
        user_address: &str,
        calls: &[Call],
    ) -> Result<TypedData, PaymasterError> {
        let invoke = InvokeDescriptor {
            user_address: user_address.to_string(),
            calls: calls.to_vec(),
        };
        debug!("Paymaster build for {} ({} calls)", user_address, calls.len());
        self.provider
            .build_transaction(&invoke, self.params)
            .await
            .map_err(PaymasterError::Build)
    }

    pub async fn sign(
        &self,
        account: &dyn Account,
        typed_data: TypedData,
    ) -> Result<SignedPaymasterTransaction, PaymasterError> {
        sign_typed_data(account, typed_data)
            .await
            .map_err(PaymasterError::Sign)
    }

    pub async fn execute(
        &self,
        user_address: &str,
        signed: SignedPaymasterTransaction,
    ) -> Result<ExecutionResult, PaymasterError> {
        let invoke = SignedInvoke {
            user_address: user_address.to_string(),
            typed_data: signed.typed_data,
            signature: signed.signature.components().to_vec(),
        };
        let transaction_hash = self
            .provider
            .execute_transaction(&invoke, self.params)
            .await
            .map_err(PaymasterError::Execute)?;
        info!("Paymaster relayed {} for {}", transaction_hash, user_address);
        Ok(ExecutionResult {
            transaction_hash,
            gas_token_address: self.params.gas_token_address(),
            gas_token_amount: None,
        })
    }

    /// Build, sign, then execute. Stops at the first failing step.
    pub async fn run_all(
        &self,
        account: &dyn Account,
        calls: &[Call],
    ) -> Result<ExecutionResult, PaymasterError> {
        let user_address = account.address();
        let typed_data = self.build(&user_address, calls).await?;
        let signed = self.sign(account, typed_data).await?;
        self.execute(&user_address, signed).await
    }
}

/// [`PaymasterProvider`] speaking the paymaster JSON-RPC API
/// (`paymaster_buildTransaction` / `paymaster_executeTransaction`).
pub struct RpcPaymasterProvider {
    gateway: Gateway,
    api_key: Option<String>,
    options: RequestOptions,
}

impl RpcPaymasterProvider {
    /// Create a provider pointing at a paymaster RPC endpoint.
    pub fn new(rpc_url: &str) -> Self {
        Self::with_gateway(Gateway::new(rpc_url))
    }

    pub fn with_gateway(gateway: Gateway) -> Self {
        Self {
            gateway,
            api_key: None,
            options: RequestOptions::default(),
        }
    }

    /// Attach an API key, sent in the request envelope.
    pub fn api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Options applied to every RPC request, e.g. an abort signal.
    pub fn with_request_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Raw JSON-RPC 2.0 call.
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });
        if let Some(key) = &self.api_key {
            body["apiKey"] = json!(key);
        }

        let resp: Value = self
            .gateway
            .post("/", &body, &self.options)
            .await
            .map_err(|e| ProviderError::from_gateway(&e))?;

        if let Some(error) = resp.get("error") {
            return Err(ProviderError {
                message: error["message"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string()),
                code: error["code"].as_i64(),
            });
        }
        Ok(resp["result"].clone())
    }
}

fn rpc_calls(calls: &[Call]) -> Result<Vec<Value>, ProviderError> {
    calls
        .iter()
        .map(|call| {
            let selector = get_selector_from_name(&call.entrypoint)
                .map_err(|e| ProviderError::new(format!("{}: {}", call.entrypoint, e)))?;
            Ok(json!({
                "to": call.contract_address,
                "selector": numeric::felt_to_fixed_hex(&selector),
                "calldata": call.calldata,
            }))
        })
        .collect()
}

#[async_trait]
impl PaymasterProvider for RpcPaymasterProvider {
    async fn build_transaction(
        &self,
        invoke: &InvokeDescriptor,
        params: &ExecutionParameters,
    ) -> Result<TypedData, ProviderError> {
        let result = self
            .rpc_call(
                "paymaster_buildTransaction",
                json!({
                    "transaction": {
                        "type": "invoke",
                        "invoke": {
                            "user_address": invoke.user_address,
                            "calls": rpc_calls(&invoke.calls)?,
                        }
                    },
                    "parameters": params,
                }),
            )
            .await?;
        match result.get("typed_data") {
            Some(typed_data) => Ok(TypedData(typed_data.clone())),
            None => Err(ProviderError::new("build response has no typed_data")),
        }
    }

    async fn execute_transaction(
        &self,
        invoke: &SignedInvoke,
        params: &ExecutionParameters,
    ) -> Result<String, ProviderError> {
        let result = self
            .rpc_call(
                "paymaster_executeTransaction",
                json!({
                    "transaction": {
                        "type": "invoke",
                        "invoke": {
                            "user_address": invoke.user_address,
                            "typed_data": invoke.typed_data,
                            "signature": invoke.signature,
                        }
                    },
                    "parameters": params,
                }),
            )
            .await?;
        result["transaction_hash"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new("execute response has no transaction_hash"))
    }
}
