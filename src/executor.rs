//! Entry points per product surface.
//!
//! Every `execute_*` call follows the same sequence:
//!
//! 1. check the action's chain id against the account's chain (no request is
//!    made on mismatch);
//! 2. build the calls through the API;
//! 3. relay through the paymaster when one is configured and active,
//!    otherwise submit directly from the account;
//! 4. return an [`ExecutionResult`] either way.
//!
//! DCA orders have an extra gasless path where the API hands back typed data
//! instead of calls.

use log::{debug, info, warn};
use starknet_core::types::Felt;
use starknet_core::utils::cairo_short_string_to_felt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::account::Account;
use crate::calls::{self, CreateDcaOrder, GaslessParams};
use crate::direct;
use crate::error::{Result, SdkError};
use crate::gateway::{Gateway, RequestOptions};
use crate::numeric;
use crate::paymaster::{self, PaymasterConfig, PaymasterError, PaymasterFlow, ProviderError};
use crate::quotes::Quote;
use crate::types::{Call, ExecutionResult};

/// Per-execution settings shared by every surface.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Relay through this paymaster when present and active.
    pub paymaster: Option<PaymasterConfig>,
    pub request: RequestOptions,
}

impl ExecuteOptions {
    pub fn with_paymaster(mut self, config: PaymasterConfig) -> Self {
        self.paymaster = Some(config);
        self
    }

    pub fn with_request(mut self, request: RequestOptions) -> Self {
        self.request = request;
        self
    }

    fn active_paymaster(&self) -> Option<&PaymasterConfig> {
        self.paymaster.as_ref().filter(|p| p.active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeAction {
    pub chain_id: String,
    pub pool_address: String,
    pub amount: u128,
}

/// Start the cooldown on `amount` of a staked position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateUnstakeAction {
    pub chain_id: String,
    pub pool_address: String,
    pub amount: u128,
}

/// Withdraw whatever finished its cooldown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnstakeAction {
    pub chain_id: String,
    pub pool_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRewardsAction {
    pub chain_id: String,
    pub pool_address: String,
    pub restake: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDcaOrderAction {
    pub chain_id: String,
    pub order: CreateDcaOrder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelDcaOrderAction {
    pub chain_id: String,
    pub order_address: String,
}

/// How gas is paid when opening a DCA order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DcaGasMode {
    /// Build calls and submit them like any other action.
    #[default]
    Calls,
    /// Sign typed data; gas is paid in `gas_token_address`, up to `max_gas_token_amount`.
    /// Both fields are required.
    GasToken {
        gas_token_address: Option<String>,
        max_gas_token_amount: Option<u128>,
    },
    /// Sign typed data; gas is sponsored.
    GasFree,
}

impl DcaGasMode {
    /// Gasless parameters for the typed-data path, or `None` for [`DcaGasMode::Calls`].
    pub fn gasless_params(&self) -> Result<Option<GaslessParams>> {
        match self {
            DcaGasMode::Calls => Ok(None),
            DcaGasMode::GasFree => Ok(Some(GaslessParams::gas_free())),
            DcaGasMode::GasToken {
                gas_token_address,
                max_gas_token_amount,
            } => match (gas_token_address, max_gas_token_amount) {
                (Some(address), Some(amount)) if !address.is_empty() => {
                    Ok(Some(GaslessParams::GasToken {
                        gas_token_address: address.clone(),
                        max_gas_token_amount: *amount,
                    }))
                }
                _ => Err(SdkError::Configuration(
                    "gas token mode needs both gas_token_address and max_gas_token_amount".into(),
                )),
            },
        }
    }
}

/// Chain ids are compared as field elements; `SN_MAIN` and `0x534e5f4d41494e` match.
fn chain_felt(chain_id: &str) -> Option<Felt> {
    let trimmed = chain_id.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        numeric::parse_felt(trimmed).ok()
    } else {
        cairo_short_string_to_felt(trimmed).ok()
    }
}

pub fn same_chain(a: &str, b: &str) -> bool {
    match (chain_felt(a), chain_felt(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

/// Addresses compare as field elements, so zero padding and case do not matter.
pub fn same_address(a: &str, b: &str) -> bool {
    match (numeric::parse_felt(a), numeric::parse_felt(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

/// Attribute a gasless DCA request failure to its step. Cancellation and
/// integrity failures are not step failures and pass through unchanged.
fn dca_step(step: fn(ProviderError) -> PaymasterError) -> impl Fn(SdkError) -> SdkError {
    move |error| match error {
        SdkError::Aborted | SdkError::Integrity(_) => error,
        other => SdkError::Paymaster(step(ProviderError::from_gateway(&other))),
    }
}

async fn ensure_chain(account: &dyn Account, expected: &str) -> Result<()> {
    let actual = account.chain_id().await?;
    if !same_chain(expected, &actual) {
        warn!("Refusing to execute: action on {}, account on {}", expected, actual);
        return Err(SdkError::ChainMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Façade over call building and both submission paths.
#[derive(Clone)]
pub struct Executor {
    gateway: Gateway,
}

impl Executor {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    async fn submit(
        &self,
        account: &dyn Account,
        calls: &[Call],
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult> {
        match options.active_paymaster() {
            Some(config) => {
                debug!("Relaying {} calls through paymaster", calls.len());
                Ok(PaymasterFlow::from_config(config)
                    .run_all(account, calls)
                    .await?)
            }
            None => direct::execute(account, calls).await,
        }
    }

    /// Swap along `quote`, accepting `slippage_bps` of price movement.
    pub async fn execute_swap(
        &self,
        account: &dyn Account,
        quote: &Quote,
        slippage_bps: u32,
        include_approve: bool,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult> {
        ensure_chain(account, &quote.chain_id).await?;
        if quote.is_expired(now_secs()) {
            warn!("Quote {} is past its expiry; the API may reject it", quote.quote_id);
        }

        let calls = calls::quote_to_calls(
            &self.gateway,
            &quote.quote_id,
            &account.address(),
            slippage_bps,
            include_approve,
            &options.request,
        )
        .await?;
        let result = self.submit(account, &calls, options).await?;
        info!("Swap {} executed in {}", quote.quote_id, result.transaction_hash);
        Ok(result)
    }

    pub async fn execute_stake(
        &self,
        account: &dyn Account,
        action: &StakeAction,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult> {
        ensure_chain(account, &action.chain_id).await?;
        let calls = calls::stake_to_calls(
            &self.gateway,
            &action.pool_address,
            &account.address(),
            action.amount,
            &options.request,
        )
        .await?;
        self.submit(account, &calls, options).await
    }

    pub async fn execute_initiate_unstake(
        &self,
        account: &dyn Account,
        action: &InitiateUnstakeAction,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult> {
        ensure_chain(account, &action.chain_id).await?;
        let calls = calls::initiate_unstake_to_calls(
            &self.gateway,
            &action.pool_address,
            &account.address(),
            action.amount,
            &options.request,
        )
        .await?;
        self.submit(account, &calls, options).await
    }

    pub async fn execute_unstake(
        &self,
        account: &dyn Account,
        action: &UnstakeAction,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult> {
        ensure_chain(account, &action.chain_id).await?;
        let calls = calls::unstake_to_calls(
            &self.gateway,
            &action.pool_address,
            &account.address(),
            &options.request,
        )
        .await?;
        self.submit(account, &calls, options).await
    }

    pub async fn execute_claim_rewards(
        &self,
        account: &dyn Account,
        action: &ClaimRewardsAction,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult> {
        ensure_chain(account, &action.chain_id).await?;
        let calls = calls::claim_rewards_to_calls(
            &self.gateway,
            &action.pool_address,
            &account.address(),
            action.restake,
            &options.request,
        )
        .await?;
        self.submit(account, &calls, options).await
    }

    /// Open a DCA order.
    ///
    /// In the gasless modes the API returns typed data that the account signs;
    /// `on_before_submit` runs after signing and right before the execute
    /// request, the point past which the order can no longer be withdrawn.
    /// It is not called in [`DcaGasMode::Calls`].
    ///
    /// The order's trader must be the connected account. Gasless failures are
    /// reported per step as [`PaymasterError::Build`], [`PaymasterError::Sign`]
    /// or [`PaymasterError::Execute`].
    pub async fn execute_create_dca_order(
        &self,
        account: &dyn Account,
        action: &CreateDcaOrderAction,
        gas_mode: &DcaGasMode,
        on_before_submit: Option<&(dyn Fn() + Send + Sync)>,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult> {
        let gasless = gas_mode.gasless_params()?;
        let trader = account.address();
        if !same_address(&action.order.trader_address, &trader) {
            return Err(SdkError::InvalidArgument(format!(
                "order trader {} is not the connected account {}",
                action.order.trader_address, trader
            )));
        }
        action.order.validate()?;
        ensure_chain(account, &action.chain_id).await?;

        let params = match gasless {
            None => {
                let calls =
                    calls::create_dca_order_to_calls(&self.gateway, &action.order, &options.request)
                        .await?;
                return self.submit(account, &calls, options).await;
            }
            Some(params) => params,
        };

        let typed_data =
            calls::build_dca_typed_data(&self.gateway, &action.order, &params, &options.request)
                .await
                .map_err(dca_step(PaymasterError::Build))?;
        let signed = paymaster::sign_typed_data(account, typed_data)
            .await
            .map_err(PaymasterError::Sign)?;
        if let Some(callback) = on_before_submit {
            callback();
        }
        let mut result =
            calls::execute_dca_typed_data(&self.gateway, &trader, &signed, &options.request)
                .await
                .map_err(dca_step(PaymasterError::Execute))?;
        if result.gas_token_address.is_none() {
            result.gas_token_address = params.gas_token_address();
        }
        Ok(result)
    }

    pub async fn execute_cancel_dca_order(
        &self,
        account: &dyn Account,
        action: &CancelDcaOrderAction,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult> {
        ensure_chain(account, &action.chain_id).await?;
        let calls =
            calls::cancel_dca_order_to_calls(&self.gateway, &action.order_address, &options.request)
                .await?;
        self.submit(account, &calls, options).await
    }
}
