//! Call building for swaps, staking and DCA orders, plus slippage bounds.
//!
//! The server rebuilds the quote's economics under the caller's slippage and
//! returns the call list; the client does not recompute amounts. Slippage is
//! always taken as integer basis points.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};
use crate::gateway::{Gateway, RequestOptions};
use crate::numeric;
use crate::types::{Call, ExecutionResult, SignedPaymasterTransaction, TypedData};

/// 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// `floor(amount * bps / 10_000)` without overflowing for any `u128` amount.
fn slippage_part(amount: u128, slippage_bps: u32) -> u128 {
    let bps = slippage_bps as u128;
    let denominator = BPS_DENOMINATOR as u128;
    let whole = (amount / denominator).saturating_mul(bps);
    let rest = (amount % denominator) * bps / denominator;
    whole.saturating_add(rest)
}

/// Lowest amount the user should accept: `amount − floor(amount·bps/10000)`.
pub fn calculate_min_received_amount(amount: u128, slippage_bps: u32) -> u128 {
    amount.saturating_sub(slippage_part(amount, slippage_bps))
}

/// Highest amount the user should spend: `amount + floor(amount·bps/10000)`, saturating.
pub fn calculate_max_spend_amount(amount: u128, slippage_bps: u32) -> u128 {
    amount.saturating_add(slippage_part(amount, slippage_bps))
}

pub(crate) fn check_slippage(slippage_bps: u32) -> Result<()> {
    if slippage_bps > BPS_DENOMINATOR {
        return Err(SdkError::InvalidArgument(format!(
            "slippage {}bps exceeds {}bps",
            slippage_bps, BPS_DENOMINATOR
        )));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildSwapRequest<'a> {
    quote_id: &'a str,
    taker_address: &'a str,
    /// The build endpoint takes a fraction, not bps.
    slippage: f64,
    include_approve: bool,
}

/// Call list returned by every build endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CallsResponse {
    #[serde(default)]
    pub chain_id: Option<String>,
    pub calls: Vec<Call>,
}

/// Turn a quote into the ordered calls that execute it.
///
/// With `include_approve`, the first call is the sell-token approval; submit the
/// whole list together so the approval is never left dangling.
pub async fn quote_to_calls(
    gateway: &Gateway,
    quote_id: &str,
    taker_address: &str,
    slippage_bps: u32,
    include_approve: bool,
    options: &RequestOptions,
) -> Result<Vec<Call>> {
    check_slippage(slippage_bps)?;
    let body = BuildSwapRequest {
        quote_id,
        taker_address,
        slippage: slippage_bps as f64 / BPS_DENOMINATOR as f64,
        include_approve,
    };
    let resp: CallsResponse = gateway.post("/swap/v2/build", &body, options).await?;

    if include_approve && resp.calls.first().map(|c| c.entrypoint.as_str()) != Some("approve") {
        warn!("Build for quote {} did not lead with an approval call", quote_id);
    }
    debug!(
        "Quote {} built into {} calls on {}",
        quote_id,
        resp.calls.len(),
        resp.chain_id.as_deref().unwrap_or("unknown chain")
    );
    Ok(resp.calls)
}

// ---- Staking ----

#[derive(Debug, Serialize)]
struct AmountBody {
    #[serde(with = "numeric::hex_u128")]
    amount: u128,
}

#[derive(Debug, Serialize)]
struct ClaimRewardsBody {
    restake: bool,
}

/// Position of a user in a staking pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMember {
    pub pool_address: String,
    pub user_address: String,
    #[serde(with = "numeric::hex_u128")]
    pub amount: u128,
    #[serde(with = "numeric::hex_u128")]
    pub unclaimed_rewards: u128,
    #[serde(default, with = "numeric::option_hex_u128")]
    pub unpool_amount: Option<u128>,
    /// Unix seconds after which the unpooled amount can be withdrawn.
    #[serde(default)]
    pub unpool_time: Option<u64>,
}

impl PoolMember {
    /// Whether a pending withdrawal exists and its cooldown has elapsed.
    pub fn can_withdraw(&self, now: u64) -> bool {
        matches!(self.unpool_amount, Some(a) if a > 0)
            && self.unpool_time.map_or(false, |t| t <= now)
    }
}

fn member_path(pool_address: &str, user_address: &str) -> Result<String> {
    if pool_address.is_empty() || user_address.is_empty() {
        return Err(SdkError::InvalidArgument(
            "pool and user addresses are required".into(),
        ));
    }
    Ok(format!(
        "/staking/v3/pools/{}/members/{}",
        pool_address, user_address
    ))
}

async fn staking_calls<B: Serialize>(
    gateway: &Gateway,
    pool_address: &str,
    user_address: &str,
    action: &str,
    body: &B,
    options: &RequestOptions,
) -> Result<Vec<Call>> {
    let path = format!("{}/{}", member_path(pool_address, user_address)?, action);
    let resp: CallsResponse = gateway.post(&path, body, options).await?;
    debug!("Staking {} for {} built into {} calls", action, user_address, resp.calls.len());
    Ok(resp.calls)
}

/// Calls depositing `amount` into `pool_address`.
pub async fn stake_to_calls(
    gateway: &Gateway,
    pool_address: &str,
    user_address: &str,
    amount: u128,
    options: &RequestOptions,
) -> Result<Vec<Call>> {
    if amount == 0 {
        return Err(SdkError::InvalidArgument("stake amount must be positive".into()));
    }
    let body = AmountBody { amount };
    staking_calls(gateway, pool_address, user_address, "stake", &body, options).await
}

/// Calls starting the withdrawal cooldown for `amount`.
pub async fn initiate_unstake_to_calls(
    gateway: &Gateway,
    pool_address: &str,
    user_address: &str,
    amount: u128,
    options: &RequestOptions,
) -> Result<Vec<Call>> {
    if amount == 0 {
        return Err(SdkError::InvalidArgument("unstake amount must be positive".into()));
    }
    staking_calls(
        gateway,
        pool_address,
        user_address,
        "initiate-unstake",
        &AmountBody { amount },
        options,
    )
    .await
}

/// Calls withdrawing funds whose cooldown has elapsed.
pub async fn unstake_to_calls(
    gateway: &Gateway,
    pool_address: &str,
    user_address: &str,
    options: &RequestOptions,
) -> Result<Vec<Call>> {
    staking_calls(
        gateway,
        pool_address,
        user_address,
        "unstake",
        &serde_json::json!({}),
        options,
    )
    .await
}

/// Calls claiming accrued rewards, optionally restaking them into the pool.
pub async fn claim_rewards_to_calls(
    gateway: &Gateway,
    pool_address: &str,
    user_address: &str,
    restake: bool,
    options: &RequestOptions,
) -> Result<Vec<Call>> {
    staking_calls(
        gateway,
        pool_address,
        user_address,
        "claim-rewards",
        &ClaimRewardsBody { restake },
        options,
    )
    .await
}

/// GET `/staking/v3/pools/{pool}/members/{user}`.
pub async fn fetch_pool_member(
    gateway: &Gateway,
    pool_address: &str,
    user_address: &str,
    options: &RequestOptions,
) -> Result<PoolMember> {
    let path = member_path(pool_address, user_address)?;
    gateway.get(&path, &[], options).await
}

// ---- DCA ----

/// Optional price band; cycles outside it are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingStrategy {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "numeric::option_hex_u128"
    )]
    pub token_to_min_amount: Option<u128>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "numeric::option_hex_u128"
    )]
    pub token_to_max_amount: Option<u128>,
}

/// Recurring order: sell `sell_amount_per_cycle` every `frequency` until
/// `sell_amount` is spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDcaOrder {
    pub trader_address: String,
    pub sell_token_address: String,
    pub buy_token_address: String,
    #[serde(with = "numeric::hex_u128")]
    pub sell_amount: u128,
    #[serde(with = "numeric::hex_u128")]
    pub sell_amount_per_cycle: u128,
    /// ISO-8601 duration, e.g. `P1D`.
    pub frequency: String,
    #[serde(default)]
    pub pricing_strategy: PricingStrategy,
}

impl CreateDcaOrder {
    pub fn validate(&self) -> Result<()> {
        if self.sell_amount_per_cycle == 0 || self.sell_amount_per_cycle > self.sell_amount {
            return Err(SdkError::InvalidArgument(format!(
                "per-cycle amount {} must be in 1..={}",
                self.sell_amount_per_cycle, self.sell_amount
            )));
        }
        if !self.frequency.starts_with('P') {
            return Err(SdkError::InvalidArgument(format!(
                "frequency {:?} is not an ISO-8601 duration",
                self.frequency
            )));
        }
        if let (Some(min), Some(max)) = (
            self.pricing_strategy.token_to_min_amount,
            self.pricing_strategy.token_to_max_amount,
        ) {
            if min > max {
                return Err(SdkError::InvalidArgument(
                    "pricing strategy minimum exceeds maximum".into(),
                ));
            }
        }
        Ok(())
    }

    /// Number of full cycles the order runs.
    pub fn cycles(&self) -> u128 {
        if self.sell_amount_per_cycle == 0 {
            return 0;
        }
        self.sell_amount / self.sell_amount_per_cycle
    }
}

/// Gas payment for a relayed DCA order, already checked for completeness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GaslessParams {
    #[serde(rename_all = "camelCase")]
    GasToken {
        gas_token_address: String,
        #[serde(with = "numeric::hex_u128")]
        max_gas_token_amount: u128,
    },
    #[serde(rename_all = "camelCase")]
    GasFree { gas_free: bool },
}

impl GaslessParams {
    pub fn gas_free() -> Self {
        GaslessParams::GasFree { gas_free: true }
    }

    pub fn gas_token_address(&self) -> Option<String> {
        match self {
            GaslessParams::GasToken {
                gas_token_address, ..
            } => Some(gas_token_address.clone()),
            GaslessParams::GasFree { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DcaOrderStatus {
    Indexing,
    Active,
    Closed,
}

/// An order as stored by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcaOrder {
    pub order_address: String,
    pub trader_address: String,
    pub status: DcaOrderStatus,
    pub sell_token_address: String,
    pub buy_token_address: String,
    #[serde(with = "numeric::hex_u128")]
    pub sell_amount: u128,
    #[serde(with = "numeric::hex_u128")]
    pub sell_amount_per_cycle: u128,
    #[serde(default, with = "numeric::option_hex_u128")]
    pub amount_sold: Option<u128>,
    #[serde(default, with = "numeric::option_hex_u128")]
    pub amount_bought: Option<u128>,
    pub frequency: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: u64,
}

/// Calls opening a DCA order. The first call approves the full `sell_amount`.
pub async fn create_dca_order_to_calls(
    gateway: &Gateway,
    order: &CreateDcaOrder,
    options: &RequestOptions,
) -> Result<Vec<Call>> {
    order.validate()?;
    let resp: CallsResponse = gateway.post("/dca/v3/orders", order, options).await?;
    debug!(
        "DCA order for {} ({} cycles) built into {} calls",
        order.trader_address,
        order.cycles(),
        resp.calls.len()
    );
    Ok(resp.calls)
}

/// Calls closing an open order and refunding what is left.
pub async fn cancel_dca_order_to_calls(
    gateway: &Gateway,
    order_address: &str,
    options: &RequestOptions,
) -> Result<Vec<Call>> {
    if order_address.is_empty() {
        return Err(SdkError::InvalidArgument("order address is required".into()));
    }
    let path = format!("/dca/v3/orders/{}/cancel", order_address);
    let resp: CallsResponse = gateway.post(&path, &serde_json::json!({}), options).await?;
    Ok(resp.calls)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildDcaTypedDataRequest<'a> {
    #[serde(flatten)]
    order: &'a CreateDcaOrder,
    #[serde(flatten)]
    gasless: &'a GaslessParams,
}

/// Typed data the trader signs to open `order` without sending a transaction.
pub async fn build_dca_typed_data(
    gateway: &Gateway,
    order: &CreateDcaOrder,
    gasless: &GaslessParams,
    options: &RequestOptions,
) -> Result<TypedData> {
    order.validate()?;
    let body = BuildDcaTypedDataRequest { order, gasless };
    gateway
        .post("/dca/v3/orders/build-typed-data", &body, options)
        .await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteDcaRequest<'a> {
    user_address: &'a str,
    typed_data: &'a TypedData,
    signature: &'a [String],
}

/// Relay signed DCA typed data.
pub async fn execute_dca_typed_data(
    gateway: &Gateway,
    user_address: &str,
    signed: &SignedPaymasterTransaction,
    options: &RequestOptions,
) -> Result<ExecutionResult> {
    let body = ExecuteDcaRequest {
        user_address,
        typed_data: &signed.typed_data,
        signature: signed.signature.components(),
    };
    let result: ExecutionResult = gateway
        .post("/dca/v3/orders/execute", &body, options)
        .await?;
    info!("DCA order relayed in {} for {}", result.transaction_hash, user_address);
    Ok(result)
}

/// GET `/dca/v3/orders` for a trader, optionally filtered by status.
pub async fn fetch_dca_orders(
    gateway: &Gateway,
    trader_address: &str,
    status: Option<DcaOrderStatus>,
    page: u32,
    options: &RequestOptions,
) -> Result<Page<DcaOrder>> {
    let mut query = vec![
        ("traderAddress".to_string(), trader_address.to_string()),
        ("page".to_string(), page.to_string()),
    ];
    if let Some(status) = status {
        let value = serde_json::to_value(&status)?;
        if let Some(s) = value.as_str() {
            query.push(("status".to_string(), s.to_string()));
        }
    }
    gateway.get("/dca/v3/orders", &query, options).await
}
