//! Quote acquisition: ranked trade quotes for a token pair and amount.
//!
//! ```ignore
//! let request = QuoteRequest::sell("0x049d...", "0x053c...", 1_000_000_000_000_000_000)
//!     .taker("0x0abc...");
//! let quotes = fetch_quotes(&gateway, &request, &RequestOptions::default()).await?;
//! ```

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Result, SdkError};
use crate::gateway::{Gateway, RequestOptions};
use crate::numeric::{self, hex_u128, option_hex_u128};

const PERCENT_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("Route percentages under {path} sum to {sum}, expected 1")]
    BadSum { path: String, sum: f64 },
    #[error("Route {name} has percent {percent} outside [0, 1]")]
    OutOfRange { name: String, percent: f64 },
}

/// One edge of the routing tree. Sub-routes split this edge; their
/// percentages sum to 1 over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub name: String,
    pub address: String,
    pub percent: f64,
    pub sell_token_address: String,
    pub buy_token_address: String,
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    #[serde(default)]
    pub fee_token: String,
    #[serde(default, with = "hex_u128")]
    pub protocol_fees: u128,
    #[serde(default)]
    pub protocol_fees_bps: u32,
    #[serde(default, with = "hex_u128")]
    pub integrator_fees: u128,
    #[serde(default)]
    pub integrator_fees_bps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasTokenPrice {
    pub token_address: String,
    #[serde(default)]
    pub gas_fees_in_usd: f64,
    #[serde(with = "hex_u128")]
    pub gas_fees_in_gas_token: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaslessInfo {
    pub active: bool,
    #[serde(default)]
    pub gas_token_prices: Vec<GasTokenPrice>,
}

/// A priced, time-bounded proposal. Amounts are minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub quote_id: String,
    pub sell_token_address: String,
    #[serde(with = "hex_u128")]
    pub sell_amount: u128,
    #[serde(default)]
    pub sell_amount_in_usd: f64,
    pub buy_token_address: String,
    #[serde(with = "hex_u128")]
    pub buy_amount: u128,
    #[serde(default)]
    pub buy_amount_in_usd: f64,
    #[serde(default)]
    pub fee: Fee,
    pub chain_id: String,
    #[serde(default)]
    pub block_number: Option<String>,
    /// Unix seconds after which the server refuses to build.
    #[serde(default)]
    pub expiry: Option<u64>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default, with = "option_hex_u128")]
    pub gas_fees: Option<u128>,
    #[serde(default)]
    pub price_impact: Option<f64>,
    #[serde(default)]
    pub gasless: Option<GaslessInfo>,
}

impl Quote {
    pub fn is_expired(&self, now_secs: u64) -> bool {
        self.expiry.is_some_and(|expiry| now_secs >= expiry)
    }

    /// Names of every leaf venue in the routing tree, depth first.
    pub fn venues(&self) -> Vec<&str> {
        let mut stack: Vec<&Route> = self.routes.iter().rev().collect();
        let mut out = Vec::new();
        while let Some(route) = stack.pop() {
            if route.routes.is_empty() {
                out.push(route.name.as_str());
            } else {
                stack.extend(route.routes.iter().rev());
            }
        }
        out
    }

    pub fn validate_routes(&self) -> std::result::Result<(), RouteError> {
        validate_routes(&self.routes)
    }
}

/// Check that every sibling group in the tree sums to 1 and each percent is in `[0, 1]`.
pub fn validate_routes(routes: &[Route]) -> std::result::Result<(), RouteError> {
    validate_level(routes, "root")
}

fn validate_level(routes: &[Route], path: &str) -> std::result::Result<(), RouteError> {
    if routes.is_empty() {
        return Ok(());
    }
    let mut sum = 0.0;
    for route in routes {
        if !(0.0..=1.0).contains(&route.percent) {
            return Err(RouteError::OutOfRange {
                name: route.name.clone(),
                percent: route.percent,
            });
        }
        sum += route.percent;
    }
    if (sum - 1.0).abs() > PERCENT_TOLERANCE {
        return Err(RouteError::BadSum {
            path: path.to_string(),
            sum,
        });
    }
    for route in routes {
        validate_level(&route.routes, &format!("{}/{}", path, route.name))?;
    }
    Ok(())
}

/// Liquidity source known to the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(rename = "type", default)]
    pub source_type: Option<String>,
}

/// Parameters for [`fetch_quotes`]. Exactly one of sell/buy amount is set.
#[derive(Debug, Clone, Default)]
pub struct QuoteRequest {
    pub sell_token_address: String,
    pub buy_token_address: String,
    pub sell_amount: Option<u128>,
    pub buy_amount: Option<u128>,
    pub taker_address: Option<String>,
    pub size: Option<u32>,
    pub exclude_sources: Vec<String>,
    pub only_direct: bool,
    pub integrator_fees_bps: Option<u32>,
    pub integrator_fee_recipient: Option<String>,
    pub integrator_name: Option<String>,
}

impl QuoteRequest {
    /// Quote for selling an exact amount.
    pub fn sell(sell_token: &str, buy_token: &str, sell_amount: u128) -> Self {
        Self {
            sell_token_address: sell_token.to_string(),
            buy_token_address: buy_token.to_string(),
            sell_amount: Some(sell_amount),
            ..Default::default()
        }
    }

    /// Quote for buying an exact amount.
    pub fn buy(sell_token: &str, buy_token: &str, buy_amount: u128) -> Self {
        Self {
            sell_token_address: sell_token.to_string(),
            buy_token_address: buy_token.to_string(),
            buy_amount: Some(buy_amount),
            ..Default::default()
        }
    }

    pub fn taker(mut self, address: &str) -> Self {
        self.taker_address = Some(address.to_string());
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn exclude_source(mut self, name: &str) -> Self {
        self.exclude_sources.push(name.to_string());
        self
    }

    pub fn only_direct(mut self) -> Self {
        self.only_direct = true;
        self
    }

    /// Integrator fee in basis points, paid to `recipient`.
    pub fn integrator(mut self, name: &str, fees_bps: u32, recipient: &str) -> Self {
        self.integrator_name = Some(name.to_string());
        self.integrator_fees_bps = Some(fees_bps);
        self.integrator_fee_recipient = Some(recipient.to_string());
        self
    }

    fn to_query(&self) -> Result<Vec<(String, String)>> {
        match (self.sell_amount, self.buy_amount) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(SdkError::InvalidArgument(
                    "exactly one of sell_amount or buy_amount must be set".into(),
                ))
            }
            _ => {}
        }
        if self.sell_token_address.is_empty() || self.buy_token_address.is_empty() {
            return Err(SdkError::InvalidArgument("token addresses are required".into()));
        }

        let mut query = vec![
            ("sellTokenAddress".to_string(), self.sell_token_address.clone()),
            ("buyTokenAddress".to_string(), self.buy_token_address.clone()),
        ];
        if let Some(amount) = self.sell_amount {
            query.push(("sellAmount".into(), numeric::to_hex(amount)));
        }
        if let Some(amount) = self.buy_amount {
            query.push(("buyAmount".into(), numeric::to_hex(amount)));
        }
        if let Some(taker) = &self.taker_address {
            query.push(("takerAddress".into(), taker.clone()));
        }
        if let Some(size) = self.size {
            query.push(("size".into(), size.to_string()));
        }
        for source in &self.exclude_sources {
            query.push(("excludeSources".into(), source.clone()));
        }
        if self.only_direct {
            query.push(("onlyDirect".into(), "true".into()));
        }
        if let Some(bps) = self.integrator_fees_bps {
            query.push(("integratorFees".into(), numeric::to_hex(bps as u128)));
        }
        if let Some(recipient) = &self.integrator_fee_recipient {
            query.push(("integratorFeeRecipient".into(), recipient.clone()));
        }
        if let Some(name) = &self.integrator_name {
            query.push(("integratorName".into(), name.clone()));
        }
        Ok(query)
    }
}

/// Fetch ranked quotes, best first.
pub async fn fetch_quotes(
    gateway: &Gateway,
    request: &QuoteRequest,
    options: &RequestOptions,
) -> Result<Vec<Quote>> {
    let query = request.to_query()?;
    let quotes: Vec<Quote> = gateway.get("/swap/v2/quotes", &query, options).await?;
    debug!(
        "Got {} quotes for {} -> {}",
        quotes.len(),
        request.sell_token_address,
        request.buy_token_address
    );
    Ok(quotes)
}

/// List liquidity sources the router can use.
pub async fn fetch_sources(gateway: &Gateway, options: &RequestOptions) -> Result<Vec<Source>> {
    gateway.get("/swap/v2/sources", &[], options).await
}
