//! In-memory doubles for the transport, account and paymaster seams.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::account::{Account, AccountError};
use crate::gateway::{
    HttpRequest, HttpResponse, Method, Transport, TransportError, SIGNATURE_HEADER,
};
use crate::keypair::ResponseSigningKey;
use crate::paymaster::{
    ExecutionParameters, InvokeDescriptor, PaymasterProvider, ProviderError, SignedInvoke,
};
use crate::types::{Call, RawSignature, TypedData};

/// Route `log` output to the test harness; `RUST_LOG=debug` shows the request trail.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A two-level routed quote: 1e18 sell for 2e18 buy on mainnet.
pub fn quote_json() -> serde_json::Value {
    json!({
        "quoteId": "q-1",
        "sellTokenAddress": "0x049d",
        "sellAmount": "0xde0b6b3a7640000",
        "sellAmountInUsd": 3200.5,
        "buyTokenAddress": "0x053c",
        "buyAmount": "0x1bc16d674ec80000",
        "buyAmountInUsd": 3199.1,
        "fee": {"feeToken": "0x053c", "protocolFees": "0x2386f26fc10000", "protocolFeesBps": 15},
        "chainId": "0x534e5f4d41494e",
        "expiry": 1700000100,
        "routes": [
            {"name": "Ekubo", "address": "0x1", "percent": 0.6,
             "sellTokenAddress": "0x049d", "buyTokenAddress": "0x053c", "routes": []},
            {"name": "Split", "address": "0x2", "percent": 0.4,
             "sellTokenAddress": "0x049d", "buyTokenAddress": "0x053c", "routes": [
                {"name": "JediSwap", "address": "0x3", "percent": 0.5,
                 "sellTokenAddress": "0x049d", "buyTokenAddress": "0x053c"},
                {"name": "10kSwap", "address": "0x4", "percent": 0.5,
                 "sellTokenAddress": "0x049d", "buyTokenAddress": "0x053c"}
             ]}
        ],
        "gasFees": "0x0",
        "gasless": {"active": true, "gasTokenPrices": [
            {"tokenAddress": "0x053c", "gasFeesInUsd": 0.02, "gasFeesInGasToken": "0x4e20"}
        ]}
    })
}

/// Shared, ordered record of calls across doubles.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: &str) {
        self.0.lock().unwrap().push(event.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct Route {
    method: Method,
    path: String,
    status: u16,
    body: Vec<u8>,
}

/// Transport answering from canned routes, matched on method and URL path suffix.
/// The most recently registered route wins.
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
    signer: Option<ResponseSigningKey>,
    delay: Option<Duration>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            signer: None,
            delay: None,
        }
    }

    /// Sign every response body with `key`.
    pub fn signed_by(mut self, key: ResponseSigningKey) -> Self {
        self.signer = Some(key);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.respond_raw(method, path, status, serde_json::to_vec(&body).unwrap());
    }

    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: Vec<u8>) {
        self.routes.lock().unwrap().push(Route {
            method,
            path: path.to_string(),
            status,
            body,
        });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests whose path ends with `suffix`.
    pub fn count(&self, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| path_of(&r.url).ends_with(suffix))
            .count()
    }

    /// JSON body of the last request sent to a path ending with `suffix`.
    pub fn last_body(&self, suffix: &str) -> Value {
        let request = self
            .requests()
            .into_iter()
            .rev()
            .find(|r| path_of(&r.url).ends_with(suffix))
            .unwrap_or_else(|| panic!("no request to {}", suffix));
        serde_json::from_slice(request.body.as_deref().unwrap_or(b"null")).unwrap()
    }
}

fn path_of(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let (status, body) = {
            let routes = self.routes.lock().unwrap();
            routes
                .iter()
                .rev()
                .find(|r| r.method == request.method && path_of(&request.url).ends_with(&r.path))
                .map(|r| (r.status, r.body.clone()))
                .unwrap_or((404, br#"{"messages":["no route"]}"#.to_vec()))
        };

        let mut headers = HashMap::new();
        if let Some(signer) = &self.signer {
            let header = signer
                .sign_body(&body)
                .map_err(|e| TransportError::Other(e.to_string()))?;
            headers.insert(SIGNATURE_HEADER.to_string(), header);
        }
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

pub struct MockAccount {
    address: String,
    chain_id: String,
    signature: Result<RawSignature, AccountError>,
    execute_result: Result<String, AccountError>,
    executed: Mutex<Vec<Vec<Call>>>,
    signed: Mutex<Vec<TypedData>>,
    events: EventLog,
}

impl MockAccount {
    pub fn new(address: &str, chain_id: &str) -> Self {
        Self {
            address: address.to_string(),
            chain_id: chain_id.to_string(),
            signature: Ok(RawSignature::Array(vec!["0x1234".into(), "0x5678".into()])),
            execute_result: Ok("0xd1ec7".into()),
            executed: Mutex::new(Vec::new()),
            signed: Mutex::new(Vec::new()),
            events: EventLog::default(),
        }
    }

    pub fn with_events(mut self, events: &EventLog) -> Self {
        self.events = events.clone();
        self
    }

    pub fn with_signature(mut self, signature: RawSignature) -> Self {
        self.signature = Ok(signature);
        self
    }

    pub fn failing_sign(mut self, error: AccountError) -> Self {
        self.signature = Err(error);
        self
    }

    pub fn with_tx_hash(mut self, hash: &str) -> Self {
        self.execute_result = Ok(hash.to_string());
        self
    }

    pub fn failing_execute(mut self, error: AccountError) -> Self {
        self.execute_result = Err(error);
        self
    }

    pub fn executed(&self) -> Vec<Vec<Call>> {
        self.executed.lock().unwrap().clone()
    }

    pub fn signed(&self) -> Vec<TypedData> {
        self.signed.lock().unwrap().clone()
    }

    pub fn sign_count(&self) -> usize {
        self.signed.lock().unwrap().len()
    }
}

#[async_trait]
impl Account for MockAccount {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn chain_id(&self) -> Result<String, AccountError> {
        Ok(self.chain_id.clone())
    }

    async fn sign_message(&self, typed_data: &TypedData) -> Result<RawSignature, AccountError> {
        self.events.push("account.sign");
        self.signed.lock().unwrap().push(typed_data.clone());
        self.signature.clone()
    }

    async fn execute(&self, calls: &[Call]) -> Result<String, AccountError> {
        self.events.push("account.execute");
        self.executed.lock().unwrap().push(calls.to_vec());
        self.execute_result.clone()
    }
}

pub struct MockPaymaster {
    build_result: Result<TypedData, ProviderError>,
    execute_result: Result<String, ProviderError>,
    builds: Mutex<Vec<InvokeDescriptor>>,
    executes: Mutex<Vec<SignedInvoke>>,
    events: EventLog,
}

impl Default for MockPaymaster {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymaster {
    pub fn new() -> Self {
        Self {
            build_result: Ok(TypedData(serde_json::json!({
                "types": {},
                "primaryType": "OutsideExecution",
                "domain": {"name": "Account.execute_from_outside", "version": "2"},
                "message": {"Caller": "0x414e595f43414c4c4552"}
            }))),
            execute_result: Ok("0x9a7ed".into()),
            builds: Mutex::new(Vec::new()),
            executes: Mutex::new(Vec::new()),
            events: EventLog::default(),
        }
    }

    pub fn with_events(mut self, events: &EventLog) -> Self {
        self.events = events.clone();
        self
    }

    pub fn failing_build(mut self, error: ProviderError) -> Self {
        self.build_result = Err(error);
        self
    }

    pub fn failing_execute(mut self, error: ProviderError) -> Self {
        self.execute_result = Err(error);
        self
    }

    pub fn tx_hash(&self) -> String {
        self.execute_result.clone().unwrap_or_default()
    }

    pub fn builds(&self) -> Vec<InvokeDescriptor> {
        self.builds.lock().unwrap().clone()
    }

    pub fn executes(&self) -> Vec<SignedInvoke> {
        self.executes.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymasterProvider for MockPaymaster {
    async fn build_transaction(
        &self,
        invoke: &InvokeDescriptor,
        _params: &ExecutionParameters,
    ) -> Result<TypedData, ProviderError> {
        self.events.push("paymaster.build");
        self.builds.lock().unwrap().push(invoke.clone());
        self.build_result.clone()
    }

    async fn execute_transaction(
        &self,
        invoke: &SignedInvoke,
        _params: &ExecutionParameters,
    ) -> Result<String, ProviderError> {
        self.events.push("paymaster.execute");
        self.executes.lock().unwrap().push(invoke.clone());
        self.execute_result.clone()
    }
}
