//! HTTP gateway to the routing API.
//!
//! Every response goes through the same pipeline: status check, signature
//! verification on the raw bytes (when a trust anchor is supplied), then JSON
//! decoding into the expected shape.
//!
//! ```ignore
//! let gateway = Gateway::new("https://starknet.api.starkx.exchange");
//! let options = RequestOptions::default().with_trust_anchor(anchor);
//! let quotes: Vec<Quote> = gateway.get("/swap/v2/quotes", &query, &options).await?;
//! ```

use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::error::{Result, SdkError};
use crate::integrity;
use crate::keypair::TrustAnchor;

/// Response header carrying the `r,s` signature over the body.
pub const SIGNATURE_HEADER: &str = "signature";
/// Request header asking the server to sign its response.
pub const ASK_SIGNATURE_HEADER: &str = "ask-signature";

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are stored lowercase.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Sends one HTTP request. The default implementation is [`ReqwestTransport`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Client with an overall per-request timeout.
    pub fn with_timeout(timeout: Duration) -> std::result::Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp.bytes().await?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Triggers an [`AbortSignal`].
pub struct AbortController {
    tx: watch::Sender<bool>,
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation for network calls. Wallet interactions are not covered.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once aborted; never resolves if the controller is dropped first.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Per-request context. Nothing here is global: the trust anchor and abort
/// signal travel with each call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub trust_anchor: Option<TrustAnchor>,
    pub abort: Option<AbortSignal>,
}

impl RequestOptions {
    pub fn with_trust_anchor(mut self, anchor: TrustAnchor) -> Self {
        self.trust_anchor = Some(anchor);
        self
    }

    pub fn with_abort(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }
}

/// Prefix the API puts on 500 messages caused by an on-chain revert.
const CONTRACT_ERROR_MARKER: &str = "Contract error";

/// Error body shape returned by the API for 4xx/5xx.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    messages: Vec<String>,
    #[serde(default)]
    revert_error: Option<String>,
}

/// Routing API client: base URL plus a [`Transport`].
#[derive(Clone)]
pub struct Gateway {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl Gateway {
    /// Create a gateway using a default reqwest transport.
    pub fn new(base_url: &str) -> Self {
        Self::with_transport(base_url, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with query parameters.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        options: &RequestOptions,
    ) -> Result<T> {
        let url = self.url(path);
        let url = if query.is_empty() {
            url
        } else {
            reqwest::Url::parse_with_params(&url, query)
                .map_err(|e| SdkError::InvalidArgument(format!("bad URL {}: {}", url, e)))?
                .to_string()
        };
        let request = HttpRequest {
            method: Method::Get,
            url,
            headers: self.headers(options, false),
            body: None,
        };
        self.dispatch(request, options).await
    }

    /// POST a JSON body to `path`.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        options: &RequestOptions,
    ) -> Result<T> {
        let request = HttpRequest {
            method: Method::Post,
            url: self.url(path),
            headers: self.headers(options, true),
            body: Some(serde_json::to_vec(body)?),
        };
        self.dispatch(request, options).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn headers(&self, options: &RequestOptions, json_body: bool) -> Vec<(String, String)> {
        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        if json_body {
            headers.push(("content-type".into(), "application/json".into()));
        }
        if options.trust_anchor.is_some() {
            headers.push((ASK_SIGNATURE_HEADER.into(), "true".into()));
        }
        headers
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        options: &RequestOptions,
    ) -> Result<T> {
        debug!("{:?} {}", request.method, request.url);

        let response = match &options.abort {
            Some(signal) if signal.is_aborted() => return Err(SdkError::Aborted),
            Some(signal) => tokio::select! {
                resp = self.transport.send(request) => resp?,
                _ = signal.aborted() => return Err(SdkError::Aborted),
            },
            None => self.transport.send(request).await?,
        };

        check_status(&response)?;

        if let Err(e) = integrity::verify_response(
            &response.body,
            response.header(SIGNATURE_HEADER),
            options.trust_anchor.as_ref(),
        ) {
            warn!("Rejecting unauthenticated response: {}", e);
            return Err(e.into());
        }

        Ok(serde_json::from_slice(&response.body)?)
    }
}

fn check_status(response: &HttpResponse) -> Result<()> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }
    let text = String::from_utf8_lossy(&response.body).to_string();
    let parsed: ApiErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();

    match response.status {
        400 => Err(SdkError::Request(
            parsed.messages.into_iter().next().unwrap_or(text),
        )),
        500 => {
            let message = parsed.messages.into_iter().next();
            let reverted = parsed.revert_error.is_some()
                || message
                    .as_deref()
                    .map_or(false, |m| m.contains(CONTRACT_ERROR_MARKER));
            if reverted {
                Err(SdkError::Contract {
                    message: message.unwrap_or_default(),
                    revert_error: parsed.revert_error.unwrap_or_default(),
                })
            } else {
                Err(SdkError::Http {
                    status: 500,
                    body: text,
                })
            }
        }
        status => Err(SdkError::Http { status, body: text }),
    }
}
