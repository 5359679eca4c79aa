use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Deserialize;

use crate::http_client::{HttpClient, HttpError, HttpRequest};
use crate::source::{DataUnavailable, OpenInterestSource};
use crate::Symbol;

// ============================================================================
// Yahoo Auth Manager - Handles cookie/crumb authentication
// ============================================================================

/// Manages Yahoo Finance cookie/crumb authentication.
///
/// Yahoo's unofficial API requires:
/// 1. Session cookie from fc.yahoo.com (held by the transport's cookie jar)
/// 2. Crumb token from query1.finance.yahoo.com/v1/test/getcrumb
pub struct YahooAuthManager {
    /// Cached crumb token
    crumb: Mutex<Option<String>>,
    /// When the auth was last refreshed
    last_refresh: Mutex<Option<Instant>>,
    /// Whether auth refresh is currently in progress
    refreshing: AtomicBool,
    /// Auth TTL in seconds
    auth_ttl_secs: u64,
}

impl Default for YahooAuthManager {
    fn default() -> Self {
        Self {
            crumb: Mutex::new(None),
            last_refresh: Mutex::new(None),
            refreshing: AtomicBool::new(false),
            auth_ttl_secs: 3600,
        }
    }
}

impl YahooAuthManager {
    fn is_auth_valid(&self) -> bool {
        let crumb = self.crumb.lock().expect("crumb lock");
        let last_refresh = self.last_refresh.lock().expect("last_refresh lock");

        if crumb.is_none() {
            return false;
        }

        if let Some(last) = *last_refresh {
            return last.elapsed().as_secs() < self.auth_ttl_secs;
        }

        false
    }

    /// Get the current crumb for use in query parameters, refreshing if needed.
    pub async fn get_crumb(&self, http_client: &Arc<dyn HttpClient>) -> Result<String, HttpError> {
        if self.is_auth_valid() {
            if let Some(crumb) = self.crumb.lock().expect("crumb lock").clone() {
                return Ok(crumb);
            }
        }

        self.refresh_auth(http_client).await?;

        let crumb = self.crumb.lock().expect("crumb lock").clone();
        crumb.ok_or_else(|| HttpError::new("failed to obtain Yahoo crumb"))
    }

    async fn refresh_auth(&self, http_client: &Arc<dyn HttpClient>) -> Result<(), HttpError> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            // Another task is refreshing; wait briefly and re-check.
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            if self.is_auth_valid() {
                return Ok(());
            }
        }

        let result = self.do_refresh(http_client).await;
        self.refreshing.store(false, Ordering::SeqCst);
        result
    }

    async fn do_refresh(&self, http_client: &Arc<dyn HttpClient>) -> Result<(), HttpError> {
        // Step 1: visit fc.yahoo.com so the jar picks up session cookies.
        let cookie_request = HttpRequest::get("https://fc.yahoo.com")
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout_ms(10_000);

        let _ = http_client.execute(cookie_request).await.map_err(|e| {
            HttpError::new(format!("failed to fetch Yahoo cookie: {}", e.message()))
        })?;

        // Step 2: fetch the crumb.
        let crumb_endpoints = [
            "https://query1.finance.yahoo.com/v1/test/getcrumb",
            "https://query2.finance.yahoo.com/v1/test/getcrumb",
        ];

        for endpoint in &crumb_endpoints {
            let crumb_request = HttpRequest::get(*endpoint)
                .with_header("referer", "https://finance.yahoo.com/")
                .with_timeout_ms(10_000);

            match http_client.execute(crumb_request).await {
                Ok(response) if response.is_success() && !response.body.is_empty() => {
                    let body = response.body.trim();

                    if body.contains("<html") || body.contains("<!DOCTYPE") {
                        continue;
                    }

                    if body.to_lowercase().contains("too many requests") {
                        return Err(HttpError::new("Yahoo rate limited while fetching crumb"));
                    }

                    if !body.is_empty() && body.len() < 100 && !body.contains(' ') {
                        *self.crumb.lock().expect("crumb lock") = Some(body.to_owned());
                        *self.last_refresh.lock().expect("last_refresh lock") =
                            Some(Instant::now());
                        return Ok(());
                    }
                }
                _ => continue,
            }
        }

        Err(HttpError::new("failed to fetch Yahoo crumb from all endpoints"))
    }

    /// Invalidate cached auth (triggers refresh on next call).
    pub fn invalidate(&self) {
        *self.crumb.lock().expect("crumb lock") = None;
        *self.last_refresh.lock().expect("last_refresh lock") = None;
    }
}

// ============================================================================
// Yahoo open-interest source
// ============================================================================

/// Liquidity source backed by the Yahoo Finance option-chain endpoint.
///
/// Without an explicit date parameter the endpoint returns the nearest
/// expiry, which is exactly the chain the liquidity proxy is defined over.
pub struct YahooOpenInterestSource {
    http_client: Arc<dyn HttpClient>,
    auth_manager: Arc<YahooAuthManager>,
    timeout_ms: u64,
}

impl YahooOpenInterestSource {
    pub fn new(http_client: Arc<dyn HttpClient>, timeout_ms: u64) -> Self {
        Self {
            http_client,
            auth_manager: Arc::new(YahooAuthManager::default()),
            timeout_ms,
        }
    }

    fn options_endpoint(&self, symbol: &Symbol, crumb: &str) -> String {
        format!(
            "https://query1.finance.yahoo.com/v7/finance/options/{}?crumb={}",
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(crumb)
        )
    }

    /// Fetch the chain body, refreshing auth and retrying once on 401/429.
    async fn fetch_chain_body(&self, symbol: &Symbol) -> Result<String, HttpError> {
        let crumb = self.auth_manager.get_crumb(&self.http_client).await?;
        let request = HttpRequest::get(self.options_endpoint(symbol, &crumb))
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout_ms(self.timeout_ms);

        let response = self.http_client.execute(request).await?;

        if response.status == 401 || response.status == 429 {
            self.auth_manager.invalidate();
            let crumb = self.auth_manager.get_crumb(&self.http_client).await?;

            let retry_request = HttpRequest::get(self.options_endpoint(symbol, &crumb))
                .with_header("referer", "https://finance.yahoo.com/")
                .with_timeout_ms(self.timeout_ms);
            let retry_response = self.http_client.execute(retry_request).await?;

            if !retry_response.is_success() {
                return Err(HttpError::new(format!(
                    "yahoo returned status {} after auth refresh",
                    retry_response.status
                )));
            }
            return Ok(retry_response.body);
        }

        if !response.is_success() {
            return Err(HttpError::new(format!(
                "yahoo returned status {}",
                response.status
            )));
        }

        Ok(response.body)
    }
}

impl OpenInterestSource for YahooOpenInterestSource {
    fn fetch_open_interest<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<u64, DataUnavailable>> + Send + 'a>> {
        Box::pin(async move {
            let body = self
                .fetch_chain_body(symbol)
                .await
                .map_err(|error| DataUnavailable::new(symbol.clone(), error.message()))?;

            parse_nearest_expiry_open_interest(&body)
                .map_err(|reason| DataUnavailable::new(symbol.clone(), reason))
        })
    }
}

/// Sum open interest over calls and puts of the nearest-expiry chain.
/// Contracts without an `openInterest` field count as zero.
fn parse_nearest_expiry_open_interest(body: &str) -> Result<u64, String> {
    let response: YahooOptionsResponse =
        serde_json::from_str(body).map_err(|e| format!("failed to parse option chain: {e}"))?;

    if let Some(error) = &response.option_chain.error {
        if !error.is_null() {
            return Err(format!("yahoo API error: {error}"));
        }
    }

    let result = response
        .option_chain
        .result
        .first()
        .ok_or_else(|| String::from("no option chain in response"))?;

    let chain = result
        .options
        .first()
        .ok_or_else(|| String::from("symbol has no listed options"))?;

    let total = chain
        .calls
        .iter()
        .chain(chain.puts.iter())
        .map(|contract| contract.open_interest.unwrap_or(0))
        .sum();

    Ok(total)
}

// Yahoo Finance options API response structures
#[derive(Debug, Clone, Deserialize)]
struct YahooOptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: YahooOptionChainData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooOptionChainData {
    result: Vec<YahooOptionsResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooOptionsResult {
    #[serde(default)]
    options: Vec<YahooOptionQuotes>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooOptionQuotes {
    #[serde(default)]
    calls: Vec<YahooContract>,
    #[serde(default)]
    puts: Vec<YahooContract>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooContract {
    #[serde(rename = "openInterest", default)]
    open_interest: Option<u64>,
}
