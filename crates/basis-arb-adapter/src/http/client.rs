/*
[INPUT]:  HTTP configuration (timeouts, credentials, sandbox flag)
[OUTPUT]: Configured reqwest client ready for spot and futures API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::http::error::{BinanceError, Result};
use crate::http::sign::sign_query;
use crate::types::{Market, MarketKind};

const SPOT_BASE_URL: &str = "https://api.binance.com";
const FUTURES_BASE_URL: &str = "https://fapi.binance.com";
const SPOT_SANDBOX_BASE_URL: &str = "https://testnet.binance.vision";
const FUTURES_SANDBOX_BASE_URL: &str = "https://testnet.binancefuture.com";

const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Credentials for signed requests
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Main HTTP client for the venue's spot and USDT-margined futures APIs.
#[derive(Debug)]
pub struct BinanceClient {
    http: Client,
    spot_base_url: Url,
    futures_base_url: Url,
    credentials: Credentials,
    sandbox: bool,
    markets: RwLock<HashMap<String, Market>>,
}

impl BinanceClient {
    /// Create a new client with default configuration.
    pub fn new(credentials: Credentials, sandbox: bool) -> Result<Self> {
        Self::with_config(credentials, sandbox, ClientConfig::default())
    }

    /// Create a new client with custom configuration.
    pub fn with_config(credentials: Credentials, sandbox: bool, config: ClientConfig) -> Result<Self> {
        let (spot, futures) = if sandbox {
            (SPOT_SANDBOX_BASE_URL, FUTURES_SANDBOX_BASE_URL)
        } else {
            (SPOT_BASE_URL, FUTURES_BASE_URL)
        };
        Self::with_base_urls(credentials, sandbox, config, spot, futures)
    }

    /// Create a client against explicit base URLs.
    ///
    /// Primarily intended for tests injecting a mock server.
    pub fn with_base_urls(
        credentials: Credentials,
        sandbox: bool,
        config: ClientConfig,
        spot_base_url: &str,
        futures_base_url: &str,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            spot_base_url: Url::parse(spot_base_url)?,
            futures_base_url: Url::parse(futures_base_url)?,
            credentials,
            sandbox,
            markets: RwLock::new(HashMap::new()),
        })
    }

    pub fn is_sandbox(&self) -> bool {
        self.sandbox
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.credentials.api_key
    }

    fn base_url(&self, kind: MarketKind) -> &Url {
        match kind {
            MarketKind::Spot => &self.spot_base_url,
            MarketKind::Linear => &self.futures_base_url,
        }
    }

    /// Build a keyed (but unsigned) request builder for an endpoint.
    pub(crate) fn request(
        &self,
        kind: MarketKind,
        method: Method,
        endpoint: &str,
    ) -> Result<RequestBuilder> {
        let url = self.base_url(kind).join(endpoint)?;
        Ok(self
            .http
            .request(method, url)
            .header(API_KEY_HEADER, self.api_key()))
    }

    /// Build a signed request: `timestamp` and `signature` are appended to
    /// the given parameters and the whole query goes on the URL.
    pub(crate) fn signed_request(
        &self,
        kind: MarketKind,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<RequestBuilder> {
        let mut query = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        let timestamp = chrono::Utc::now().timestamp_millis();
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!("timestamp={timestamp}"));

        let signature = sign_query(&self.credentials.api_secret, &query)?;
        query.push_str(&format!("&signature={signature}"));

        let mut url = self.base_url(kind).join(endpoint)?;
        url.set_query(Some(&query));
        Ok(self
            .http
            .request(method, url)
            .header(API_KEY_HEADER, self.api_key()))
    }

    /// Execute a request, mapping venue error payloads into [`BinanceError::Api`].
    pub(crate) async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(decode_api_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|err| BinanceError::InvalidResponse(format!("{err}: {body}")))
    }

    pub(crate) fn insert_markets(&self, markets: Vec<Market>) {
        let mut guard = self
            .markets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for market in markets {
            guard.insert(market.symbol.clone(), market);
        }
    }

    /// Precision metadata for a canonical symbol, if loaded.
    pub fn market(&self, symbol: &str) -> Result<Market> {
        self.markets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(symbol)
            .cloned()
            .ok_or_else(|| BinanceError::UnknownMarket(symbol.to_string()))
    }

    pub fn market_count(&self) -> usize {
        self.markets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

fn decode_api_error(status: u16, body: &str) -> BinanceError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => BinanceError::Api {
            code: err.code,
            message: err.msg,
        },
        Err(_) => BinanceError::Api {
            code: i64::from(status),
            message: body.to_string(),
        },
    }
}
