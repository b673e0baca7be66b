/*
[INPUT]:  API-key-authenticated listen-key endpoints per instrument class
[OUTPUT]: Listen keys for the user-data WebSocket sessions
[POS]:    HTTP layer - user-data stream bootstrap
[UPDATE]: When the venue changes listen-key endpoints or TTL semantics
*/

use reqwest::Method;
use serde::Deserialize;

use crate::http::client::BinanceClient;
use crate::http::error::Result;
use crate::types::MarketKind;

const SPOT_LISTEN_KEY: &str = "/api/v3/userDataStream";
const FUTURES_LISTEN_KEY: &str = "/fapi/v1/listenKey";

#[derive(Debug, Deserialize)]
struct ListenKeyResponse {
    #[serde(rename = "listenKey")]
    listen_key: String,
}

impl BinanceClient {
    /// Obtain a fresh listen key for the given instrument class.
    pub async fn create_listen_key(&self, kind: MarketKind) -> Result<String> {
        let response: ListenKeyResponse = self
            .send(self.request(kind, Method::POST, listen_key_endpoint(kind))?)
            .await?;
        Ok(response.listen_key)
    }

    /// Extend a listen key's lifetime. The venue expires keys after sixty
    /// minutes without a keepalive; callers PUT every twenty minutes and
    /// reconnect with a new key when this fails.
    pub async fn keepalive_listen_key(&self, kind: MarketKind, listen_key: &str) -> Result<()> {
        let endpoint = format!("{}?listenKey={listen_key}", listen_key_endpoint(kind));
        let _: serde_json::Value = self.send(self.request(kind, Method::PUT, &endpoint)?).await?;
        Ok(())
    }
}

fn listen_key_endpoint(kind: MarketKind) -> &'static str {
    match kind {
        MarketKind::Spot => SPOT_LISTEN_KEY,
        MarketKind::Linear => FUTURES_LISTEN_KEY,
    }
}
