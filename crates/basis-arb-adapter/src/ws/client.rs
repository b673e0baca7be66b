/*
[INPUT]:  Listen key and instrument class
[OUTPUT]: Decoded user-data frames from a live WebSocket session
[POS]:    WebSocket layer - connection and frame reading
[UPDATE]: When changing stream endpoints or connection handling
*/

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::http::error::{BinanceError, Result};
use crate::types::MarketKind;
use crate::ws::message::UserDataFrame;

const SPOT_STREAM_URL: &str = "wss://stream.binance.com:9443/ws/";
const FUTURES_STREAM_URL: &str = "wss://fstream.binance.com/ws/";
const SPOT_SANDBOX_STREAM_URL: &str = "wss://stream.testnet.binance.vision/ws/";
const FUTURES_SANDBOX_STREAM_URL: &str = "wss://stream.binancefuture.com/ws/";

/// A connected user-data WebSocket session.
///
/// The session lives exactly as long as its listen key; callers reconnect
/// with a fresh key when the keepalive rotates it.
#[derive(Debug)]
pub struct UserDataSocket {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl UserDataSocket {
    pub fn stream_url(kind: MarketKind, sandbox: bool, listen_key: &str) -> String {
        let base = match (kind, sandbox) {
            (MarketKind::Spot, false) => SPOT_STREAM_URL,
            (MarketKind::Linear, false) => FUTURES_STREAM_URL,
            (MarketKind::Spot, true) => SPOT_SANDBOX_STREAM_URL,
            (MarketKind::Linear, true) => FUTURES_SANDBOX_STREAM_URL,
        };
        format!("{base}{listen_key}")
    }

    pub async fn connect(kind: MarketKind, sandbox: bool, listen_key: &str) -> Result<Self> {
        let url = Self::stream_url(kind, sandbox, listen_key);
        let (inner, _response) = connect_async(url.as_str())
            .await
            .map_err(|err| BinanceError::WebSocket(err.to_string()))?;
        debug!(?kind, "user-data stream connected");
        Ok(Self { inner })
    }

    /// Next decoded frame. `Ok(None)` means the session ended and the
    /// caller should reconnect. Undecodable frames are dropped with a
    /// warning, per the protocol error policy.
    pub async fn next_frame(&mut self) -> Result<Option<UserDataFrame>> {
        while let Some(message) = self.inner.next().await {
            let message = message.map_err(|err| BinanceError::WebSocket(err.to_string()))?;
            match message {
                WsMessage::Text(text) => match serde_json::from_str::<UserDataFrame>(&text) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(err) => {
                        warn!(error = %err, "dropping undecodable user-data frame");
                    }
                },
                WsMessage::Ping(payload) => {
                    self.inner
                        .send(WsMessage::Pong(payload))
                        .await
                        .map_err(|err| BinanceError::WebSocket(err.to_string()))?;
                }
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}
