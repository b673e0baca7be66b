use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use basis_arb_adapter::{
    BinanceClient, BinanceError, ClientConfig, Credentials, OrderRequest, OrderStatus, OrderType,
    Rounding, Side,
};

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).expect("valid decimal")
}

fn test_client(base_url: &str) -> BinanceClient {
    BinanceClient::with_base_urls(
        Credentials {
            api_key: "test-api-key".to_string(),
            api_secret: "test-api-secret".to_string(),
        },
        true,
        ClientConfig::default(),
        base_url,
        base_url,
    )
    .expect("client builds")
}

/// Matches requests carrying a `timestamp` and a 64-hex-char `signature`.
#[derive(Clone)]
struct SignedQueryMatcher;

impl Match for SignedQueryMatcher {
    fn matches(&self, request: &Request) -> bool {
        let mut has_timestamp = false;
        let mut has_signature = false;
        for (key, value) in request.url.query_pairs() {
            match key.as_ref() {
                "timestamp" => has_timestamp = value.parse::<i64>().is_ok(),
                "signature" => {
                    has_signature =
                        value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit());
                }
                _ => {}
            }
        }
        has_timestamp && has_signature
    }
}

fn spot_exchange_info() -> serde_json::Value {
    json!({
        "symbols": [
            {
                "symbol": "BTCUSDT",
                "status": "TRADING",
                "quoteAsset": "USDT",
                "filters": [
                    {"filterType": "PRICE_FILTER", "minPrice": "0.01", "tickSize": "0.01000000"},
                    {"filterType": "LOT_SIZE", "stepSize": "0.00001000"}
                ]
            },
            {
                "symbol": "BTCTRY",
                "status": "TRADING",
                "quoteAsset": "TRY",
                "filters": []
            }
        ]
    })
}

fn futures_exchange_info() -> serde_json::Value {
    json!({
        "symbols": [
            {
                "symbol": "BTCUSDT",
                "status": "TRADING",
                "quoteAsset": "USDT",
                "pricePrecision": 1,
                "quantityPrecision": 3
            },
            {
                "symbol": "ETHUSDT",
                "status": "SETTLING",
                "quoteAsset": "USDT",
                "pricePrecision": 2,
                "quantityPrecision": 3
            }
        ]
    })
}

#[tokio::test]
async fn load_markets_populates_precision_for_both_classes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(spot_exchange_info()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fapi/v1/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(futures_exchange_info()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let count = client.load_markets().await.unwrap();

    // Non-USDT and non-trading symbols are skipped.
    assert_eq!(count, 2);

    let spot = client.market("BTC/USDT").unwrap();
    assert_eq!(spot.price_decimals, 2);
    assert_eq!(spot.amount_decimals, 5);

    let linear = client.market("BTC/USDT:USDT").unwrap();
    assert_eq!(linear.price_decimals, 1);
    assert_eq!(linear.amount_decimals, 3);

    assert_eq!(
        client.price_to_precision("BTC/USDT:USDT", dec("100.6005"), Rounding::Ceil).unwrap(),
        dec("100.7")
    );
    assert_eq!(
        client.amount_to_precision("BTC/USDT:USDT", dec("0.0004999"), Rounding::Floor).unwrap(),
        dec("0.000")
    );
    assert!(matches!(
        client.market("DOGE/USDT"),
        Err(BinanceError::UnknownMarket(_))
    ));
}

#[tokio::test]
async fn create_limit_order_on_futures_is_signed_and_normalized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fapi/v1/order"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("side", "SELL"))
        .and(query_param("type", "LIMIT"))
        .and(query_param("quantity", "0.400"))
        .and(query_param("price", "50100.0"))
        .and(query_param("timeInForce", "GTC"))
        .and(query_param("reduceOnly", "true"))
        .and(query_param("newClientOrderId", "ba-test-id"))
        .and(SignedQueryMatcher)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbol": "BTCUSDT",
            "orderId": 8886774,
            "clientOrderId": "ba-test-id",
            "status": "NEW",
            "side": "SELL",
            "price": "50100.0",
            "avgPrice": "0.00000",
            "origQty": "0.400",
            "executedQty": "0.000"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let order = client
        .create_order(&OrderRequest {
            symbol: "BTC/USDT:USDT".to_string(),
            order_type: OrderType::Limit,
            side: Side::Sell,
            amount: dec("0.400"),
            price: Some(dec("50100.0")),
            reduce_only: true,
            client_order_id: Some("ba-test-id".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(order.id, "8886774");
    assert_eq!(order.symbol, "BTC/USDT:USDT");
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.remaining, dec("0.400"));
    assert_eq!(order.client_order_id, "ba-test-id");
}

#[tokio::test]
async fn create_market_order_on_spot_derives_average() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/order"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("type", "MARKET"))
        .and(SignedQueryMatcher)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbol": "BTCUSDT",
            "orderId": 28,
            "clientOrderId": "ba-test-id",
            "status": "FILLED",
            "side": "BUY",
            "price": "0.00000000",
            "origQty": "0.40000000",
            "executedQty": "0.40000000",
            "cummulativeQuoteQty": "40.20000000"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let order = client
        .create_order(&OrderRequest {
            symbol: "BTC/USDT".to_string(),
            order_type: OrderType::Market,
            side: Side::Buy,
            amount: dec("0.4"),
            price: None,
            // Reduce-only never reaches the spot API.
            reduce_only: true,
            client_order_id: Some("ba-test-id".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(order.symbol, "BTC/USDT");
    assert_eq!(order.average, dec("100.5"));
    assert_eq!(order.filled, dec("0.4"));
}

#[tokio::test]
async fn cancel_order_returns_remaining_amount() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/fapi/v1/order"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("orderId", "8886774"))
        .and(SignedQueryMatcher)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbol": "BTCUSDT",
            "orderId": 8886774,
            "clientOrderId": "ba-test-id",
            "status": "CANCELED",
            "side": "SELL",
            "price": "50100.0",
            "avgPrice": "50090.0",
            "origQty": "1.000",
            "executedQty": "0.400"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let order = client.cancel_order("8886774", "BTC/USDT:USDT").await.unwrap();

    assert_eq!(order.status, OrderStatus::Canceled);
    assert_eq!(order.remaining, dec("0.600"));
}

#[tokio::test]
async fn api_errors_surface_code_and_message() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/fapi/v1/order"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": -2011,
            "msg": "Unknown order sent."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .cancel_order("1", "BTC/USDT:USDT")
        .await
        .expect_err("cancel should fail");

    match err {
        BinanceError::Api { code, message } => {
            assert_eq!(code, -2011);
            assert_eq!(message, "Unknown order sent.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn listen_key_create_and_keepalive() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fapi/v1/listenKey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listenKey": "pqia91ma19a5s61cv6a81va65sdf19v8a65a1a5s61cv6a81va65sdf19v8a65a1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/fapi/v1/listenKey"))
        .and(query_param(
            "listenKey",
            "pqia91ma19a5s61cv6a81va65sdf19v8a65a1a5s61cv6a81va65sdf19v8a65a1",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let key = client
        .create_listen_key(basis_arb_adapter::MarketKind::Linear)
        .await
        .unwrap();
    client
        .keepalive_listen_key(basis_arb_adapter::MarketKind::Linear, &key)
        .await
        .unwrap();
}
