//! HTTP front end over a price source

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

use crate::domain::price::PriceSource;
use crate::shared::errors::{AppError, FeedError};

/// Symbol probed by `/health`
const HEALTH_SYMBOL: &str = "BTC/USD";

pub struct ApiServer {
    source: Arc<dyn PriceSource>,
    addr: SocketAddr,
}

impl ApiServer {
    pub fn new(source: Arc<dyn PriceSource>, host: &str, port: u16) -> Result<Self, AppError> {
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| AppError::ConfigError(format!("invalid listen address {}:{}: {}", host, port, e)))?;
        Ok(Self { source, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<(), AppError> {
        let (addr, server) = warp::serve(routes(self.source.clone()))
            .try_bind_with_graceful_shutdown(self.addr, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .map_err(|e| AppError::Server(e.to_string()))?;

        info!("🌐 Price API listening on http://{} ({} source)", addr, self.source.kind());
        server.await;
        info!("Price API shut down");
        Ok(())
    }
}

/// All routes, with JSON error bodies for anything unmatched
pub fn routes(source: Arc<dyn PriceSource>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let index_route = warp::path::end().and(warp::get()).map(index);

    let health_route = warp::path!("health")
        .and(warp::get())
        .and(with_source(source.clone()))
        .and_then(health);

    let symbols_route = warp::path!("symbols")
        .or(warp::path!("api" / "v1" / "symbols"))
        .unify()
        .and(warp::get())
        .and(with_source(source.clone()))
        .and_then(symbols);

    let price_route = warp::path("price")
        .or(warp::path("api").and(warp::path("v1")).and(warp::path("price")))
        .unify()
        .and(warp::path::tail())
        .and(warp::get())
        .and(with_source(source.clone()))
        .and_then(|tail: warp::path::Tail, source| price(tail.as_str().to_string(), source));

    let prices_route = warp::path!("prices")
        .or(warp::path!("api" / "v1" / "prices"))
        .unify()
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_source(source))
        .and_then(prices);

    index_route
        .or(health_route)
        .or(symbols_route)
        .or(price_route)
        .or(prices_route)
        .recover(handle_rejection)
}

fn with_source(
    source: Arc<dyn PriceSource>,
) -> impl Filter<Extract = (Arc<dyn PriceSource>,), Error = Infallible> + Clone {
    warp::any().map(move || source.clone())
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn reply(body: Value, status: StatusCode) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&body), status)
}

fn index() -> WithStatus<Json> {
    reply(
        json!({
            "service": "Pyth Network Price API",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": now(),
            "endpoints": {
                "GET /": "This help message",
                "GET /health": "Service health check",
                "GET /symbols": "List available symbols",
                "GET /price/<symbol>": "Get price for single symbol",
                "POST /prices": "Get prices for multiple symbols",
                "GET /api/v1/price/<symbol>": "Alternative price endpoint"
            },
            "example_usage": {
                "single_price": "/price/BTC/USD",
                "multiple_prices": "POST /prices with JSON body: {\"symbols\": [\"BTC/USD\", \"ETH/USD\"]}"
            }
        }),
        StatusCode::OK,
    )
}

async fn health(source: Arc<dyn PriceSource>) -> Result<WithStatus<Json>, Infallible> {
    let (status, code, error) = match source.latest_price(HEALTH_SYMBOL).await {
        Ok(_) => ("healthy", StatusCode::OK, None),
        Err(FeedError::Fetch(e)) => ("unhealthy", StatusCode::INTERNAL_SERVER_ERROR, Some(e.to_string())),
        Err(e) => ("degraded", StatusCode::OK, Some(e.to_string())),
    };
    Ok(reply(
        json!({
            "status": status,
            "service_type": source.kind(),
            "error": error,
            "timestamp": now(),
        }),
        code,
    ))
}

async fn symbols(source: Arc<dyn PriceSource>) -> Result<WithStatus<Json>, Infallible> {
    let symbols = source.registry().symbols();
    Ok(reply(
        json!({
            "symbols": symbols,
            "count": symbols.len(),
            "timestamp": now(),
        }),
        StatusCode::OK,
    ))
}

async fn price(raw: String, source: Arc<dyn PriceSource>) -> Result<WithStatus<Json>, Infallible> {
    // `BTC-USD`, `BTC/USD` and an encoded slash all name the same feed
    let symbol = raw.replace("%2F", "/").replace("%2f", "/").replace('-', "/");

    match source.latest_price(&symbol).await {
        Ok(quote) => Ok(reply(
            json!({ "success": true, "data": quote, "timestamp": now() }),
            StatusCode::OK,
        )),
        Err(FeedError::Fetch(e)) => {
            error!("Price lookup for {} failed: {}", symbol, e);
            Ok(reply(
                json!({ "success": false, "error": e.to_string(), "timestamp": now() }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
        Err(_) => Ok(reply(
            json!({
                "success": false,
                "error": format!("No data available for {}", symbol),
                "timestamp": now(),
            }),
            StatusCode::NOT_FOUND,
        )),
    }
}

async fn prices(body: Bytes, source: Arc<dyn PriceSource>) -> Result<WithStatus<Json>, Infallible> {
    let bad_request = |message: &str| {
        Ok(reply(
            json!({ "success": false, "error": message, "timestamp": now() }),
            StatusCode::BAD_REQUEST,
        ))
    };

    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return bad_request("Request body must contain 'symbols' array"),
    };
    let Some(requested) = parsed.get("symbols") else {
        return bad_request("Request body must contain 'symbols' array");
    };
    let Some(requested) = requested.as_array() else {
        return bad_request("'symbols' must be an array");
    };
    let symbols: Vec<String> = requested
        .iter()
        .filter_map(Value::as_str)
        .map(|s| s.replace('-', "/"))
        .collect();

    match source.latest_prices(&symbols).await {
        Ok(batch) => Ok(reply(
            json!({
                "success": true,
                "received_count": batch.quotes.len(),
                "data": batch.quotes,
                "requested_symbols": symbols,
                "unknown_symbols": batch.unknown,
                "failed_batches": batch.failures,
                "timestamp": now(),
            }),
            StatusCode::OK,
        )),
        Err(e) => {
            error!("Multi-price lookup failed: {}", e);
            Ok(reply(
                json!({ "success": false, "error": e.to_string(), "timestamp": now() }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<WithStatus<Json>, Infallible> {
    if err.is_not_found() {
        return Ok(reply(
            json!({
                "success": false,
                "error": "Endpoint not found",
                "available_endpoints": [
                    "/", "/health", "/symbols", "/price/<symbol>",
                    "POST /prices", "/api/v1/..."
                ],
                "timestamp": now(),
            }),
            StatusCode::NOT_FOUND,
        ));
    }

    let (code, message) = if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(reply(
        json!({ "success": false, "error": message, "timestamp": now() }),
        code,
    ))
}
