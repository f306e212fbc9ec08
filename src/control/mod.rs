//! Control API (C8, spec.md §4.8): a local-only HTTP surface for
//! status, trade inspection, config updates, and manual trade actions.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

pub mod handlers;

use alloy::providers::Provider;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::aggregation::AggregationState;
use crate::chain::ChainClient;
use crate::error::AgentError;
use crate::swap::RouterAddresses;
use crate::trade::TradeBook;
use crate::types::Config;

/// Shared state every handler reads or mutates. `config` is behind a
/// `tokio::sync::RwLock` since `POST /config` writes it and every GET
/// handler that reports limits reads it; everything else is either
/// already internally synchronized (`TradeBook`, `AggregationState`)
/// or immutable for the process's lifetime (`routers`, `config_path`).
/// `global_data` is the cross-pair counterpart to each pair's
/// `custom_data`: a plain `Mutex`, never held across an `.await`, since
/// policy evaluation only ever takes it, mutates its clone, and puts it
/// back.
pub struct AppState<P: Provider + Clone> {
    pub chain: Arc<ChainClient<P>>,
    pub aggregation: AggregationState,
    pub trades: Arc<TradeBook>,
    pub config: tokio::sync::RwLock<Config>,
    pub config_path: PathBuf,
    pub routers: RouterAddresses,
    pub paused: AtomicBool,
    pub started_at: i64,
    pub global_data: std::sync::Mutex<std::collections::HashMap<String, serde_json::Value>>,
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = axum::http::StatusCode::from_u16(self.status_code()).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({"error": self.to_string()}));
        (status, body).into_response()
    }
}

/// Build the router, bound explicitly to `127.0.0.1` (spec.md §4.8
/// "local-only HTTP surface"), never `0.0.0.0`.
pub fn router<P: Provider + Clone + Send + Sync + 'static>(state: Arc<AppState<P>>) -> Router {
    Router::new()
        .route("/status", get(handlers::status::<P>))
        .route("/trades", get(handlers::trades::<P>))
        .route("/balances", get(handlers::balances::<P>))
        .route("/config", get(handlers::get_config::<P>).post(handlers::post_config::<P>))
        .route("/pause", post(handlers::pause::<P>))
        .route("/resume", post(handlers::resume::<P>))
        .route("/sell", post(handlers::sell::<P>))
        .route("/sell-all", post(handlers::sell_all::<P>))
        .route("/buy", post(handlers::buy::<P>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn bind_address(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_is_loopback_only() {
        let addr = bind_address(8787);
        assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(addr.port(), 8787);
    }
}
