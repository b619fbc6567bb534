//! This project is split in 2 main modules:
//!
//! - [gateway] (NeginPardakht API client)
//! - [checkout] (payment flow and the store facing HTTP surface)
#![doc = include_str!("../README.md")]

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::Arc,
};

use tracing_subscriber::EnvFilter;

/// Payment flow of a store checkout
///
/// This module drives an order from transaction creation to the verified return callback
/// and exposes it over HTTP.
mod checkout;
mod config;
mod db;
/// Gateway integration implementation
///
/// This module defines the types and methods to communicate with the NeginPardakht API.
mod gateway;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .init();

    match dotenvy::dotenv() {
        Ok(p) => tracing::info!(path = %p.display(), "Loaded environment variables from .env file"),
        Err(e) => tracing::warn!("Failed to load environment variables from .env: {e}"),
    };
    let config = Arc::new(config::GatewayConfig::from_env()?);
    let db = db::Db::connect().await?;
    let gateway = gateway::NeginGateway::from_config(&config)?;

    let mut methods = checkout::registry::PaymentMethods::default();
    methods.register(Arc::new(checkout::orchestrator::Orchestrator::new(
        db, gateway, config,
    )));
    let state = state::AppState::new(methods);

    let app = checkout::api::router()
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3030);

    let listener =
        tokio::net::TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).await?;

    tracing::info!("Serving on port {port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
