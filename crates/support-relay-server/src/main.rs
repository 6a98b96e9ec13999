//! Remote support relay server.
//!
//! Run with: cargo run -p support-relay-server -- --port 5000
//!
//! Clients and support consoles connect to `ws://<host>:<port>/ws`.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use support_relay_session::{HubConfig, SessionHub, directory::MemoryDirectory};
use support_relay_transport::{Peers, create_ws_router, spawn_dispatcher};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "support-relay", about = "Relay for remote support sessions")]
struct Args {
    /// Host to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port for the server
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Seconds a client has to answer a control request
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Token required to join the admin group
    #[arg(long, env = "SUPPORT_RELAY_ADMIN_TOKEN")]
    admin_token: Option<String>,
}

impl Args {
    fn hub_config(&self) -> HubConfig {
        let config =
            HubConfig::default().with_request_timeout(Duration::from_secs(self.request_timeout_secs));
        match &self.admin_token {
            Some(token) => config.with_admin_token(token.clone()),
            None => config,
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    if args.admin_token.is_none() {
        tracing::warn!("No admin token set, any connection may join the admin group");
    }

    let (hub, events) = SessionHub::new(MemoryDirectory::new(), args.hub_config());
    let peers = Arc::new(Peers::new());
    let _dispatcher = spawn_dispatcher(Arc::clone(&peers), events);

    let app = create_ws_router(Arc::new(hub), peers)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = args.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Relay listening on ws://{addr}/ws");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
