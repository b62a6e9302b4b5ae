/*
 * Janus - Dual-Provider Savings Router
 * Main entry point for the application
 */

use janus::{api, config::Config, service::RouterService};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Janus Savings Routing Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Configuration loaded successfully");

    let router_service = Arc::new(RouterService::new(config.clone()).await?);

    let api_state = api::ApiState {
        config: config.clone(),
        router_service,
    };

    info!(
        "Starting API server on {}:{}",
        config.server.host, config.server.port
    );

    let rocket = api::create_rocket(api_state);
    rocket.launch().await?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "janus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
