//! Webchat Relay server binary.
//!
//! Wiring order: config → logging → queue broker → hub → consumer → HTTP.
//! Ctrl-C stops the HTTP server first, then the consumer, which hands any
//! unacked items back to the queue.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webchat_relay::adapters::callback::HttpCallbackForwarder;
use webchat_relay::adapters::http::{relay_router, RelayAppState};
use webchat_relay::adapters::queue::{Consumer, ConsumerSettings, QueueConnection};
use webchat_relay::adapters::websocket::{Hub, WebSocketState};
use webchat_relay::application::{OutboundDelivery, OUTBOUND_QUEUE};
use webchat_relay::config::{AppConfig, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.server);

    let addr = config.server.socket_addr()?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        redirect_to_frontend = config.websocket.redirect_to_frontend,
        redirect_to_callback = config.websocket.redirect_to_callback,
        "Starting webchat relay"
    );

    let connection = QueueConnection::open_redis(&config.queue.tag, &config.queue.url).await?;
    let outbound_queue = connection.open_queue(OUTBOUND_QUEUE);

    let hub = Hub::spawn();

    let consumer = Consumer::new(
        outbound_queue.clone(),
        ConsumerSettings::from(&config.queue),
    );
    let consumer_handle =
        consumer.start_consuming(Arc::new(OutboundDelivery::new(hub.clone())))?;

    let state = RelayAppState {
        websocket: WebSocketState::new(
            hub,
            Arc::new(HttpCallbackForwarder::new()),
            config.websocket,
        ),
        outbound_queue,
    };
    let app = relay_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let returned = consumer_handle.stop().await?;
    tracing::info!(returned, "Shut down");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides the configured
/// filter; production logs are JSON.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
