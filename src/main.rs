mod config;
mod error;
mod gate;
mod gemini;
mod models;
mod pipeline;
mod prompts;
mod retry;
mod routes;
mod validate;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::gate::Gate;
use crate::gemini::GeminiClient;
use crate::pipeline::GenerationSettings;
use crate::routes::{generate, health, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        "Credential pool: {} key(s), gate capacity: {}",
        config.credentials.len(),
        config.gate_capacity
    );

    // One gate for the whole process: it bounds every outbound generative
    // call across all concurrent requests.
    let gate = Gate::new(config.gate_capacity);
    let state = AppState {
        gemini: Arc::new(GeminiClient::new(&config, gate)),
        settings: GenerationSettings {
            max_attempts: config.max_attempts,
            attempt_delay: config.attempt_delay,
            limits: config.limits,
        },
        collage: config.collage,
        max_photo_bytes: config.max_photo_bytes,
    };

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/generate", post(generate))
        .layer(DefaultBodyLimit::max(config.max_photo_bytes + 64 * 1024))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
