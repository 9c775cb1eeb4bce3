use axum::http::HeaderValue;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod rate_limit;
mod routes;
mod weather;

use config::Settings;
use rate_limit::RateLimiter;
use routes::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_api_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let bind_addr = settings.bind_addr;
    let sweep_interval = settings.rate_limit_sweep_interval();

    let cors = CorsLayer::new()
        .allow_origin(settings.cors_allowed_origin.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState::new(settings)?;
    spawn_limiter_sweep(state.limiter.clone(), sweep_interval);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server starting on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Periodically forgets clients whose window has emptied.
fn spawn_limiter_sweep(limiter: RateLimiter, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = limiter.sweep();
            if evicted > 0 {
                tracing::debug!(
                    "Evicted {} idle rate-limit clients, {} still tracked",
                    evicted,
                    limiter.tracked_clients()
                );
            }
        }
    });
}
