//! Backend of a warehouse management simulation.
//!
//! CRUD over employees, SKUs, locations, orders, tasks, task collections, exception logs and their root
//! causes. Every route validates the request, forwards it to the document store and answers with JSON.
//!
//!
//!
//! # Log Numbers
//!
//! Exception logs carry a human readable number such as `EXC-000042`.
//!
//! - One counter per log category, advanced with a single atomic upsert-increment in Redis
//! - Concurrent creates for a category always receive distinct, gap free values
//! - If the counter cannot be advanced the create fails as a whole, no log is stored without a number
//! - A number issued for a log that is never saved is lost, uniqueness is what matters
//!
//!
//!
//! # Authentication
//!
//! - `POST /auth/login` returns a signed token valid for 6 hours
//! - Every resource route requires `Authorization: Bearer <token>`
//! - Mutations additionally require the admin flag carried in the token
//!
//!
//!
//! # Setup
//!
//! Secrets are read from `/run/secrets`: `TOKEN_SECRET`, `CLOUDINARY_NAME`, `CLOUDINARY_KEY`,
//! `CLOUDINARY_SECRET`.
//!
//! Run against a local Redis.
//! ```sh
//! REDIS_URL=redis://localhost:6379 RUST_LOG=info cargo run
//! ```
//!
//! Run without Redis, data is lost on restart.
//! ```sh
//! WMS_BACKEND=memory cargo run
//! ```
//!
//! Load mock data.
//! ```sh
//! cargo run -p seed -- data/mock.json
//! ```
use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderValue,
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod counter;
pub mod database;
pub mod documents;
pub mod error;
pub mod log_number;
pub mod models;
pub mod populate;
pub mod query;
pub mod routes;
pub mod state;
pub mod upload;
pub mod utils;

use config::Config;
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load();

    info!("Initializing state...");
    let state = AppState::new(&config).await;

    info!("Starting server...");

    let app = routes::router(state)
        .layer(cors(&config.origin))
        .layer(TraceLayer::new_for_http());

    let address = format!("0.0.0.0:{}", config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .expect("Failed to bind address");
    info!("Server running on {address}");

    serve(listener, app).await;

    info!("Server shut down");
}

fn cors(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    match origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!("Invalid ORIGIN {origin}: {e}, cross-origin requests will be rejected");
            layer
        }
    }
}

async fn serve(listener: TcpListener, app: Router) {
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        warn!("Server error: {e}");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
