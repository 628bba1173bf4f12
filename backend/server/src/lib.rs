//! Documentation of a twelve-month gift coupon calendar.
//!
//!
//!
//! # General Infrastructure
//! - Frontend signs in against the hosted identity service and sends its access token as a bearer token
//! - Every `/coupons` route verifies that token and derives the caller's role from it
//! - Coupons live in one record store: in memory, a Redis hash, or a PostgREST table
//! - The manager keeps the twelve coupons in memory and writes through to the store
//! - Changes are pushed to open calendars over server-sent events
//!
//!
//!
//! # Roles
//!
//! - **Owner** creates and edits the coupons and approves redemptions
//! - **Recipient** opens, saves and asks to redeem them
//!
//! A coupon moves `locked`/`unlocked` -> `saved` -> `pending` -> `used`.
//! Saving is allowed once the month has come around; approving stamps the
//! use date.
//!
//!
//!
//! # Notes
//!
//! ## Month boundaries
//! The current month is read from the host's local clock. Set
//! `CALENDAR_UTC_OFFSET_MINUTES` to pin it to a fixed offset when the host
//! runs in a different timezone than the people using the calendar.
//!
//! ## Store outages
//! The memory store starts out seeded. A Redis or REST store that is down or
//! empty at startup does not leave the calendar blank either: the seed for
//! the current month is served from memory instead, and nothing is written
//! back. Mutations against it fail until the store is seeded with
//! `process seed` and `/coupons/reload` is called. Records that no longer
//! decode are skipped, not fatal.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! `````
//!
//! Run against the in-memory store.
//! ```sh
//! JWT_SECRET=... RUST_LOG=info cargo run --bin coupons
//! ```
//!
//! Seed a Redis store, then print it.
//! ```sh
//! STORE_BACKEND=redis cargo run --bin process -- seed
//! STORE_BACKEND=redis cargo run --bin process -- status
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod manager;
pub mod routes;
pub mod state;

use error::AppResult;
use routes::{
    approve_handler, calendar_handler, current_handler, edit_handler, events_handler,
    health_handler, reload_handler, request_handler, reveal_handler, save_handler,
    wallet_handler,
};
use state::State;

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/coupons", get(calendar_handler))
        .route("/coupons/current", get(current_handler))
        .route("/coupons/wallet", get(wallet_handler))
        .route("/coupons/events", get(events_handler))
        .route("/coupons/reload", post(reload_handler))
        .route("/coupons/:id", get(reveal_handler).patch(edit_handler))
        .route("/coupons/:id/save", post(save_handler))
        .route("/coupons/:id/request", post(request_handler))
        .route("/coupons/:id/approve", post(approve_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server() -> AppResult<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await?;

    info!(
        "Starting server for month {}...",
        state.manager.current_month()
    );

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
