// SPDX-License-Identifier: MIT

//! Peloton-Board API Server
//!
//! Syncs a group's Strava activities on a fixed interval, tracks cumulative
//! distances per category, and notifies users when the leaderboard order
//! changes.

use peloton_board::{
    categories::CategoryConfig,
    config::Config,
    db::FirestoreDb,
    services::{OvertakeDetector, StravaClient, SyncScheduler},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Peloton-Board API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Strava API client
    let strava = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    );

    // Category configuration is immutable and shared by reference
    let categories = CategoryConfig::standard();

    // Background sync: token refresh + reconciliation per user, then
    // overtake detection, on a fixed interval
    let detector = OvertakeDetector::new(db.clone(), categories.clone());
    let scheduler = SyncScheduler::new(
        db.clone(),
        strava.clone(),
        detector,
        Duration::from_secs(config.sync_interval_secs),
        Duration::from_millis(config.sync_pacing_ms),
    );
    tokio::spawn(scheduler.run_loop());
    tracing::info!(
        interval_secs = config.sync_interval_secs,
        "Sync scheduler spawned"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        strava,
        categories,
    });

    // Build router
    let app = peloton_board::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("peloton_board=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
