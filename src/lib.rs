// SPDX-License-Identifier: MIT

//! Peloton-Board: a friends' distance leaderboard with overtake alerts
//!
//! This crate provides the backend that syncs everyone's Strava activities
//! on a schedule, keeps per-category distance totals, and notifies users
//! when someone passes them on the leaderboard.

pub mod categories;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use categories::CategoryConfig;
use config::Config;
use db::FirestoreDb;
use services::StravaClient;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub strava: StravaClient,
    pub categories: CategoryConfig,
}
