// SPDX-License-Identifier: MIT

//! Strava activity model for storage and API.

use serde::{Deserialize, Serialize};

/// Stored activity record.
///
/// Identity is the Strava activity ID: the reconciler upserts by it and
/// deletes rows whose ID disappeared from the owner's remote feed. Optional
/// source fields stay `None` when Strava does not provide them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID (also used as document ID)
    pub strava_activity_id: u64,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    /// Activity name/title
    pub name: String,
    /// Classic activity type (Run, TrailRun, Ride, ...); drives category
    /// aggregation
    pub activity_type: String,
    /// Newer sport type (may differ from `activity_type`, e.g. MountainBikeRide)
    pub sport_type: String,
    /// Distance in meters
    pub distance_meters: f64,
    /// Moving time in seconds
    pub moving_time_secs: u32,
    /// Elapsed time in seconds
    pub elapsed_time_secs: u32,
    /// Total elevation gain in meters
    pub total_elevation_gain: f64,
    /// Start date/time (ISO 8601)
    pub start_date: String,
    /// Average speed (m/s)
    pub average_speed: f64,
    /// Max speed (m/s)
    pub max_speed: f64,
    /// Average heart rate, if recorded
    pub average_heartrate: Option<f64>,
    /// Max heart rate, if recorded
    pub max_heartrate: Option<f64>,
    /// Encoded summary polyline of the route, if present
    pub summary_polyline: Option<String>,
    /// Start coordinate as "lat,lng", if present
    pub start_latlng: Option<String>,
    /// When this record was last written by the reconciler
    pub synced_at: String,
}
