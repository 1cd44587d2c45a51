// SPDX-License-Identifier: MIT

//! Per-(user, category) distance snapshots.

use serde::{Deserialize, Serialize};

/// The last cumulative distance observed for a user in a category.
///
/// Written unconditionally at the end of every detection pass and used as
/// the previous-state baseline for the next one. At most one document per
/// (athlete, category) pair; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceSnapshot {
    /// Strava athlete ID
    pub athlete_id: u64,
    /// Category name ("Run", "Ride", "Swim")
    pub category: String,
    /// Cumulative distance in meters at the last detection pass
    pub total_distance_meters: f64,
    /// When the snapshot was last overwritten (ISO 8601)
    pub updated_at: String,
}

impl DistanceSnapshot {
    /// Document ID enforcing the (athlete, category) unique constraint.
    pub fn doc_id(athlete_id: u64, category: &str) -> String {
        format!("{}_{}", athlete_id, category)
    }
}
