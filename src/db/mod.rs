// SPDX-License-Identifier: MIT

//! Database layer (Firestore) and the storage interface consumed by the
//! sync engine.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use std::collections::{HashMap, HashSet};

use crate::error::AppError;
use crate::models::{Activity, DistanceSnapshot, Notification, StravaTokens, User};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const ACTIVITIES: &str = "activities";
    /// Distance snapshots (keyed by `{athlete_id}_{category}`)
    pub const DISTANCE_SNAPSHOTS: &str = "distance_snapshots";
    pub const NOTIFICATIONS: &str = "notifications";
}

/// Storage operations the sync engine depends on.
///
/// Implemented by [`FirestoreDb`] for production and by [`MemoryStore`] for
/// tests. All writes are per-document upserts/deletes; the engine relies on
/// their idempotence rather than on cross-document transactions.
#[allow(async_fn_in_trait)]
pub trait SyncStore {
    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    /// Persist a refreshed credential on the user document.
    async fn update_user_tokens(
        &self,
        athlete_id: u64,
        tokens: &StravaTokens,
    ) -> Result<(), AppError>;

    /// Insert-or-update an activity keyed by its Strava activity ID.
    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError>;

    /// Delete every activity of `athlete_id` whose ID is not in `keep`.
    /// Returns the number of deleted activities.
    async fn delete_activities_not_in(
        &self,
        athlete_id: u64,
        keep: &HashSet<u64>,
    ) -> Result<usize, AppError>;

    /// Cumulative distance per athlete across activities whose raw type is
    /// in `raw_types`. Athletes with no matching activity are absent.
    async fn sum_distances_for_types(
        &self,
        raw_types: &[&str],
    ) -> Result<HashMap<u64, f64>, AppError>;

    /// All snapshots for one category.
    async fn get_snapshots(&self, category: &str) -> Result<Vec<DistanceSnapshot>, AppError>;

    /// Upsert a snapshot, overwriting value and timestamp unconditionally.
    async fn set_snapshot(&self, snapshot: &DistanceSnapshot) -> Result<(), AppError>;

    /// Append a notification. Notifications are never updated by the engine.
    async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError>;
}
