// SPDX-License-Identifier: MIT

//! In-memory [`SyncStore`] used by tests.
//!
//! Mirrors the Firestore semantics the engine relies on: upserts keyed by
//! natural IDs, at-most-one snapshot per (athlete, category), append-only
//! notifications. Cloning shares the underlying state, so a test can hand a
//! clone to the engine and inspect the results afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::db::SyncStore;
use crate::error::AppError;
use crate::models::{Activity, DistanceSnapshot, Notification, StravaTokens, User};

#[derive(Default)]
struct Inner {
    users: HashMap<u64, User>,
    activities: HashMap<u64, Activity>,
    snapshots: HashMap<(u64, String), DistanceSnapshot>,
    notifications: Vec<Notification>,
}

/// Shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only happens after a panicking test; propagate it.
        self.inner.lock().expect("memory store lock poisoned")
    }

    // ─── Test inspection helpers ─────────────────────────────────

    pub fn insert_user(&self, user: User) {
        self.lock().users.insert(user.strava_athlete_id, user);
    }

    pub fn get_user(&self, athlete_id: u64) -> Option<User> {
        self.lock().users.get(&athlete_id).cloned()
    }

    pub fn insert_activity_record(&self, activity: Activity) {
        self.lock()
            .activities
            .insert(activity.strava_activity_id, activity);
    }

    pub fn activities_for(&self, athlete_id: u64) -> Vec<Activity> {
        let mut activities: Vec<Activity> = self
            .lock()
            .activities
            .values()
            .filter(|a| a.athlete_id == athlete_id)
            .cloned()
            .collect();
        activities.sort_by_key(|a| a.strava_activity_id);
        activities
    }

    pub fn snapshot_for(&self, athlete_id: u64, category: &str) -> Option<DistanceSnapshot> {
        self.lock()
            .snapshots
            .get(&(athlete_id, category.to_string()))
            .cloned()
    }

    /// Previous cumulative distance, defaulting to 0 for a missing snapshot.
    pub fn previous_distance(&self, athlete_id: u64, category: &str) -> f64 {
        self.snapshot_for(athlete_id, category)
            .map(|s| s.total_distance_meters)
            .unwrap_or(0.0)
    }

    pub fn notifications_for(&self, athlete_id: u64) -> Vec<Notification> {
        self.lock()
            .notifications
            .iter()
            .filter(|n| n.athlete_id == athlete_id)
            .cloned()
            .collect()
    }

    pub fn notification_count(&self) -> usize {
        self.lock().notifications.len()
    }
}

impl SyncStore for MemoryStore {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.lock().users.values().cloned().collect();
        users.sort_by_key(|u| u.strava_athlete_id);
        Ok(users)
    }

    async fn update_user_tokens(
        &self,
        athlete_id: u64,
        tokens: &StravaTokens,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        let user = inner
            .users
            .get_mut(&athlete_id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", athlete_id)))?;
        user.tokens = Some(tokens.clone());
        Ok(())
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.lock()
            .activities
            .insert(activity.strava_activity_id, activity.clone());
        Ok(())
    }

    async fn delete_activities_not_in(
        &self,
        athlete_id: u64,
        keep: &HashSet<u64>,
    ) -> Result<usize, AppError> {
        let mut inner = self.lock();
        let before = inner.activities.len();
        inner
            .activities
            .retain(|id, a| a.athlete_id != athlete_id || keep.contains(id));
        Ok(before - inner.activities.len())
    }

    async fn sum_distances_for_types(
        &self,
        raw_types: &[&str],
    ) -> Result<HashMap<u64, f64>, AppError> {
        let inner = self.lock();
        let mut totals: HashMap<u64, f64> = HashMap::new();
        for activity in inner.activities.values() {
            if raw_types.contains(&activity.activity_type.as_str()) {
                *totals.entry(activity.athlete_id).or_insert(0.0) += activity.distance_meters;
            }
        }
        Ok(totals)
    }

    async fn get_snapshots(&self, category: &str) -> Result<Vec<DistanceSnapshot>, AppError> {
        Ok(self
            .lock()
            .snapshots
            .values()
            .filter(|s| s.category == category)
            .cloned()
            .collect())
    }

    async fn set_snapshot(&self, snapshot: &DistanceSnapshot) -> Result<(), AppError> {
        self.lock().snapshots.insert(
            (snapshot.athlete_id, snapshot.category.clone()),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        self.lock().notifications.push(notification.clone());
        Ok(())
    }
}
