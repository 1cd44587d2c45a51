// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profiles + OAuth tokens)
//! - Activities (synced Strava activities)
//! - Distance snapshots (overtake detection baselines)
//! - Notifications (overtake events)

use std::collections::{HashMap, HashSet};

use crate::db::{collections, SyncStore};
use crate::error::AppError;
use crate::models::{Activity, DistanceSnapshot, Notification, StravaTokens, User};
use crate::time_utils::format_utc_rfc3339;
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by their Strava athlete ID.
    pub async fn get_user(&self, athlete_id: u64) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user.strava_athlete_id.to_string())
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// All registered users (the sync cohort is small, tens of users).
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Persist refreshed tokens on the user document, preserving the
    /// remaining profile fields.
    pub async fn update_user_tokens(
        &self,
        athlete_id: u64,
        tokens: &StravaTokens,
    ) -> Result<(), AppError> {
        let mut user = self
            .get_user(athlete_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", athlete_id)))?;
        user.tokens = Some(tokens.clone());
        user.updated_at = format_utc_rfc3339(chrono::Utc::now());
        self.upsert_user(&user).await
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Get all stored activities for a user.
    pub async fn get_activities_for_user(
        &self,
        athlete_id: u64,
    ) -> Result<Vec<Activity>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| q.field("athlete_id").eq(athlete_id))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert-or-update an activity keyed by its Strava activity ID.
    pub async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(activity.strava_activity_id.to_string())
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a user's activities whose IDs are not in `keep`.
    ///
    /// This reclaims deletions made on Strava: after a full reconciliation
    /// pass the local set converges to exactly the remote set.
    pub async fn delete_activities_not_in(
        &self,
        athlete_id: u64,
        keep: &HashSet<u64>,
    ) -> Result<usize, AppError> {
        let stale: Vec<u64> = self
            .get_activities_for_user(athlete_id)
            .await?
            .into_iter()
            .map(|a| a.strava_activity_id)
            .filter(|id| !keep.contains(id))
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }

        let client = self.get_client()?;

        // Chunked transactional deletes, same shape as any other batch
        // write against Firestore's 500-operation limit.
        for chunk in stale.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for activity_id in chunk {
                client
                    .fluent()
                    .delete()
                    .from(collections::ACTIVITIES)
                    .document_id(activity_id.to_string())
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add deletion to transaction: {}", e))
                    })?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Failed to commit deletions: {}", e)))?;
        }

        Ok(stale.len())
    }

    /// Cumulative distance per athlete for activities of the given raw types.
    ///
    /// Scans the activities collection and aggregates in memory; the cohort
    /// is small and the detector recomputes from storage every cycle.
    pub async fn sum_distances_for_types(
        &self,
        raw_types: &[&str],
    ) -> Result<HashMap<u64, f64>, AppError> {
        let activities: Vec<Activity> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut totals: HashMap<u64, f64> = HashMap::new();
        for activity in activities {
            if raw_types.contains(&activity.activity_type.as_str()) {
                *totals.entry(activity.athlete_id).or_insert(0.0) += activity.distance_meters;
            }
        }
        Ok(totals)
    }

    // ─── Snapshot Operations ─────────────────────────────────────

    /// All snapshots for one category.
    pub async fn get_snapshots(&self, category: &str) -> Result<Vec<DistanceSnapshot>, AppError> {
        let category = category.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::DISTANCE_SNAPSHOTS)
            .filter(move |q| q.field("category").eq(category.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Upsert a snapshot; the `{athlete_id}_{category}` document ID enforces
    /// at most one row per pair.
    pub async fn set_snapshot(&self, snapshot: &DistanceSnapshot) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::DISTANCE_SNAPSHOTS)
            .document_id(DistanceSnapshot::doc_id(
                snapshot.athlete_id,
                &snapshot.category,
            ))
            .object(snapshot)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Notification Operations ─────────────────────────────────

    /// Append a notification (document ID carried by the model).
    pub async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::NOTIFICATIONS)
            .document_id(&notification.id)
            .object(notification)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Notifications for a user, newest first.
    pub async fn get_notifications_for_user(
        &self,
        athlete_id: u64,
        limit: u32,
    ) -> Result<Vec<Notification>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::NOTIFICATIONS)
            .filter(move |q| q.field("athlete_id").eq(athlete_id))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark one of the user's notifications as read. No-op when already read
    /// or when the notification belongs to someone else.
    pub async fn mark_notification_read(
        &self,
        athlete_id: u64,
        notification_id: &str,
    ) -> Result<(), AppError> {
        let found: Option<Notification> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::NOTIFICATIONS)
            .obj()
            .one(notification_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(mut notification) = found else {
            return Err(AppError::NotFound(format!(
                "Notification {}",
                notification_id
            )));
        };

        if notification.athlete_id != athlete_id || notification.read_at.is_some() {
            return Ok(());
        }

        notification.read_at = Some(format_utc_rfc3339(chrono::Utc::now()));
        self.insert_notification(&notification).await
    }

    /// Mark all of the user's unread notifications as read.
    pub async fn mark_all_notifications_read(&self, athlete_id: u64) -> Result<usize, AppError> {
        let unread: Vec<Notification> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::NOTIFICATIONS)
            .filter(move |q| q.field("athlete_id").eq(athlete_id))
            .obj::<Notification>()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .filter(|n| n.read_at.is_none())
            .collect();

        let now = format_utc_rfc3339(chrono::Utc::now());
        let count = unread.len();

        // Concurrent writes with a limit to avoid overloading Firestore.
        stream::iter(unread)
            .map(|mut notification| {
                let now = now.clone();
                async move {
                    notification.read_at = Some(now);
                    self.insert_notification(&notification).await
                }
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(count)
    }
}

impl SyncStore for FirestoreDb {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        FirestoreDb::list_users(self).await
    }

    async fn update_user_tokens(
        &self,
        athlete_id: u64,
        tokens: &StravaTokens,
    ) -> Result<(), AppError> {
        FirestoreDb::update_user_tokens(self, athlete_id, tokens).await
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        FirestoreDb::upsert_activity(self, activity).await
    }

    async fn delete_activities_not_in(
        &self,
        athlete_id: u64,
        keep: &HashSet<u64>,
    ) -> Result<usize, AppError> {
        FirestoreDb::delete_activities_not_in(self, athlete_id, keep).await
    }

    async fn sum_distances_for_types(
        &self,
        raw_types: &[&str],
    ) -> Result<HashMap<u64, f64>, AppError> {
        FirestoreDb::sum_distances_for_types(self, raw_types).await
    }

    async fn get_snapshots(&self, category: &str) -> Result<Vec<DistanceSnapshot>, AppError> {
        FirestoreDb::get_snapshots(self, category).await
    }

    async fn set_snapshot(&self, snapshot: &DistanceSnapshot) -> Result<(), AppError> {
        FirestoreDb::set_snapshot(self, snapshot).await
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        FirestoreDb::insert_notification(self, notification).await
    }
}
