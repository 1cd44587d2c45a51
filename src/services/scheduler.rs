// SPDX-License-Identifier: MIT

//! Periodic sync orchestration.
//!
//! One cycle = refresh + reconcile every user sequentially, then run
//! overtake detection once. Per-user processing is deliberately sequential
//! with a pacing delay, trading throughput for predictable load against
//! Strava's rate limit. A try-lock run guard makes cycles single-flight:
//! a tick (or a manual trigger) that would overlap a still-running cycle is
//! skipped instead of stacking.

use std::time::Duration;

use tokio::sync::Mutex;

use crate::db::SyncStore;
use crate::error::AppError;
use crate::models::User;
use crate::services::overtake::OvertakeDetector;
use crate::services::strava::{ActivityFeed, CredentialRefresher};
use crate::services::{sync, token};

/// Outcome of a cycle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle ran to completion (individual users may still have failed).
    Completed,
    /// Another cycle was already in flight; nothing was done.
    Skipped,
}

/// Drives the periodic sync cycle.
pub struct SyncScheduler<S, C> {
    store: S,
    client: C,
    detector: OvertakeDetector<S>,
    interval: Duration,
    pacing: Duration,
    run_guard: Mutex<()>,
}

impl<S, C> SyncScheduler<S, C>
where
    S: SyncStore,
    C: CredentialRefresher + ActivityFeed,
{
    pub fn new(
        store: S,
        client: C,
        detector: OvertakeDetector<S>,
        interval: Duration,
        pacing: Duration,
    ) -> Self {
        Self {
            store,
            client,
            detector,
            interval,
            pacing,
            run_guard: Mutex::new(()),
        }
    }

    /// Run cycles forever on the configured interval.
    ///
    /// The first cycle starts immediately. A cycle that runs longer than
    /// the interval delays the next tick rather than overlapping it.
    pub async fn run_loop(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Sync scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// Run one full sync cycle, unless one is already in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_guard) = self.run_guard.try_lock() else {
            tracing::warn!("Previous sync cycle still running, skipping this one");
            return CycleOutcome::Skipped;
        };

        tracing::info!("Starting sync cycle");

        match self.store.list_users().await {
            Ok(users) => {
                tracing::info!(count = users.len(), "Syncing users");
                for user in &users {
                    // One bad user must not take down the rest of the cycle
                    match self.sync_user(user).await {
                        Ok(synced) => {
                            tracing::info!(
                                athlete_id = user.strava_athlete_id,
                                synced,
                                "User synced"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                athlete_id = user.strava_athlete_id,
                                error = %e,
                                "User sync failed, continuing"
                            );
                        }
                    }
                    tokio::time::sleep(self.pacing).await;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to list users for sync cycle");
            }
        }

        // Detection runs even when individual users failed, and its own
        // failure does not mark the cycle failed either.
        match self.detector.detect().await {
            Ok(notifications) => {
                if !notifications.is_empty() {
                    tracing::info!(count = notifications.len(), "Overtake notifications created");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Overtake detection failed");
            }
        }

        tracing::info!("Sync cycle completed");
        CycleOutcome::Completed
    }

    /// Refresh + reconcile one user.
    async fn sync_user(&self, user: &User) -> Result<u32, AppError> {
        let Some(tokens) = &user.tokens else {
            tracing::debug!(
                athlete_id = user.strava_athlete_id,
                "User has no tokens, skipping"
            );
            return Ok(0);
        };

        let valid = token::ensure_valid(&self.client, tokens).await?;

        if valid.access_token != tokens.access_token {
            self.store
                .update_user_tokens(user.strava_athlete_id, &valid)
                .await?;
            tracing::debug!(
                athlete_id = user.strava_athlete_id,
                "Persisted refreshed tokens"
            );
        }

        sync::reconcile_activities(
            &self.store,
            &self.client,
            user.strava_athlete_id,
            &valid.access_token,
        )
        .await
    }
}
