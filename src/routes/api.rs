// SPDX-License-Identifier: MIT

//! API routes for authenticated users.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Activity, Notification, User};
use crate::services::{sync, token};
use crate::AppState;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/activities", get(get_activities))
        .route("/api/activities/sync", post(sync_activities))
        .route("/api/dashboard/personal", get(personal_stats))
        .route("/api/dashboard/global", get(global_leaderboard))
        .route("/api/notifications", get(get_notifications))
        .route("/api/notifications/{id}/read", post(read_notification))
        .route("/api/notifications/read-all", post(read_all_notifications))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
pub struct UserResponse {
    pub athlete_id: u64,
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub display_name: String,
    pub profile_picture: Option<String>,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = require_user(&state, user.athlete_id).await?;

    Ok(Json(UserResponse {
        athlete_id: profile.strava_athlete_id,
        display_name: profile.display_name(),
        username: profile.username,
        firstname: profile.firstname,
        lastname: profile.lastname,
        profile_picture: profile.profile_picture,
    }))
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Filter by category name (Run, Ride, Swim)
    category: Option<String>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    50
}

const MAX_PER_PAGE: u32 = 100;

/// List the current user's stored activities, newest first.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<Vec<Activity>>> {
    let mut activities = filtered_activities(&state, user.athlete_id, params.category.as_deref())
        .await?;

    // RFC3339 strings order chronologically
    activities.sort_by(|a, b| b.start_date.cmp(&a.start_date));

    let per_page = params.per_page.clamp(1, MAX_PER_PAGE) as usize;
    let offset = (params.page.max(1) as usize - 1) * per_page;
    let page: Vec<Activity> = activities.into_iter().skip(offset).take(per_page).collect();

    Ok(Json(page))
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub synced: u32,
}

/// Manually reconcile the current user's activities with Strava.
async fn sync_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SyncResponse>> {
    let profile = require_user(&state, user.athlete_id).await?;
    let tokens = profile.tokens.as_ref().ok_or(AppError::Unauthorized)?;

    let valid = token::ensure_valid(&state.strava, tokens).await?;
    if valid.access_token != tokens.access_token {
        state
            .db
            .update_user_tokens(user.athlete_id, &valid)
            .await?;
    }

    let synced = sync::reconcile_activities(
        &state.db,
        &state.strava,
        user.athlete_id,
        &valid.access_token,
    )
    .await?;

    Ok(Json(SyncResponse { synced }))
}

// ─── Dashboard ───────────────────────────────────────────────

#[derive(Deserialize)]
struct DashboardQuery {
    category: Option<String>,
}

/// Aggregate stats for the current user.
#[derive(Serialize, Default)]
pub struct PersonalStats {
    pub total_activities: u32,
    pub total_distance_meters: f64,
    pub total_moving_time_secs: u64,
    pub total_elevation_gain: f64,
    pub max_distance_meters: f64,
}

async fn personal_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<PersonalStats>> {
    let activities =
        filtered_activities(&state, user.athlete_id, params.category.as_deref()).await?;

    let mut stats = PersonalStats::default();
    for activity in &activities {
        stats.total_activities += 1;
        stats.total_distance_meters += activity.distance_meters;
        stats.total_moving_time_secs += u64::from(activity.moving_time_secs);
        stats.total_elevation_gain += activity.total_elevation_gain;
        stats.max_distance_meters = stats.max_distance_meters.max(activity.distance_meters);
    }

    Ok(Json(stats))
}

/// One row of the global leaderboard.
#[derive(Serialize)]
pub struct LeaderboardEntry {
    pub athlete_id: u64,
    pub display_name: String,
    pub profile_picture: Option<String>,
    pub total_distance_meters: f64,
}

/// Global leaderboard for one category (defaults to Run).
async fn global_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let name = params.category.as_deref().unwrap_or("Run");
    let category = state
        .categories
        .get(name)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown category: {}", name)))?;

    let totals = state.db.sum_distances_for_types(category.raw_types).await?;
    let users = state.db.list_users().await?;

    let mut entries: Vec<LeaderboardEntry> = users
        .into_iter()
        .filter_map(|user| {
            totals
                .get(&user.strava_athlete_id)
                .map(|total| LeaderboardEntry {
                    athlete_id: user.strava_athlete_id,
                    display_name: user.display_name(),
                    profile_picture: user.profile_picture.clone(),
                    total_distance_meters: *total,
                })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_distance_meters
            .partial_cmp(&a.total_distance_meters)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(Json(entries))
}

// ─── Notifications ───────────────────────────────────────────

const NOTIFICATIONS_LIMIT: u32 = 50;

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

/// Notifications for the current user, newest first.
async fn get_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<NotificationsResponse>> {
    let notifications = state
        .db
        .get_notifications_for_user(user.athlete_id, NOTIFICATIONS_LIMIT)
        .await?;
    let unread_count = notifications.iter().filter(|n| n.read_at.is_none()).count();

    Ok(Json(NotificationsResponse {
        notifications,
        unread_count,
    }))
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Mark one notification as read.
async fn read_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>> {
    state.db.mark_notification_read(user.athlete_id, &id).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// Mark all of the user's notifications as read.
async fn read_all_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<OkResponse>> {
    state.db.mark_all_notifications_read(user.athlete_id).await?;
    Ok(Json(OkResponse { ok: true }))
}

// ─── Helpers ─────────────────────────────────────────────────

async fn require_user(state: &AppState, athlete_id: u64) -> Result<User> {
    state
        .db
        .get_user(athlete_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", athlete_id)))
}

/// The user's activities, optionally restricted to one category.
async fn filtered_activities(
    state: &AppState,
    athlete_id: u64,
    category: Option<&str>,
) -> Result<Vec<Activity>> {
    let activities = state.db.get_activities_for_user(athlete_id).await?;

    let Some(name) = category else {
        return Ok(activities);
    };
    let category = state
        .categories
        .get(name)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown category: {}", name)))?;

    Ok(activities
        .into_iter()
        .filter(|a| category.matches(&a.activity_type))
        .collect())
}
