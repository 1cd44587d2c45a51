// SPDX-License-Identifier: MIT

//! Shared helpers for integration tests: model factories, a scripted Strava
//! double, and Firestore-emulator gating.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use peloton_board::categories::CategoryConfig;
use peloton_board::config::Config;
use peloton_board::db::FirestoreDb;
use peloton_board::error::AppError;
use peloton_board::models::{Activity, StravaTokens, User};
use peloton_board::routes::create_router;
use peloton_board::services::strava::{
    ActivityFeed, CredentialRefresher, StravaActivity, StravaClient, TokenRefreshResponse,
};
use peloton_board::time_utils::format_utc_rfc3339;
use peloton_board::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app with offline mock dependencies.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::default();
    let strava = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    );
    let state = Arc::new(AppState {
        config,
        db: FirestoreDb::new_mock(),
        strava,
        categories: CategoryConfig::standard(),
    });
    (create_router(state.clone()), state)
}

// ─── Model factories ─────────────────────────────────────────

/// User whose access token is valid for another hour.
#[allow(dead_code)]
pub fn test_user(athlete_id: u64, firstname: &str, access_token: &str) -> User {
    let now = chrono::Utc::now();
    User {
        strava_athlete_id: athlete_id,
        username: Some(format!("user{}", athlete_id)),
        firstname: Some(firstname.to_string()),
        lastname: None,
        profile_picture: None,
        tokens: Some(StravaTokens {
            access_token: access_token.to_string(),
            refresh_token: format!("refresh_{}", athlete_id),
            expires_at: Some(format_utc_rfc3339(now + chrono::Duration::hours(1))),
        }),
        created_at: format_utc_rfc3339(now),
        updated_at: format_utc_rfc3339(now),
    }
}

/// User whose access token expired an hour ago.
#[allow(dead_code)]
pub fn test_user_expired(athlete_id: u64, firstname: &str, access_token: &str) -> User {
    let mut user = test_user(athlete_id, firstname, access_token);
    let expired = chrono::Utc::now() - chrono::Duration::hours(1);
    if let Some(tokens) = user.tokens.as_mut() {
        tokens.expires_at = Some(format_utc_rfc3339(expired));
    }
    user
}

/// Remote feed record with the given raw type and distance.
#[allow(dead_code)]
pub fn remote_activity(id: u64, activity_type: &str, distance: f64) -> StravaActivity {
    StravaActivity {
        id,
        name: format!("Activity {}", id),
        activity_type: activity_type.to_string(),
        sport_type: activity_type.to_string(),
        distance,
        moving_time: 1800,
        elapsed_time: 2000,
        total_elevation_gain: 50.0,
        start_date: "2024-03-01T08:00:00Z".to_string(),
        average_speed: 3.0,
        max_speed: 5.0,
        average_heartrate: None,
        max_heartrate: None,
        map: None,
        start_latlng: None,
    }
}

/// A full feed page of 100 runs with consecutive IDs starting at `first_id`.
#[allow(dead_code)]
pub fn full_page(first_id: u64) -> Vec<StravaActivity> {
    (0..100)
        .map(|i| remote_activity(first_id + i, "Run", 5_000.0))
        .collect()
}

/// Stored activity for seeding a store directly.
#[allow(dead_code)]
pub fn local_activity(id: u64, athlete_id: u64, activity_type: &str, distance: f64) -> Activity {
    Activity {
        strava_activity_id: id,
        athlete_id,
        name: format!("Activity {}", id),
        activity_type: activity_type.to_string(),
        sport_type: activity_type.to_string(),
        distance_meters: distance,
        moving_time_secs: 1800,
        elapsed_time_secs: 2000,
        total_elevation_gain: 50.0,
        start_date: "2024-02-01T08:00:00Z".to_string(),
        average_speed: 3.0,
        max_speed: 5.0,
        average_heartrate: None,
        max_heartrate: None,
        summary_polyline: None,
        start_latlng: None,
        synced_at: "2024-02-01T09:00:00Z".to_string(),
    }
}

// ─── Scripted Strava double ──────────────────────────────────

/// Scripted stand-in for the Strava API: serves canned feed pages per
/// access token and counts every capability invocation.
#[allow(dead_code)]
pub struct ScriptedStrava {
    pages: Mutex<HashMap<String, Vec<Vec<StravaActivity>>>>,
    fetch_calls: AtomicU32,
    refresh_calls: AtomicU32,
    fail_page: Mutex<Option<u32>>,
    fail_tokens: Mutex<Vec<String>>,
    refresh_response: Mutex<Option<TokenRefreshResponse>>,
}

#[allow(dead_code)]
impl ScriptedStrava {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            fetch_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            fail_page: Mutex::new(None),
            fail_tokens: Mutex::new(Vec::new()),
            refresh_response: Mutex::new(Some(TokenRefreshResponse {
                access_token: "refreshed_access".to_string(),
                refresh_token: "refreshed_refresh".to_string(),
                expires_at: (chrono::Utc::now() + chrono::Duration::hours(6)).timestamp(),
            })),
        }
    }

    /// Serve these pages for the given access token.
    pub fn set_pages(&self, access_token: &str, pages: Vec<Vec<StravaActivity>>) {
        self.pages
            .lock()
            .unwrap()
            .insert(access_token.to_string(), pages);
    }

    /// Fail every fetch of this page number.
    pub fn fail_on_page(&self, page: u32) {
        *self.fail_page.lock().unwrap() = Some(page);
    }

    /// Fail every fetch made with this access token.
    pub fn fail_token(&self, access_token: &str) {
        self.fail_tokens
            .lock()
            .unwrap()
            .push(access_token.to_string());
    }

    /// Make the refresh capability fail.
    pub fn fail_refresh(&self) {
        *self.refresh_response.lock().unwrap() = None;
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl ActivityFeed for ScriptedStrava {
    async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<StravaActivity>, AppError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .fail_tokens
            .lock()
            .unwrap()
            .iter()
            .any(|t| t == access_token)
        {
            return Err(AppError::StravaApi("scripted token failure".to_string()));
        }
        if *self.fail_page.lock().unwrap() == Some(page) {
            return Err(AppError::StravaApi("scripted page failure".to_string()));
        }

        let pages = self.pages.lock().unwrap();
        Ok(pages
            .get(access_token)
            .and_then(|p| p.get((page - 1) as usize))
            .cloned()
            .unwrap_or_default())
    }
}

impl CredentialRefresher for ScriptedStrava {
    async fn refresh(&self, _refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()))
    }
}

// The scheduler owns its client; tests keep an Arc handle for assertions.
// `Arc<ScriptedStrava>` gets its `ActivityFeed`/`CredentialRefresher` impls
// from the blanket `impl<T> … for Arc<T>` in the library crate (the orphan
// rule forbids implementing those foreign traits for `Arc` here).
