// SPDX-License-Identifier: MIT

//! Strava API client.
//!
//! Handles:
//! - OAuth authorization URL construction and code exchange
//! - Token refresh when expired
//! - Paginated activity listing for reconciliation
//! - Rate limit (429) and token (401) error mapping

use std::sync::Arc;

use serde::Deserialize;

use crate::error::AppError;

/// The two Strava capabilities the sync engine consumes, kept behind traits
/// so tests can substitute scripted doubles.
#[allow(async_fn_in_trait)]
pub trait CredentialRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError>;
}

#[allow(async_fn_in_trait)]
pub trait ActivityFeed {
    async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivity>, AppError>;
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://www.strava.com/api/v3".to_string(),
            token_url: "https://www.strava.com/oauth/token".to_string(),
            client_id,
            client_secret,
        }
    }

    /// Authorization URL the login route redirects to.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://www.strava.com/oauth/authorize?\
             client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             scope=read,activity:read_all&\
             approval_prompt=auto&\
             state={}",
            self.client_id,
            urlencoding::encode(redirect_uri),
            state
        )
    }

    /// Exchange an authorization code for tokens and the athlete profile.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            // Rate limit - the orchestrator's pacing should make this rare
            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
                return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
            }

            // Unauthorized - token expired or revoked
            if status.as_u16() == 401 {
                return Err(AppError::StravaApi(
                    AppError::STRAVA_TOKEN_ERROR.to_string(),
                ));
            }

            return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}

impl CredentialRefresher for StravaClient {
    /// Refresh an expired access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }
}

impl ActivityFeed for StravaClient {
    /// One page of the athlete's activity feed, newest first.
    async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivity>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }
}

impl<T: CredentialRefresher + ?Sized> CredentialRefresher for Arc<T> {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        (**self).refresh(refresh_token).await
    }
}

impl<T: ActivityFeed + ?Sized> ActivityFeed for Arc<T> {
    async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivity>, AppError> {
        (**self).list_activities(access_token, page, per_page).await
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as Unix epoch seconds
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

/// Summary activity from the feed endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    pub name: String,
    /// Classic type (Run, TrailRun, Ride, ...)
    #[serde(rename = "type")]
    pub activity_type: String,
    pub sport_type: String,
    pub distance: f64,
    pub moving_time: u32,
    pub elapsed_time: u32,
    pub total_elevation_gain: f64,
    pub start_date: String,
    pub average_speed: f64,
    pub max_speed: f64,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub map: Option<StravaMap>,
    /// Strava sends `[]` instead of null for activities without GPS
    #[serde(default)]
    pub start_latlng: Option<Vec<f64>>,
}

/// Activity map data with the encoded summary polyline.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaMap {
    #[serde(default)]
    pub summary_polyline: Option<String>,
}
