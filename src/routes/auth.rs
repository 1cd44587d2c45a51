// SPDX-License-Identifier: MIT

//! Strava OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::create_jwt;
use crate::models::{StravaTokens, User};
use crate::services::sync;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(auth_start))
        .route("/auth/strava/callback", get(auth_callback))
        .route("/auth/logout", get(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses the configured frontend URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Strava authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: axum::http::HeaderMap,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let oauth_state = sign_state(&frontend_url, &state.config.oauth_state_key)?;
    let callback_url = format!("{}/auth/strava/callback", request_origin(&headers));
    let auth_url = state.strava.authorize_url(&callback_url, &oauth_state);

    tracing::info!(frontend_url = %frontend_url, "Starting OAuth flow, redirecting to Strava");

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, store user, create session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    // Decode and verify frontend URL from the state parameter
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key))
        .unwrap_or_else(|| {
            tracing::warn!("Invalid or missing state parameter, using default frontend URL");
            state.config.frontend_url.clone()
        });

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return Ok(Redirect::temporary(&format!(
            "{}/login?error={}",
            frontend_url, error
        )));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing code parameter".to_string()))?;

    let token_response = state.strava.exchange_code(&code).await?;
    let athlete = &token_response.athlete;
    let now = format_utc_rfc3339(chrono::Utc::now());

    let tokens = StravaTokens {
        access_token: token_response.access_token.clone(),
        refresh_token: token_response.refresh_token.clone(),
        expires_at: chrono::DateTime::from_timestamp(token_response.expires_at, 0)
            .map(format_utc_rfc3339),
    };

    // Re-connecting keeps the original created_at
    let created_at = state
        .db
        .get_user(athlete.id)
        .await?
        .map(|existing| existing.created_at)
        .unwrap_or_else(|| now.clone());

    let user = User {
        strava_athlete_id: athlete.id,
        username: athlete.username.clone(),
        firstname: athlete.firstname.clone(),
        lastname: athlete.lastname.clone(),
        profile_picture: athlete.profile.clone(),
        tokens: Some(tokens),
        created_at,
        updated_at: now,
    };
    state.db.upsert_user(&user).await?;

    tracing::info!(
        athlete_id = athlete.id,
        username = ?athlete.username,
        "OAuth successful, user and tokens stored"
    );

    // Pull the first activities in the background so the dashboard is not
    // empty until the next scheduled cycle.
    let db = state.db.clone();
    let client = state.strava.clone();
    let athlete_id = athlete.id;
    let access_token = token_response.access_token.clone();
    tokio::spawn(async move {
        match sync::reconcile_activities(&db, &client, athlete_id, &access_token).await {
            Ok(synced) => tracing::info!(athlete_id, synced, "Initial activity sync complete"),
            Err(e) => tracing::warn!(athlete_id, error = %e, "Initial activity sync failed"),
        }
    });

    let jwt = create_jwt(athlete.id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    Ok(Redirect::temporary(&format!(
        "{}/callback?token={}",
        frontend_url, jwt
    )))
}

/// Logout - the client clears its stored token; this just redirects back.
async fn logout() -> Redirect {
    Redirect::temporary("/")
}

/// Scheme + host of the incoming request, for the OAuth callback URL.
fn request_origin(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}", scheme, host)
}

/// Sign the frontend URL into an opaque OAuth state parameter.
///
/// Format before encoding: "frontend_url|timestamp_hex|signature_hex",
/// HMAC-SHA256 over the first two fields.
fn sign_state(frontend_url: &str, secret: &[u8]) -> Result<String> {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let payload = format!("{}|{:x}", frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature).as_bytes()))
}

/// Verify the HMAC signature and decode the frontend URL from the OAuth
/// state parameter. Returns None on any mismatch or malformed input.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let frontend_url = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    let payload = format!("{}|{}", frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}
