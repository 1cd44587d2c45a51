// SPDX-License-Identifier: MIT

//! Credential lifecycle: make sure a user's access token is usable before
//! the sync engine talks to Strava.

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::StravaTokens;
use crate::services::strava::CredentialRefresher;
use crate::time_utils::format_utc_rfc3339;

/// Return a usable credential for the user.
///
/// A credential whose expiry is set and still in the future is returned
/// unchanged without any network call. Otherwise the refresh capability is
/// invoked; an unparseable expiry is treated as expired. The caller is
/// responsible for persisting the result when the access token changed.
///
/// Refresh failures surface as [`AppError::TokenRefresh`]; the orchestrator
/// skips the user for the cycle instead of aborting the run.
pub async fn ensure_valid<R: CredentialRefresher>(
    refresher: &R,
    tokens: &StravaTokens,
) -> Result<StravaTokens, AppError> {
    if let Some(raw_expiry) = tokens.expires_at.as_deref() {
        if let Ok(expires_at) = DateTime::parse_from_rfc3339(raw_expiry) {
            if expires_at.with_timezone(&Utc) > Utc::now() {
                return Ok(tokens.clone());
            }
        }
    }

    let refreshed = refresher
        .refresh(&tokens.refresh_token)
        .await
        .map_err(|e| AppError::TokenRefresh(e.to_string()))?;

    Ok(StravaTokens {
        access_token: refreshed.access_token,
        refresh_token: refreshed.refresh_token,
        expires_at: DateTime::from_timestamp(refreshed.expires_at, 0).map(format_utc_rfc3339),
    })
}
