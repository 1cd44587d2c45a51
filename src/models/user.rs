// SPDX-License-Identifier: MIT

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Strava athlete ID (also used as document ID)
    pub strava_athlete_id: u64,
    /// Strava username (may be None if not set)
    pub username: Option<String>,
    /// First name
    pub firstname: Option<String>,
    /// Last name
    pub lastname: Option<String>,
    /// Profile picture URL
    pub profile_picture: Option<String>,
    /// OAuth tokens; None until the user completes the OAuth flow,
    /// or after the tokens were revoked
    pub tokens: Option<StravaTokens>,
    /// When user first connected (ISO 8601)
    pub created_at: String,
    /// Last profile/token update (ISO 8601)
    pub updated_at: String,
}

impl User {
    /// Name shown in notification messages.
    ///
    /// Precedence: "first last", then first name alone, then username,
    /// then a generic placeholder.
    pub fn display_name(&self) -> String {
        match (self.firstname.as_deref(), self.lastname.as_deref()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.to_string(),
            _ => self
                .username
                .clone()
                .unwrap_or_else(|| "Someone".to_string()),
        }
    }
}

/// A user's Strava OAuth credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StravaTokens {
    /// Short-lived access token
    pub access_token: String,
    /// Long-lived refresh token
    pub refresh_token: String,
    /// When the access token expires (ISO 8601); None means unknown,
    /// which forces a refresh before use
    pub expires_at: Option<String>,
}
