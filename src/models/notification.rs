// SPDX-License-Identifier: MIT

//! Overtake notification events.

use serde::{Deserialize, Serialize};

use crate::time_utils::format_utc_rfc3339;

/// Which side of a crossing the recipient was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// The recipient moved ahead of the related user
    Overtook,
    /// The related user moved ahead of the recipient
    Overtaken,
}

/// A notification created by the overtake detector.
///
/// Always created in pairs (one `overtook`, one `overtaken`). The sync
/// engine never mutates a notification after insert; only the API layer
/// sets `read_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Document ID (composite; see [`Notification::crossing`])
    pub id: String,
    /// Recipient athlete ID
    pub athlete_id: u64,
    pub kind: NotificationKind,
    /// The user on the other side of the crossing
    pub related_athlete_id: u64,
    /// Category the crossing happened in
    pub category: String,
    /// Rendered message (template with the other user's name substituted)
    pub message: String,
    /// When the crossing was detected (ISO 8601)
    pub created_at: String,
    /// When the recipient read it; None while unread
    pub read_at: Option<String>,
}

impl Notification {
    /// Build one side of a crossing pair.
    ///
    /// The document ID combines recipient, related user, category and a
    /// nanosecond timestamp: unique per event without a serial key, and the
    /// recipient/related order already distinguishes the two sides of a pair.
    pub fn crossing(
        athlete_id: u64,
        kind: NotificationKind,
        related_athlete_id: u64,
        category: &str,
        message: String,
    ) -> Self {
        let now = chrono::Utc::now();
        let nanos = now.timestamp_nanos_opt().unwrap_or_default();
        Self {
            id: format!("{}_{}_{}_{}", athlete_id, related_athlete_id, category, nanos),
            athlete_id,
            kind,
            related_athlete_id,
            category: category.to_string(),
            message,
            created_at: format_utc_rfc3339(now),
            read_at: None,
        }
    }
}
