// SPDX-License-Identifier: MIT

//! Activity reconciliation: make local storage converge to a user's remote
//! Strava activity set.
//!
//! The reconciler pages through the full feed, upserting every record by
//! Strava activity ID, then deletes local activities that no longer exist
//! remotely. Upserts are idempotent, so a cycle that fails mid-pagination
//! leaves valid partial progress behind and the next cycle repairs the rest.

use std::collections::HashSet;

use crate::db::SyncStore;
use crate::error::AppError;
use crate::models::Activity;
use crate::services::strava::{ActivityFeed, StravaActivity};
use crate::time_utils::format_utc_rfc3339;

/// Strava feed page size. A page shorter than this marks the end of data.
pub const SYNC_PAGE_SIZE: u32 = 100;

/// Reconcile one user's local activities against their remote feed.
///
/// Returns the number of activities upserted this run. A page fetch failure
/// aborts reconciliation for this user (already-written pages are kept); the
/// orchestrator logs and moves on to the next user.
pub async fn reconcile_activities<S: SyncStore, F: ActivityFeed>(
    store: &S,
    feed: &F,
    athlete_id: u64,
    access_token: &str,
) -> Result<u32, AppError> {
    let mut page = 1u32;
    let mut total_synced = 0u32;
    let mut seen_ids: HashSet<u64> = HashSet::new();

    loop {
        let batch = feed
            .list_activities(access_token, page, SYNC_PAGE_SIZE)
            .await?;

        if batch.is_empty() {
            break;
        }
        let last_page = (batch.len() as u32) < SYNC_PAGE_SIZE;

        let synced_at = format_utc_rfc3339(chrono::Utc::now());
        for remote in &batch {
            seen_ids.insert(remote.id);
            store
                .upsert_activity(&activity_from_remote(remote, athlete_id, &synced_at))
                .await?;
            total_synced += 1;
        }

        if last_page {
            break;
        }
        page += 1;
    }

    // Clean up activities deleted on Strava. Skipped when the feed was
    // empty: an empty seen-set would wipe the user's history on a feed
    // hiccup rather than converge it.
    if !seen_ids.is_empty() {
        let removed = store.delete_activities_not_in(athlete_id, &seen_ids).await?;
        if removed > 0 {
            tracing::info!(athlete_id, removed, "Cleaned up activities deleted on Strava");
        }
    }

    Ok(total_synced)
}

/// Map a remote feed record onto the stored model.
///
/// Optional source fields (heart rate, polyline, start coordinate) map to
/// explicit `None`, never to zero or an empty string.
pub fn activity_from_remote(remote: &StravaActivity, athlete_id: u64, synced_at: &str) -> Activity {
    Activity {
        strava_activity_id: remote.id,
        athlete_id,
        name: remote.name.clone(),
        activity_type: remote.activity_type.clone(),
        sport_type: remote.sport_type.clone(),
        distance_meters: remote.distance,
        moving_time_secs: remote.moving_time,
        elapsed_time_secs: remote.elapsed_time,
        total_elevation_gain: remote.total_elevation_gain,
        start_date: remote.start_date.clone(),
        average_speed: remote.average_speed,
        max_speed: remote.max_speed,
        average_heartrate: remote.average_heartrate,
        max_heartrate: remote.max_heartrate,
        summary_polyline: remote
            .map
            .as_ref()
            .and_then(|m| m.summary_polyline.clone()),
        start_latlng: format_latlng(remote.start_latlng.as_deref()),
        synced_at: synced_at.to_string(),
    }
}

/// Serialize a coordinate pair as "lat,lng"; anything else is absent.
fn format_latlng(latlng: Option<&[f64]>) -> Option<String> {
    match latlng {
        Some([lat, lng]) => Some(format!("{},{}", lat, lng)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::strava::StravaMap;

    fn remote_activity(id: u64) -> StravaActivity {
        StravaActivity {
            id,
            name: "Morning Run".to_string(),
            activity_type: "Run".to_string(),
            sport_type: "Run".to_string(),
            distance: 5000.0,
            moving_time: 1500,
            elapsed_time: 1600,
            total_elevation_gain: 12.0,
            start_date: "2024-03-01T07:00:00Z".to_string(),
            average_speed: 3.3,
            max_speed: 4.0,
            average_heartrate: None,
            max_heartrate: None,
            map: None,
            start_latlng: None,
        }
    }

    #[test]
    fn test_mapping_preserves_identity_and_owner() {
        let activity = activity_from_remote(&remote_activity(7), 42, "2024-03-01T08:00:00Z");
        assert_eq!(activity.strava_activity_id, 7);
        assert_eq!(activity.athlete_id, 42);
        assert_eq!(activity.synced_at, "2024-03-01T08:00:00Z");
    }

    #[test]
    fn test_missing_optionals_map_to_none() {
        let activity = activity_from_remote(&remote_activity(1), 42, "now");
        assert!(activity.average_heartrate.is_none());
        assert!(activity.max_heartrate.is_none());
        assert!(activity.summary_polyline.is_none());
        assert!(activity.start_latlng.is_none());
    }

    #[test]
    fn test_present_optionals_are_kept() {
        let mut remote = remote_activity(1);
        remote.average_heartrate = Some(150.0);
        remote.map = Some(StravaMap {
            summary_polyline: Some("poly".to_string()),
        });
        remote.start_latlng = Some(vec![45.76, 4.83]);

        let activity = activity_from_remote(&remote, 42, "now");
        assert_eq!(activity.average_heartrate, Some(150.0));
        assert_eq!(activity.summary_polyline.as_deref(), Some("poly"));
        assert_eq!(activity.start_latlng.as_deref(), Some("45.76,4.83"));
    }

    #[test]
    fn test_latlng_requires_exactly_two_values() {
        assert_eq!(format_latlng(Some(&[45.0, 4.0])), Some("45,4".to_string()));
        assert_eq!(format_latlng(Some(&[])), None);
        assert_eq!(format_latlng(Some(&[45.0])), None);
        assert_eq!(format_latlng(Some(&[45.0, 4.0, 1.0])), None);
        assert_eq!(format_latlng(None), None);
    }

    #[test]
    fn test_empty_polyline_is_preserved_as_is() {
        // Strava may send a map object with a null polyline; that is
        // absence, not an empty string.
        let mut remote = remote_activity(1);
        remote.map = Some(StravaMap {
            summary_polyline: None,
        });
        let activity = activity_from_remote(&remote, 42, "now");
        assert!(activity.summary_polyline.is_none());
    }
}
