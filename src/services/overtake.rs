// SPDX-License-Identifier: MIT

//! Overtake detection across sync cycles.
//!
//! After every full sync cycle the detector compares each user's current
//! cumulative distance per category against the snapshot taken at the
//! previous pass, and emits a paired notification for every crossing. The
//! comparison is a full O(n²) pairwise scan: a user who passes three others
//! in one cycle produces three pairs, not just the rank-adjacent one. The
//! cohort is tens of users; see `benches/detection_benchmark.rs` before
//! replacing this with a sort-based walk.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::categories::CategoryConfig;
use crate::db::SyncStore;
use crate::error::AppError;
use crate::models::{DistanceSnapshot, Notification, NotificationKind, User};
use crate::time_utils::format_utc_rfc3339;

/// Message templates for one category. `{name}` is replaced with the other
/// user's display name.
pub struct MessagePool {
    pub category: &'static str,
    pub templates: &'static [&'static str],
}

/// Messages sent to the user who moved ahead.
pub static OVERTOOK_MESSAGES: &[MessagePool] = &[
    MessagePool {
        category: "Run",
        templates: &[
            "You just ran past {name}! The road is yours today 🏃",
            "Shoes laced, leaderboard rearranged: {name} is behind you now 💨",
            "The GPS doesn't lie: you are officially ahead of {name} 📱",
            "Every kilometer counted, and now {name} is staring at your heels 🔥",
            "{name} looked strong this month... just not as strong as you 💪",
            "Light stride, climbing rank: {name} is in your rearview mirror 😎",
        ],
    },
    MessagePool {
        category: "Ride",
        templates: &[
            "Decisive pedal stroke: {name} is riding in your slipstream now 🚲",
            "Local Tour de France: you just dropped {name} on the climb 🗻",
            "Chain oiled, tailwind found, and {name} fading in your mirror 🌬️",
            "{name} wanted to keep that spot... your gearing decided otherwise 🔧",
            "You are burning up the tarmac and {name} can only watch 🔥",
            "Two wheels, two legs, one leaderboard in your favor: {name} is beaten 🎯",
        ],
    },
    MessagePool {
        category: "Swim",
        templates: &[
            "Breaststroke, crawl or butterfly: whatever the stroke, you passed {name} 🏊",
            "{name} sank under your wake. The pool has a new champion 🌊",
            "Length after length you pulled away from {name}. The water is yours 💧",
            "Goggles on, {name} behind: a perfect champion's outfit 🥽",
            "Splash! That's {name} diving in to try to catch you. Too late 😄",
            "Your arms did the talking and the ranking listened: {name} is behind 💪",
        ],
    },
];

/// Messages sent to the user who was passed.
pub static OVERTAKEN_MESSAGES: &[MessagePool] = &[
    MessagePool {
        category: "Run",
        templates: &[
            "{name} just ran past you! Your shoes are waiting by the door 👟",
            "Bad news: {name} runs more than you. Good news: the month isn't over 📅",
            "That sound of footsteps? It's {name} moving ahead of you 👂",
            "{name} logged the kilometers while you were 'recovering' 🛋️",
            "The leaderboard has spoken: {name} is ahead. Revenge starts tomorrow 🌅",
            "Nobody saw it coming, least of all you: {name} is in front 😬",
        ],
    },
    MessagePool {
        category: "Ride",
        templates: &[
            "{name} is out-pedaling you this month. Time to pump those tires 🔧",
            "Local Tour de France: {name} just dropped you on the climb 😤",
            "Morale puncture: {name} passed your distance total. Get the bike out 🚲",
            "The road was flat, yet {name} still found a way past you 🌾",
            "Every km counts, and {name} has more of them. This weekend's mission 🗓️",
            "{name} went by on the road, but nobody has crossed the finish line yet 🏁",
        ],
    },
    MessagePool {
        category: "Swim",
        templates: &[
            "{name} swims farther than you this month. Grab the fins, no shame 🤿",
            "The pool doesn't lie: {name} is ahead. Next session, full throttle 🏊",
            "{name} broke out the dolphin kicks and left you behind. Slightly humbling 🐬",
            "Good news: there's water left in the pool. {name} leads, but you can catch up 💦",
            "{name} is ahead in the water. Revenge builds one length at a time 🔄",
            "The clock is merciless: {name} is in front. You know how long the pool is 🏁",
        ],
    },
];

/// Pick a message for a category, substituting the other user's name.
///
/// Unknown categories fall back to the first pool so a message is always
/// produced.
pub fn pick_message<R: Rng>(
    pools: &[MessagePool],
    category: &str,
    name: &str,
    rng: &mut R,
) -> String {
    let pool = pools
        .iter()
        .find(|p| p.category == category)
        .unwrap_or(&pools[0]);
    let template = pool.templates[rng.gen_range(0..pool.templates.len())];
    template.replace("{name}", name)
}

/// All crossings between the previous and current distance maps.
///
/// A crossing "A overtook B" holds iff `curr_A > curr_B` and
/// `prev_A <= prev_B`, evaluated over every ordered pair of *eligible*
/// users (current distance at or above `min_distance`). Users missing from
/// `previous` count as 0. Ties never cross in either direction.
pub fn detect_crossings(
    current: &HashMap<u64, f64>,
    previous: &HashMap<u64, f64>,
    min_distance: f64,
) -> Vec<(u64, u64)> {
    let mut eligible: Vec<(u64, f64)> = current
        .iter()
        .filter(|(_, distance)| **distance >= min_distance)
        .map(|(id, distance)| (*id, *distance))
        .collect();
    // Deterministic output order regardless of map iteration order
    eligible.sort_by_key(|(id, _)| *id);

    let mut crossings = Vec::new();
    for &(a, curr_a) in &eligible {
        for &(b, curr_b) in &eligible {
            if a == b {
                continue;
            }
            let prev_a = previous.get(&a).copied().unwrap_or(0.0);
            let prev_b = previous.get(&b).copied().unwrap_or(0.0);
            if curr_a > curr_b && prev_a <= prev_b {
                crossings.push((a, b));
            }
        }
    }
    crossings
}

/// Detects crossings and emits notification pairs once per sync cycle.
pub struct OvertakeDetector<S> {
    store: S,
    categories: CategoryConfig,
    rng: Mutex<StdRng>,
}

impl<S: SyncStore> OvertakeDetector<S> {
    pub fn new(store: S, categories: CategoryConfig) -> Self {
        Self::with_rng(store, categories, StdRng::from_entropy())
    }

    /// Construct with a seeded RNG for deterministic message selection.
    pub fn with_rng(store: S, categories: CategoryConfig, rng: StdRng) -> Self {
        Self {
            store,
            categories,
            rng: Mutex::new(rng),
        }
    }

    /// Run one detection pass over all categories.
    ///
    /// Returns the notifications that were created (two per crossing).
    /// Snapshots are overwritten for every user present in the current
    /// aggregate, crossing or not, so the next pass compares against this
    /// one.
    pub async fn detect(&self) -> Result<Vec<Notification>, AppError> {
        let users = self.store.list_users().await?;
        let user_map: HashMap<u64, &User> =
            users.iter().map(|u| (u.strava_athlete_id, u)).collect();

        let mut emitted = Vec::new();

        for category in self.categories.categories() {
            let current = self
                .store
                .sum_distances_for_types(category.raw_types)
                .await?;
            let previous: HashMap<u64, f64> = self
                .store
                .get_snapshots(category.name)
                .await?
                .into_iter()
                .map(|s| (s.athlete_id, s.total_distance_meters))
                .collect();

            for (winner_id, loser_id) in
                detect_crossings(&current, &previous, category.min_distance_meters)
            {
                // A user deleted mid-cycle may still have activity rows
                let (Some(winner), Some(loser)) =
                    (user_map.get(&winner_id), user_map.get(&loser_id))
                else {
                    continue;
                };

                let (winner_message, loser_message) = {
                    let mut rng = self.rng.lock().expect("detector rng lock poisoned");
                    (
                        pick_message(
                            OVERTOOK_MESSAGES,
                            category.name,
                            &loser.display_name(),
                            &mut *rng,
                        ),
                        pick_message(
                            OVERTAKEN_MESSAGES,
                            category.name,
                            &winner.display_name(),
                            &mut *rng,
                        ),
                    )
                };

                let overtook = Notification::crossing(
                    winner_id,
                    NotificationKind::Overtook,
                    loser_id,
                    category.name,
                    winner_message,
                );
                let overtaken = Notification::crossing(
                    loser_id,
                    NotificationKind::Overtaken,
                    winner_id,
                    category.name,
                    loser_message,
                );

                self.store.insert_notification(&overtook).await?;
                self.store.insert_notification(&overtaken).await?;

                tracing::info!(
                    winner = winner_id,
                    loser = loser_id,
                    category = category.name,
                    winner_km = current.get(&winner_id).copied().unwrap_or(0.0) / 1000.0,
                    loser_km = current.get(&loser_id).copied().unwrap_or(0.0) / 1000.0,
                    "Overtake detected"
                );

                emitted.push(overtook);
                emitted.push(overtaken);
            }

            // New baseline for the next cycle, eligible or not
            for (&athlete_id, &total) in &current {
                self.store
                    .set_snapshot(&DistanceSnapshot {
                        athlete_id,
                        category: category.name.to_string(),
                        total_distance_meters: total,
                        updated_at: format_utc_rfc3339(chrono::Utc::now()),
                    })
                    .await?;
            }
        }

        Ok(emitted)
    }
}
