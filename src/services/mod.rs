// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod overtake;
pub mod scheduler;
pub mod strava;
pub mod sync;
pub mod token;

pub use overtake::OvertakeDetector;
pub use scheduler::{CycleOutcome, SyncScheduler};
pub use strava::{ActivityFeed, CredentialRefresher, StravaClient};
