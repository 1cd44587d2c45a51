// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod activity;
pub mod notification;
pub mod snapshot;
pub mod user;

pub use activity::Activity;
pub use notification::{Notification, NotificationKind};
pub use snapshot::DistanceSnapshot;
pub use user::{StravaTokens, User};
