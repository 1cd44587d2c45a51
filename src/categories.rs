// SPDX-License-Identifier: MIT

//! Activity categories used for aggregation and overtake notifications.
//!
//! Each category groups a set of raw Strava activity types (a trail run
//! counts as a run) and carries a minimum cumulative distance below which a
//! user does not participate in overtake detection. The configuration is
//! immutable: it is built once at startup and shared by reference.

/// A single activity category.
#[derive(Debug, Clone)]
pub struct Category {
    /// Canonical name ("Run", "Ride", "Swim")
    pub name: &'static str,
    /// Raw Strava activity types aggregated under this category
    pub raw_types: &'static [&'static str],
    /// Minimum cumulative distance (meters) to participate in
    /// overtake notifications
    pub min_distance_meters: f64,
}

impl Category {
    /// Whether a raw Strava activity type belongs to this category.
    pub fn matches(&self, raw_type: &str) -> bool {
        self.raw_types.contains(&raw_type)
    }
}

/// The fixed set of categories, built once at startup.
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    categories: Vec<Category>,
}

impl CategoryConfig {
    /// The standard Run / Ride / Swim configuration.
    pub fn standard() -> Self {
        Self {
            categories: vec![
                Category {
                    name: "Run",
                    raw_types: &["Run", "TrailRun"],
                    min_distance_meters: 10_000.0,
                },
                Category {
                    name: "Ride",
                    raw_types: &[
                        "Ride",
                        "MountainBikeRide",
                        "GravelRide",
                        "EBikeRide",
                        "VirtualRide",
                    ],
                    min_distance_meters: 20_000.0,
                },
                Category {
                    name: "Swim",
                    raw_types: &["Swim"],
                    min_distance_meters: 1_000.0,
                },
            ],
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Look up a category by canonical name.
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Find the category a raw Strava activity type belongs to, if any.
    pub fn category_for_type(&self, raw_type: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.matches(raw_type))
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trail_run_counts_as_run() {
        let config = CategoryConfig::standard();
        let category = config.category_for_type("TrailRun").expect("should match");
        assert_eq!(category.name, "Run");
    }

    #[test]
    fn test_virtual_ride_counts_as_ride() {
        let config = CategoryConfig::standard();
        let category = config.category_for_type("VirtualRide").expect("should match");
        assert_eq!(category.name, "Ride");
    }

    #[test]
    fn test_unknown_type_has_no_category() {
        let config = CategoryConfig::standard();
        assert!(config.category_for_type("Yoga").is_none());
    }

    #[test]
    fn test_thresholds() {
        let config = CategoryConfig::standard();
        assert_eq!(config.get("Run").unwrap().min_distance_meters, 10_000.0);
        assert_eq!(config.get("Ride").unwrap().min_distance_meters, 20_000.0);
        assert_eq!(config.get("Swim").unwrap().min_distance_meters, 1_000.0);
    }

    #[test]
    fn test_category_names_unique() {
        let config = CategoryConfig::standard();
        let mut seen = std::collections::HashSet::new();
        for category in config.categories() {
            assert!(seen.insert(category.name), "duplicate: {}", category.name);
        }
    }
}
