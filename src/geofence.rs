//! Geofence region
//!
//! The tracked area is a single latitude/longitude rectangle. Every edge is inclusive,
//! so an aircraft sitting exactly on a boundary counts as inside.

use serde::{Deserialize, Serialize};

/// Rectangular region of interest in WGS84 degrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Display name used in alert messages (e.g., "Nigeria")
    #[serde(default = "default_region_name")]
    pub name: String,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

fn default_region_name() -> String {
    "Nigeria".to_string()
}

impl Default for Region {
    fn default() -> Self {
        Self {
            name: default_region_name(),
            min_lat: 4.0,
            max_lat: 14.0,
            min_lon: 2.7,
            max_lon: 14.6,
        }
    }
}

impl Region {
    /// Create a new region
    pub fn new(
        name: impl Into<String>,
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    ) -> Self {
        Self {
            name: name.into(),
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Check if a coordinate lies inside the region (edges included)
    ///
    /// NaN never compares inside, so the predicate is total over f64 inputs.
    pub fn inside(&self, lat: f64, lon: f64) -> bool {
        self.min_lat <= lat && lat <= self.max_lat && self.min_lon <= lon && lon <= self.max_lon
    }

    /// Validate the bounds
    pub fn validate(&self) -> Result<(), String> {
        let bounds = [self.min_lat, self.max_lat, self.min_lon, self.max_lon];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err("Region bounds must be finite numbers".to_string());
        }
        if self.min_lat < -90.0 || self.max_lat > 90.0 {
            return Err("Latitude bounds must be between -90 and 90".to_string());
        }
        if self.min_lon < -180.0 || self.max_lon > 180.0 {
            return Err("Longitude bounds must be between -180 and 180".to_string());
        }
        if self.min_lat > self.max_lat {
            return Err(format!(
                "min_lat ({}) must not exceed max_lat ({})",
                self.min_lat, self.max_lat
            ));
        }
        if self.min_lon > self.max_lon {
            return Err(format!(
                "min_lon ({}) must not exceed max_lon ({})",
                self.min_lon, self.max_lon
            ));
        }
        Ok(())
    }
}
