use serde::{Deserialize, Serialize};

/// One tracked object's close-approach data for a given date.
///
/// `id` is the stable NeoWs reference id and the storage primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asteroid {
    pub id: i64,
    pub codename: String,
    /// ISO-8601 `YYYY-MM-DD`, so plain string comparison orders by date.
    pub close_approach_date: String,
    pub absolute_magnitude: f64,
    pub estimated_diameter_km: f64,
    pub relative_velocity_km_s: f64,
    pub distance_from_earth_au: f64,
    pub is_potentially_hazardous: bool,
}

impl Asteroid {
    pub fn hazard_label(&self) -> &'static str {
        if self.is_potentially_hazardous {
            "hazardous"
        } else {
            "safe"
        }
    }
}
