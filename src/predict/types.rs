use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// A complete pass of the tracked object over the ground station.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PassEvent {
    pub rise: DateTime<Utc>,
    pub culmination: DateTime<Utc>,
    pub set: DateTime<Utc>,
    /// Maximum elevation reached between rise and set.
    pub peak_elevation_deg: f64,
    pub rise_azimuth_deg: f64,
    pub culmination_azimuth_deg: f64,
    pub set_azimuth_deg: f64,
    pub culmination_range_km: f64,
    /// Negative while approaching; absent when the source has no velocity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rise_range_rate_km_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_range_rate_km_s: Option<f64>,
    pub duration_seconds: i64,
}

