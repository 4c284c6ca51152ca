use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const EARTH_ROTATION_RAD_S: f64 = 7.292_115e-5;

// WGS-84 ellipsoid
const EQUATORIAL_RADIUS_KM: f64 = 6378.137;
const ECCENTRICITY_SQUARED: f64 = 0.006_694_379_990_14;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GroundStation {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    /// Height above the WGS-84 ellipsoid.
    #[serde(default)]
    pub altitude_m: f64,
}

impl GroundStation {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }

    /// Parse `"lat, lon"` in decimal degrees.
    pub fn from_coordinates(coordinates: &str, altitude_m: Option<f64>) -> Option<Self> {
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 {
            return None;
        }
        let lat = parts[0].parse().ok()?;
        let lon = parts[1].parse().ok()?;
        let station = Self::new(lat, lon, altitude_m.unwrap_or(0.0));
        station.is_valid().then_some(station)
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude_deg)
            && (-180.0..=180.0).contains(&self.longitude_deg)
            && self.altitude_m.is_finite()
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        let (sin_lat, cos_lat) = self.lat_rad().sin_cos();
        let (sin_lon, cos_lon) = self.lon_rad().sin_cos();
        let n = EQUATORIAL_RADIUS_KM / (1.0 - ECCENTRICITY_SQUARED * sin_lat * sin_lat).sqrt();
        let alt_km = self.altitude_m / 1000.0;
        [
            (n + alt_km) * cos_lat * cos_lon,
            (n + alt_km) * cos_lat * sin_lon,
            (n * (1.0 - ECCENTRICITY_SQUARED) + alt_km) * sin_lat,
        ]
    }
}
