use std::f64::consts::TAU;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::predict::ground_station::{GroundStation, EARTH_ROTATION_RAD_S};
use crate::predict::propagator::StateVector;

const UNIX_EPOCH_JULIAN_DATE: f64 = 2_440_587.5;
const J2000_JULIAN_DATE: f64 = 2_451_545.0;

/// Look angles from a ground station to the tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Observation {
    /// Clockwise from true north, in [0, 360).
    pub azimuth_deg: f64,
    /// Above the local horizontal plane, in [-90, 90].
    pub elevation_deg: f64,
    pub range_km: f64,
    /// Positive when the object moves away from the station.
    pub range_rate_km_s: Option<f64>,
}

pub fn julian_date(instant: DateTime<Utc>) -> f64 {
    instant.timestamp_micros() as f64 / 86_400e6 + UNIX_EPOCH_JULIAN_DATE
}

/// Greenwich mean sidereal time (IAU-82) in radians.
pub fn gmst(instant: DateTime<Utc>) -> f64 {
    let tut1 = (julian_date(instant) - J2000_JULIAN_DATE) / 36_525.0;
    let seconds = -6.2e-6 * tut1 * tut1 * tut1
        + 0.093_104 * tut1 * tut1
        + (876_600.0 * 3600.0 + 8_640_184.812_866) * tut1
        + 67_310.548_41;
    (seconds.to_radians() / 240.0).rem_euclid(TAU)
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let (sin_gmst, cos_gmst) = gmst.sin_cos();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

pub fn teme_to_ecef_velocity(pos_teme: [f64; 3], vel_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let pos = teme_to_ecef_position(pos_teme, gmst);
    let rotated = teme_to_ecef_position(vel_teme, gmst);
    let rotation = [
        -EARTH_ROTATION_RAD_S * pos[1],
        EARTH_ROTATION_RAD_S * pos[0],
        0.0,
    ];
    [
        rotated[0] - rotation[0],
        rotated[1] - rotation[1],
        rotated[2] - rotation[2],
    ]
}

pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let (sin_lat, cos_lat) = lat_rad.sin_cos();
    let (sin_lon, cos_lon) = lon_rad.sin_cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}

/// Look angles to a TEME position at `instant`.
pub fn observe(position_teme: [f64; 3], station: &GroundStation, instant: DateTime<Utc>) -> Observation {
    let sat_ecef = teme_to_ecef_position(position_teme, gmst(instant));
    look_angles(sat_ecef, station)
}

/// Look angles plus range rate for a full state vector.
///
/// The velocity is taken into the Earth-fixed frame, where the station is at rest.
pub fn observe_state(
    state: &StateVector,
    station: &GroundStation,
    instant: DateTime<Utc>,
) -> Observation {
    let sidereal = gmst(instant);
    let sat_ecef = teme_to_ecef_position(state.position, sidereal);
    let sat_vel_ecef = teme_to_ecef_velocity(state.position, state.velocity, sidereal);

    let mut observation = look_angles(sat_ecef, station);
    if observation.range_km > 0.0 {
        let sta_ecef = station.position_ecef_km();
        let range = observation.range_km;
        observation.range_rate_km_s = Some(
            (0..3)
                .map(|i| sat_vel_ecef[i] * (sat_ecef[i] - sta_ecef[i]) / range)
                .sum(),
        );
    }
    observation
}

fn look_angles(sat_ecef: [f64; 3], station: &GroundStation) -> Observation {
    let sta_ecef = station.position_ecef_km();
    let dr = [
        sat_ecef[0] - sta_ecef[0],
        sat_ecef[1] - sta_ecef[1],
        sat_ecef[2] - sta_ecef[2],
    ];
    let range_km = (dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]).sqrt();

    let (east, north, up) = ecef_to_enu(dr, station.lat_rad(), station.lon_rad());
    let azimuth_deg = east.atan2(north).to_degrees().rem_euclid(360.0);
    let elevation_deg = if range_km > 0.0 {
        (up / range_km).clamp(-1.0, 1.0).asin().to_degrees()
    } else {
        0.0
    };

    Observation {
        azimuth_deg,
        elevation_deg,
        range_km,
        range_rate_km_s: None,
    }
}
