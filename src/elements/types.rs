use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::tle::{checksum, format_decimal_point, format_implied_decimal};

/// Mean orbital elements of one tracked object, as carried by a two-line element set.
///
/// Angles are in degrees and mean motion in revolutions per day, exactly as written
/// in the element lines. An `ElementSet` is never mutated after parsing; a fresher
/// set replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ElementSet {
    pub name: String,
    pub norad_id: u32,
    pub classification: String,
    pub international_designator: String,
    pub epoch: DateTime<Utc>,
    /// First derivative of mean motion divided by two (rev/day²).
    pub mean_motion_dot: f64,
    /// Second derivative of mean motion divided by six (rev/day³).
    pub mean_motion_ddot: f64,
    /// B* drag term (1/earth radii).
    pub drag_term: f64,
    pub element_set_number: u32,
    pub inclination_deg: f64,
    pub right_ascension_deg: f64,
    pub eccentricity: f64,
    pub argument_of_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    pub mean_motion_rev_per_day: f64,
    pub revolution_number: u32,
}

impl ElementSet {
    /// Orbital period in minutes.
    pub fn period_minutes(&self) -> f64 {
        1440.0 / self.mean_motion_rev_per_day
    }

    /// Age of the element set at `instant`, negative before the epoch.
    pub fn age_days(&self, instant: DateTime<Utc>) -> f64 {
        (instant - self.epoch).num_milliseconds() as f64 / 86_400_000.0
    }

    /// Serialize back into the fixed-format element lines, with fresh checksums.
    pub fn to_lines(&self) -> (String, String) {
        let year = self.epoch.year();
        let year_start = Utc
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(self.epoch);
        let elapsed = self.epoch - year_start;
        let day = 1.0
            + elapsed
                .num_nanoseconds()
                .map(|ns| ns as f64 / 86_400e9)
                .unwrap_or_else(|| elapsed.num_milliseconds() as f64 / 86_400e3);

        let body1 = format!(
            "1 {:05}{} {:<8} {:02}{:012.8} {} {} {} 0 {:>4}",
            self.norad_id % 100_000,
            self.classification.chars().next().unwrap_or('U'),
            self.international_designator,
            year.rem_euclid(100),
            day,
            format_decimal_point(self.mean_motion_dot),
            format_implied_decimal(self.mean_motion_ddot),
            format_implied_decimal(self.drag_term),
            self.element_set_number % 10_000,
        );

        let eccentricity = (self.eccentricity * 1e7).round() as u32;
        let body2 = format!(
            "2 {:05} {:>8.4} {:>8.4} {:07} {:>8.4} {:>8.4} {:>11.8}{:>5}",
            self.norad_id % 100_000,
            self.inclination_deg,
            self.right_ascension_deg,
            eccentricity.min(9_999_999),
            self.argument_of_perigee_deg,
            self.mean_anomaly_deg,
            self.mean_motion_rev_per_day,
            self.revolution_number % 100_000,
        );

        let line1 = format!("{body1}{}", checksum(&body1));
        let line2 = format!("{body2}{}", checksum(&body2));
        (line1, line2)
    }
}
