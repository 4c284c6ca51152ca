use chrono::{DateTime, Duration, Utc};

use crate::config::TrackingConfiguration;
use crate::elements::ElementStore;
use crate::predict::error::PredictError;
use crate::predict::pass_finder::{find_passes, next_pass, DetectorSettings};
use crate::predict::types::PassEvent;

/// Pass predictions for the configured object from the current element text.
///
/// Each call resolves the element set afresh and reads the tracking
/// configuration it was built with, so callers pass in whatever snapshot is
/// current at the time of the request.
pub struct Forecast<'a> {
    pub elements: &'a ElementStore,
    pub tracking: &'a TrackingConfiguration,
    pub settings: DetectorSettings,
}

impl Forecast<'_> {
    /// Passes from `now` over `days` (default: the configured horizon) peaking
    /// at least `min_peak_elevation_deg` (default: the configured threshold).
    pub fn passes(
        &self,
        now: DateTime<Utc>,
        days: Option<u32>,
        min_peak_elevation_deg: Option<f64>,
    ) -> Result<Vec<PassEvent>, PredictError> {
        let elements = self.elements.resolve(&self.tracking.identifier)?;
        let horizon = days
            .map(|d| Duration::days(i64::from(d)))
            .unwrap_or_else(|| self.tracking.horizon());
        let passes = find_passes(
            &elements,
            &self.tracking.station,
            now,
            window_end(now, horizon)?,
            min_peak_elevation_deg.unwrap_or(self.tracking.min_peak_elevation_deg),
            &self.settings,
        )?;
        log::info!(
            "{} passes of {} over the next {}",
            passes.len(),
            elements.name,
            humantime::format_duration(horizon.to_std().unwrap_or_default())
        );
        Ok(passes)
    }

    pub fn next(&self, now: DateTime<Utc>) -> Result<Option<PassEvent>, PredictError> {
        let elements = self.elements.resolve(&self.tracking.identifier)?;
        next_pass(
            &elements,
            &self.tracking.station,
            now,
            window_end(now, self.tracking.horizon())?,
            self.tracking.min_peak_elevation_deg,
            &self.settings,
        )
    }
}

fn window_end(start: DateTime<Utc>, horizon: Duration) -> Result<DateTime<Utc>, PredictError> {
    start
        .checked_add_signed(horizon)
        .ok_or(PredictError::Window {
            start,
            days: horizon.num_days(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::fixtures::{CATALOG, ISS};
    use crate::elements::{parse, ElementError};

    fn tracking() -> TrackingConfiguration {
        TrackingConfiguration {
            identifier: "ISS".into(),
            min_peak_elevation_deg: 0.0,
            horizon_days: 1,
            ..Default::default()
        }
    }

    #[test]
    fn predicts_from_loaded_text() {
        let store = ElementStore::new();
        store.replace(CATALOG.to_string(), Utc::now());
        let tracking = tracking();
        let forecast = Forecast {
            elements: &store,
            tracking: &tracking,
            settings: DetectorSettings::default(),
        };
        let epoch = parse(ISS).unwrap().epoch;

        let passes = forecast.passes(epoch, None, None).unwrap();
        assert!(!passes.is_empty());
        assert_eq!(forecast.next(epoch).unwrap().as_ref(), passes.first());

        let high = forecast.passes(epoch, None, Some(45.0)).unwrap();
        assert!(high.iter().all(|p| p.peak_elevation_deg >= 45.0));
        assert!(high.len() <= passes.len());

        let longer = forecast.passes(epoch, Some(2), None).unwrap();
        assert!(longer.len() >= passes.len());
    }

    #[test]
    fn unrepresentable_window_is_an_error() {
        let store = ElementStore::new();
        store.replace(CATALOG.to_string(), Utc::now());
        // Built directly, so never validated.
        let tracking = TrackingConfiguration {
            horizon_days: 4_000_000_000,
            ..tracking()
        };
        let forecast = Forecast {
            elements: &store,
            tracking: &tracking,
            settings: DetectorSettings::default(),
        };
        assert!(matches!(
            forecast.next(Utc::now()),
            Err(PredictError::Window { .. })
        ));
        assert!(matches!(
            forecast.passes(DateTime::<Utc>::MAX_UTC, Some(1), None),
            Err(PredictError::Window { days: 1, .. })
        ));
    }

    #[test]
    fn reports_missing_data() {
        let store = ElementStore::new();
        let mut tracking = tracking();
        let forecast = Forecast {
            elements: &store,
            tracking: &tracking,
            settings: DetectorSettings::default(),
        };
        assert!(matches!(
            forecast.next(Utc::now()),
            Err(PredictError::Elements(ElementError::DataUnavailable(_)))
        ));

        store.replace(CATALOG.to_string(), Utc::now());
        tracking.identifier = "HUBBLE".into();
        let forecast = Forecast {
            elements: &store,
            tracking: &tracking,
            settings: DetectorSettings::default(),
        };
        assert!(matches!(
            forecast.passes(Utc::now(), None, None),
            Err(PredictError::Elements(ElementError::NotFound(_)))
        ));
    }
}
