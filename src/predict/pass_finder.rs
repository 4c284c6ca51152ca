use std::ops::ControlFlow;

use chrono::{DateTime, Duration, Utc};

use crate::elements::ElementSet;
use crate::predict::error::PredictError;
use crate::predict::ground_station::GroundStation;
use crate::predict::propagator::Propagator;
use crate::predict::topocentric::{observe, observe_state, Observation};
use crate::predict::types::PassEvent;

const DEFAULT_STEP_SECONDS: i64 = 30;
const DEFAULT_PRECISION_MS: i64 = 500;
const HORIZON_ELEVATION: f64 = 0.0;
const INV_GOLDEN_RATIO: f64 = 0.618_033_988_749_894_9;
/// The culmination is resolved this many times finer than the crossings.
const CULMINATION_REFINEMENT: f64 = 10.0;

/// Anything that can report look angles at an instant.
pub trait ElevationSource {
    fn look(&self, instant: DateTime<Utc>) -> Result<Observation, PredictError>;

    /// Range rate at `instant`, for sources that know the object's velocity.
    fn range_rate(&self, _instant: DateTime<Utc>) -> Result<Option<f64>, PredictError> {
        Ok(None)
    }
}

/// Propagated element set seen from a ground station.
#[derive(Debug, Clone)]
pub struct Observer {
    propagator: Propagator,
    station: GroundStation,
}

impl Observer {
    pub fn new(elements: &ElementSet, station: GroundStation) -> Result<Self, PredictError> {
        Ok(Self {
            propagator: Propagator::new(elements)?,
            station,
        })
    }
}

impl ElevationSource for Observer {
    fn look(&self, instant: DateTime<Utc>) -> Result<Observation, PredictError> {
        let state = self.propagator.propagate(instant)?;
        Ok(observe(state.position, &self.station, instant))
    }

    fn range_rate(&self, instant: DateTime<Utc>) -> Result<Option<f64>, PredictError> {
        let state = self.propagator.propagate(instant)?;
        Ok(observe_state(&state, &self.station, instant).range_rate_km_s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    /// Coarse sampling interval.
    pub step: Duration,
    /// Crossings are refined until bracketed this tightly.
    pub precision: Duration,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            step: Duration::seconds(DEFAULT_STEP_SECONDS),
            precision: Duration::milliseconds(DEFAULT_PRECISION_MS),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    instant: DateTime<Utc>,
    observation: Observation,
}

impl Sample {
    fn elevation(&self) -> f64 {
        self.observation.elevation_deg
    }

    fn visible(&self) -> bool {
        self.elevation() > HORIZON_ELEVATION
    }
}

enum ScanState {
    /// Window opened mid-pass; wait for the object to set before looking for rises.
    Straddling,
    Searching,
    InPass { rise: Sample, best: Sample },
}

/// Find every complete pass in `[start, end]` whose peak reaches `min_peak_elevation_deg`.
pub fn find_passes(
    elements: &ElementSet,
    station: &GroundStation,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    min_peak_elevation_deg: f64,
    settings: &DetectorSettings,
) -> Result<Vec<PassEvent>, PredictError> {
    let observer = Observer::new(elements, *station)?;
    let passes = find_passes_from(&observer, start, end, min_peak_elevation_deg, settings)?;
    log::debug!(
        "Found {} passes of {} between {start} and {end}",
        passes.len(),
        elements.name
    );
    Ok(passes)
}

/// First qualifying pass in `[start, end]`, stopping the scan as soon as it is found.
pub fn next_pass(
    elements: &ElementSet,
    station: &GroundStation,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    min_peak_elevation_deg: f64,
    settings: &DetectorSettings,
) -> Result<Option<PassEvent>, PredictError> {
    let observer = Observer::new(elements, *station)?;
    let mut first = None;
    scan(&observer, start, end, min_peak_elevation_deg, settings, |pass| {
        first = Some(pass);
        ControlFlow::Break(())
    })?;
    Ok(first)
}

pub fn find_passes_from<S: ElevationSource + ?Sized>(
    source: &S,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    min_peak_elevation_deg: f64,
    settings: &DetectorSettings,
) -> Result<Vec<PassEvent>, PredictError> {
    let mut passes = Vec::new();
    scan(source, start, end, min_peak_elevation_deg, settings, |pass| {
        passes.push(pass);
        ControlFlow::Continue(())
    })?;
    Ok(passes)
}

/// Walk the window at the coarse step, handing each qualifying pass to `on_pass`
/// in rise order until it asks to stop.
pub fn scan<S, F>(
    source: &S,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    min_peak_elevation_deg: f64,
    settings: &DetectorSettings,
    mut on_pass: F,
) -> Result<(), PredictError>
where
    S: ElevationSource + ?Sized,
    F: FnMut(PassEvent) -> ControlFlow<()>,
{
    if end <= start {
        return Ok(());
    }
    let step = settings.step.max(Duration::milliseconds(1));
    let precision = settings.precision.max(Duration::milliseconds(1));

    let mut previous = sample(source, start)?;
    let mut state = if previous.visible() {
        ScanState::Straddling
    } else {
        ScanState::Searching
    };
    let mut instant = start;

    while instant < end {
        // The final sample lands exactly on the window end.
        instant = instant
            .checked_add_signed(step)
            .map_or(end, |next| next.min(end));
        let current = sample(source, instant)?;

        state = match (state, current.visible()) {
            (ScanState::Straddling, true) => ScanState::Straddling,
            (ScanState::Straddling | ScanState::Searching, false) => ScanState::Searching,
            (ScanState::Searching, true) => ScanState::InPass {
                rise: refine_crossing(source, previous, current, precision)?,
                best: current,
            },
            (ScanState::InPass { rise, best }, true) => ScanState::InPass {
                rise,
                best: if current.elevation() > best.elevation() {
                    current
                } else {
                    best
                },
            },
            (ScanState::InPass { rise, best }, false) => {
                let set = refine_crossing(source, previous, current, precision)?;
                let pass = close_pass(source, rise, best, set, step, precision)?;
                if let Some(pass) = pass.filter(|p| p.peak_elevation_deg >= min_peak_elevation_deg) {
                    if on_pass(pass).is_break() {
                        return Ok(());
                    }
                }
                ScanState::Searching
            }
        };
        previous = current;
    }

    if let ScanState::InPass { rise, .. } = state {
        log::debug!("Pass rising at {} still in progress at {end}, dropped", rise.instant);
    }
    Ok(())
}

fn sample<S: ElevationSource + ?Sized>(
    source: &S,
    instant: DateTime<Utc>,
) -> Result<Sample, PredictError> {
    Ok(Sample {
        instant,
        observation: source.look(instant)?,
    })
}

/// Bisect between two samples on opposite sides of the horizon.
/// Returns the visible sample closest to the crossing.
fn refine_crossing<S: ElevationSource + ?Sized>(
    source: &S,
    mut before: Sample,
    mut after: Sample,
    precision: Duration,
) -> Result<Sample, PredictError> {
    let rising = after.visible();
    while after.instant - before.instant > precision {
        let probe = sample(source, before.instant + (after.instant - before.instant) / 2)?;
        if probe.visible() == rising {
            after = probe;
        } else {
            before = probe;
        }
    }
    Ok(if rising { after } else { before })
}

fn close_pass<S: ElevationSource + ?Sized>(
    source: &S,
    rise: Sample,
    best: Sample,
    set: Sample,
    step: Duration,
    precision: Duration,
) -> Result<Option<PassEvent>, PredictError> {
    let low = (best.instant - step).max(rise.instant);
    let high = (best.instant + step).min(set.instant);
    let peak = culminate(source, low, high, precision)?;
    let culmination = if peak.elevation() >= best.elevation() {
        peak
    } else {
        best
    };

    let ordered = rise.instant < culmination.instant && culmination.instant < set.instant;
    let dominant = culmination.elevation() >= rise.elevation().max(set.elevation());
    if !ordered || !dominant {
        log::debug!(
            "Discarding degenerate pass between {} and {}",
            rise.instant,
            set.instant
        );
        return Ok(None);
    }

    Ok(Some(PassEvent {
        rise: rise.instant,
        culmination: culmination.instant,
        set: set.instant,
        peak_elevation_deg: culmination.elevation(),
        rise_azimuth_deg: rise.observation.azimuth_deg,
        culmination_azimuth_deg: culmination.observation.azimuth_deg,
        set_azimuth_deg: set.observation.azimuth_deg,
        culmination_range_km: culmination.observation.range_km,
        rise_range_rate_km_s: source.range_rate(rise.instant)?,
        set_range_rate_km_s: source.range_rate(set.instant)?,
        duration_seconds: (set.instant - rise.instant).num_seconds(),
    }))
}

/// Golden-section search for the highest elevation in `[low, high]`.
fn culminate<S: ElevationSource + ?Sized>(
    source: &S,
    low: DateTime<Utc>,
    high: DateTime<Utc>,
    precision: Duration,
) -> Result<Sample, PredictError> {
    let tolerance = seconds(precision) / CULMINATION_REFINEMENT;
    let at = |offset: f64| {
        sample(
            source,
            low + Duration::microseconds((offset * 1e6).round() as i64),
        )
    };

    let (mut a, mut b) = (0.0, seconds(high - low));
    let mut c = b - INV_GOLDEN_RATIO * (b - a);
    let mut d = a + INV_GOLDEN_RATIO * (b - a);
    let mut at_c = at(c)?;
    let mut at_d = at(d)?;

    while b - a > tolerance {
        if at_c.elevation() > at_d.elevation() {
            b = d;
            d = c;
            at_d = at_c;
            c = b - INV_GOLDEN_RATIO * (b - a);
            at_c = at(c)?;
        } else {
            a = c;
            c = d;
            at_c = at_d;
            d = a + INV_GOLDEN_RATIO * (b - a);
            at_d = at(d)?;
        }
    }

    Ok(if at_c.elevation() > at_d.elevation() {
        at_c
    } else {
        at_d
    })
}

fn seconds(duration: Duration) -> f64 {
    match duration.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => duration.num_milliseconds() as f64 / 1e3,
    }
}
