mod error;
mod forecast;
mod ground_station;
mod pass_finder;
mod propagator;
mod topocentric;
mod types;

pub use error::{PredictError, PropagationError};
pub use forecast::Forecast;
pub use ground_station::GroundStation;
pub use pass_finder::{
    find_passes, find_passes_from, next_pass, scan, DetectorSettings, ElevationSource, Observer,
};
pub use propagator::{propagate, Propagator, StateVector};
pub use topocentric::{gmst, observe, observe_state, Observation};
pub use types::PassEvent;
