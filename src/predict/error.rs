use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::elements::ElementError;

/// Failure of the SGP4 model for a given element set or instant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropagationError {
    #[error("eccentricity {0} outside the valid range")]
    Eccentricity(f64),
    #[error("mean motion must be positive")]
    MeanMotion,
    #[error("semi-latus rectum is negative")]
    SemiLatusRectum,
    #[error("orbit decayed {minutes:.1} minutes after epoch")]
    Decayed { minutes: f64 },
    #[error("deep-space orbit (period {period_minutes:.1} min) is not supported")]
    DeepSpace { period_minutes: f64 },
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Elements(#[from] ElementError),
    #[error("propagation error: {0}")]
    Propagation(#[from] PropagationError),
    #[error("a {days}-day window from {start} is out of range")]
    Window { start: DateTime<Utc>, days: i64 },
}
