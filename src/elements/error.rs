use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElementError {
    #[error("element data unavailable: {0}")]
    DataUnavailable(String),
    #[error("object {0:?} not found in element text")]
    NotFound(String),
    #[error("invalid element line {line}: {message}")]
    Parse { line: u8, message: String },
}

impl ElementError {
    pub(crate) fn parse(line: u8, message: impl Into<String>) -> Self {
        ElementError::Parse {
            line,
            message: message.into(),
        }
    }
}
