use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::error::ElementError;
use super::tle::lookup;
use super::types::ElementSet;
use crate::shared::Latest;

/// Element text as last supplied by the fetch collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSnapshot {
    pub text: String,
    pub updated_at: DateTime<Utc>,
}

impl ElementSnapshot {
    pub fn resolve(&self, identifier: &str) -> Result<ElementSet, ElementError> {
        lookup(&self.text, identifier)
    }
}

/// Current element text for the tracked object.
///
/// Text is replaced as a whole; predictions resolve their element set from one
/// snapshot, so a refresh racing a prediction is seen either entirely or not at all.
#[derive(Debug, Default)]
pub struct ElementStore {
    current: Latest<Option<Arc<ElementSnapshot>>>,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, text: String, updated_at: DateTime<Utc>) -> Arc<ElementSnapshot> {
        let lines = text.lines().count();
        let snapshot = Arc::new(ElementSnapshot { text, updated_at });
        self.current.replace(Some(snapshot.clone()));
        log::info!("Element text replaced ({lines} lines, updated {updated_at})");
        snapshot
    }

    pub fn snapshot(&self) -> Result<Arc<ElementSnapshot>, ElementError> {
        (*self.current.load()).clone().ok_or_else(|| {
            ElementError::DataUnavailable(
                "no element text loaded; refresh the element source first".into(),
            )
        })
    }

    /// Resolve the element set for `identifier` from the current snapshot.
    pub fn resolve(&self, identifier: &str) -> Result<ElementSet, ElementError> {
        self.snapshot()?.resolve(identifier)
    }
}
