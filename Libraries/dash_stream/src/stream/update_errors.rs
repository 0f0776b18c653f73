use std::collections::BTreeMap;

use crate::error::StreamError;
use crate::types::MediaCategory;

/// Last data-update outcome per category. Only audio and video are kept.
#[derive(Debug, Default, Clone)]
pub struct UpdateErrorMap {
    errors: BTreeMap<MediaCategory, Option<String>>,
}

impl UpdateErrorMap {
    pub fn record(&mut self, category: MediaCategory, error: Option<String>) {
        if category.tracks_update_errors() {
            self.errors.insert(category, error);
        }
    }

    pub fn get(&self, category: MediaCategory) -> Option<&str> {
        self.errors.get(&category).and_then(|e| e.as_deref())
    }

    /// The single error reported with stream initialization, if audio or video failed.
    pub fn aggregate(&self) -> Option<StreamError> {
        let categories: Vec<MediaCategory> = self
            .errors
            .iter()
            .filter(|(_, error)| error.is_some())
            .map(|(category, _)| *category)
            .collect();
        if categories.is_empty() {
            None
        } else {
            Some(StreamError::DataUpdateFailed { categories })
        }
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}
