//! Activity Event Models
//!
//! Raw usage events handed over by the service layer, and the normalized
//! day-bounded form the merge engine consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// One offline app usage record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppActivity {
    pub application: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Offline app usage reported in bulk by a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppActivityBatch {
    /// Device clock reading at the time the batch was sent
    pub device_date_time: DateTime<Utc>,

    #[serde(default)]
    pub device_id: Option<Uuid>,

    pub activities: Vec<AppActivity>,
}

/// A categorized network hit reported in near real time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkActivityEvent {
    pub categories: BTreeSet<String>,

    pub url: String,

    /// Time of the hit; server time is used when absent
    #[serde(default)]
    pub event_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub device_id: Option<Uuid>,
}

impl NetworkActivityEvent {
    pub fn new<I, S>(categories: I, url: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            url: url.to_string(),
            event_time: None,
            device_id: None,
        }
    }

    pub fn at(mut self, event_time: DateTime<Utc>) -> Self {
        self.event_time = Some(event_time);
        self
    }

    pub fn from_device(mut self, device_id: Uuid) -> Self {
        self.device_id = Some(device_id);
        self
    }
}

/// Truncate a URL to at most `max_chars` characters
pub fn truncate_url(url: &str, max_chars: usize) -> String {
    match url.char_indices().nth(max_chars) {
        Some((byte_index, _)) => url[..byte_index].to_string(),
        None => url.to_string(),
    }
}

/// An event corrected for clock drift and confined to one calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub device_id: Option<Uuid>,
    pub app: Option<String>,
    pub url: Option<String>,
}
