//! Image inspection payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::null_as_default;

/// One layer in an image's build history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHistoryEntry {
    /// Layer identifier, or `"<missing>"` for layers built elsewhere.
    #[serde(rename = "Id")]
    pub id: String,
    /// Creation time as a Unix timestamp.
    #[serde(rename = "Created")]
    pub created: i64,
    /// Command that produced the layer.
    #[serde(rename = "CreatedBy")]
    pub created_by: String,
    /// Tags pointing at the layer. The daemon sends `null` when empty.
    #[serde(rename = "Tags", deserialize_with = "null_as_default", default)]
    pub tags: Vec<String>,
    #[serde(rename = "Size")]
    pub size: i64,
    #[serde(rename = "Comment", default)]
    pub comment: String,
}

impl ImageHistoryEntry {
    /// Creation time as an aware UTC datetime.
    pub fn created_date(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }

    /// Layer identifier truncated to ten characters.
    pub fn short_id(&self) -> &str {
        self.id.get(..10).unwrap_or(&self.id)
    }
}
