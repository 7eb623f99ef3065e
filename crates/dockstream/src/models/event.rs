//! System event payloads from `/events`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Object an event refers to, with its identifying attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventActor {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Attributes", deserialize_with = "null_as_default", default)]
    pub attributes: HashMap<String, String>,
}

/// One event from the daemon's real-time event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Object type the event concerns (`container`, `image`, `network`, ...).
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Actor", default)]
    pub actor: EventActor,
    #[serde(rename = "time")]
    pub time: i64,
    /// Nanosecond-resolution timestamp.
    #[serde(rename = "timeNano", default)]
    pub time_nano: i64,
    /// Scope of the event, `local` or `swarm`.
    #[serde(rename = "scope", default)]
    pub scope: String,
    /// Legacy top-level fields still emitted by older daemons.
    #[serde(rename = "status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "from", default, skip_serializing_if = "Option::is_none")]
    pub from_image: Option<String>,
}
