//! Daemon version report from `/version`.

use serde::{Deserialize, Serialize};

/// Version information reported by the daemon.
///
/// `version` is the Engine release; `api_version` is the highest API version
/// the daemon speaks, which is what request URLs are versioned with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "ApiVersion")]
    pub api_version: String,
    /// Oldest API version the daemon still accepts.
    #[serde(rename = "MinAPIVersion", default)]
    pub min_api_version: Option<String>,
    #[serde(rename = "Os", default)]
    pub os: String,
    #[serde(rename = "Arch", default)]
    pub arch: String,
    #[serde(rename = "KernelVersion", default)]
    pub kernel_version: String,
    #[serde(rename = "GoVersion", default)]
    pub go_version: String,
    #[serde(rename = "BuildTime", default)]
    pub build_time: String,
}
