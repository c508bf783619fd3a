use std::fmt;

use serde::{Deserialize, Deserializer};

/// Torrent states reported by the qBittorrent WebUI API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "String")]
pub enum TorrentState {
    Error,
    MissingFiles,
    Uploading,
    PausedUp,
    StoppedUp,
    QueuedUp,
    StalledUp,
    CheckingUp,
    ForcedUp,
    Allocating,
    Downloading,
    MetaDl,
    ForcedMetaDl,
    PausedDl,
    StoppedDl,
    QueuedDl,
    ForcedDl,
    StalledDl,
    CheckingDl,
    CheckingResumeData,
    Moving,
    #[default]
    Unknown,
}

impl TorrentState {
    pub const ALL: [TorrentState; 22] = [
        Self::Error,
        Self::MissingFiles,
        Self::Uploading,
        Self::PausedUp,
        Self::StoppedUp,
        Self::QueuedUp,
        Self::StalledUp,
        Self::CheckingUp,
        Self::ForcedUp,
        Self::Allocating,
        Self::Downloading,
        Self::MetaDl,
        Self::ForcedMetaDl,
        Self::PausedDl,
        Self::StoppedDl,
        Self::QueuedDl,
        Self::ForcedDl,
        Self::StalledDl,
        Self::CheckingDl,
        Self::CheckingResumeData,
        Self::Moving,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::MissingFiles => "missingFiles",
            Self::Uploading => "uploading",
            Self::PausedUp => "pausedUP",
            Self::StoppedUp => "stoppedUP",
            Self::QueuedUp => "queuedUP",
            Self::StalledUp => "stalledUP",
            Self::CheckingUp => "checkingUP",
            Self::ForcedUp => "forcedUP",
            Self::Allocating => "allocating",
            Self::Downloading => "downloading",
            Self::MetaDl => "metaDL",
            Self::ForcedMetaDl => "forcedMetaDL",
            Self::PausedDl => "pausedDL",
            Self::StoppedDl => "stoppedDL",
            Self::QueuedDl => "queuedDL",
            Self::ForcedDl => "forcedDL",
            Self::StalledDl => "stalledDL",
            Self::CheckingDl => "checkingDL",
            Self::CheckingResumeData => "checkingResumeData",
            Self::Moving => "moving",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == value)
            .unwrap_or(Self::Unknown)
    }
}

impl From<String> for TorrentState {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl fmt::Display for TorrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `server_state` section of `/api/v2/sync/maindata`. Absent fields read as
/// zero or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerState {
    #[serde(deserialize_with = "lenient_string")]
    pub connection_status: String,
    #[serde(deserialize_with = "non_negative")]
    pub dht_nodes: u64,
    #[serde(deserialize_with = "non_negative")]
    pub dl_info_data: u64,
    #[serde(deserialize_with = "non_negative")]
    pub up_info_data: u64,
    #[serde(deserialize_with = "non_negative")]
    pub alltime_dl: u64,
    #[serde(deserialize_with = "non_negative")]
    pub alltime_ul: u64,
    #[serde(deserialize_with = "non_negative")]
    pub total_peer_connections: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MainData {
    pub server_state: ServerState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusPayload {
    pub server_state: ServerState,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CategoryInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "savePath", deserialize_with = "lenient_string")]
    pub save_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Torrent {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(deserialize_with = "lenient_state")]
    pub state: TorrentState,
    #[serde(deserialize_with = "non_negative")]
    pub size: u64,
    #[serde(deserialize_with = "non_negative")]
    pub downloaded: u64,
    #[serde(deserialize_with = "non_negative")]
    pub uploaded: u64,
}

fn non_negative<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let number = match value {
        serde_json::Value::Number(number) => number,
        _ => return Ok(0),
    };

    if let Some(value) = number.as_u64() {
        return Ok(value);
    }
    if number.as_i64().is_some() {
        return Ok(0);
    }
    Ok(number
        .as_f64()
        .filter(|value| value.is_finite() && *value > 0.0)
        .map(|value| value.min(u64::MAX as f64) as u64)
        .unwrap_or(0))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(value) => value,
        _ => String::new(),
    })
}

fn lenient_state<'de, D>(deserializer: D) -> Result<TorrentState, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer).map(|value| TorrentState::parse(&value))
}
