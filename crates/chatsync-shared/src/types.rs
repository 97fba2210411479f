use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;

/// Build the client-side id of a message sent to `chat_id`.
///
/// The id is unique per send and embeds the conversation so a stray row can
/// be attributed without a lookup.
pub fn new_client_id(chat_id: &str) -> String {
    format!("_{}_{}", Uuid::new_v4().simple(), chat_id)
}

/// Image resolution hint forwarded to the server with every chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ImageResolution {
    #[serde(rename = "480x640")]
    R480x640,
    #[serde(rename = "720x960")]
    R720x960,
    #[default]
    #[serde(rename = "1080x1440")]
    R1080x1440,
    #[serde(rename = "1440x1920")]
    R1440x1920,
}

impl ImageResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::R480x640 => "480x640",
            Self::R720x960 => "720x960",
            Self::R1080x1440 => "1080x1440",
            Self::R1440x1920 => "1440x1920",
        }
    }
}

impl std::fmt::Display for ImageResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageResolution {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "480x640" => Ok(Self::R480x640),
            "720x960" => Ok(Self::R720x960),
            "1080x1440" => Ok(Self::R1080x1440),
            "1440x1920" => Ok(Self::R1440x1920),
            other => Err(ProtocolError::UnknownResolution(other.to_string())),
        }
    }
}

/// Peer presence as last reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnlineStatus {
    Online,
    Away,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "male")]
    Male,
    #[serde(rename = "female")]
    Female,
}
