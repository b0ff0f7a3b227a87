//! Core types shared by every capability agent

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of capability types a client can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    Asr,
    AudioPlayer,
    Display,
    Extension,
    System,
    Text,
    Tts,
}

impl CapabilityKind {
    /// All kinds, in the order agents are built at client construction.
    pub const ALL: [CapabilityKind; 7] = [
        CapabilityKind::Asr,
        CapabilityKind::Tts,
        CapabilityKind::AudioPlayer,
        CapabilityKind::System,
        CapabilityKind::Display,
        CapabilityKind::Extension,
        CapabilityKind::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Asr => "ASR",
            CapabilityKind::AudioPlayer => "AudioPlayer",
            CapabilityKind::Display => "Display",
            CapabilityKind::Extension => "Extension",
            CapabilityKind::System => "System",
            CapabilityKind::Text => "Text",
            CapabilityKind::Tts => "TTS",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASR" => Ok(CapabilityKind::Asr),
            "AudioPlayer" => Ok(CapabilityKind::AudioPlayer),
            "Display" => Ok(CapabilityKind::Display),
            "Extension" => Ok(CapabilityKind::Extension),
            "System" => Ok(CapabilityKind::System),
            "Text" => Ok(CapabilityKind::Text),
            "TTS" => Ok(CapabilityKind::Tts),
            other => Err(format!("unknown capability type: {other}")),
        }
    }
}

/// An instruction from the cloud service addressed to one capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directive {
    pub capability: CapabilityKind,
    pub name: String,
    /// Correlates a directive with the dialog turn that produced it.
    pub dialog_id: Option<String>,
    pub payload: serde_json::Value,
}

impl Directive {
    pub fn new(
        capability: CapabilityKind,
        name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            capability,
            name: name.into(),
            dialog_id: None,
            payload,
        }
    }

    pub fn with_dialog_id(mut self, dialog_id: impl Into<String>) -> Self {
        self.dialog_id = Some(dialog_id.into());
        self
    }
}

/// A capability-originated event, relayed upstream and to local listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityEvent {
    pub capability: CapabilityKind,
    pub name: String,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in CapabilityKind::ALL {
            assert_eq!(kind.as_str().parse::<CapabilityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!("Telephony".parse::<CapabilityKind>().is_err());
    }
}
