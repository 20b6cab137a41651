//! Telemetry events as persisted by the ingest pipeline.

use crate::error::ModelError;
use crate::ids::{EventId, ParticipantId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Suspicion score at or above which an event is considered flagged.
pub const FLAG_THRESHOLD: f64 = 0.5;

/// Kind of telemetry event an editor agent can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Paste,
    Typing,
    FileChange,
    FileOperation,
    WindowBlur,
    Clipboard,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Paste,
        EventKind::Typing,
        EventKind::FileChange,
        EventKind::FileOperation,
        EventKind::WindowBlur,
        EventKind::Clipboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Paste => "paste",
            EventKind::Typing => "typing",
            EventKind::FileChange => "file_change",
            EventKind::FileOperation => "file_operation",
            EventKind::WindowBlur => "window_blur",
            EventKind::Clipboard => "clipboard",
        }
    }
}

impl FromStr for EventKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paste" => Ok(EventKind::Paste),
            "typing" => Ok(EventKind::Typing),
            "file_change" => Ok(EventKind::FileChange),
            "file_operation" => Ok(EventKind::FileOperation),
            "window_blur" => Ok(EventKind::WindowBlur),
            "clipboard" => Ok(EventKind::Clipboard),
            other => Err(ModelError::UnknownEventKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, scored telemetry event belonging to one participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: EventId,
    pub participant_id: ParticipantId,
    pub kind: EventKind,
    /// Millisecond timestamp assigned by the agent's clock.
    pub timestamp_ms: i64,
    /// Opaque, bounded payload; the scorer destructures kind-specific fields.
    pub data: serde_json::Value,
    pub suspicion_score: f64,
    pub flagged: bool,
}

impl EventRecord {
    pub fn new(
        participant_id: ParticipantId,
        kind: EventKind,
        timestamp_ms: i64,
        data: serde_json::Value,
        suspicion_score: f64,
    ) -> Self {
        Self {
            id: EventId::new(),
            participant_id,
            kind,
            timestamp_ms,
            data,
            suspicion_score,
            flagged: suspicion_score >= FLAG_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_round_trips_through_str() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("keylogger".parse::<EventKind>().is_err());
    }

    #[test]
    fn flagged_follows_score_threshold() {
        let low = EventRecord::new(
            ParticipantId::new(),
            EventKind::Typing,
            1_000,
            serde_json::json!({}),
            0.499,
        );
        assert!(!low.flagged);

        let high = EventRecord::new(
            ParticipantId::new(),
            EventKind::Paste,
            1_000,
            serde_json::json!({}),
            0.5,
        );
        assert!(high.flagged);
    }
}
