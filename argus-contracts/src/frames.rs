//! Live-channel frames and observer intents.
//!
//! Observers join rooms by sending plain-text intents; the engine pushes
//! JSON frames tagged by `event`.

use crate::dashboard::ParticipantSummary;
use crate::source::SourceAnalysisSummary;
use argus_model::AlertLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Room receiving every participant update and alert.
pub const DASHBOARD_ROOM: &str = "dashboard";

/// Room name for a single participant's updates.
pub fn participant_room(id: Uuid) -> String {
    format!("participant:{id}")
}

/// Inbound observer intent, sent as a plain text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    JoinDashboard,
    WatchParticipant(Uuid),
}

impl Intent {
    /// Parse an intent line; anything unrecognised is ignored by the
    /// fabric.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == "join:dashboard" {
            return Some(Intent::JoinDashboard);
        }
        let id = raw.strip_prefix("watch:participant:")?;
        Uuid::parse_str(id).ok().map(Intent::WatchParticipant)
    }

    /// Room this intent subscribes to.
    pub fn room(&self) -> String {
        match self {
            Intent::JoinDashboard => DASHBOARD_ROOM.to_string(),
            Intent::WatchParticipant(id) => participant_room(*id),
        }
    }
}

/// Alert frame payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertFrame {
    pub participant_id: Uuid,
    pub machine_id: String,
    pub display_name: String,
    pub level: AlertLevel,
    pub reasons: Vec<String>,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Outbound frame pushed to subscribed observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum Frame {
    #[serde(rename = "participant:updated")]
    ParticipantUpdated(ParticipantSummary),
    #[serde(rename = "alert")]
    Alert(AlertFrame),
    #[serde(rename = "sourceAnalysis:updated")]
    SourceAnalysisUpdated(SourceAnalysisSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_intents() {
        assert_eq!(Intent::parse("join:dashboard"), Some(Intent::JoinDashboard));
        let id = Uuid::new_v4();
        assert_eq!(
            Intent::parse(&format!("watch:participant:{id}")),
            Some(Intent::WatchParticipant(id))
        );
    }

    #[test]
    fn rejects_unknown_intents() {
        assert_eq!(Intent::parse("watch:participant:not-a-uuid"), None);
        assert_eq!(Intent::parse("leave:dashboard"), None);
        assert_eq!(Intent::parse(""), None);
    }

    #[test]
    fn frames_tag_by_event_name() {
        let frame = Frame::Alert(AlertFrame {
            participant_id: Uuid::new_v4(),
            machine_id: "m-1".into(),
            display_name: "m-1".into(),
            level: AlertLevel::Critical,
            reasons: vec!["excessive_pastes (12)".into()],
            score: 0.8,
            timestamp: Utc::now(),
        });
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["event"], "alert");
        assert_eq!(value["payload"]["level"], "critical");
    }
}
