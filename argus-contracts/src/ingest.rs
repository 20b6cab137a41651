//! Batch submission contract for editor agents. Field names are camelCase
//! on the wire; unknown fields are stripped by serde.

use serde::{Deserialize, Serialize};

/// Maximum number of events accepted in one batch.
pub const MAX_EVENTS_PER_BATCH: usize = 500;

/// Maximum number of typing samples accepted in one batch.
pub const MAX_TYPING_SAMPLES: usize = 5_000;

/// Maximum accepted `machineId` length in characters.
pub const MAX_MACHINE_ID_LEN: usize = 200;

/// Maximum serialized size of a single event's `data` payload, in bytes.
pub const MAX_EVENT_DATA_BYTES: usize = 4_096;

/// One telemetry event as submitted by an agent. `kind` is validated
/// against the event-kind enum by admission control before scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub kind: String,
    /// Millisecond timestamp from the agent's clock.
    pub timestamp: i64,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
}

/// One inter-keystroke interval sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSample {
    pub timestamp: i64,
    /// Interval to the previous keystroke, milliseconds.
    pub interval: f64,
}

/// Identity block carried with every batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantIdentity {
    pub machine_id: String,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `POST /api/events` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub typing_pattern: Vec<TypingSample>,
    pub participant: ParticipantIdentity,
}

/// `POST /api/events` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    pub participant_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_stripped() {
        let body = serde_json::json!({
            "events": [{
                "kind": "paste",
                "timestamp": 1000,
                "data": {"length": 42},
                "telemetryVersion": 3
            }],
            "typingPattern": [],
            "participant": {"machineId": "m-1", "agentBuild": "9.9"}
        });
        let req: IngestRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.events.len(), 1);
        assert_eq!(req.participant.machine_id, "m-1");
    }

    #[test]
    fn events_and_typing_default_to_empty() {
        let req: IngestRequest =
            serde_json::from_value(serde_json::json!({"participant": {"machineId": "m"}}))
                .unwrap();
        assert!(req.events.is_empty());
        assert!(req.typing_pattern.is_empty());
    }
}
