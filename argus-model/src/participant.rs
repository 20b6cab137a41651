//! Participant documents and their aggregate behavioural counters.

use crate::ids::ParticipantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate counters accumulated across a participant's event stream.
///
/// The participant's suspicion score is a pure function of these counters;
/// the ingest pipeline mutates them and recomputes the score in one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    pub paste_count: u64,
    pub paste_chars_total: u64,
    pub typing_anomalies: u64,
    pub window_blur_count: u64,
    pub window_blur_total_ms: u64,
    pub clipboard_changes: u64,
    pub files_created: u64,
    pub files_deleted: u64,
}

/// A contest participant, keyed by the opaque stable machine id reported
/// by its editor agent. Created on first ingest, never destroyed during a
/// contest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub machine_id: String,
    pub external_account_name: Option<String>,
    pub session_id: Option<String>,
    pub workspace: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub total_events: u64,
    pub stats: ParticipantStats,
    /// In [0, 1]; recomputed from `stats` on every successful ingest.
    pub suspicion_score: f64,
}

impl Participant {
    pub fn new(machine_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ParticipantId::new(),
            machine_id: machine_id.into(),
            external_account_name: None,
            session_id: None,
            workspace: None,
            started_at: now,
            last_active: now,
            total_events: 0,
            stats: ParticipantStats::default(),
            suspicion_score: 0.0,
        }
    }

    /// Display name for dashboard frames: external identity when known,
    /// otherwise the machine id.
    pub fn display_name(&self) -> &str {
        self.external_account_name
            .as_deref()
            .unwrap_or(&self.machine_id)
    }
}
