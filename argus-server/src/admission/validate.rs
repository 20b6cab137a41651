//! Ingest payload validation with field-level error reporting.

use argus_contracts::ingest::{
    IngestRequest, MAX_EVENTS_PER_BATCH, MAX_EVENT_DATA_BYTES, MAX_MACHINE_ID_LEN,
    MAX_TYPING_SAMPLES,
};
use argus_core::{EngineError, FieldError, Result};
use argus_model::EventKind;
use std::str::FromStr;

/// A validated event ready for scoring.
#[derive(Debug, Clone)]
pub struct ValidEvent {
    pub kind: EventKind,
    pub timestamp_ms: i64,
    pub data: serde_json::Value,
    pub user_id: Option<String>,
}

/// A fully validated ingest batch.
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    pub machine_id: String,
    pub session_id: Option<String>,
    pub workspace: Option<String>,
    pub events: Vec<ValidEvent>,
    /// Inter-keystroke intervals, milliseconds.
    pub typing_intervals: Vec<f64>,
}

/// Validate a raw ingest request. Every violation is collected so the
/// client sees the full field list at once.
pub fn validate_ingest(request: &IngestRequest) -> Result<ValidatedBatch> {
    let mut errors = Vec::new();

    let machine_id = request.participant.machine_id.trim().to_string();
    if machine_id.is_empty() {
        errors.push(FieldError::new(
            "participant.machineId",
            "machine id is required",
        ));
    } else if machine_id.chars().count() > MAX_MACHINE_ID_LEN {
        errors.push(FieldError::new(
            "participant.machineId",
            format!("must be at most {MAX_MACHINE_ID_LEN} characters"),
        ));
    }

    if request.events.len() > MAX_EVENTS_PER_BATCH {
        errors.push(FieldError::new(
            "events",
            format!("at most {MAX_EVENTS_PER_BATCH} events per batch"),
        ));
    }
    if request.typing_pattern.len() > MAX_TYPING_SAMPLES {
        errors.push(FieldError::new(
            "typingPattern",
            format!("at most {MAX_TYPING_SAMPLES} samples per batch"),
        ));
    }

    let mut events = Vec::with_capacity(request.events.len());
    if request.events.len() <= MAX_EVENTS_PER_BATCH {
        for (index, event) in request.events.iter().enumerate() {
            let kind = match EventKind::from_str(&event.kind) {
                Ok(kind) => kind,
                Err(_) => {
                    errors.push(FieldError::new(
                        format!("events[{index}].kind"),
                        format!("unknown event kind '{}'", event.kind),
                    ));
                    continue;
                }
            };
            if event.timestamp <= 0 {
                errors.push(FieldError::new(
                    format!("events[{index}].timestamp"),
                    "must be a positive millisecond timestamp",
                ));
                continue;
            }
            let data_len = serde_json::to_vec(&event.data).map(|v| v.len()).unwrap_or(0);
            if data_len > MAX_EVENT_DATA_BYTES {
                errors.push(FieldError::new(
                    format!("events[{index}].data"),
                    format!("payload exceeds {MAX_EVENT_DATA_BYTES} bytes"),
                ));
                continue;
            }
            events.push(ValidEvent {
                kind,
                timestamp_ms: event.timestamp,
                data: event.data.clone(),
                user_id: event.user_id.clone(),
            });
        }
    }

    if !errors.is_empty() {
        return Err(EngineError::ValidationFailed(errors));
    }

    Ok(ValidatedBatch {
        machine_id,
        session_id: request.participant.session_id.clone(),
        workspace: request.participant.workspace.clone(),
        events,
        typing_intervals: request
            .typing_pattern
            .iter()
            .map(|sample| sample.interval)
            .collect(),
    })
}
