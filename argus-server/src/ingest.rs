//! Telemetry batch ingest: admission, scoring, counter accumulation,
//! persistence, alert evaluation, and live fan-out.

use crate::AppState;
use crate::admission::{self, ValidatedBatch};
use crate::auth::validate_token;
use crate::errors::{AppError, AppResult};
use argus_contracts::dashboard::ParticipantSummary;
use argus_contracts::frames::{AlertFrame, Frame};
use argus_contracts::ingest::{IngestRequest, IngestResponse};
use argus_core::scoring::{RecentContext, TypingStats, paste_length};
use argus_model::{EventKind, EventRecord, Participant};
use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use serde_json::Value;
use std::net::SocketAddr;
use tracing::{debug, warn};

/// `POST /api/events`: ingest one agent batch.
pub async fn ingest_handler(
    State(state): State<AppState>,
    parts: Parts,
    Json(request): Json<IngestRequest>,
) -> AppResult<Json<IngestResponse>> {
    // Contest deployments run the ingest endpoint public; otherwise agents
    // carry the same bearer tokens as observers.
    if !state.config.ingest_public {
        require_bearer(&state, &parts.headers)?;
    }

    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // Admission control rejects before any store I/O.
    let batch = admission::admit(&state, &client_ip, &request)?;
    let batch_size = batch.events.len();

    let mut participant = state
        .store
        .upsert_participant(
            &batch.machine_id,
            batch.session_id.as_deref(),
            batch.workspace.as_deref(),
        )
        .await?;

    let context = RecentContext {
        clipboard_changes_60s: state
            .store
            .recent_clipboard_count(participant.id, Utc::now().timestamp_millis() - 60_000)
            .await?,
        had_typing_before: state.store.has_any_typing_event(participant.id).await?,
    };
    let typing_stats = TypingStats::from_intervals(&batch.typing_intervals);

    let records = score_batch(&state, &mut participant, &batch, typing_stats.as_ref(), &context);

    let written = state.store.append_events(&records).await?;
    if written < records.len() {
        // Forward progress wins over completeness; counters already moved.
        warn!(
            participant = %participant.machine_id,
            written,
            submitted = records.len(),
            "partial event batch persisted"
        );
    }

    if !batch.typing_intervals.is_empty() {
        state
            .store
            .update_typing_pattern(participant.id, &batch.typing_intervals)
            .await?;
    }

    participant.suspicion_score = state.scoring.participant_score(&participant.stats);
    participant.total_events += batch_size as u64;
    participant.last_active = Utc::now();
    state.store.save_participant(&participant).await?;

    let evaluation = state.scoring.evaluate_alert(&participant);
    if evaluation.should_alert() {
        debug!(
            participant = %participant.machine_id,
            level = %evaluation.level,
            "alert threshold tripped"
        );
        state.fabric.alert(Frame::Alert(AlertFrame {
            participant_id: participant.id.to_uuid(),
            machine_id: participant.machine_id.clone(),
            display_name: participant.display_name().to_string(),
            level: evaluation.level,
            reasons: evaluation.reasons,
            score: evaluation.score,
            timestamp: Utc::now(),
        }));
    }

    state
        .fabric
        .participant_updated(ParticipantSummary::from(&participant));

    Ok(Json(IngestResponse {
        success: true,
        message: format!("processed {batch_size} events"),
        participant_score: participant.suspicion_score,
    }))
}

/// Score every event in submission order, accumulating the participant's
/// counters as each one lands. Only counter mutations happen here; scoring
/// policy stays in the engine.
fn score_batch(
    state: &AppState,
    participant: &mut Participant,
    batch: &ValidatedBatch,
    typing_stats: Option<&TypingStats>,
    context: &RecentContext,
) -> Vec<EventRecord> {
    let mut records = Vec::with_capacity(batch.events.len());
    for event in &batch.events {
        let scored = state
            .scoring
            .score_event(event.kind, &event.data, typing_stats, context);

        if participant.external_account_name.is_none() {
            if let Some(user_id) = &event.user_id {
                participant.external_account_name = Some(user_id.clone());
            }
        }

        apply_counters(participant, event.kind, &event.data);
        records.push(EventRecord::new(
            participant.id,
            event.kind,
            event.timestamp_ms,
            event.data.clone(),
            scored.score,
        ));
    }
    records
}

fn apply_counters(participant: &mut Participant, kind: EventKind, data: &Value) {
    let stats = &mut participant.stats;
    match kind {
        EventKind::Paste => {
            stats.paste_count += 1;
            stats.paste_chars_total += paste_length(data);
        }
        EventKind::Typing => {
            if data.get("anomaly").is_some_and(|v| !v.is_null()) {
                stats.typing_anomalies += 1;
            }
        }
        EventKind::WindowBlur => {
            if data.get("focused").and_then(Value::as_bool) == Some(false) {
                stats.window_blur_count += 1;
                stats.window_blur_total_ms += data
                    .get("unfocusedDurationMs")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
            }
        }
        EventKind::Clipboard => {
            stats.clipboard_changes += 1;
        }
        EventKind::FileOperation => match data.get("operation").and_then(Value::as_str) {
            Some("create") => stats.files_created += 1,
            Some("delete") => stats.files_deleted += 1,
            _ => {}
        },
        EventKind::FileChange => {}
    }
}

fn require_bearer(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("bearer token required"))?;
    validate_token(token, &state.config.jwt_secret)
        .map_err(|_| AppError::unauthorized("invalid or expired token"))?;
    Ok(())
}
