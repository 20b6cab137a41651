//! Participant read surface for the dashboard.

use crate::AppState;
use crate::errors::{AppError, AppResult};
use argus_contracts::dashboard::{
    ParticipantDetailQuery, ParticipantDetailResponse, ParticipantListQuery,
    ParticipantListResponse, ParticipantSummary,
};
use argus_core::store::{EventFilter, ParticipantSort, SortOrder};
use argus_model::{EventKind, ParticipantId};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::str::FromStr;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// `GET /api/participants`
pub async fn list_participants(
    State(state): State<AppState>,
    Query(query): Query<ParticipantListQuery>,
) -> AppResult<Json<ParticipantListResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    let page = state
        .store
        .list_participants(
            ParticipantSort::parse(query.sort.as_deref()),
            SortOrder::parse(query.order.as_deref()),
            limit,
            offset,
        )
        .await?;

    Ok(Json(ParticipantListResponse {
        participants: page
            .participants
            .iter()
            .map(ParticipantSummary::from)
            .collect(),
        total: page.total,
        limit,
        offset,
    }))
}

/// `GET /api/participant/{id}`
pub async fn participant_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ParticipantDetailQuery>,
) -> AppResult<Json<ParticipantDetailResponse>> {
    let participant_id = ParticipantId::from(id);
    let participant = state
        .store
        .get_participant(participant_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("participant {id} not found")))?;

    let kind = match query.event_kind.as_deref() {
        Some(raw) => Some(
            EventKind::from_str(raw)
                .map_err(|e| AppError::bad_request(e.to_string()))?,
        ),
        None => None,
    };
    let filter = EventFilter {
        kind,
        flagged_only: query.flagged_only.unwrap_or(false),
        limit: query
            .events_limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE),
        offset: query.events_offset.unwrap_or(0).max(0),
    };

    let events = state
        .store
        .events_for_participant(participant_id, &filter)
        .await?;
    let typing_pattern = state.store.get_typing_pattern(participant_id).await?;
    let suspicion_breakdown = state.store.suspicion_breakdown(participant_id).await?;

    Ok(Json(ParticipantDetailResponse {
        participant,
        events: events.events,
        event_count: events.total,
        typing_pattern,
        suspicion_breakdown,
    }))
}
