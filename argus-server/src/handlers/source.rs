//! Source-monitoring surface: registration, on-demand sync, analysis
//! reads, and pairwise comparison.

use crate::AppState;
use crate::errors::{AppError, AppResult};
use argus_contracts::api::ApiResponse;
use argus_contracts::source::{CompareRequest, RegisterRepoRequest, SourceAnalysisSummary};
use argus_core::SyncScheduler;
use argus_model::{BurstCommit, ParticipantId, SourceAnalysis, SuspiciousCommit};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

const OVERVIEW_LIMIT: i64 = 50;

fn sync_engine(state: &AppState) -> AppResult<Arc<SyncScheduler>> {
    state.sync.clone().ok_or_else(|| {
        AppError::service_unavailable("source monitoring is disabled: no source token configured")
    })
}

/// `POST /api/source/register`
pub async fn register_repository(
    State(state): State<AppState>,
    Json(request): Json<RegisterRepoRequest>,
) -> AppResult<Json<ApiResponse<SourceAnalysisSummary>>> {
    let sync = sync_engine(&state)?;
    let participant_id = ParticipantId::from(request.participant_id);
    state
        .store
        .get_participant(participant_id)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("participant {} not found", request.participant_id))
        })?;

    let analysis = sync
        .register_repository(participant_id, &request.owner, &request.repo)
        .await?;
    Ok(Json(ApiResponse::success(SourceAnalysisSummary::from(
        &analysis,
    ))))
}

/// `POST /api/source/sync/{participant_id}`: one synchronous monitor pass.
pub async fn sync_repository(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SourceAnalysisSummary>>> {
    let sync = sync_engine(&state)?;
    let summary = sync
        .monitor_repository(ParticipantId::from(participant_id))
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `GET /api/source/participant/{id}/analysis`
pub async fn participant_analysis(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
) -> AppResult<Json<SourceAnalysis>> {
    let analysis = load_analysis(&state, participant_id).await?;
    Ok(Json(analysis))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitListingResponse {
    pub suspicious_commits: Vec<SuspiciousCommit>,
    pub burst_commits: Vec<BurstCommit>,
}

/// `GET /api/source/participant/{id}/commits`
pub async fn participant_commits(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
) -> AppResult<Json<CommitListingResponse>> {
    let analysis = load_analysis(&state, participant_id).await?;
    Ok(Json(CommitListingResponse {
        suspicious_commits: analysis.suspicious_commits,
        burst_commits: analysis.burst_commits,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    pub matches_found: usize,
    pub first: SourceAnalysisSummary,
    pub second: SourceAnalysisSummary,
}

/// `POST /api/source/compare`: on-demand comparison of two repositories.
pub async fn compare_repositories(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> AppResult<Json<ApiResponse<CompareResponse>>> {
    let sync = sync_engine(&state)?;
    let first = ParticipantId::from(request.participant_id1);
    let second = ParticipantId::from(request.participant_id2);
    let matches = sync
        .compare_pair(first, second, request.threshold)
        .await?;

    let first_analysis = load_analysis(&state, request.participant_id1).await?;
    let second_analysis = load_analysis(&state, request.participant_id2).await?;
    Ok(Json(ApiResponse::success(CompareResponse {
        matches_found: matches.len(),
        first: SourceAnalysisSummary::from(&first_analysis),
        second: SourceAnalysisSummary::from(&second_analysis),
    })))
}

/// `GET /api/source/overview`
pub async fn source_overview(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<SourceAnalysisSummary>>> {
    let analyses = state.store.top_source_analyses(OVERVIEW_LIMIT).await?;
    Ok(Json(
        analyses.iter().map(SourceAnalysisSummary::from).collect(),
    ))
}

async fn load_analysis(state: &AppState, participant_id: Uuid) -> AppResult<SourceAnalysis> {
    state
        .store
        .get_source_analysis(ParticipantId::from(participant_id))
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("no analysis registered for {participant_id}"))
        })
}
