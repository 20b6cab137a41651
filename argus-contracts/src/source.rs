//! Source-monitoring API contracts.

use argus_model::SourceAnalysis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `POST /api/source/register` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRepoRequest {
    pub participant_id: Uuid,
    pub owner: String,
    pub repo: String,
}

/// `POST /api/source/compare` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    pub participant_id1: Uuid,
    pub participant_id2: Uuid,
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Condensed analysis view carried in responses and live frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAnalysisSummary {
    pub participant_id: Uuid,
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
    pub total_commits: u64,
    pub suspicious_commit_count: usize,
    pub burst_commit_count: usize,
    pub idle_burst_count: usize,
    pub similarity_match_count: usize,
    pub highest_similarity: f64,
    pub avg_commit_suspicion_score: f64,
    pub source_suspicion_score: f64,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl From<&SourceAnalysis> for SourceAnalysisSummary {
    fn from(a: &SourceAnalysis) -> Self {
        Self {
            participant_id: a.participant_id.to_uuid(),
            owner: a.owner.clone(),
            repo: a.repo.clone(),
            default_branch: a.default_branch.clone(),
            total_commits: a.aggregates.total_commits,
            suspicious_commit_count: a.suspicious_commits.len(),
            burst_commit_count: a.burst_commits.len(),
            idle_burst_count: a.idle_bursts.len(),
            similarity_match_count: a.similarity_matches.len(),
            highest_similarity: a.highest_similarity,
            avg_commit_suspicion_score: a.avg_commit_suspicion_score,
            source_suspicion_score: a.source_suspicion_score,
            last_sync_at: a.last_sync_at,
        }
    }
}
