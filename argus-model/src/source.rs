//! Source-analysis records: per-repository commit statistics, burst and
//! idle-burst findings, and cross-repository similarity matches.

use crate::ids::{AnalysisId, ParticipantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single commit as fetched from the remote source host, oldest-first
/// ordering is established by the sync worker before analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub additions: u64,
    pub deletions: u64,
    pub files_changed: u64,
}

/// A commit whose structural score exceeded zero, with the reasons that
/// contributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousCommit {
    pub commit_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub reasons: Vec<String>,
    pub additions: u64,
    pub deletions: u64,
    pub files_changed: u64,
}

/// A commit landed within five minutes of its predecessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstCommit {
    pub commit_id: String,
    pub timestamp: DateTime<Utc>,
    /// Gap to the preceding commit, strictly positive.
    pub gap_ms: i64,
}

/// A long idle gap followed by a rapid run of commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleBurst {
    /// Length of the idle gap preceding the burst.
    pub idle_gap_ms: i64,
    /// Timestamp of the first commit after the gap.
    pub resumed_at: DateTime<Utc>,
    /// Commits in the burst, counting the one that ended the gap.
    pub burst_commit_count: usize,
}

/// One side of a cross-repository similarity finding. The counterpart is a
/// weak reference: resolvers must tolerate a missing other side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityMatch {
    pub other_participant_id: ParticipantId,
    pub other_owner: String,
    pub other_repo: String,
    pub file1: String,
    pub file2: String,
    pub similarity: f64,
    pub detected_at: DateTime<Utc>,
}

/// Totals and integer-rounded per-commit means over the analysed window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitAggregates {
    pub total_commits: u64,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub total_files_changed: u64,
    pub avg_additions: u64,
    pub avg_deletions: u64,
    pub avg_files_changed: u64,
    /// Mean positive inter-commit interval; `None` with fewer than two
    /// commits.
    pub avg_interval_ms: Option<i64>,
}

/// Hour-of-day histogram (UTC) and total inter-commit gap time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingAnalysis {
    pub hour_histogram: [u64; 24],
    pub total_gap_ms: i64,
}

impl Default for TimingAnalysis {
    fn default() -> Self {
        Self {
            hour_histogram: [0; 24],
            total_gap_ms: 0,
        }
    }
}

/// Per-repository analysis document owned by one participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAnalysis {
    pub id: AnalysisId,
    pub participant_id: ParticipantId,
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
    pub aggregates: CommitAggregates,
    pub timing: TimingAnalysis,
    pub suspicious_commits: Vec<SuspiciousCommit>,
    pub burst_commits: Vec<BurstCommit>,
    pub idle_bursts: Vec<IdleBurst>,
    pub similarity_matches: Vec<SimilarityMatch>,
    /// `max(similarity_matches.similarity ∪ {0})`; only ever moves upward.
    pub highest_similarity: f64,
    pub avg_commit_suspicion_score: f64,
    pub source_suspicion_score: f64,
    pub last_processed_commit_id: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

impl SourceAnalysis {
    pub const MAX_SUSPICIOUS_COMMITS: usize = 200;
    pub const MAX_BURST_COMMITS: usize = 100;
    pub const MAX_IDLE_BURSTS: usize = 100;
    pub const MAX_SIMILARITY_MATCHES: usize = 100;

    pub fn new(
        participant_id: ParticipantId,
        owner: impl Into<String>,
        repo: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Self {
        Self {
            id: AnalysisId::new(),
            participant_id,
            owner: owner.into(),
            repo: repo.into(),
            default_branch: default_branch.into(),
            aggregates: CommitAggregates::default(),
            timing: TimingAnalysis::default(),
            suspicious_commits: Vec::new(),
            burst_commits: Vec::new(),
            idle_bursts: Vec::new(),
            similarity_matches: Vec::new(),
            highest_similarity: 0.0,
            avg_commit_suspicion_score: 0.0,
            source_suspicion_score: 0.0,
            last_processed_commit_id: None,
            last_sync_at: None,
            registered_at: Utc::now(),
        }
    }

    /// `owner/repo` coordinate used in logs and frames.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Record a similarity finding: append to the bounded match list and
    /// ratchet `highest_similarity` upward, never downward.
    pub fn record_similarity(&mut self, m: SimilarityMatch) {
        if m.similarity > self.highest_similarity {
            self.highest_similarity = m.similarity;
        }
        self.similarity_matches.push(m);
        Self::keep_most_recent(&mut self.similarity_matches, Self::MAX_SIMILARITY_MATCHES);
    }

    /// Enforce every bounded-list invariant, keeping the most recent
    /// entries. Called by the store gateway before each write.
    pub fn truncate_bounded_lists(&mut self) {
        Self::keep_most_recent(&mut self.suspicious_commits, Self::MAX_SUSPICIOUS_COMMITS);
        Self::keep_most_recent(&mut self.burst_commits, Self::MAX_BURST_COMMITS);
        Self::keep_most_recent(&mut self.idle_bursts, Self::MAX_IDLE_BURSTS);
        Self::keep_most_recent(&mut self.similarity_matches, Self::MAX_SIMILARITY_MATCHES);
    }

    fn keep_most_recent<T>(list: &mut Vec<T>, bound: usize) {
        if list.len() > bound {
            let excess = list.len() - bound;
            list.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_with_similarity(similarity: f64) -> SimilarityMatch {
        SimilarityMatch {
            other_participant_id: ParticipantId::new(),
            other_owner: "other".into(),
            other_repo: "repo".into(),
            file1: "src/main.rs".into(),
            file2: "src/main.rs".into(),
            similarity,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn highest_similarity_is_monotone() {
        let mut analysis = SourceAnalysis::new(ParticipantId::new(), "o", "r", "main");
        analysis.record_similarity(match_with_similarity(0.9));
        assert_eq!(analysis.highest_similarity, 0.9);
        analysis.record_similarity(match_with_similarity(0.6));
        assert_eq!(analysis.highest_similarity, 0.9);
        analysis.record_similarity(match_with_similarity(0.95));
        assert_eq!(analysis.highest_similarity, 0.95);
    }

    #[test]
    fn bounded_lists_hold_after_truncation() {
        let mut analysis = SourceAnalysis::new(ParticipantId::new(), "o", "r", "main");
        for i in 0..250 {
            analysis.suspicious_commits.push(SuspiciousCommit {
                commit_id: format!("c{i}"),
                message: String::new(),
                timestamp: Utc::now(),
                score: 0.2,
                reasons: vec![],
                additions: 0,
                deletions: 0,
                files_changed: 0,
            });
            analysis.burst_commits.push(BurstCommit {
                commit_id: format!("c{i}"),
                timestamp: Utc::now(),
                gap_ms: 1,
            });
        }
        analysis.truncate_bounded_lists();
        assert_eq!(
            analysis.suspicious_commits.len(),
            SourceAnalysis::MAX_SUSPICIOUS_COMMITS
        );
        assert_eq!(
            analysis.burst_commits.len(),
            SourceAnalysis::MAX_BURST_COMMITS
        );
        // Most recent entries are the ones preserved.
        assert_eq!(analysis.suspicious_commits.last().unwrap().commit_id, "c249");
        assert_eq!(analysis.suspicious_commits[0].commit_id, "c50");
    }
}
