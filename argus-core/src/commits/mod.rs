//! Structural and temporal suspicion analysis over commit history.
//!
//! Input is a chronologically ordered (oldest-first) commit sequence; the
//! sync worker establishes the ordering before calling in here. Analysis is
//! pure and cannot fail; re-running it over the same sequence yields
//! identical output.

use crate::{clamp_score, round3};
use argus_model::{
    BurstCommit, CommitAggregates, CommitInfo, IdleBurst, SuspiciousCommit, TimingAnalysis,
};
use chrono::Timelike;

/// Commits closer together than this are a burst pair.
pub const BURST_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Gaps longer than this begin an idle episode.
pub const IDLE_GAP_MS: i64 = 30 * 60 * 1000;

/// Minimum commits following an idle gap, each within the burst window of
/// its predecessor, for the episode to count as an idle burst.
pub const IDLE_BURST_MIN_FOLLOWERS: usize = 3;

/// Score and reasons for a single commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitFinding {
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Structural suspicion for one commit given its predecessor. Contributions
/// accumulate, clamp at 1.0, and round to three decimals.
pub fn score_commit(commit: &CommitInfo, previous: Option<&CommitInfo>) -> CommitFinding {
    let mut score = 0.0;
    let mut reasons = Vec::new();
    let churn = commit.additions + commit.deletions;

    if churn > 500 && commit.message.trim().len() < 15 {
        score += 0.5;
        reasons.push("large_commit_short_msg".to_string());
    }
    if churn > 1000 {
        score += 0.3;
        reasons.push("very_large_commit".to_string());
    }
    if let Some(prev) = previous {
        let gap_ms = (commit.timestamp - prev.timestamp).num_milliseconds();
        // Out-of-order timestamps (gap <= 0) never count as a burst.
        if gap_ms > 0 && gap_ms < BURST_WINDOW_MS {
            score += 0.2;
            reasons.push("burst_commit".to_string());
        }
    }
    if commit.files_changed == 1 && commit.additions > 200 && commit.deletions < 10 {
        score += 0.4;
        reasons.push("single_file_bulk_add".to_string());
    }

    CommitFinding {
        score: clamp_score(score),
        reasons,
    }
}

/// Full analysis over an oldest-first commit sequence.
#[derive(Debug, Clone, Default)]
pub struct CommitAnalysis {
    pub aggregates: CommitAggregates,
    pub timing: TimingAnalysis,
    pub suspicious_commits: Vec<SuspiciousCommit>,
    pub burst_commits: Vec<BurstCommit>,
    pub idle_bursts: Vec<IdleBurst>,
    /// Mean of the per-commit scores, rounded to three decimals.
    pub avg_commit_score: f64,
}

pub fn analyze_commits(commits: &[CommitInfo]) -> CommitAnalysis {
    if commits.is_empty() {
        return CommitAnalysis::default();
    }

    let mut analysis = CommitAnalysis::default();
    let mut score_sum = 0.0;

    for (i, commit) in commits.iter().enumerate() {
        let previous = if i > 0 { Some(&commits[i - 1]) } else { None };
        let finding = score_commit(commit, previous);
        score_sum += finding.score;
        if finding.score > 0.0 {
            analysis.suspicious_commits.push(SuspiciousCommit {
                commit_id: commit.id.clone(),
                message: commit.message.clone(),
                timestamp: commit.timestamp,
                score: finding.score,
                reasons: finding.reasons,
                additions: commit.additions,
                deletions: commit.deletions,
                files_changed: commit.files_changed,
            });
        }

        if let Some(prev) = previous {
            let gap_ms = (commit.timestamp - prev.timestamp).num_milliseconds();
            if gap_ms > 0 && gap_ms < BURST_WINDOW_MS {
                analysis.burst_commits.push(BurstCommit {
                    commit_id: commit.id.clone(),
                    timestamp: commit.timestamp,
                    gap_ms,
                });
            }
        }
    }

    analysis.idle_bursts = detect_idle_bursts(commits);
    analysis.timing = timing_analysis(commits);
    analysis.aggregates = aggregate_stats(commits);
    analysis.avg_commit_score = round3(score_sum / commits.len() as f64);
    analysis
}

/// An idle burst is a gap longer than [`IDLE_GAP_MS`] followed by a run of
/// at least [`IDLE_BURST_MIN_FOLLOWERS`] commits, each within the burst
/// window of its predecessor. The look-ahead stops at the first gap of five
/// minutes or more.
fn detect_idle_bursts(commits: &[CommitInfo]) -> Vec<IdleBurst> {
    let mut episodes = Vec::new();
    for i in 1..commits.len() {
        let gap_ms = (commits[i].timestamp - commits[i - 1].timestamp).num_milliseconds();
        if gap_ms <= IDLE_GAP_MS {
            continue;
        }
        // Count the run starting at the commit that ended the gap.
        let mut run_end = i;
        while run_end + 1 < commits.len() {
            let next_gap =
                (commits[run_end + 1].timestamp - commits[run_end].timestamp).num_milliseconds();
            if next_gap > 0 && next_gap < BURST_WINDOW_MS {
                run_end += 1;
            } else {
                break;
            }
        }
        let followers = run_end - i;
        if followers >= IDLE_BURST_MIN_FOLLOWERS {
            episodes.push(IdleBurst {
                idle_gap_ms: gap_ms,
                resumed_at: commits[i].timestamp,
                burst_commit_count: followers + 1,
            });
        }
    }
    episodes
}

fn timing_analysis(commits: &[CommitInfo]) -> TimingAnalysis {
    let mut timing = TimingAnalysis::default();
    for commit in commits {
        timing.hour_histogram[commit.timestamp.hour() as usize] += 1;
    }
    for pair in commits.windows(2) {
        let gap_ms = (pair[1].timestamp - pair[0].timestamp).num_milliseconds();
        if gap_ms > 0 {
            timing.total_gap_ms += gap_ms;
        }
    }
    timing
}

fn aggregate_stats(commits: &[CommitInfo]) -> CommitAggregates {
    let n = commits.len() as u64;
    let total_additions: u64 = commits.iter().map(|c| c.additions).sum();
    let total_deletions: u64 = commits.iter().map(|c| c.deletions).sum();
    let total_files_changed: u64 = commits.iter().map(|c| c.files_changed).sum();

    let positive_gaps: Vec<i64> = commits
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds())
        .filter(|gap| *gap > 0)
        .collect();
    let avg_interval_ms = if positive_gaps.is_empty() {
        None
    } else {
        Some(
            (positive_gaps.iter().sum::<i64>() as f64 / positive_gaps.len() as f64).round() as i64,
        )
    };

    let mean = |total: u64| (total as f64 / n as f64).round() as u64;
    CommitAggregates {
        total_commits: n,
        total_additions,
        total_deletions,
        total_files_changed,
        avg_additions: mean(total_additions),
        avg_deletions: mean(total_deletions),
        avg_files_changed: mean(total_files_changed),
        avg_interval_ms,
    }
}

/// Aggregate source-suspicion score for an analysis record.
///
/// `0.35 * avg_commit_score`, up to 0.25 from idle bursts (0.1 each), and a
/// plagiarism contribution: 0.4 from similarity 0.8 up, otherwise scaled
/// 0.3 above 0.5.
pub fn source_suspicion_score(
    avg_commit_score: f64,
    idle_burst_count: usize,
    highest_similarity: f64,
) -> f64 {
    let plagiarism = if highest_similarity >= 0.8 {
        0.4
    } else if highest_similarity > 0.5 {
        0.3 * highest_similarity
    } else {
        0.0
    };
    let idle = (0.1 * idle_burst_count as f64).min(0.25);
    clamp_score(0.35 * avg_commit_score + idle + plagiarism)
}
