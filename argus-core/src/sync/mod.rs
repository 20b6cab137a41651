//! Periodic source-history synchronisation.
//!
//! A single long-lived worker per process: after a short startup delay it
//! runs once, then ticks at the configured interval. Cycles never overlap;
//! a tick that fires while a cycle is still running is skipped with a
//! warning. Within a cycle repositories are monitored sequentially to
//! respect remote API rate limits.

use crate::commits::{analyze_commits, source_suspicion_score};
use crate::error::{EngineError, Result};
use crate::fingerprint::{eligible_file, CandidateRepo, CrossMatch, Fingerprinter, RepoFile};
use crate::forge::SourceHost;
use crate::store::StoreGateway;
use argus_contracts::source::SourceAnalysisSummary;
use argus_model::{CommitInfo, ParticipantId, SimilarityMatch, SourceAnalysis};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Scheduler timing and comparison settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between cycles; callers clamp to 1-60 minutes.
    pub interval: Duration,
    /// Delay before the first cycle, letting the store come online.
    pub startup_delay: Duration,
    /// Similarity threshold for cross-repo matches.
    pub similarity_threshold: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            startup_delay: Duration::from_secs(10),
            similarity_threshold: 0.8,
        }
    }
}

/// Fan-out hook for analysis updates, implemented by the live fabric.
#[async_trait]
pub trait SyncEvents: Send + Sync {
    async fn source_analysis_updated(&self, summary: SourceAnalysisSummary);
}

/// No-op events sink for tests and headless runs.
#[derive(Debug, Default)]
pub struct NullSyncEvents;

#[async_trait]
impl SyncEvents for NullSyncEvents {
    async fn source_analysis_updated(&self, _summary: SourceAnalysisSummary) {}
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncCycleReport {
    /// True when the tick was skipped because a cycle was still running.
    pub skipped: bool,
    pub repos_synced: usize,
    pub repos_failed: usize,
    pub matches_recorded: usize,
}

/// The periodic repository monitor and cross-comparison worker.
pub struct SyncScheduler {
    store: Arc<dyn StoreGateway>,
    host: Arc<dyn SourceHost>,
    events: Arc<dyn SyncEvents>,
    fingerprinter: Fingerprinter,
    config: SyncConfig,
    is_running: AtomicBool,
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("config", &self.config)
            .field("is_running", &self.is_running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SyncScheduler {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        host: Arc<dyn SourceHost>,
        events: Arc<dyn SyncEvents>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            host,
            events,
            fingerprinter: Fingerprinter::default(),
            config,
            is_running: AtomicBool::new(false),
        }
    }

    /// Spawn the scheduler loop: startup delay, one immediate cycle, then
    /// ticks at the configured interval with overrun ticks skipped.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.config.interval.as_secs(),
                "sync scheduler started"
            );
            tokio::time::sleep(self.config.startup_delay).await;
            if let Err(e) = self.run_sync().await {
                error!("initial sync cycle failed: {e}");
            }

            let mut ticker = interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of a fresh interval completes immediately;
            // the startup cycle above already covered it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_sync().await {
                    error!("sync cycle failed: {e}");
                }
            }
        })
    }

    /// Run one full cycle, unless one is already in flight process-wide.
    pub async fn run_sync(&self) -> Result<SyncCycleReport> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("sync cycle still running, skipping this tick");
            return Ok(SyncCycleReport {
                skipped: true,
                ..Default::default()
            });
        }
        let result = self.run_cycle().await;
        self.is_running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_cycle(&self) -> Result<SyncCycleReport> {
        let analyses = self.store.list_source_analyses().await?;
        info!(repos = analyses.len(), "starting sync cycle");

        let mut report = SyncCycleReport::default();
        let mut syncable = Vec::new();
        for analysis in analyses {
            let participant_id = analysis.participant_id;
            let full_name = analysis.full_name();
            // One bad repository must not stop the rest of the cycle.
            match self.monitor_analysis(analysis).await {
                Ok(_) => {
                    report.repos_synced += 1;
                    syncable.push(participant_id);
                }
                Err(e) => {
                    report.repos_failed += 1;
                    warn!(repo = %full_name, "repository sync failed: {e}");
                }
            }
        }

        if syncable.len() >= 2 {
            match self
                .compare_analyses(&syncable, self.config.similarity_threshold)
                .await
            {
                Ok(matches) => report.matches_recorded = matches.len(),
                Err(e) => warn!("cross-repo comparison failed: {e}"),
            }
        }

        info!(
            synced = report.repos_synced,
            failed = report.repos_failed,
            matches = report.matches_recorded,
            "sync cycle complete"
        );
        Ok(report)
    }

    /// Verify a repository is reachable, then fetch-or-create its analysis
    /// record.
    pub async fn register_repository(
        &self,
        participant_id: ParticipantId,
        owner: &str,
        repo: &str,
    ) -> Result<SourceAnalysis> {
        let info = self.host.repo_info(owner, repo).await?;
        self.store
            .get_or_create_source_analysis(participant_id, owner, repo, &info.default_branch)
            .await
    }

    /// Run one incremental monitor pass for a participant's repository.
    pub async fn monitor_repository(
        &self,
        participant_id: ParticipantId,
    ) -> Result<SourceAnalysisSummary> {
        let analysis = self
            .store
            .get_source_analysis(participant_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("no analysis registered for {participant_id}"))
            })?;
        self.monitor_analysis(analysis).await
    }

    async fn monitor_analysis(
        &self,
        mut analysis: SourceAnalysis,
    ) -> Result<SourceAnalysisSummary> {
        let listing = self
            .host
            .list_commits(&analysis.owner, &analysis.repo, analysis.last_sync_at)
            .await?;

        // Walk the newest-first listing until the incremental watermark;
        // the since-filter can re-deliver already-analysed commits.
        let mut fresh = Vec::new();
        for commit in listing {
            if analysis.last_processed_commit_id.as_deref() == Some(commit.id.as_str()) {
                break;
            }
            fresh.push(commit);
        }

        if !fresh.is_empty() {
            let newest_id = fresh[0].id.clone();
            fresh.reverse();

            let mut commits = Vec::with_capacity(fresh.len());
            for commit in &fresh {
                let detail = self
                    .host
                    .commit_detail(&analysis.owner, &analysis.repo, &commit.id)
                    .await?;
                commits.push(CommitInfo {
                    id: commit.id.clone(),
                    message: commit.message.clone(),
                    timestamp: commit.timestamp,
                    additions: detail.additions,
                    deletions: detail.deletions,
                    files_changed: detail.files_changed,
                });
            }
            commits.sort_by_key(|c| c.timestamp);

            let result = analyze_commits(&commits);
            analysis.aggregates = result.aggregates;
            analysis.timing = result.timing;
            analysis.suspicious_commits.extend(result.suspicious_commits);
            analysis.burst_commits.extend(result.burst_commits);
            analysis.idle_bursts.extend(result.idle_bursts);
            analysis.truncate_bounded_lists();
            analysis.avg_commit_suspicion_score = result.avg_commit_score;
            analysis.last_processed_commit_id = Some(newest_id);
        }

        analysis.last_sync_at = Some(Utc::now());
        analysis.source_suspicion_score = source_suspicion_score(
            analysis.avg_commit_suspicion_score,
            analysis.idle_bursts.len(),
            analysis.highest_similarity,
        );
        self.store.persist_source_analysis(&analysis).await?;

        let summary = SourceAnalysisSummary::from(&analysis);
        self.events.source_analysis_updated(summary.clone()).await;
        Ok(summary)
    }

    /// On-demand comparison of exactly two registered repositories.
    pub async fn compare_pair(
        &self,
        first: ParticipantId,
        second: ParticipantId,
        threshold: Option<f64>,
    ) -> Result<Vec<CrossMatch>> {
        let threshold = threshold.unwrap_or(self.config.similarity_threshold);
        self.compare_analyses(&[first, second], threshold).await
    }

    /// Fingerprint every eligible file of the given repositories, record
    /// each match on both sides, and recompute affected scores.
    async fn compare_analyses(
        &self,
        participants: &[ParticipantId],
        threshold: f64,
    ) -> Result<Vec<CrossMatch>> {
        let mut analyses: HashMap<ParticipantId, SourceAnalysis> = HashMap::new();
        let mut candidates = Vec::new();
        for &participant_id in participants {
            let analysis = self
                .store
                .get_source_analysis(participant_id)
                .await?
                .ok_or_else(|| {
                    EngineError::NotFound(format!("no analysis registered for {participant_id}"))
                })?;
            match self.fetch_repo_files(&analysis).await {
                Ok(files) if !files.is_empty() => {
                    candidates.push(CandidateRepo {
                        key: participant_id.to_string(),
                        files,
                    });
                    analyses.insert(participant_id, analysis);
                }
                Ok(_) => {
                    warn!(repo = %analysis.full_name(), "no eligible files for comparison");
                }
                Err(e) => {
                    warn!(repo = %analysis.full_name(), "file fetch failed: {e}");
                }
            }
        }
        if candidates.len() < 2 {
            return Ok(Vec::new());
        }

        let matches = self.fingerprinter.cross_repo_matches(&candidates, threshold);
        let detected_at = Utc::now();
        let mut affected = Vec::new();
        for m in &matches {
            let id_a = ParticipantId::from(
                Uuid::parse_str(&m.repo_a).map_err(|e| EngineError::Internal(e.to_string()))?,
            );
            let id_b = ParticipantId::from(
                Uuid::parse_str(&m.repo_b).map_err(|e| EngineError::Internal(e.to_string()))?,
            );
            let (owner_a, repo_a) = {
                let a = &analyses[&id_a];
                (a.owner.clone(), a.repo.clone())
            };
            let (owner_b, repo_b) = {
                let b = &analyses[&id_b];
                (b.owner.clone(), b.repo.clone())
            };

            let side_a = analyses.get_mut(&id_a).expect("candidate analysis loaded");
            side_a.record_similarity(SimilarityMatch {
                other_participant_id: id_b,
                other_owner: owner_b.clone(),
                other_repo: repo_b.clone(),
                file1: m.file_a.clone(),
                file2: m.file_b.clone(),
                similarity: m.similarity,
                detected_at,
            });
            let side_b = analyses.get_mut(&id_b).expect("candidate analysis loaded");
            side_b.record_similarity(SimilarityMatch {
                other_participant_id: id_a,
                other_owner: owner_a,
                other_repo: repo_a,
                file1: m.file_b.clone(),
                file2: m.file_a.clone(),
                similarity: m.similarity,
                detected_at,
            });
            for id in [id_a, id_b] {
                if !affected.contains(&id) {
                    affected.push(id);
                }
            }
        }

        for id in affected {
            let analysis = analyses.get_mut(&id).expect("affected analysis loaded");
            analysis.source_suspicion_score = source_suspicion_score(
                analysis.avg_commit_suspicion_score,
                analysis.idle_bursts.len(),
                analysis.highest_similarity,
            );
            self.store.persist_source_analysis(analysis).await?;
            self.events
                .source_analysis_updated(SourceAnalysisSummary::from(&*analysis))
                .await;
        }

        Ok(matches)
    }

    async fn fetch_repo_files(&self, analysis: &SourceAnalysis) -> Result<Vec<RepoFile>> {
        let listing = self
            .host
            .list_files(&analysis.owner, &analysis.repo, &analysis.default_branch)
            .await?;
        let mut files = Vec::new();
        for file in listing {
            if !eligible_file(&file.path, file.size as usize) {
                continue;
            }
            match self
                .host
                .file_content(
                    &analysis.owner,
                    &analysis.repo,
                    &file.path,
                    &analysis.default_branch,
                )
                .await
            {
                Ok(content) => files.push(RepoFile {
                    path: file.path,
                    content,
                }),
                Err(e) => {
                    warn!(path = %file.path, "skipping unreadable file: {e}");
                }
            }
        }
        Ok(files)
    }
}
