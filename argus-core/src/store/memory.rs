//! In-memory store double used by unit and integration tests.

use super::{
    EventFilter, EventPage, ParticipantPage, ParticipantSort, SortOrder, StoreGateway,
    SuspiciousEntry,
};
use crate::error::{EngineError, Result};
use argus_contracts::dashboard::{OverviewStats, SuspicionBucket};
use argus_model::{
    EventKind, EventRecord, Participant, ParticipantId, SourceAnalysis, TypingPattern,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    participants: HashMap<ParticipantId, Participant>,
    by_machine: HashMap<String, ParticipantId>,
    events: Vec<EventRecord>,
    typing: HashMap<ParticipantId, TypingPattern>,
    analyses: HashMap<ParticipantId, SourceAnalysis>,
}

/// A `StoreGateway` backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreGateway for MemoryStore {
    async fn initialize_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_participant(
        &self,
        machine_id: &str,
        session_id: Option<&str>,
        workspace: Option<&str>,
    ) -> Result<Participant> {
        let mut inner = self.inner.write().await;
        let id = inner.by_machine.get(machine_id).copied();
        let participant = match id {
            Some(id) => {
                let participant = inner
                    .participants
                    .get_mut(&id)
                    .expect("machine index out of sync");
                participant.last_active = Utc::now();
                if session_id.is_some() {
                    participant.session_id = session_id.map(str::to_string);
                }
                if workspace.is_some() {
                    participant.workspace = workspace.map(str::to_string);
                }
                participant.clone()
            }
            None => {
                let mut participant = Participant::new(machine_id);
                participant.session_id = session_id.map(str::to_string);
                participant.workspace = workspace.map(str::to_string);
                inner.by_machine.insert(machine_id.to_string(), participant.id);
                inner.participants.insert(participant.id, participant.clone());
                participant
            }
        };
        Ok(participant)
    }

    async fn save_participant(&self, participant: &Participant) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .participants
            .insert(participant.id, participant.clone());
        inner
            .by_machine
            .insert(participant.machine_id.clone(), participant.id);
        Ok(())
    }

    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>> {
        Ok(self.inner.read().await.participants.get(&id).cloned())
    }

    async fn list_participants(
        &self,
        sort: ParticipantSort,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<ParticipantPage> {
        let inner = self.inner.read().await;
        let mut participants: Vec<Participant> = inner.participants.values().cloned().collect();
        participants.sort_by(|a, b| {
            let ordering = match sort {
                ParticipantSort::SuspicionScore => a
                    .suspicion_score
                    .partial_cmp(&b.suspicion_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
                ParticipantSort::LastActive => a.last_active.cmp(&b.last_active),
                ParticipantSort::TotalEvents => a.total_events.cmp(&b.total_events),
                ParticipantSort::StartedAt => a.started_at.cmp(&b.started_at),
            };
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        let total = participants.len() as u64;
        let page = participants
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok(ParticipantPage {
            participants: page,
            total,
        })
    }

    async fn append_events(&self, events: &[EventRecord]) -> Result<usize> {
        let mut inner = self.inner.write().await;
        inner.events.extend_from_slice(events);
        Ok(events.len())
    }

    async fn events_for_participant(
        &self,
        id: ParticipantId,
        filter: &EventFilter,
    ) -> Result<EventPage> {
        let inner = self.inner.read().await;
        let mut events: Vec<EventRecord> = inner
            .events
            .iter()
            .filter(|e| e.participant_id == id)
            .filter(|e| filter.kind.is_none_or(|kind| e.kind == kind))
            .filter(|e| !filter.flagged_only || e.flagged)
            .cloned()
            .collect();
        // Newest first, matching the timeline index.
        events.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        let total = events.len() as u64;
        let page = events
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok(EventPage {
            events: page,
            total,
        })
    }

    async fn suspicion_breakdown(&self, id: ParticipantId) -> Result<Vec<SuspicionBucket>> {
        let inner = self.inner.read().await;
        let mut buckets: HashMap<(EventKind, bool), (u64, f64, f64)> = HashMap::new();
        for event in inner.events.iter().filter(|e| e.participant_id == id) {
            let entry = buckets
                .entry((event.kind, event.flagged))
                .or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += event.suspicion_score;
            entry.2 = entry.2.max(event.suspicion_score);
        }
        let mut breakdown: Vec<SuspicionBucket> = buckets
            .into_iter()
            .map(|((kind, flagged), (count, sum, max))| SuspicionBucket {
                kind: kind.as_str().to_string(),
                flagged,
                count,
                avg_score: sum / count as f64,
                max_score: max,
            })
            .collect();
        breakdown.sort_by(|a, b| (&a.kind, a.flagged).cmp(&(&b.kind, b.flagged)));
        Ok(breakdown)
    }

    async fn update_typing_pattern(
        &self,
        id: ParticipantId,
        intervals: &[f64],
    ) -> Result<TypingPattern> {
        let mut inner = self.inner.write().await;
        let pattern = inner
            .typing
            .entry(id)
            .or_insert_with(|| TypingPattern::new(id));
        pattern.extend(intervals);
        Ok(pattern.clone())
    }

    async fn get_typing_pattern(&self, id: ParticipantId) -> Result<Option<TypingPattern>> {
        Ok(self.inner.read().await.typing.get(&id).cloned())
    }

    async fn recent_clipboard_count(&self, id: ParticipantId, since_ms: i64) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .iter()
            .filter(|e| {
                e.participant_id == id
                    && e.kind == EventKind::Clipboard
                    && e.timestamp_ms >= since_ms
            })
            .count() as u64)
    }

    async fn has_any_typing_event(&self, id: ParticipantId) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner.events.iter().any(|e| {
            e.participant_id == id
                && matches!(e.kind, EventKind::Typing | EventKind::FileChange)
        }))
    }

    async fn suspicious_participants(&self, limit: i64) -> Result<Vec<SuspiciousEntry>> {
        let inner = self.inner.read().await;
        let mut suspicious: Vec<&Participant> = inner
            .participants
            .values()
            .filter(|p| p.suspicion_score > 0.0)
            .collect();
        suspicious.sort_by(|a, b| {
            b.suspicion_score
                .partial_cmp(&a.suspicion_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(suspicious
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|p| SuspiciousEntry {
                flagged_event_count: inner
                    .events
                    .iter()
                    .filter(|e| e.participant_id == p.id && e.flagged)
                    .count() as u64,
                participant: p.clone(),
            })
            .collect())
    }

    async fn overview_stats(&self) -> Result<OverviewStats> {
        let inner = self.inner.read().await;
        let total_participants = inner.participants.len() as u64;
        let active_cutoff = Utc::now() - Duration::minutes(5);
        let active_participants = inner
            .participants
            .values()
            .filter(|p| p.last_active >= active_cutoff)
            .count() as u64;
        let avg_suspicion_score = if total_participants == 0 {
            0.0
        } else {
            inner
                .participants
                .values()
                .map(|p| p.suspicion_score)
                .sum::<f64>()
                / total_participants as f64
        };
        Ok(OverviewStats {
            total_participants,
            active_participants,
            total_events: inner.events.len() as u64,
            flagged_events: inner.events.iter().filter(|e| e.flagged).count() as u64,
            avg_suspicion_score,
        })
    }

    async fn get_or_create_source_analysis(
        &self,
        participant_id: ParticipantId,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<SourceAnalysis> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.analyses.get(&participant_id) {
            return Ok(existing.clone());
        }
        // (owner, repo) is unique across participants.
        if inner
            .analyses
            .values()
            .any(|a| a.owner == owner && a.repo == repo)
        {
            return Err(EngineError::validation(
                "repo",
                format!("{owner}/{repo} is already registered"),
            ));
        }
        let analysis = SourceAnalysis::new(participant_id, owner, repo, default_branch);
        inner.analyses.insert(participant_id, analysis.clone());
        Ok(analysis)
    }

    async fn persist_source_analysis(&self, analysis: &SourceAnalysis) -> Result<()> {
        let mut record = analysis.clone();
        record.truncate_bounded_lists();
        self.inner
            .write()
            .await
            .analyses
            .insert(record.participant_id, record);
        Ok(())
    }

    async fn get_source_analysis(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Option<SourceAnalysis>> {
        Ok(self.inner.read().await.analyses.get(&participant_id).cloned())
    }

    async fn list_source_analyses(&self) -> Result<Vec<SourceAnalysis>> {
        let inner = self.inner.read().await;
        let mut analyses: Vec<SourceAnalysis> = inner.analyses.values().cloned().collect();
        analyses.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        Ok(analyses)
    }

    async fn top_source_analyses(&self, limit: i64) -> Result<Vec<SourceAnalysis>> {
        let mut analyses = self.list_source_analyses().await?;
        analyses.sort_by(|a, b| {
            b.source_suspicion_score
                .partial_cmp(&a.source_suspicion_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        analyses.truncate(limit.max(0) as usize);
        Ok(analyses)
    }
}
