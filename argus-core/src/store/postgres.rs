//! PostgreSQL-backed store gateway.
//!
//! All queries go through the runtime API so the crate builds without a
//! live database. Analysis records and typing patterns are stored as JSONB
//! documents with the sortable attributes lifted into columns.

use super::{
    EventFilter, EventPage, ParticipantPage, ParticipantSort, SortOrder, StoreGateway,
    SuspiciousEntry,
};
use crate::error::{EngineError, Result};
use argus_contracts::dashboard::{OverviewStats, SuspicionBucket};
use argus_model::{
    EventKind, EventRecord, Participant, ParticipantId, ParticipantStats, SourceAnalysis,
    TypingPattern,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS participants (
    id UUID PRIMARY KEY,
    machine_id TEXT NOT NULL,
    external_account_name TEXT,
    session_id TEXT,
    workspace TEXT,
    started_at TIMESTAMPTZ NOT NULL,
    last_active TIMESTAMPTZ NOT NULL,
    total_events BIGINT NOT NULL DEFAULT 0,
    paste_count BIGINT NOT NULL DEFAULT 0,
    paste_chars_total BIGINT NOT NULL DEFAULT 0,
    typing_anomalies BIGINT NOT NULL DEFAULT 0,
    window_blur_count BIGINT NOT NULL DEFAULT 0,
    window_blur_total_ms BIGINT NOT NULL DEFAULT 0,
    clipboard_changes BIGINT NOT NULL DEFAULT 0,
    files_created BIGINT NOT NULL DEFAULT 0,
    files_deleted BIGINT NOT NULL DEFAULT 0,
    suspicion_score DOUBLE PRECISION NOT NULL DEFAULT 0
);

CREATE UNIQUE INDEX IF NOT EXISTS participants_machine_id_key
    ON participants (machine_id);

CREATE TABLE IF NOT EXISTS events (
    id UUID PRIMARY KEY,
    participant_id UUID NOT NULL REFERENCES participants (id),
    kind TEXT NOT NULL,
    timestamp_ms BIGINT NOT NULL,
    data JSONB NOT NULL DEFAULT '{}'::jsonb,
    suspicion_score DOUBLE PRECISION NOT NULL DEFAULT 0,
    flagged BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX IF NOT EXISTS events_timeline_idx
    ON events (participant_id, timestamp_ms DESC);

CREATE INDEX IF NOT EXISTS events_flagged_idx
    ON events (flagged, suspicion_score DESC);

CREATE TABLE IF NOT EXISTS typing_patterns (
    participant_id UUID PRIMARY KEY REFERENCES participants (id),
    pattern JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS source_analyses (
    participant_id UUID PRIMARY KEY REFERENCES participants (id),
    owner TEXT NOT NULL,
    repo TEXT NOT NULL,
    record JSONB NOT NULL,
    source_suspicion_score DOUBLE PRECISION NOT NULL DEFAULT 0,
    registered_at TIMESTAMPTZ NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS source_analyses_repo_key
    ON source_analyses (owner, repo);
"#;

/// `StoreGateway` over a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore").finish_non_exhaustive()
    }
}

impl PostgresStore {
    /// Connect with a bounded pool. Fails fast; startup retry policy lives
    /// with the caller.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn participant_from_row(row: &PgRow) -> Result<Participant> {
    let stats = ParticipantStats {
        paste_count: row.try_get::<i64, _>("paste_count")? as u64,
        paste_chars_total: row.try_get::<i64, _>("paste_chars_total")? as u64,
        typing_anomalies: row.try_get::<i64, _>("typing_anomalies")? as u64,
        window_blur_count: row.try_get::<i64, _>("window_blur_count")? as u64,
        window_blur_total_ms: row.try_get::<i64, _>("window_blur_total_ms")? as u64,
        clipboard_changes: row.try_get::<i64, _>("clipboard_changes")? as u64,
        files_created: row.try_get::<i64, _>("files_created")? as u64,
        files_deleted: row.try_get::<i64, _>("files_deleted")? as u64,
    };
    Ok(Participant {
        id: ParticipantId::from(row.try_get::<Uuid, _>("id")?),
        machine_id: row.try_get("machine_id")?,
        external_account_name: row.try_get("external_account_name")?,
        session_id: row.try_get("session_id")?,
        workspace: row.try_get("workspace")?,
        started_at: row.try_get("started_at")?,
        last_active: row.try_get("last_active")?,
        total_events: row.try_get::<i64, _>("total_events")? as u64,
        stats,
        suspicion_score: row.try_get("suspicion_score")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<EventRecord> {
    let kind: String = row.try_get("kind")?;
    let kind = EventKind::from_str(&kind)
        .map_err(|e| EngineError::Internal(format!("corrupt event row: {e}")))?;
    let data: Json<serde_json::Value> = row.try_get("data")?;
    Ok(EventRecord {
        id: row.try_get::<Uuid, _>("id")?.into(),
        participant_id: ParticipantId::from(row.try_get::<Uuid, _>("participant_id")?),
        kind,
        timestamp_ms: row.try_get("timestamp_ms")?,
        data: data.0,
        suspicion_score: row.try_get("suspicion_score")?,
        flagged: row.try_get("flagged")?,
    })
}

fn analysis_from_row(row: &PgRow) -> Result<SourceAnalysis> {
    let record: Json<SourceAnalysis> = row.try_get("record")?;
    Ok(record.0)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

#[async_trait]
impl StoreGateway for PostgresStore {
    async fn initialize_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert_participant(
        &self,
        machine_id: &str,
        session_id: Option<&str>,
        workspace: Option<&str>,
    ) -> Result<Participant> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO participants (id, machine_id, session_id, workspace, started_at, last_active)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (machine_id) DO UPDATE SET
                last_active = EXCLUDED.last_active,
                session_id = COALESCE(EXCLUDED.session_id, participants.session_id),
                workspace = COALESCE(EXCLUDED.workspace, participants.workspace)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(machine_id)
        .bind(session_id)
        .bind(workspace)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        participant_from_row(&row)
    }

    async fn save_participant(&self, participant: &Participant) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE participants SET
                external_account_name = $2,
                session_id = $3,
                workspace = $4,
                last_active = $5,
                total_events = $6,
                paste_count = $7,
                paste_chars_total = $8,
                typing_anomalies = $9,
                window_blur_count = $10,
                window_blur_total_ms = $11,
                clipboard_changes = $12,
                files_created = $13,
                files_deleted = $14,
                suspicion_score = $15
            WHERE id = $1
            "#,
        )
        .bind(participant.id.to_uuid())
        .bind(&participant.external_account_name)
        .bind(&participant.session_id)
        .bind(&participant.workspace)
        .bind(participant.last_active)
        .bind(participant.total_events as i64)
        .bind(participant.stats.paste_count as i64)
        .bind(participant.stats.paste_chars_total as i64)
        .bind(participant.stats.typing_anomalies as i64)
        .bind(participant.stats.window_blur_count as i64)
        .bind(participant.stats.window_blur_total_ms as i64)
        .bind(participant.stats.clipboard_changes as i64)
        .bind(participant.stats.files_created as i64)
        .bind(participant.stats.files_deleted as i64)
        .bind(participant.suspicion_score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>> {
        let row = sqlx::query("SELECT * FROM participants WHERE id = $1")
            .bind(id.to_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(participant_from_row).transpose()
    }

    async fn list_participants(
        &self,
        sort: ParticipantSort,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<ParticipantPage> {
        let sort_column = match sort {
            ParticipantSort::SuspicionScore => "suspicion_score",
            ParticipantSort::LastActive => "last_active",
            ParticipantSort::TotalEvents => "total_events",
            ParticipantSort::StartedAt => "started_at",
        };
        let direction = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let query = format!(
            "SELECT * FROM participants ORDER BY {sort_column} {direction} LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&query)
            .bind(limit.max(0))
            .bind(offset.max(0))
            .fetch_all(&self.pool)
            .await?;
        let participants = rows
            .iter()
            .map(participant_from_row)
            .collect::<Result<Vec<_>>>()?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participants")
            .fetch_one(&self.pool)
            .await?;
        Ok(ParticipantPage {
            participants,
            total: total as u64,
        })
    }

    async fn append_events(&self, events: &[EventRecord]) -> Result<usize> {
        let mut written = 0;
        for event in events {
            let outcome = sqlx::query(
                r#"
                INSERT INTO events
                    (id, participant_id, kind, timestamp_ms, data, suspicion_score, flagged)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(event.id.to_uuid())
            .bind(event.participant_id.to_uuid())
            .bind(event.kind.as_str())
            .bind(event.timestamp_ms)
            .bind(Json(&event.data))
            .bind(event.suspicion_score)
            .bind(event.flagged)
            .execute(&self.pool)
            .await;
            match outcome {
                Ok(_) => written += 1,
                Err(e) => {
                    // Partial failures do not abort the batch.
                    warn!(event_id = %event.id, "failed to persist event: {e}");
                }
            }
        }
        Ok(written)
    }

    async fn events_for_participant(
        &self,
        id: ParticipantId,
        filter: &EventFilter,
    ) -> Result<EventPage> {
        let flagged_clause = if filter.flagged_only {
            " AND flagged = TRUE"
        } else {
            ""
        };
        let (list_kind_clause, count_kind_clause) = if filter.kind.is_some() {
            (" AND kind = $3", " AND kind = $2")
        } else {
            ("", "")
        };

        let list_sql = format!(
            "SELECT * FROM events WHERE participant_id = $1{list_kind_clause}{flagged_clause} \
             ORDER BY timestamp_ms DESC LIMIT $2 OFFSET {}",
            filter.offset.max(0)
        );
        let count_sql = format!(
            "SELECT COUNT(*) FROM events \
             WHERE participant_id = $1{count_kind_clause}{flagged_clause}"
        );

        let mut list_query = sqlx::query(&list_sql)
            .bind(id.to_uuid())
            .bind(filter.limit.max(0));
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(id.to_uuid());
        if let Some(kind) = filter.kind {
            list_query = list_query.bind(kind.as_str());
            count_query = count_query.bind(kind.as_str());
        }

        let rows = list_query.fetch_all(&self.pool).await?;
        let events = rows.iter().map(event_from_row).collect::<Result<Vec<_>>>()?;
        let total = count_query.fetch_one(&self.pool).await?;
        Ok(EventPage {
            events,
            total: total as u64,
        })
    }

    async fn suspicion_breakdown(&self, id: ParticipantId) -> Result<Vec<SuspicionBucket>> {
        let rows = sqlx::query(
            r#"
            SELECT kind, flagged,
                   COUNT(*) AS bucket_count,
                   AVG(suspicion_score) AS avg_score,
                   MAX(suspicion_score) AS max_score
            FROM events
            WHERE participant_id = $1
            GROUP BY kind, flagged
            ORDER BY kind, flagged
            "#,
        )
        .bind(id.to_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(SuspicionBucket {
                    kind: row.try_get("kind")?,
                    flagged: row.try_get("flagged")?,
                    count: row.try_get::<i64, _>("bucket_count")? as u64,
                    avg_score: row.try_get("avg_score")?,
                    max_score: row.try_get("max_score")?,
                })
            })
            .collect()
    }

    async fn update_typing_pattern(
        &self,
        id: ParticipantId,
        intervals: &[f64],
    ) -> Result<TypingPattern> {
        // Read-modify-write under a transaction keeps the truncation and
        // statistics recompute atomic.
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query(
            "SELECT pattern FROM typing_patterns WHERE participant_id = $1 FOR UPDATE",
        )
        .bind(id.to_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let mut pattern = match existing {
            Some(row) => {
                let stored: Json<TypingPattern> = row.try_get("pattern")?;
                stored.0
            }
            None => TypingPattern::new(id),
        };
        pattern.extend(intervals);

        sqlx::query(
            r#"
            INSERT INTO typing_patterns (participant_id, pattern)
            VALUES ($1, $2)
            ON CONFLICT (participant_id) DO UPDATE SET pattern = EXCLUDED.pattern
            "#,
        )
        .bind(id.to_uuid())
        .bind(Json(&pattern))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(pattern)
    }

    async fn get_typing_pattern(&self, id: ParticipantId) -> Result<Option<TypingPattern>> {
        let row = sqlx::query("SELECT pattern FROM typing_patterns WHERE participant_id = $1")
            .bind(id.to_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            let stored: Json<TypingPattern> = row.try_get("pattern")?;
            Ok(stored.0)
        })
        .transpose()
    }

    async fn recent_clipboard_count(&self, id: ParticipantId, since_ms: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM events
            WHERE participant_id = $1 AND kind = 'clipboard' AND timestamp_ms >= $2
            "#,
        )
        .bind(id.to_uuid())
        .bind(since_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn has_any_typing_event(&self, id: ParticipantId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM events
                WHERE participant_id = $1 AND kind IN ('typing', 'file_change')
            )
            "#,
        )
        .bind(id.to_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn suspicious_participants(&self, limit: i64) -> Result<Vec<SuspiciousEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT p.*,
                   (SELECT COUNT(*) FROM events e
                    WHERE e.participant_id = p.id AND e.flagged) AS flagged_event_count
            FROM participants p
            WHERE p.suspicion_score > 0
            ORDER BY p.suspicion_score DESC
            LIMIT $1
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(SuspiciousEntry {
                    participant: participant_from_row(row)?,
                    flagged_event_count: row.try_get::<i64, _>("flagged_event_count")? as u64,
                })
            })
            .collect()
    }

    async fn overview_stats(&self) -> Result<OverviewStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM participants) AS total_participants,
                (SELECT COUNT(*) FROM participants
                 WHERE last_active >= NOW() - INTERVAL '5 minutes') AS active_participants,
                (SELECT COUNT(*) FROM events) AS total_events,
                (SELECT COUNT(*) FROM events WHERE flagged) AS flagged_events,
                (SELECT COALESCE(AVG(suspicion_score), 0) FROM participants) AS avg_suspicion
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(OverviewStats {
            total_participants: row.try_get::<i64, _>("total_participants")? as u64,
            active_participants: row.try_get::<i64, _>("active_participants")? as u64,
            total_events: row.try_get::<i64, _>("total_events")? as u64,
            flagged_events: row.try_get::<i64, _>("flagged_events")? as u64,
            avg_suspicion_score: row.try_get("avg_suspicion")?,
        })
    }

    async fn get_or_create_source_analysis(
        &self,
        participant_id: ParticipantId,
        owner: &str,
        repo: &str,
        default_branch: &str,
    ) -> Result<SourceAnalysis> {
        if let Some(existing) = self.get_source_analysis(participant_id).await? {
            return Ok(existing);
        }
        let analysis = SourceAnalysis::new(participant_id, owner, repo, default_branch);
        let inserted = sqlx::query(
            r#"
            INSERT INTO source_analyses
                (participant_id, owner, repo, record, source_suspicion_score, registered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(participant_id.to_uuid())
        .bind(owner)
        .bind(repo)
        .bind(Json(&analysis))
        .bind(analysis.source_suspicion_score)
        .bind(analysis.registered_at)
        .execute(&self.pool)
        .await;
        match inserted {
            Ok(_) => Ok(analysis),
            Err(e) if is_unique_violation(&e) => Err(EngineError::validation(
                "repo",
                format!("{owner}/{repo} is already registered"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist_source_analysis(&self, analysis: &SourceAnalysis) -> Result<()> {
        let mut record = analysis.clone();
        record.truncate_bounded_lists();
        sqlx::query(
            r#"
            INSERT INTO source_analyses
                (participant_id, owner, repo, record, source_suspicion_score, registered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (participant_id) DO UPDATE SET
                record = EXCLUDED.record,
                source_suspicion_score = EXCLUDED.source_suspicion_score
            "#,
        )
        .bind(record.participant_id.to_uuid())
        .bind(&record.owner)
        .bind(&record.repo)
        .bind(Json(&record))
        .bind(record.source_suspicion_score)
        .bind(record.registered_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_source_analysis(
        &self,
        participant_id: ParticipantId,
    ) -> Result<Option<SourceAnalysis>> {
        let row = sqlx::query("SELECT record FROM source_analyses WHERE participant_id = $1")
            .bind(participant_id.to_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(analysis_from_row).transpose()
    }

    async fn list_source_analyses(&self) -> Result<Vec<SourceAnalysis>> {
        let rows = sqlx::query("SELECT record FROM source_analyses ORDER BY registered_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(analysis_from_row).collect()
    }

    async fn top_source_analyses(&self, limit: i64) -> Result<Vec<SourceAnalysis>> {
        let rows = sqlx::query(
            "SELECT record FROM source_analyses ORDER BY source_suspicion_score DESC LIMIT $1",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(analysis_from_row).collect()
    }
}
