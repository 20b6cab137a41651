//! Per-event suspicion scoring, aggregate participant scoring, and alert
//! threshold evaluation.
//!
//! Scoring is pure: contributions accumulate additively, clamp at 1.0, and
//! round to three decimals. Event payloads arrive as opaque JSON; the
//! accessors below destructure the kind-specific fields the agents ship.

use crate::clamp_score;
use argus_model::{AlertEvaluation, AlertLevel, EventKind, Participant, ParticipantStats};
use serde_json::Value;

/// Batch-local typing statistics computed over the submitted intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypingStats {
    pub avg_interval: f64,
    /// Population variance.
    pub variance: f64,
}

impl TypingStats {
    /// Arithmetic mean and population variance of a batch of interval
    /// samples; `None` for an empty batch.
    pub fn from_intervals(intervals: &[f64]) -> Option<Self> {
        if intervals.is_empty() {
            return None;
        }
        let n = intervals.len() as f64;
        let mean = intervals.iter().sum::<f64>() / n;
        let variance = intervals
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / n;
        Some(Self {
            avg_interval: mean,
            variance,
        })
    }
}

/// Per-participant derived state read by the ingest pipeline before
/// scoring a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecentContext {
    /// Clipboard events recorded in the last 60 seconds.
    pub clipboard_changes_60s: u64,
    /// Whether any typing or file-change event has ever been recorded.
    pub had_typing_before: bool,
}

/// Score and reasons for a single event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventScore {
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Scoring thresholds and contributions, with the deployed defaults.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub large_paste_len: u64,
    pub large_paste_score: f64,
    pub medium_paste_len: u64,
    pub medium_paste_score: f64,
    pub fast_typing_interval_ms: f64,
    pub fast_typing_score: f64,
    pub fast_avg_interval_ms: f64,
    pub fast_avg_score: f64,
    pub high_variance_threshold: f64,
    pub high_variance_score: f64,
    pub long_blur_ms: u64,
    pub long_blur_score: f64,
    pub clipboard_burst_count: u64,
    pub clipboard_burst_score: f64,
    pub cold_file_create_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            large_paste_len: 500,
            large_paste_score: 0.9,
            medium_paste_len: 100,
            medium_paste_score: 0.6,
            fast_typing_interval_ms: 30.0,
            fast_typing_score: 0.4,
            fast_avg_interval_ms: 30.0,
            fast_avg_score: 0.4,
            high_variance_threshold: 15_000.0,
            high_variance_score: 0.3,
            long_blur_ms: 120_000,
            long_blur_score: 0.2,
            clipboard_burst_count: 5,
            clipboard_burst_score: 0.3,
            cold_file_create_score: 0.5,
        }
    }
}

impl ScoringConfig {
    /// Score one event against its payload, the batch typing statistics,
    /// and the participant's recent context.
    pub fn score_event(
        &self,
        kind: EventKind,
        data: &Value,
        typing_stats: Option<&TypingStats>,
        context: &RecentContext,
    ) -> EventScore {
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if kind == EventKind::Paste {
            let length = paste_length(data);
            if length > self.large_paste_len {
                score += self.large_paste_score;
                reasons.push("large_paste".to_string());
            } else if length > self.medium_paste_len {
                score += self.medium_paste_score;
                reasons.push("medium_paste".to_string());
            }
        }

        if kind == EventKind::Typing
            && data.get("anomaly").and_then(Value::as_str) == Some("fast_typing")
        {
            let interval = data.get("interval").and_then(Value::as_f64).unwrap_or(0.0);
            if interval > 0.0 && interval < self.fast_typing_interval_ms {
                score += self.fast_typing_score;
                reasons.push("fast_typing".to_string());
            }
        }

        if let Some(stats) = typing_stats {
            if stats.avg_interval > 0.0 && stats.avg_interval < self.fast_avg_interval_ms {
                score += self.fast_avg_score;
                reasons.push("avg_typing_too_fast".to_string());
            }
            if stats.variance > self.high_variance_threshold {
                score += self.high_variance_score;
                reasons.push("high_variance".to_string());
            }
        }

        if kind == EventKind::WindowBlur
            && data.get("focused").and_then(Value::as_bool) == Some(false)
        {
            let unfocused_ms = data
                .get("unfocusedDurationMs")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            if unfocused_ms > self.long_blur_ms {
                score += self.long_blur_score;
                reasons.push("long_blur".to_string());
            }
        }

        if kind == EventKind::Clipboard && context.clipboard_changes_60s > self.clipboard_burst_count
        {
            score += self.clipboard_burst_score;
            reasons.push("clipboard_burst".to_string());
        }

        if kind == EventKind::FileOperation
            && data.get("operation").and_then(Value::as_str) == Some("create")
            && !context.had_typing_before
        {
            score += self.cold_file_create_score;
            reasons.push("file_created_no_typing".to_string());
        }

        EventScore {
            score: clamp_score(score),
            reasons,
        }
    }

    /// Aggregate participant score, a pure function of the counters.
    pub fn participant_score(&self, stats: &ParticipantStats) -> f64 {
        let mut score = (0.18 * ((stats.paste_count + 1) as f64).log10()).min(0.5);
        if stats.paste_chars_total > 1_000 {
            score += (stats.paste_chars_total as f64 / 10_000.0).min(0.3);
        }
        if stats.typing_anomalies > 5 {
            score += (stats.typing_anomalies as f64 / 100.0).min(0.2);
        }
        if stats.window_blur_total_ms > 600_000 {
            score += 0.15;
        }
        if stats.clipboard_changes > 20 {
            score += (stats.clipboard_changes as f64 / 200.0).min(0.15);
        }
        clamp_score(score)
    }

    /// Evaluate alert thresholds against an updated participant. Every
    /// triggered condition contributes a reason; the level is the most
    /// severe one tripped.
    pub fn evaluate_alert(&self, participant: &Participant) -> AlertEvaluation {
        let mut reasons = Vec::new();
        let score = participant.suspicion_score;

        if score > 0.7 {
            reasons.push(format!("high_suspicion_score ({score:.3})"));
        }
        if participant.stats.paste_count > 10 {
            reasons.push(format!("excessive_pastes ({})", participant.stats.paste_count));
        }
        if participant.stats.window_blur_total_ms > 600_000 {
            reasons.push(format!(
                "extended_window_blur ({}ms)",
                participant.stats.window_blur_total_ms
            ));
        }

        let level = if score > 0.7 {
            AlertLevel::Critical
        } else if participant.stats.paste_count > 10
            || participant.stats.window_blur_total_ms > 600_000
        {
            AlertLevel::Warning
        } else {
            AlertLevel::None
        };

        AlertEvaluation {
            level,
            reasons,
            score,
        }
    }
}

/// Pasted character count from a paste event's payload.
pub fn paste_length(data: &Value) -> u64 {
    data.get("length").and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    fn ctx() -> RecentContext {
        RecentContext::default()
    }

    #[test]
    fn paste_length_boundaries() {
        let cfg = config();
        let score_at = |len: u64| {
            cfg.score_event(EventKind::Paste, &json!({"length": len}), None, &ctx())
        };
        assert_eq!(score_at(100).score, 0.0);
        assert_eq!(score_at(101).score, 0.6);
        assert_eq!(score_at(101).reasons, vec!["medium_paste"]);
        assert_eq!(score_at(500).score, 0.6);
        assert_eq!(score_at(501).score, 0.9);
        assert_eq!(score_at(501).reasons, vec!["large_paste"]);
        assert_eq!(score_at(600).score, 0.9);
    }

    #[test]
    fn fast_typing_requires_anomaly_tag_and_interval() {
        let cfg = config();
        let scored = cfg.score_event(
            EventKind::Typing,
            &json!({"anomaly": "fast_typing", "interval": 12.0}),
            None,
            &ctx(),
        );
        assert_eq!(scored.score, 0.4);
        assert_eq!(scored.reasons, vec!["fast_typing"]);

        // Interval of zero means no measurement, not infinite speed.
        let zero = cfg.score_event(
            EventKind::Typing,
            &json!({"anomaly": "fast_typing", "interval": 0.0}),
            None,
            &ctx(),
        );
        assert_eq!(zero.score, 0.0);

        let untagged = cfg.score_event(
            EventKind::Typing,
            &json!({"interval": 12.0}),
            None,
            &ctx(),
        );
        assert_eq!(untagged.score, 0.0);
    }

    #[test]
    fn batch_typing_stats_contribute() {
        let cfg = config();
        let fast = TypingStats {
            avg_interval: 20.0,
            variance: 100.0,
        };
        let scored = cfg.score_event(EventKind::Typing, &json!({}), Some(&fast), &ctx());
        assert_eq!(scored.score, 0.4);
        assert_eq!(scored.reasons, vec!["avg_typing_too_fast"]);

        let erratic = TypingStats {
            avg_interval: 150.0,
            variance: 16_000.0,
        };
        let scored = cfg.score_event(EventKind::FileChange, &json!({}), Some(&erratic), &ctx());
        assert_eq!(scored.score, 0.3);
        assert_eq!(scored.reasons, vec!["high_variance"]);
    }

    #[test]
    fn long_blur_requires_unfocused_over_two_minutes() {
        let cfg = config();
        let scored = cfg.score_event(
            EventKind::WindowBlur,
            &json!({"focused": false, "unfocusedDurationMs": 120_001}),
            None,
            &ctx(),
        );
        assert_eq!(scored.score, 0.2);
        assert_eq!(scored.reasons, vec!["long_blur"]);

        let boundary = cfg.score_event(
            EventKind::WindowBlur,
            &json!({"focused": false, "unfocusedDurationMs": 120_000}),
            None,
            &ctx(),
        );
        assert_eq!(boundary.score, 0.0);

        let focused = cfg.score_event(
            EventKind::WindowBlur,
            &json!({"focused": true, "unfocusedDurationMs": 500_000}),
            None,
            &ctx(),
        );
        assert_eq!(focused.score, 0.0);
    }

    #[test]
    fn clipboard_burst_uses_recent_context() {
        let cfg = config();
        let busy = RecentContext {
            clipboard_changes_60s: 6,
            had_typing_before: true,
        };
        let scored = cfg.score_event(EventKind::Clipboard, &json!({}), None, &busy);
        assert_eq!(scored.score, 0.3);
        assert_eq!(scored.reasons, vec!["clipboard_burst"]);

        let calm = RecentContext {
            clipboard_changes_60s: 5,
            had_typing_before: true,
        };
        assert_eq!(
            cfg.score_event(EventKind::Clipboard, &json!({}), None, &calm).score,
            0.0
        );
    }

    #[test]
    fn cold_file_creation_scores_without_prior_typing() {
        let cfg = config();
        let scored = cfg.score_event(
            EventKind::FileOperation,
            &json!({"operation": "create"}),
            None,
            &ctx(),
        );
        assert_eq!(scored.score, 0.5);
        assert_eq!(scored.reasons, vec!["file_created_no_typing"]);

        let warmed = RecentContext {
            clipboard_changes_60s: 0,
            had_typing_before: true,
        };
        let scored = cfg.score_event(
            EventKind::FileOperation,
            &json!({"operation": "create"}),
            None,
            &warmed,
        );
        assert_eq!(scored.score, 0.0);

        let delete = cfg.score_event(
            EventKind::FileOperation,
            &json!({"operation": "delete"}),
            None,
            &ctx(),
        );
        assert_eq!(delete.score, 0.0);
    }

    #[test]
    fn contributions_accumulate_and_clamp() {
        let cfg = config();
        let stats = TypingStats {
            avg_interval: 10.0,
            variance: 20_000.0,
        };
        let scored = cfg.score_event(
            EventKind::Paste,
            &json!({"length": 5_000}),
            Some(&stats),
            &ctx(),
        );
        // 0.9 + 0.4 + 0.3 clamps to 1.0.
        assert_eq!(scored.score, 1.0);
        assert_eq!(
            scored.reasons,
            vec!["large_paste", "avg_typing_too_fast", "high_variance"]
        );
    }

    #[test]
    fn participant_score_for_single_paste() {
        let cfg = config();
        let stats = ParticipantStats {
            paste_count: 1,
            paste_chars_total: 600,
            ..Default::default()
        };
        // 0.18 * log10(2), chars below the 1000 gate.
        assert_eq!(cfg.participant_score(&stats), 0.054);
    }

    #[test]
    fn participant_score_term_gates() {
        let cfg = config();
        let stats = ParticipantStats {
            paste_count: 0,
            paste_chars_total: 1_000,
            typing_anomalies: 5,
            clipboard_changes: 20,
            window_blur_total_ms: 600_000,
            ..Default::default()
        };
        // Every term sits exactly at its gate: nothing contributes.
        assert_eq!(cfg.participant_score(&stats), 0.0);

        let over = ParticipantStats {
            paste_count: 0,
            paste_chars_total: 1_001,
            typing_anomalies: 6,
            clipboard_changes: 21,
            window_blur_total_ms: 600_001,
            ..Default::default()
        };
        let expected = 1_001.0 / 10_000.0 + 6.0 / 100.0 + 0.15 + 21.0 / 200.0;
        assert_eq!(cfg.participant_score(&over), crate::round3(expected));
    }

    #[test]
    fn participant_score_caps_each_term() {
        let cfg = config();
        let stats = ParticipantStats {
            paste_count: 1_000_000,
            paste_chars_total: 10_000_000,
            typing_anomalies: 10_000,
            clipboard_changes: 100_000,
            window_blur_total_ms: 100_000_000,
            ..Default::default()
        };
        // 0.5 + 0.3 + 0.2 + 0.15 + 0.15 clamps to 1.0.
        assert_eq!(cfg.participant_score(&stats), 1.0);
    }

    #[test]
    fn alert_levels_follow_thresholds() {
        let cfg = config();
        let mut participant = Participant::new("m-alert");

        participant.suspicion_score = 0.3;
        assert_eq!(cfg.evaluate_alert(&participant).level, AlertLevel::None);
        assert!(!cfg.evaluate_alert(&participant).should_alert());

        participant.stats.paste_count = 11;
        let evaluation = cfg.evaluate_alert(&participant);
        assert_eq!(evaluation.level, AlertLevel::Warning);
        assert_eq!(evaluation.reasons, vec!["excessive_pastes (11)"]);

        participant.suspicion_score = 0.71;
        let evaluation = cfg.evaluate_alert(&participant);
        assert_eq!(evaluation.level, AlertLevel::Critical);
        assert_eq!(evaluation.reasons.len(), 2);
    }

    #[test]
    fn blur_warning_boundary() {
        let cfg = config();
        let mut participant = Participant::new("m-blur");
        participant.stats.window_blur_total_ms = 600_000;
        assert_eq!(cfg.evaluate_alert(&participant).level, AlertLevel::None);
        participant.stats.window_blur_total_ms = 600_001;
        assert_eq!(cfg.evaluate_alert(&participant).level, AlertLevel::Warning);
    }

    #[test]
    fn typing_stats_from_uniform_batch() {
        let stats = TypingStats::from_intervals(&vec![150.0; 100]).unwrap();
        assert_eq!(stats.avg_interval, 150.0);
        assert_eq!(stats.variance, 0.0);
        assert!(TypingStats::from_intervals(&[]).is_none());
    }
}
