//! Per-participant typing cadence, capped and summarised.

use crate::ids::ParticipantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of retained inter-keystroke interval samples.
pub const MAX_INTERVAL_SAMPLES: usize = 10_000;

/// Number of most-recent samples preserved after an overflow truncation.
pub const OVERFLOW_RETAIN: usize = 8_000;

/// A bounded ordered sequence of inter-keystroke intervals (milliseconds)
/// plus derived statistics. One per participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPattern {
    pub participant_id: ParticipantId,
    pub intervals: Vec<f64>,
    pub mean_interval: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub sample_count: usize,
    pub wpm_estimate: f64,
    pub updated_at: DateTime<Utc>,
}

impl TypingPattern {
    pub fn new(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            intervals: Vec::new(),
            mean_interval: 0.0,
            variance: 0.0,
            std_dev: 0.0,
            sample_count: 0,
            wpm_estimate: 0.0,
            updated_at: Utc::now(),
        }
    }

    /// Append new interval samples, enforce the retention bound, and
    /// recompute the derived statistics.
    pub fn extend(&mut self, new_intervals: &[f64]) {
        self.intervals.extend_from_slice(new_intervals);
        if self.intervals.len() > MAX_INTERVAL_SAMPLES {
            let excess = self.intervals.len() - OVERFLOW_RETAIN;
            self.intervals.drain(..excess);
        }
        self.recompute();
        self.updated_at = Utc::now();
    }

    fn recompute(&mut self) {
        self.sample_count = self.intervals.len();
        if self.intervals.is_empty() {
            self.mean_interval = 0.0;
            self.variance = 0.0;
            self.std_dev = 0.0;
            self.wpm_estimate = 0.0;
            return;
        }
        let n = self.intervals.len() as f64;
        let mean = self.intervals.iter().sum::<f64>() / n;
        let variance = self
            .intervals
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / n;
        self.mean_interval = mean;
        self.variance = variance;
        self.std_dev = variance.sqrt();
        self.wpm_estimate = if mean > 0.0 { 60_000.0 / mean / 5.0 } else { 0.0 };
    }
}
