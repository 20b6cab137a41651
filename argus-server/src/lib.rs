//! # Argus Server
//!
//! Real-time proctoring engine for programming contests.
//!
//! ## Overview
//!
//! The server ingests telemetry batches from editor agents running in
//! participant sandboxes, scores every event and participant for suspicious
//! behaviour, periodically pulls and analyses each registered repository's
//! commit history, detects cross-participant plagiarism with winnowed code
//! fingerprints, and pushes live updates and alerts to dashboard observers.
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL for persistent storage (behind a trait-abstracted gateway)
//! - JWT bearer tokens for the dashboard surface
//! - WebSocket rooms for live fan-out
//! - A single background worker for source-history synchronisation

/// Admission control: rate limits and payload validation
pub mod admission;

/// JWT authentication for the dashboard surface
pub mod auth;

/// Server config
pub mod config;

/// Error types and handling
pub mod errors;

/// Live-channel fan-out to dashboard observers
pub mod fabric;

/// Dashboard, analytics, source, and alert handlers
pub mod handlers;

/// Telemetry batch ingest pipeline
pub mod ingest;

/// Route organization
pub mod routes;

use argus_core::{ScoringConfig, StoreGateway, SyncScheduler};
use std::sync::Arc;
use std::time::Instant;

/// Server application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreGateway>,
    pub config: Arc<config::Config>,
    pub fabric: Arc<fabric::FabricManager>,
    pub limiter: Arc<admission::RateLimiter>,
    pub scoring: Arc<ScoringConfig>,
    /// Present only when a source token is configured.
    pub sync: Option<Arc<SyncScheduler>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn StoreGateway>, config: config::Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
            fabric: Arc::new(fabric::FabricManager::new()),
            limiter: Arc::new(admission::RateLimiter::new()),
            scoring: Arc::new(ScoringConfig::default()),
            sync: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_sync(mut self, sync: Arc<SyncScheduler>) -> Self {
        self.sync = Some(sync);
        self
    }
}
