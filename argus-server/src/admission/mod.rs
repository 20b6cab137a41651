//! Admission control for the ingest endpoint.
//!
//! Requests pass through, in order: authentication (handled by the route
//! layer), the global and per-participant rate limits, and payload
//! validation. Rejections happen before any store I/O.

pub mod rate_limit;
pub mod validate;

use crate::AppState;
use argus_contracts::ingest::IngestRequest;
use argus_core::Result;

pub use rate_limit::{RateLimiter, GLOBAL_LIMIT, PER_PARTICIPANT_LIMIT};
pub use validate::{ValidEvent, ValidatedBatch, validate_ingest};

/// Run rate limiting and validation for one batch. The per-participant
/// limit keys on the payload's machine id, falling back to the caller's
/// source IP.
pub fn admit(state: &AppState, client_ip: &str, request: &IngestRequest) -> Result<ValidatedBatch> {
    let machine_id = request.participant.machine_id.trim();
    let participant_key = if machine_id.is_empty() {
        format!("ip:{client_ip}")
    } else {
        format!("machine:{machine_id}")
    };

    state.limiter.check_global()?;
    state.limiter.check_participant(&participant_key)?;

    validate_ingest(request)
}
