pub mod alerts;
pub mod analytics;
pub mod participants;
pub mod source;
