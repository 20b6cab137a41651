use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("unknown alert level: {0}")]
    UnknownAlertLevel(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
