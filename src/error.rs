use crate::domain::document::Document;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),
    #[error("Failed to write push configuration: {0}")]
    StoreWriteFailed(String),
    /// The backend accepted the registration but the local store could not record it.
    /// `response` is the backend's reply so callers can retry only the local step.
    #[error("Registered with the backend but failed to persist provider info: {source}")]
    PartialRegistration { response: Document, source: Box<AppError> },
    #[error("Transport failure: {0}")]
    TransportFailure(Arc<anyhow::Error>),
    #[error("Task was cancelled")]
    Cancelled,
    #[error("Blocking wait on a current-thread runtime would deadlock the driving thread")]
    BlockingWaitOnRuntime,
}

impl AppError {
    pub(crate) fn transport(err: anyhow::Error) -> Self {
        Self::TransportFailure(Arc::new(err))
    }

    /// The backend response carried by a partial registration, if any.
    #[must_use]
    pub const fn partial_response(&self) -> Option<&Document> {
        match self {
            Self::PartialRegistration { response, .. } => Some(response),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
