//! Error types for beanstalk-worker.

use crate::queue::QueueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad worker argument or startup configuration. Raised before any work begins.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A worker left its work step unimplemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A queue facade was used on a worker built without a queue client.
    #[error("feature disabled: {0}")]
    FeatureDisabled(String),

    #[error("config error: {0}")]
    Config(String),

    /// The work step failed. Carries the step's own error untouched.
    #[error("worker failed: {0:#}")]
    WorkerFailed(anyhow::Error),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Variant name, used to attribute failure records.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "InvalidConfiguration",
            Error::NotImplemented(_) => "NotImplemented",
            Error::FeatureDisabled(_) => "FeatureDisabled",
            Error::Config(_) => "Config",
            Error::WorkerFailed(_) => "WorkerFailed",
            Error::Queue(e) => e.kind(),
            Error::Io(_) => "Io",
            Error::Database(_) => "Database",
            Error::Other(_) => "Other",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
