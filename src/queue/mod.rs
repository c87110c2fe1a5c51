//! Queue client boundary.
//!
//! The worker loop only ever talks to a [`QueueClient`]. The concrete
//! [`BeanstalkClient`] speaks the beanstalkd text protocol; tests inject
//! their own implementations.

pub mod beanstalk;

pub use beanstalk::BeanstalkClient;

use async_trait::async_trait;
use thiserror::Error;

/// Priority used when burying a job. Matches beanstalkd's customary default.
pub const DEFAULT_PRIORITY: u32 = 1024;

/// The tube every beanstalkd connection watches on connect.
pub const DEFAULT_TUBE: &str = "default";

/// A reserved job. Only its id is meaningful to the queue; the body belongs
/// to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: u64,
    pub body: Vec<u8>,
}

impl Job {
    pub fn new(id: u64, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            body: body.into(),
        }
    }

    /// Body as UTF-8, if it is.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("unexpected reply to {command}: {reply:?}")]
    Protocol { command: String, reply: String },

    #[error("server error: {0}")]
    Server(String),

    #[error("job {0} not found")]
    NotFound(u64),

    #[error("reserved job deadline is soon")]
    DeadlineSoon,

    #[error("cannot ignore the last watched tube")]
    NotIgnored,

    #[error("job body exceeds the server's max-job-size")]
    JobTooBig,

    #[error("invalid tube name {0:?}")]
    InvalidTube(String),
}

impl QueueError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueueError::Io(_) => "QueueIo",
            QueueError::ConnectionClosed => "ConnectionClosed",
            QueueError::Protocol { .. } => "Protocol",
            QueueError::Server(_) => "Server",
            QueueError::NotFound(_) => "NotFound",
            QueueError::DeadlineSoon => "DeadlineSoon",
            QueueError::NotIgnored => "NotIgnored",
            QueueError::JobTooBig => "JobTooBig",
            QueueError::InvalidTube(_) => "InvalidTube",
        }
    }
}

/// The narrow contract the worker needs from a work-queue client.
#[async_trait]
pub trait QueueClient: Send {
    /// Add `tube` to the watch list. Returns the number of watched tubes.
    async fn watch(&mut self, tube: &str) -> Result<usize, QueueError>;

    /// Remove `tube` from the watch list. Returns the number of watched tubes.
    async fn ignore(&mut self, tube: &str) -> Result<usize, QueueError>;

    /// Block until a job is available on a watched tube and claim it.
    async fn reserve(&mut self) -> Result<Job, QueueError>;

    async fn delete(&mut self, job: &Job) -> Result<(), QueueError>;

    async fn bury(&mut self, job: &Job, priority: u32) -> Result<(), QueueError>;
}
