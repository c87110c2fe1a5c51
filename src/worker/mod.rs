//! Worker loop: a worker-supplied work step run forever, one iteration at a
//! time, with a memory ceiling, a fixed pause, and a per-worker log file.

pub mod context;
pub mod log;
pub mod memory;
pub mod runtime;

pub use context::WorkerContext;
pub use log::{SectionLog, Severity, WorkerLog};
pub use memory::{MemorySampler, ProcessMemory};
pub use runtime::{ShutdownHandle, StopReason, Worker};

use crate::error::Error;
use async_trait::async_trait;

/// The capability a worker type provides.
///
/// Only `step` does real work; the hooks default to no-ops. A type that
/// forgets to implement `step` fails on the first iteration with
/// `Error::NotImplemented`.
#[async_trait]
pub trait WorkStep: Send {
    /// Runs once, before the loop starts.
    async fn on_start(&mut self, _ctx: &mut WorkerContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Process one unit of work.
    async fn step(&mut self, ctx: &mut WorkerContext) -> anyhow::Result<()> {
        Err(Error::NotImplemented(format!("worker {} must implement step()", ctx.name())).into())
    }

    /// Runs once after the loop ends, whatever ended it.
    async fn on_stop(&mut self, _ctx: &mut WorkerContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Whether the worker needs a queue client injected.
    fn uses_queue(&self) -> bool {
        true
    }
}
