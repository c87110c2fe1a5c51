//! Worker lifecycle: create (start hook), run (loop), finish (stop hook).

use super::WorkStep;
use super::context::WorkerContext;
use super::log::Severity;
use super::memory::{MemorySampler, ProcessMemory};
use crate::config::WorkerSettings;
use crate::error::{Error, Result};
use crate::telemetry::metrics;
use crate::telemetry::work::{record_stop, start_worker_span};
use opentelemetry::KeyValue;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::Instrument;
use uuid::Uuid;

/// Why a worker loop stopped without failing.
///
/// A failed work step is not a stop reason: `run` returns
/// `Err(Error::WorkerFailed(original))` so the failure propagates with `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Sampled memory went above the configured ceiling.
    MemoryLimitExceeded { usage: u64, limit: u64 },
    /// A [`ShutdownHandle`] asked the worker to stop.
    CancelledByCaller,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::MemoryLimitExceeded { .. } => "memory_limit_exceeded",
            StopReason::CancelledByCaller => "cancelled_by_caller",
        }
    }
}

/// Asks a running worker to stop after its current iteration.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.notify_one();
    }
}

pub struct Worker {
    id: Uuid,
    step: Box<dyn WorkStep>,
    ctx: WorkerContext,
    settings: WorkerSettings,
    sampler: Box<dyn MemorySampler>,
    shutdown: Arc<Notify>,
}

impl Worker {
    /// Build a worker: log `starting`, then run the step's start hook.
    pub async fn create(
        mut step: Box<dyn WorkStep>,
        mut ctx: WorkerContext,
        settings: WorkerSettings,
    ) -> Result<Self> {
        ctx.info("starting");
        if let Err(err) = step.on_start(&mut ctx).await {
            ctx.log_failure(&err);
            return Err(Error::WorkerFailed(err));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            step,
            ctx,
            settings,
            sampler: Box::new(ProcessMemory::new()),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Replace the process memory sampler.
    pub fn with_sampler(mut self, sampler: impl MemorySampler + 'static) -> Self {
        self.sampler = Box::new(sampler);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    pub fn settings(&self) -> WorkerSettings {
        self.settings
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Run the loop until the memory ceiling, a shutdown request, or a
    /// failed step ends it. The stop hook runs and `ending` is logged on
    /// every path.
    pub async fn run(mut self) -> Result<StopReason> {
        let span = start_worker_span(self.ctx.name(), &self.id);

        let outcome = self.run_loop().instrument(span.clone()).await;

        let reason = match &outcome {
            Ok(reason) => reason.as_str(),
            Err(_) => "worker_failed",
        };
        record_stop(&span, reason, self.ctx.iterations());

        self.finish().instrument(span).await;
        outcome
    }

    async fn run_loop(&mut self) -> Result<StopReason> {
        self.ctx.info("starting to run");
        let labels = [KeyValue::new("worker", self.ctx.name().to_string())];
        let limit = u64::try_from(self.settings.memory_limit)
            .ok()
            .filter(|limit| *limit > 0);

        loop {
            if let Err(err) = self.step.step(&mut self.ctx).await {
                self.ctx.log_failure(&err);
                metrics::worker_failures().add(1, &labels);
                return Err(Error::WorkerFailed(err));
            }

            self.ctx.record_iteration();
            metrics::worker_iterations().add(1, &labels);

            let usage = self.sampler.sample();
            metrics::worker_memory_usage().record(usage, &labels);
            self.ctx.info(format!("memory:{usage}"));

            if let Some(limit) = limit.filter(|limit| usage > *limit) {
                self.ctx.log(
                    Severity::Warning,
                    format!("exiting run due to memory limit ({usage} > {limit})"),
                );
                return Ok(StopReason::MemoryLimitExceeded { usage, limit });
            }

            tokio::select! {
                _ = self.shutdown.notified() => {
                    self.ctx.info("exiting run on shutdown request");
                    return Ok(StopReason::CancelledByCaller);
                }
                _ = tokio::time::sleep(self.settings.sleep_interval) => {}
            }
        }
    }

    async fn finish(&mut self) {
        if let Err(err) = self.step.on_stop(&mut self.ctx).await {
            self.ctx.log_failure(&err);
        }
        self.ctx.info("ending");
    }
}
