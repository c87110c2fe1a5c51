//! What a work step sees: queue facades, the log, and the application context.

use super::log::{Severity, WorkerLog, failure_source};
use crate::context::AppContext;
use crate::db::Db;
use crate::error::{Error, Result};
use crate::queue::{DEFAULT_PRIORITY, DEFAULT_TUBE, Job, QueueClient};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;

pub struct WorkerContext {
    name: String,
    log: WorkerLog,
    queue: Option<Box<dyn QueueClient>>,
    app: Option<Arc<AppContext>>,
    iterations: u64,
}

impl WorkerContext {
    /// A context with no queue client: the queue facades fail with
    /// `FeatureDisabled` until one is attached.
    pub fn new(name: &str, log: WorkerLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            queue: None,
            app: None,
            iterations: 0,
        }
    }

    pub fn with_queue(mut self, client: Box<dyn QueueClient>) -> Self {
        self.queue = Some(client);
        self
    }

    pub fn with_app(mut self, app: Arc<AppContext>) -> Self {
        self.app = Some(app);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app(&self) -> Option<&AppContext> {
        self.app.as_deref()
    }

    pub fn db(&self) -> Option<&Db> {
        self.app.as_deref().and_then(AppContext::db)
    }

    pub fn queue_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Successful iterations so far.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub(crate) fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    pub fn log(&self, severity: Severity, message: impl AsRef<str>) {
        self.log.log(severity, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Severity::Info, message);
    }

    /// Log a failure at `fatal`, attributed to the root cause's type: the
    /// full cause chain, then a backtrace with source files and lines.
    ///
    /// The error's own backtrace is used when it captured one; otherwise one
    /// is taken here, whatever `RUST_BACKTRACE` says.
    pub fn log_failure(&self, err: &anyhow::Error) {
        let backtrace = match err.backtrace() {
            captured if captured.status() == BacktraceStatus::Captured => captured.to_string(),
            _ => Backtrace::force_capture().to_string(),
        };
        self.log.log_error(
            Severity::Fatal,
            failure_source(err),
            &format!("{err:#}\n{backtrace}"),
        );
    }

    /// Watch `queue`, stop watching `default`, and block until a job is reserved.
    pub async fn get_job(&mut self, queue: &str) -> Result<Job> {
        let client = self.client("get_job")?;
        client.watch(queue).await?;
        if queue != DEFAULT_TUBE {
            client.ignore(DEFAULT_TUBE).await?;
        }
        let job = client.reserve().await?;
        count_operation(Some(queue), "reserve");
        Ok(job)
    }

    /// Remove a finished job from the queue.
    pub async fn delete_job(&mut self, job: &Job) -> Result<()> {
        self.client("delete_job")?.delete(job).await?;
        count_operation(None, "delete");
        Ok(())
    }

    /// Set a job aside; it is not redelivered until kicked.
    pub async fn bury_job(&mut self, job: &Job) -> Result<()> {
        self.client("bury_job")?
            .bury(job, DEFAULT_PRIORITY)
            .await?;
        count_operation(None, "bury");
        Ok(())
    }

    fn client(&mut self, operation: &str) -> Result<&mut (dyn QueueClient + 'static)> {
        self.queue.as_deref_mut().ok_or_else(|| {
            Error::FeatureDisabled(format!(
                "{operation}: queue integration is not enabled for worker {}",
                self.name
            ))
        })
    }
}

fn count_operation(queue: Option<&str>, operation: &'static str) {
    let mut labels = vec![KeyValue::new("operation", operation)];
    if let Some(queue) = queue {
        labels.push(KeyValue::new("queue", queue.to_string()));
    }
    metrics::queue_operations().add(1, &labels);
}
