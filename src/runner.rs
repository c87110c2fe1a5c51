//! Worker runner: resolve a worker by name, open its context, build it, run it.

use crate::config::Config;
use crate::context::AppContext;
use crate::error::Result;
use crate::queue::BeanstalkClient;
use crate::registry::WorkerRegistry;
use crate::worker::{SectionLog, StopReason, Worker, WorkerContext, WorkerLog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// One `run` invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Registered worker name.
    pub worker: String,
    /// Log directory. Defaults to the configured one.
    pub log_dir: Option<PathBuf>,
    pub application: String,
    pub environment: String,
    pub connection: String,
}

impl RunRequest {
    pub fn new(worker: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            log_dir: None,
            application: "frontend".to_string(),
            environment: "dev".to_string(),
            connection: "doctrine".to_string(),
        }
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }
}

pub struct WorkerRunner {
    config: Config,
    registry: WorkerRegistry,
}

impl WorkerRunner {
    pub fn new(config: Config, registry: WorkerRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Build the requested worker without running it.
    ///
    /// The worker name is validated first: an unknown name fails with
    /// `InvalidConfiguration` before the context is opened or anything is
    /// constructed.
    pub async fn prepare(
        &self,
        request: &RunRequest,
        section: Option<Arc<dyn SectionLog>>,
    ) -> Result<Worker> {
        let factory = self.registry.resolve(&request.worker)?;

        let app = AppContext::open(
            &self.config,
            &request.application,
            &request.environment,
            &request.connection,
        )
        .await?;

        let step = factory(&self.config)?;

        let log_dir = request
            .log_dir
            .clone()
            .unwrap_or_else(|| self.config.log_dir.clone());
        let mut log = WorkerLog::open(
            &log_dir,
            &request.application,
            &request.environment,
            &request.worker,
        )?;
        if let Some(section) = section {
            log = log.with_section(section);
        }
        info!(worker = %request.worker, log = %log.path().display(), "worker log opened");

        let mut ctx = WorkerContext::new(&request.worker, log).with_app(Arc::new(app));
        if step.uses_queue() {
            let client = BeanstalkClient::connect(&self.config.beanstalkd_addr).await?;
            info!(addr = %client.addr(), "queue client connected");
            ctx = ctx.with_queue(Box::new(client));
        }

        Worker::create(step, ctx, self.config.worker_settings()).await
    }

    /// Build and run the requested worker.
    pub async fn run(
        &self,
        request: &RunRequest,
        section: Option<Arc<dyn SectionLog>>,
    ) -> Result<StopReason> {
        self.prepare(request, section).await?.run().await
    }
}
