//! Command workers: each job body is piped to an external program.
//!
//! Defined in TOML (see `WorkerRegistry::load_from_dir`):
//!
//! ```toml
//! [worker]
//! name = "thumbnails"
//! tube = "images"
//! command = "bin/make-thumbnail"
//! args = ["--size", "128"]
//! bury_on_failure = true
//! ```
//!
//! Exit status 0 deletes the job. Any other status buries it, or deletes
//! it when `bury_on_failure = false`. A command that cannot be started is
//! a worker failure and ends the loop.

use crate::queue::Job;
use crate::worker::{Severity, WorkStep, WorkerContext};
use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, Deserialize)]
pub struct CommandWorkerDef {
    pub name: String,
    pub tube: String,
    pub command: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_bury_on_failure")]
    pub bury_on_failure: bool,
}

fn default_bury_on_failure() -> bool {
    true
}

pub struct CommandWorker {
    def: CommandWorkerDef,
}

impl CommandWorker {
    pub fn new(def: CommandWorkerDef) -> Self {
        Self { def }
    }

    /// Run the command with the job body on stdin. Returns whether it exited 0.
    async fn run_command(&self, job: &Job) -> anyhow::Result<bool> {
        // Paths with a separator are taken relative to the process CWD;
        // bare names are looked up on PATH.
        let command = if self.def.command.is_relative() && self.def.command.components().count() > 1
        {
            std::env::current_dir()?.join(&self.def.command)
        } else {
            self.def.command.clone()
        };

        let mut child = Command::new(&command)
            .args(&self.def.args)
            .env("BEANSTALK_JOB_ID", job.id.to_string())
            .env("BEANSTALK_TUBE", &self.def.tube)
            .env("BEANSTALK_WORKER", &self.def.name)
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("cannot start {}", command.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&job.body).await {
                // The command may exit without reading its input.
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let status = child.wait().await?;
        Ok(status.success())
    }
}

#[async_trait]
impl WorkStep for CommandWorker {
    async fn on_start(&mut self, ctx: &mut WorkerContext) -> anyhow::Result<()> {
        ctx.info(format!(
            "piping jobs from tube {} to {}",
            self.def.tube,
            self.def.command.display()
        ));
        Ok(())
    }

    async fn step(&mut self, ctx: &mut WorkerContext) -> anyhow::Result<()> {
        let job = ctx.get_job(&self.def.tube).await?;

        if self.run_command(&job).await? {
            ctx.info(format!("job {} done", job.id));
            ctx.delete_job(&job).await?;
        } else if self.def.bury_on_failure {
            ctx.log(Severity::Error, format!("job {} failed, burying", job.id));
            ctx.bury_job(&job).await?;
        } else {
            ctx.log(Severity::Error, format!("job {} failed, deleting", job.id));
            ctx.delete_job(&job).await?;
        }
        Ok(())
    }
}
