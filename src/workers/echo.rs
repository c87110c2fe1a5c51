//! `echo`: log each job body and delete the job.

use crate::queue::Job;
use crate::worker::{Severity, WorkStep, WorkerContext};
use async_trait::async_trait;

pub struct EchoWorker {
    tube: String,
}

impl EchoWorker {
    pub fn new(tube: impl Into<String>) -> Self {
        Self { tube: tube.into() }
    }
}

#[async_trait]
impl WorkStep for EchoWorker {
    async fn step(&mut self, ctx: &mut WorkerContext) -> anyhow::Result<()> {
        let job: Job = ctx.get_job(&self.tube).await?;
        match job.body_str() {
            Some(body) => {
                ctx.info(format!("job {}: {body}", job.id));
                ctx.delete_job(&job).await?;
            }
            None => {
                ctx.log(
                    Severity::Warning,
                    format!("job {} body is not UTF-8, burying", job.id),
                );
                ctx.bury_job(&job).await?;
            }
        }
        Ok(())
    }
}
