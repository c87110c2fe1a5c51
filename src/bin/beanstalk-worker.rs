//! beanstalk-worker CLI: run a named worker, list workers, enqueue jobs.

use beanstalk_worker::config::Config;
use beanstalk_worker::queue::{BeanstalkClient, DEFAULT_PRIORITY};
use beanstalk_worker::registry::WorkerRegistry;
use beanstalk_worker::runner::{RunRequest, WorkerRunner};
use beanstalk_worker::telemetry::{TelemetryConfig, init_telemetry};
use beanstalk_worker::worker::{SectionLog, StopReason};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "beanstalk-worker", about = "Run long-lived beanstalkd workers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a worker until its memory ceiling, a failure, or Ctrl-C
    Run {
        /// Registered worker name
        worker: String,
        /// Log directory (defaults to WORKER_LOG_DIR)
        log_dir: Option<PathBuf>,
        /// The application name
        #[arg(long, default_value = "frontend")]
        application: String,
        /// The environment
        #[arg(long, default_value = "dev")]
        env: String,
        /// The connection name
        #[arg(long, default_value = "doctrine")]
        connection: String,
    },
    /// List registered workers
    List,
    /// Put a job on a tube
    Put {
        /// Tube name
        tube: String,
        /// Job body
        body: String,
        /// Priority (lower = more urgent)
        #[arg(long, default_value_t = DEFAULT_PRIORITY)]
        priority: u32,
        /// Seconds before the job becomes ready
        #[arg(long, default_value_t = 0)]
        delay: u32,
        /// Seconds a worker may hold the job
        #[arg(long, default_value_t = 60)]
        ttr: u32,
    },
}

/// Prints worker records on the console, next to the log file.
struct ConsoleSection;

impl SectionLog for ConsoleSection {
    fn log_section(&self, section: &str, message: &str) {
        println!(">> {section:<9} {message}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "beanstalk-worker".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let mut registry = WorkerRegistry::with_builtins();
    if let Some(dir) = &config.worker_defs_dir {
        let loaded = registry.load_from_dir(dir)?;
        info!(dir = %dir.display(), loaded, "worker definitions loaded");
    }

    match cli.command {
        Command::Run {
            worker,
            log_dir,
            application,
            env,
            connection,
        } => {
            let mut request = RunRequest::new(worker)
                .application(application)
                .environment(env)
                .connection(connection);
            if let Some(dir) = log_dir {
                request = request.log_dir(dir);
            }
            cmd_run(WorkerRunner::new(config, registry), request).await
        }
        Command::List => {
            for name in registry.names() {
                println!("{name}");
            }
            Ok(())
        }
        Command::Put {
            tube,
            body,
            priority,
            delay,
            ttr,
        } => cmd_put(&config, &tube, body, priority, delay, ttr).await,
    }
}

async fn cmd_run(runner: WorkerRunner, request: RunRequest) -> anyhow::Result<()> {
    let worker = runner
        .prepare(&request, Some(Arc::new(ConsoleSection)))
        .await?;

    // First Ctrl-C stops after the current iteration; a second one exits now.
    let handle = worker.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown requested, stopping after the current iteration");
            handle.shutdown();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    match worker.run().await? {
        StopReason::MemoryLimitExceeded { usage, limit } => {
            info!(usage, limit, "worker stopped at its memory ceiling");
        }
        StopReason::CancelledByCaller => info!("worker stopped on request"),
    }
    Ok(())
}

async fn cmd_put(
    config: &Config,
    tube: &str,
    body: String,
    priority: u32,
    delay: u32,
    ttr: u32,
) -> anyhow::Result<()> {
    let mut client = BeanstalkClient::connect(&config.beanstalkd_addr).await?;
    client.use_tube(tube).await?;
    let id = client.put(body.as_bytes(), priority, delay, ttr).await?;
    println!("Inserted job {id} into {tube}");
    Ok(())
}
