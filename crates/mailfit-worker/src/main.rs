//! Video compression worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mailfit_jobstore::PgJobStore;
use mailfit_media::Encoder;
use mailfit_notify::{MailgunConfig, MailgunNotifier, NoopNotifier, Notifier};
use mailfit_queue::RedisJobQueue;
use mailfit_storage::S3Store;
use mailfit_worker::{metrics, JobExecutor, WorkerConfig, WorkerDeps};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("mailfit=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting mailfit-worker");

    // Load configuration
    let config = WorkerConfig::from_env();
    info!(
        "Worker config: scratch={}, poll={}s, url_ttl={}s",
        config.scratch_dir.display(),
        config.poll_timeout.as_secs(),
        config.url_ttl.as_secs()
    );

    // Prometheus scrape endpoint, when configured
    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        match addr.parse::<SocketAddr>() {
            Ok(addr) => metrics::install_exporter(addr),
            Err(e) => error!("Invalid METRICS_ADDR '{}': {}", addr, e),
        }
    }

    // Queue
    let queue = match RedisJobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = queue.ping().await {
        error!("Redis unreachable: {}", e);
        std::process::exit(1);
    }

    // Job record store
    let jobs = match PgJobStore::from_env().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to connect to the job store: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = jobs.migrate().await {
        error!("Failed to run job store migrations: {}", e);
        std::process::exit(1);
    }

    // Object store
    let objects = match S3Store::from_env().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create object store client: {}", e);
            std::process::exit(1);
        }
    };

    // Encoder
    let transcoder = match Encoder::new() {
        Ok(enc) => enc.with_limits(config.encode_limits),
        Err(e) => {
            error!("ffmpeg unavailable: {}", e);
            std::process::exit(1);
        }
    };

    // Notifier; absent Mailgun config degrades to logging
    let notifier: Arc<dyn Notifier> = match MailgunConfig::from_env() {
        Some(mailgun) => match MailgunNotifier::new(mailgun) {
            Ok(n) => Arc::new(n),
            Err(e) => {
                error!("Failed to create notifier: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            info!("Mailgun not configured; completion emails disabled");
            Arc::new(NoopNotifier)
        }
    };

    let deps = WorkerDeps {
        queue: Arc::new(queue),
        jobs: Arc::new(jobs),
        objects: Arc::new(objects),
        transcoder: Arc::new(transcoder),
        notifier,
    };

    let executor = match JobExecutor::new(config, deps) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            error!("Failed to create job executor: {}", e);
            std::process::exit(1);
        }
    };

    // ctrl-c lets the in-flight job finish, then stops the loop
    let signal_target = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_target.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
