//! Video export worker binary.
//!
//! Claims at most one export job, renders it and exits. Exit code 0 means
//! the queue was empty or the job completed; 1 means the job or the worker
//! failed.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use reel_media::{check_ffmpeg, FfmpegRunner};
use reel_orchestrator::ApiClient;
use reel_queue::JobQueue;
use reel_storage::S3Client;
use reel_worker::{init_logging, JobExecutor, ObjectStore, WorkerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    dotenvy::dotenv().ok();
    init_logging();

    info!("Starting reel-worker");

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("Worker error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<u8> {
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    match check_ffmpeg() {
        Ok(path) => info!("Using ffmpeg at {}", path.display()),
        Err(e) => warn!("{}", e),
    }

    let queue = JobQueue::from_env().context("queue configuration")?;
    queue.init().await.context("queue initialization")?;
    let api = ApiClient::from_env().context("orchestration API configuration")?;

    let store = match S3Client::from_env().context("object storage configuration")? {
        Some(s3) => {
            info!(bucket = s3.bucket(), "Uploading exports to object storage");
            if let Err(e) = s3.check_connectivity().await {
                warn!("Object storage check failed: {}", e);
            }
            Some(Arc::new(s3) as Arc<dyn ObjectStore>)
        }
        None => {
            info!("Object storage not configured, exports stay in {}", config.uploads_dir.display());
            None
        }
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, cancelling encoder");
        let _ = cancel_tx.send(true);
    });

    let encoder = FfmpegRunner::new()
        .with_cancel(cancel_rx)
        .with_timeout(config.encoder_timeout_secs);

    let executor = JobExecutor::new(Arc::new(queue), Arc::new(api), Arc::new(encoder), config)
        .with_store(store);

    let outcome = executor.run_once().await?;
    info!(?outcome, "Worker finished");
    Ok(outcome.exit_code())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
