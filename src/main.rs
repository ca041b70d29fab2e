//! vLLM Manager - Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use vllm_manager::{
    GenerationService, HfHubSource, InferenceEngine, ModelDownloader, VllmEngine, api,
    config::ManagerConfig, engine::SystemProcessManager, metrics, models::bytes_to_gb,
};

const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "vllm-manager")]
#[command(about = "Model cache manager and vLLM generation service", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log format (json or pretty)
    #[arg(long, default_value = "json", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the inference engine and the HTTP API
    Serve {
        /// Override API port
        #[arg(long)]
        port: Option<u16>,

        /// Override the local model directory
        #[arg(long)]
        model_path: Option<PathBuf>,
    },
    /// Download a model into the cache
    Download {
        /// HuggingFace repository id, e.g. `Qwen/Qwen3-VL-32B-Instruct-FP8`
        model_id: String,

        /// Re-sync files even if the cached copy looks complete
        #[arg(long)]
        force: bool,

        /// Override the cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Remove all but the newest cached models
    Cleanup {
        #[arg(long)]
        keep_latest: Option<usize>,
    },
    /// List cached models
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    match cli.log_format.as_str() {
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .json()
                .init();
        }
    }

    let mut config = ManagerConfig::load(cli.config)?;

    match cli.command {
        Command::Serve { port, model_path } => {
            if let Some(port) = port {
                config.api_port = port;
            }
            if let Some(model_path) = model_path {
                config.model_path = model_path;
            }
            config.validate()?;
            serve(config).await
        }
        Command::Download {
            model_id,
            force,
            cache_dir,
        } => {
            if let Some(cache_dir) = cache_dir {
                config.downloader.cache_dir = cache_dir;
            }
            config.validate()?;
            let downloader = build_downloader(&config)?;
            let path = downloader.download_model(&model_id, force).await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Cleanup { keep_latest } => {
            if let Some(keep_latest) = keep_latest {
                config.downloader.keep_latest = keep_latest;
            }
            config.validate()?;
            let downloader = build_downloader(&config)?;
            let removed = downloader.cleanup_old_models(config.downloader.keep_latest)?;
            tracing::info!(removed = removed.len(), "Cleanup complete");
            for path in removed {
                println!("{}", path.display());
            }
            Ok(())
        }
        Command::List => {
            config.validate()?;
            let downloader = build_downloader(&config)?;
            for model in downloader.cache().list()? {
                println!(
                    "{}\t{:.1} GB\t{}\t{}",
                    model.model_id,
                    bytes_to_gb(model.size_bytes),
                    if model.complete { "complete" } else { "partial" },
                    model.modified.to_rfc3339()
                );
            }
            Ok(())
        }
    }
}

fn build_downloader(config: &ManagerConfig) -> Result<ModelDownloader> {
    let source = Arc::new(HfHubSource::from_env());
    ModelDownloader::from_config(&config.downloader, source)
}

async fn serve(config: ManagerConfig) -> Result<()> {
    tracing::info!("Starting vLLM Manager");
    tracing::info!(
        api_port = config.api_port,
        model_path = ?config.model_path,
        cache_dir = ?config.downloader.cache_dir,
        "Configuration loaded"
    );

    let gpus = vllm_manager::gpu::get_or_init();
    if !gpus.is_available() {
        tracing::warn!("No GPUs detected; the engine will likely fail to load the model");
    } else if !gpus.supports_tensor_parallel(config.engine.tensor_parallel_size) {
        tracing::warn!(
            gpus = gpus.count(),
            tensor_parallel_size = config.engine.tensor_parallel_size,
            "Fewer GPUs than tensor parallel size"
        );
    }

    if !config.model_path.exists() {
        tracing::warn!(model_path = ?config.model_path, "Model path does not exist");
    }

    // Setup metrics
    let prometheus_handle = metrics::setup_metrics()?;

    let engine_args = config.engine.engine_args(&config.model_path);
    let engine = Arc::new(match &config.engine.endpoint {
        Some(endpoint) => VllmEngine::attach(engine_args, endpoint)?,
        None => {
            VllmEngine::launch(
                engine_args,
                Arc::new(SystemProcessManager::new()),
                config.engine.log_dir.clone(),
            )
            .await?
        }
    });

    if let Err(e) = engine
        .wait_until_ready(
            Duration::from_secs(config.engine.startup_timeout_secs),
            READY_POLL_INTERVAL,
        )
        .await
    {
        tracing::error!(error = %e, "Inference engine failed to start");
        if let Err(stop_err) = engine.shutdown().await {
            tracing::error!(error = %stop_err, "Failed to stop inference engine");
        }
        return Err(e);
    }
    metrics::update_engine_health(true);

    let service = Arc::new(GenerationService::new(
        engine.clone() as Arc<dyn InferenceEngine>
    ));
    let downloader = Arc::new(build_downloader(&config)?);

    // Setup API
    let app_state = api::AppState {
        service,
        downloader,
        request_timeout: Duration::from_secs(config.request_timeout_secs),
        keep_latest: config.downloader.keep_latest,
        prometheus_handle,
    };

    let app = api::create_router(app_state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.api_port));
    tracing::info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    // Graceful shutdown
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error");

    tracing::info!("Shutting down...");
    if let Err(e) = engine.shutdown().await {
        tracing::error!(error = %e, "Failed to stop inference engine during shutdown");
    }
    tracing::info!("Shutdown complete");

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
