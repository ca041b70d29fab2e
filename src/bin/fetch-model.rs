//! Download the service's fixed model into `./models` and check that it loads

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use vllm_manager::models::{
    HfHubSource, SnapshotRequest, SnapshotSource, bytes_to_gb, verify_model_dir,
};

const MODEL_ID: &str = "Qwen/Qwen3-VL-32B-Instruct-FP8";
const LOCAL_DIR: &str = "./models/Qwen3-VL-32B-Instruct-FP8";

#[derive(Parser, Debug)]
#[clap(
    name = "fetch-model",
    about = "Download Qwen/Qwen3-VL-32B-Instruct-FP8 and verify it loads"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(&args.log_level)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(&args.log_level)
                .init();
        }
    }

    let local_dir = PathBuf::from(LOCAL_DIR);
    tracing::info!(model_id = MODEL_ID, path = ?local_dir, "Downloading model");

    let source = HfHubSource::from_env().with_progress(true);
    let request = SnapshotRequest::new(MODEL_ID, &local_dir);
    if let Err(e) = source.snapshot(&request).await {
        tracing::error!(model_id = MODEL_ID, error = %e, "Download failed");
        return Err(e);
    }

    // Per-file sizes are logged during verification
    let report = verify_model_dir(&local_dir)
        .with_context(|| format!("Model in {:?} failed verification", local_dir))?;
    println!(
        "{} files, {:.1} GB total",
        report.file_count,
        bytes_to_gb(report.total_bytes)
    );
    println!(
        "model_type={} vocab_size={} processor={}",
        report.metadata.model_type.as_deref().unwrap_or("unknown"),
        report.tokenizer_vocab_size,
        report.processor_class.as_deref().unwrap_or("none"),
    );

    let gpus = vllm_manager::gpu::get_or_init();
    if gpus.is_available() {
        println!(
            "{} GPU(s), {} MiB total memory",
            gpus.count(),
            gpus.total_memory_mib()
        );
    } else {
        println!("No GPUs detected");
    }

    tracing::info!(model_id = MODEL_ID, "Model ready");
    Ok(())
}
