//! Configuration structures and loading logic

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::EngineArgs;

/// Main manager configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub api_port: u16,
    /// Local model directory served by the engine (`MODEL_PATH`)
    pub model_path: PathBuf,
    /// Upper bound on a single generation request
    pub request_timeout_secs: u64,
    pub engine: EngineConfig,
    pub downloader: DownloaderConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            model_path: default_model_path(),
            request_timeout_secs: default_request_timeout(),
            engine: EngineConfig::default(),
            downloader: DownloaderConfig::default(),
        }
    }
}

/// Inference engine settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Attach to an already-running OpenAI-compatible server instead of spawning one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub binary_path: String,
    pub host: String,
    pub port: u16,
    pub tensor_parallel_size: u32,
    pub trust_remote_code: bool,
    pub gpu_memory_utilization: f32,
    pub max_model_len: u32,
    pub dtype: String,
    pub enforce_eager: bool,
    pub startup_timeout_secs: u64,
    pub log_dir: PathBuf,
    /// Additional CLI args passed through to `vllm serve`
    pub extra_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            binary_path: default_vllm_binary_path(),
            host: "127.0.0.1".to_string(),
            port: default_engine_port(),
            tensor_parallel_size: 4,
            trust_remote_code: true,
            gpu_memory_utilization: 0.90,
            max_model_len: 4096,
            dtype: "float16".to_string(),
            enforce_eager: true,
            startup_timeout_secs: default_engine_startup_timeout(),
            log_dir: default_log_dir(),
            extra_args: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Build engine arguments for the given model directory
    pub fn engine_args(&self, model_path: &std::path::Path) -> EngineArgs {
        EngineArgs {
            model: model_path.to_string_lossy().to_string(),
            tensor_parallel_size: self.tensor_parallel_size,
            trust_remote_code: self.trust_remote_code,
            gpu_memory_utilization: self.gpu_memory_utilization,
            max_model_len: self.max_model_len,
            dtype: self.dtype.clone(),
            enforce_eager: self.enforce_eager,
            host: self.host.clone(),
            port: self.port,
            binary: self.binary_path.clone(),
            extra_args: self.extra_args.clone(),
        }
    }
}

/// Cache-managed downloader settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DownloaderConfig {
    pub cache_dir: PathBuf,
    /// Below this many free GB a warning is logged before downloading
    pub min_free_space_gb: f64,
    pub keep_latest: usize,
    pub ignore_patterns: Vec<String>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            min_free_space_gb: 70.0,
            keep_latest: 2,
            ignore_patterns: crate::models::DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(model_path) = std::env::var("MODEL_PATH") {
            self.model_path = PathBuf::from(model_path);
        }
        if let Ok(port) = std::env::var("VLLM_MANAGER_API_PORT") {
            self.api_port = port
                .parse()
                .context("Invalid VLLM_MANAGER_API_PORT value")?;
        }
        if let Ok(cache_dir) = std::env::var("VLLM_MANAGER_CACHE_DIR") {
            self.downloader.cache_dir = PathBuf::from(cache_dir);
        }
        if let Ok(endpoint) = std::env::var("VLLM_MANAGER_ENGINE_ENDPOINT") {
            self.engine.endpoint = Some(endpoint);
        }
        if let Ok(binary_path) = std::env::var("VLLM_BINARY_PATH") {
            self.engine.binary_path = binary_path;
        }
        if let Ok(tp) = std::env::var("VLLM_MANAGER_TENSOR_PARALLEL_SIZE") {
            self.engine.tensor_parallel_size = tp
                .parse()
                .context("Invalid VLLM_MANAGER_TENSOR_PARALLEL_SIZE value")?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_port < 1024 {
            anyhow::bail!("API port must be >= 1024 (got {})", self.api_port);
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be > 0");
        }

        let engine = &self.engine;
        if engine.endpoint.is_none() {
            if engine.port < 1024 {
                anyhow::bail!("Engine port must be >= 1024 (got {})", engine.port);
            }
            if engine.port == self.api_port {
                anyhow::bail!("Engine port {} conflicts with API port", engine.port);
            }
        }
        if engine.tensor_parallel_size == 0 {
            anyhow::bail!("tensor_parallel_size must be >= 1");
        }
        if !(engine.gpu_memory_utilization > 0.0 && engine.gpu_memory_utilization <= 1.0) {
            anyhow::bail!(
                "gpu_memory_utilization must be in (0, 1] (got {})",
                engine.gpu_memory_utilization
            );
        }
        if engine.max_model_len == 0 {
            anyhow::bail!("max_model_len must be >= 1");
        }

        if self.downloader.keep_latest == 0 {
            anyhow::bail!("keep_latest must be >= 1");
        }
        if self.downloader.min_free_space_gb < 0.0 {
            anyhow::bail!("min_free_space_gb cannot be negative");
        }

        Ok(())
    }
}

// Default functions
fn default_api_port() -> u16 {
    3000
}
fn default_model_path() -> PathBuf {
    PathBuf::from("/app/model")
}
fn default_request_timeout() -> u64 {
    300
}
fn default_engine_port() -> u16 {
    8000
}
fn default_engine_startup_timeout() -> u64 {
    900
}
fn default_vllm_binary_path() -> String {
    "vllm".to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("/tmp/model_cache")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("/tmp/vllm-manager/logs")
}
