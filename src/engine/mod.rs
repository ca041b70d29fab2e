//! Inference engine boundary
//!
//! The service only needs one capability from an engine: given a prompt and
//! sampling parameters, produce a stream of cumulative outputs. Batching,
//! KV-cache management and tensor parallel execution stay inside the engine.

pub mod process;
pub mod sse;
pub mod vllm;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use process::{ProcessHandle, ProcessManager, SpawnConfig, SystemProcessManager};
pub use vllm::VllmEngine;

/// Generation controls forwarded to the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

impl SamplingParams {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            anyhow::bail!("max_tokens must be >= 1");
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            anyhow::bail!(
                "temperature must be a finite value >= 0 (got {})",
                self.temperature
            );
        }
        Ok(())
    }
}

/// One sequence of a request; `text` is everything generated so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutput {
    pub index: u32,
    pub text: String,
    pub finish_reason: Option<String>,
}

/// Snapshot of a request's progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOutput {
    pub request_id: String,
    pub outputs: Vec<CompletionOutput>,
    pub finished: bool,
}

pub type OutputStream = BoxStream<'static, Result<RequestOutput>>;

/// Streaming text generation backend
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Model name the engine serves
    fn model_name(&self) -> &str;

    /// Succeeds when the engine can accept requests
    async fn health(&self) -> Result<()>;

    /// Start a generation; each stream item carries cumulative text
    async fn generate(
        &self,
        prompt: String,
        params: SamplingParams,
        request_id: String,
    ) -> Result<OutputStream>;
}

/// Engine construction arguments, rendered as `vllm serve` flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineArgs {
    pub model: String,
    pub tensor_parallel_size: u32,
    pub trust_remote_code: bool,
    pub gpu_memory_utilization: f32,
    pub max_model_len: u32,
    pub dtype: String,
    pub enforce_eager: bool,
    pub host: String,
    pub port: u16,
    pub binary: String,
    pub extra_args: Vec<String>,
}

impl EngineArgs {
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "serve".to_string(),
            self.model.clone(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--tensor-parallel-size".to_string(),
            self.tensor_parallel_size.to_string(),
            "--gpu-memory-utilization".to_string(),
            self.gpu_memory_utilization.to_string(),
            "--max-model-len".to_string(),
            self.max_model_len.to_string(),
            "--dtype".to_string(),
            self.dtype.clone(),
        ];
        if self.trust_remote_code {
            args.push("--trust-remote-code".to_string());
        }
        if self.enforce_eager {
            args.push("--enforce-eager".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================
