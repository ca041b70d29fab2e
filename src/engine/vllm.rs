//! vLLM engine over its OpenAI-compatible server
//!
//! The engine either owns a `vllm serve` subprocess or attaches to one that
//! is already running. Generation uses the streaming completions endpoint;
//! the per-chunk deltas are folded back into cumulative outputs so callers
//! see the same shape the in-process engine produces.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::process::{ProcessHandle, ProcessManager, SpawnConfig};
use super::sse::{SseDecoder, SseEvent};
use super::{
    CompletionOutput, EngineArgs, InferenceEngine, OutputStream, RequestOutput, SamplingParams,
};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    text: String,
    finish_reason: Option<String>,
}

/// Folds streamed deltas into cumulative per-choice text
#[derive(Debug)]
struct CompletionAccumulator {
    output: RequestOutput,
}

impl CompletionAccumulator {
    fn new(request_id: String) -> Self {
        Self {
            output: RequestOutput {
                request_id,
                outputs: Vec::new(),
                finished: false,
            },
        }
    }

    fn apply(&mut self, chunk: CompletionChunk) -> Result<RequestOutput> {
        if let Some(error) = chunk.error {
            anyhow::bail!("engine reported an error mid-stream: {}", error);
        }

        let outputs = &mut self.output.outputs;
        for choice in chunk.choices {
            let pos = match outputs.iter().position(|o| o.index == choice.index) {
                Some(pos) => pos,
                None => {
                    outputs.push(CompletionOutput {
                        index: choice.index,
                        ..Default::default()
                    });
                    outputs.len() - 1
                }
            };
            let slot = &mut outputs[pos];
            slot.text.push_str(&choice.text);
            if choice.finish_reason.is_some() {
                slot.finish_reason = choice.finish_reason;
            }
        }
        outputs.sort_by_key(|o| o.index);

        Ok(self.output.clone())
    }

    fn finish(mut self) -> RequestOutput {
        self.output.finished = true;
        self.output
    }
}

/// Turn an SSE byte stream into cumulative request outputs
pub fn completion_stream<S, B, E>(
    body: S,
    request_id: String,
) -> impl Stream<Item = Result<RequestOutput>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    async_stream::try_stream! {
        let mut body = Box::pin(body);
        let mut decoder = SseDecoder::new();
        let mut accumulator = CompletionAccumulator::new(request_id);
        let mut done = false;

        'read: while let Some(chunk) = body.next().await {
            let chunk = chunk.context("Failed to read streaming chunk")?;
            for event in decoder.push(chunk.as_ref()) {
                match event {
                    SseEvent::Done => {
                        done = true;
                        break 'read;
                    }
                    SseEvent::Data(data) => {
                        let parsed: CompletionChunk = serde_json::from_str(&data)
                            .with_context(|| format!("Invalid completion chunk: {}", data))?;
                        yield accumulator.apply(parsed)?;
                    }
                }
            }
        }

        if !done {
            match decoder.finish() {
                Some(SseEvent::Data(data)) => {
                    let parsed: CompletionChunk = serde_json::from_str(&data)
                        .with_context(|| format!("Invalid completion chunk: {}", data))?;
                    yield accumulator.apply(parsed)?;
                }
                Some(SseEvent::Done) | None => {}
            }
        }

        yield accumulator.finish();
    }
}

/// vLLM engine reached over HTTP
pub struct VllmEngine {
    args: EngineArgs,
    base_url: String,
    client: reqwest::Client,
    process_manager: Option<Arc<dyn ProcessManager>>,
    process_handle: RwLock<Option<ProcessHandle>>,
}

impl VllmEngine {
    fn with_base_url(args: EngineArgs, base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            args,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            process_manager: None,
            process_handle: RwLock::new(None),
        })
    }

    /// Use an engine server that is already running at `endpoint`
    pub fn attach(args: EngineArgs, endpoint: &str) -> Result<Self> {
        tracing::info!(endpoint = %endpoint, model = %args.model, "Attaching to running engine");
        Self::with_base_url(args, endpoint.to_string())
    }

    /// Spawn `vllm serve` with the given arguments
    pub async fn launch(
        args: EngineArgs,
        process_manager: Arc<dyn ProcessManager>,
        log_dir: PathBuf,
    ) -> Result<Self> {
        let base_url = args.base_url();
        let mut engine = Self::with_base_url(args, base_url)?;

        let spawn_config = SpawnConfig {
            name: "vllm-engine".to_string(),
            binary_path: engine.args.binary.clone(),
            args: engine.args.to_cli_args(),
            env: Vec::new(),
            log_dir,
        };

        tracing::info!(
            model = %engine.args.model,
            tensor_parallel_size = engine.args.tensor_parallel_size,
            max_model_len = engine.args.max_model_len,
            dtype = %engine.args.dtype,
            "Launching inference engine"
        );

        let handle = process_manager.spawn(spawn_config).await?;
        *engine.process_handle.get_mut() = Some(handle);
        engine.process_manager = Some(process_manager);

        Ok(engine)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether this engine owns a live subprocess (always false when attached)
    pub async fn is_process_running(&self) -> bool {
        let guard = self.process_handle.read().await;
        match (&self.process_manager, guard.as_ref()) {
            (Some(manager), Some(handle)) => manager.is_running(handle).await,
            _ => false,
        }
    }

    /// Poll the health endpoint until it answers or `timeout` elapses
    pub async fn wait_until_ready(&self, timeout: Duration, poll_interval: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.process_manager.is_some() && !self.is_process_running().await {
                anyhow::bail!("Engine process exited before becoming ready");
            }

            match self.health().await {
                Ok(()) => {
                    tracing::info!(base_url = %self.base_url, "Inference engine ready");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Engine not ready yet");
                }
            }

            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!(
                    "Engine did not become ready within {}s",
                    timeout.as_secs()
                );
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Stop the owned subprocess, if any
    pub async fn shutdown(&self) -> Result<()> {
        let handle = self.process_handle.write().await.take();
        if let (Some(manager), Some(handle)) = (&self.process_manager, handle) {
            tracing::info!("Stopping inference engine");
            manager.stop(handle, STOP_TIMEOUT).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl InferenceEngine for VllmEngine {
    fn model_name(&self) -> &str {
        &self.args.model
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Health check request to {} failed", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Health check returned status: {}", response.status());
        }
        Ok(())
    }

    async fn generate(
        &self,
        prompt: String,
        params: SamplingParams,
        request_id: String,
    ) -> Result<OutputStream> {
        let url = format!("{}/v1/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.args.model,
            prompt: &prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: true,
        };

        tracing::debug!(request_id = %request_id, url = %url, "Submitting completion");

        let response = self
            .client
            .post(&url)
            .header("X-Request-Id", &request_id)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Completion request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Engine returned {}: {}", status, text);
        }

        Ok(completion_stream(response.bytes_stream(), request_id).boxed())
    }
}
