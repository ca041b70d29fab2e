//! Generation service
//!
//! Turns chat messages into a single prompt, submits it to the inference
//! engine and returns the final text of the first sequence.

pub mod prompt;

use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

use crate::engine::{InferenceEngine, SamplingParams};
pub use prompt::{ChatMessage, ContentPart, MessageContent, build_chat_prompt, default_messages};

pub struct GenerationService {
    engine: Arc<dyn InferenceEngine>,
}

impl GenerationService {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    /// Generate a reply to `messages`
    ///
    /// Only the latest streamed output is kept; intermediate increments are
    /// discarded. An empty stream yields an empty string.
    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let params = SamplingParams::new(temperature, max_tokens);
        params.validate()?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let prompt = build_chat_prompt(messages);
        let started = Instant::now();

        tracing::debug!(
            request_id = %request_id,
            messages = messages.len(),
            max_tokens,
            temperature,
            "Generating"
        );

        let result = async {
            let mut stream = self
                .engine
                .generate(prompt, params, request_id.clone())
                .await?;

            let mut final_output = String::new();
            while let Some(output) = stream.next().await {
                if let Some(first) = output?.outputs.into_iter().next() {
                    final_output = first.text;
                }
            }
            Ok::<_, anyhow::Error>(final_output)
        }
        .await;

        let elapsed = started.elapsed();
        match &result {
            Ok(text) => {
                tracing::info!(
                    request_id = %request_id,
                    chars = text.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Generation complete"
                );
                crate::metrics::record_generation(elapsed, "success");
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Generation failed");
                crate::metrics::record_generation(elapsed, "failure");
            }
        }

        result
    }
}
