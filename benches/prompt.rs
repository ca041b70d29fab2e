//! Request hot-path benchmarks
//!
//! - Chat prompt construction for growing conversations
//! - SSE decoding and delta accumulation for a streamed completion

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures::StreamExt;
use std::hint::black_box;
use tokio::runtime::Runtime;
use vllm_manager::engine::sse::SseDecoder;
use vllm_manager::engine::vllm::completion_stream;
use vllm_manager::service::{ChatMessage, build_chat_prompt};

fn conversation(turns: usize) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::new("system", "You are a helpful assistant.")];
    for i in 0..turns {
        messages.push(ChatMessage::user(format!("Question number {} about the image?", i)));
        messages.push(ChatMessage::new(
            "assistant",
            "The image shows a cat sitting on a windowsill in the afternoon sun.",
        ));
    }
    messages
}

/// SSE body with one token per event, split into network-sized chunks
fn sse_chunks(tokens: usize, chunk_size: usize) -> Vec<Vec<u8>> {
    let mut body = String::new();
    for i in 0..tokens {
        body.push_str(&format!(
            "data: {{\"id\":\"cmpl-1\",\"choices\":[{{\"index\":0,\"text\":\"tok{} \",\"finish_reason\":null}}]}}\n\n",
            i
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body.as_bytes().chunks(chunk_size).map(<[u8]>::to_vec).collect()
}

fn bench_build_prompt(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_chat_prompt");

    for turns in [1, 10, 100] {
        let messages = conversation(turns);
        group.bench_with_input(BenchmarkId::new("turns", turns), &messages, |b, messages| {
            b.iter(|| build_chat_prompt(black_box(messages)));
        });
    }
    group.finish();
}

fn bench_sse_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("sse_decode");

    for tokens in [64, 512] {
        let chunks = sse_chunks(tokens, 256);
        let bytes: usize = chunks.iter().map(Vec::len).sum();
        group.throughput(Throughput::Bytes(bytes as u64));

        group.bench_with_input(BenchmarkId::new("tokens", tokens), &chunks, |b, chunks| {
            b.iter(|| {
                let mut decoder = SseDecoder::new();
                let mut events = 0;
                for chunk in chunks {
                    events += decoder.push(black_box(chunk)).len();
                }
                events
            });
        });
    }
    group.finish();
}

fn bench_completion_stream(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("completion_stream");

    for tokens in [64, 512] {
        let chunks = sse_chunks(tokens, 256);

        group.bench_with_input(BenchmarkId::new("tokens", tokens), &chunks, |b, chunks| {
            b.to_async(&rt).iter(|| async {
                let body = futures::stream::iter(
                    chunks
                        .iter()
                        .cloned()
                        .map(Ok::<_, std::io::Error>)
                        .collect::<Vec<_>>(),
                );
                let mut stream = Box::pin(completion_stream(body, "bench".to_string()));
                let mut last = None;
                while let Some(output) = stream.next().await {
                    last = Some(output.unwrap());
                }
                black_box(last)
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_build_prompt,
    bench_sse_decode,
    bench_completion_stream
);
criterion_main!(benches);
