//! Property-based tests using proptest
//!
//! These tests verify invariants across randomized inputs, helping catch
//! edge cases that might be missed by example-based testing.

use proptest::prelude::*;
use vllm_manager::config::ManagerConfig;
use vllm_manager::engine::sse::{SseDecoder, SseEvent};
use vllm_manager::models::{
    DEFAULT_IGNORE_PATTERNS, IgnorePatterns, cache_dir_name, model_id_from_dir_name,
};
use vllm_manager::service::{ChatMessage, build_chat_prompt};

// =============================================================================
// Strategies
// =============================================================================

/// HuggingFace-style `org/name` ids; orgs never contain `-`
fn arb_model_id() -> impl Strategy<Value = String> {
    (
        "[a-zA-Z0-9][a-zA-Z0-9_.]{0,15}",
        "[a-zA-Z0-9][a-zA-Z0-9._-]{0,30}",
    )
        .prop_map(|(org, name)| format!("{}/{}", org, name))
}

fn arb_message() -> impl Strategy<Value = ChatMessage> {
    (
        prop::sample::select(vec!["system", "user", "assistant"]),
        "[^<|]{0,40}",
    )
        .prop_map(|(role, content)| ChatMessage::new(role, content))
}

/// SSE body made of data lines, terminated by `[DONE]`
fn arb_sse_body() -> impl Strategy<Value = (String, Vec<String>)> {
    prop::collection::vec("[a-zA-Z0-9 {}:,\"é日]{1,30}", 0..8).prop_map(|payloads| {
        let mut body = String::new();
        for payload in &payloads {
            body.push_str(&format!("data: {}\n\n", payload));
        }
        body.push_str("data: [DONE]\n\n");
        (body, payloads)
    })
}

// =============================================================================
// Cache naming
// =============================================================================

proptest! {
    #[test]
    fn prop_cache_dir_name_round_trips(model_id in arb_model_id()) {
        let dir = cache_dir_name(&model_id);
        prop_assert!(!dir.contains('/'));
        prop_assert_eq!(model_id_from_dir_name(&dir), model_id);
    }

    #[test]
    fn prop_cache_dir_name_is_injective(a in arb_model_id(), b in arb_model_id()) {
        prop_assume!(a != b);
        prop_assert_ne!(cache_dir_name(&a), cache_dir_name(&b));
    }
}

// =============================================================================
// Prompt construction
// =============================================================================

proptest! {
    #[test]
    fn prop_prompt_has_one_turn_per_message(
        messages in prop::collection::vec(arb_message(), 0..10)
    ) {
        let prompt = build_chat_prompt(&messages);

        prop_assert_eq!(prompt.matches("<|im_start|>").count(), messages.len() + 1);
        prop_assert_eq!(prompt.matches("<|im_end|>").count(), messages.len());
        prop_assert!(prompt.ends_with("<|im_start|>assistant\n"));

        let mut rest = prompt.as_str();
        for msg in &messages {
            let turn = format!("<|im_start|>{}\n{}<|im_end|>\n", msg.role, msg.text());
            prop_assert!(rest.starts_with(&turn));
            rest = &rest[turn.len()..];
        }
        prop_assert_eq!(rest, "<|im_start|>assistant\n");
    }
}

// =============================================================================
// SSE decoding
// =============================================================================

proptest! {
    #[test]
    fn prop_sse_decoding_ignores_chunk_boundaries(
        (body, payloads) in arb_sse_body(),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        let bytes = body.as_bytes();
        let mut positions: Vec<usize> = cuts.iter().map(|c| c.index(bytes.len() + 1)).collect();
        positions.sort_unstable();

        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        let mut start = 0;
        for pos in positions {
            events.extend(decoder.push(&bytes[start..pos]));
            start = pos;
        }
        events.extend(decoder.push(&bytes[start..]));
        prop_assert_eq!(decoder.finish(), None);

        let mut expected: Vec<SseEvent> = payloads.into_iter().map(SseEvent::Data).collect();
        expected.push(SseEvent::Done);
        prop_assert_eq!(events, expected);
    }
}

// =============================================================================
// Ignore patterns
// =============================================================================

proptest! {
    #[test]
    fn prop_bin_weights_ignored_safetensors_kept(stem in "[a-z0-9_-]{1,20}") {
        let ignore = IgnorePatterns::new(DEFAULT_IGNORE_PATTERNS).unwrap();

        let bin = format!("{}.bin", stem);
        let nested_bin = format!("subdir/{}.bin", stem);
        let safetensors = format!("{}.safetensors", stem);
        prop_assert!(ignore.is_ignored(&bin));
        prop_assert!(ignore.is_ignored(&nested_bin));
        prop_assert!(!ignore.is_ignored(&safetensors));
    }
}

// =============================================================================
// Configuration
// =============================================================================

proptest! {
    #[test]
    fn prop_config_toml_round_trip(
        api_port in 1024u16..60000,
        timeout in 1u64..3600,
        tp in 1u32..9,
        keep_latest in 1usize..10,
    ) {
        let mut config = ManagerConfig::default();
        config.api_port = api_port;
        config.request_timeout_secs = timeout;
        config.engine.tensor_parallel_size = tp;
        config.downloader.keep_latest = keep_latest;

        let text = toml::to_string(&config).unwrap();
        let parsed: ManagerConfig = toml::from_str(&text).unwrap();

        prop_assert_eq!(parsed.api_port, api_port);
        prop_assert_eq!(parsed.request_timeout_secs, timeout);
        prop_assert_eq!(parsed.engine, config.engine);
        prop_assert_eq!(parsed.downloader.keep_latest, keep_latest);
        prop_assert_eq!(parsed.downloader.ignore_patterns, config.downloader.ignore_patterns);
    }

    #[test]
    fn prop_low_api_port_rejected(api_port in 1u16..1024) {
        let config = ManagerConfig {
            api_port,
            ..Default::default()
        };
        prop_assert!(config.validate().is_err());
    }
}
