//! Chat messages and prompt construction

use serde::{Deserialize, Serialize};

const IM_START: &str = "<|im_start|>";
const IM_END: &str = "<|im_end|>";

/// One typed part of a multimodal message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Message content: plain text or a list of typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Text of the message; only `text` parts contribute, in order
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| p.kind == "text")
                .filter_map(|p| p.text.as_deref())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(MessageContent::Text(content.into())),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn text(&self) -> String {
        self.content
            .as_ref()
            .map(MessageContent::as_text)
            .unwrap_or_default()
    }
}

/// Messages used when a request omits them
pub fn default_messages() -> Vec<ChatMessage> {
    vec![ChatMessage::user("Hello!")]
}

/// Render messages in ChatML form and open the assistant turn
pub fn build_chat_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        prompt.push_str(IM_START);
        prompt.push_str(&msg.role);
        prompt.push('\n');
        prompt.push_str(&msg.text());
        prompt.push_str(IM_END);
        prompt.push('\n');
    }
    prompt.push_str(IM_START);
    prompt.push_str("assistant\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_user_message() {
        let prompt = build_chat_prompt(&default_messages());
        assert_eq!(
            prompt,
            "<|im_start|>user\nHello!<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_multi_turn() {
        let messages = vec![
            ChatMessage::new("system", "You are terse."),
            ChatMessage::user("2+2?"),
            ChatMessage::new("assistant", "4"),
            ChatMessage::user("3+3?"),
        ];
        assert_eq!(
            build_chat_prompt(&messages),
            "<|im_start|>system\nYou are terse.<|im_end|>\n\
             <|im_start|>user\n2+2?<|im_end|>\n\
             <|im_start|>assistant\n4<|im_end|>\n\
             <|im_start|>user\n3+3?<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_empty_messages() {
        assert_eq!(build_chat_prompt(&[]), "<|im_start|>assistant\n");
    }

    #[test]
    fn test_missing_content_is_empty() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role": "user"}"#).unwrap();
        assert_eq!(
            build_chat_prompt(&[msg]),
            "<|im_start|>user\n<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_null_content_is_empty() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role": "user", "content": null}"#).unwrap();
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn test_multimodal_parts_keep_text_only() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{
                "role": "user",
                "content": [
                    {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}},
                    {"type": "text", "text": "What is this? "},
                    {"type": "text", "text": "Be brief."}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(msg.text(), "What is this? Be brief.");
    }

    #[test]
    fn test_role_is_required() {
        let result: Result<ChatMessage, _> = serde_json::from_str(r#"{"content": "hi"}"#);
        assert!(result.is_err());
    }
}
