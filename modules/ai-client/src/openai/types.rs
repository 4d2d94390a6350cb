use serde::{Deserialize, Serialize};

use crate::traits::{GenerateOptions, ResponseMode};

/// Single-turn `/chat/completions` body. Borrows the prompt so retries do
/// not clone it.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: [PromptMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<JsonObjectFormat>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PromptMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// Serializes as `{"type": "json_object"}`.
#[derive(Debug, Serialize)]
pub(crate) struct JsonObjectFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl<'a> ChatRequest<'a> {
    pub fn user_prompt(model: &'a str, prompt: &'a str, options: &GenerateOptions) -> Self {
        Self {
            model,
            messages: [PromptMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: match options.response_mode {
                ResponseMode::Text => None,
                ResponseMode::JsonObject => Some(JsonObjectFormat {
                    kind: "json_object",
                }),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Text of the first choice, if it has any non-blank content.
    pub fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplyMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_mode_serializes_response_format() {
        let options = GenerateOptions::json_object().temperature(1.0);
        let request = ChatRequest::user_prompt("deepseek-ai/DeepSeek-V3", "hi", &options);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["response_format"], serde_json::json!({"type": "json_object"}));
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn text_mode_omits_response_format() {
        let request = ChatRequest::user_prompt("gpt-4o", "hi", &GenerateOptions::default());
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("response_format").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn first_non_blank_choice_is_the_reply() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{}"},"finish_reason":"stop"}]}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(response.usage.is_none());
        assert_eq!(response.into_text().as_deref(), Some("{}"));

        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert_eq!(blank.into_text(), None);
    }
}
