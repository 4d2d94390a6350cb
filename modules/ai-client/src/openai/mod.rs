pub(crate) mod types;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use tracing::debug;

use crate::error::AiError;
use crate::traits::{GenerateOptions, TextGenerator};

use types::{ChatRequest, ChatResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for any endpoint that speaks the OpenAI chat completions protocol.
/// The model id is chosen per call, so one instance serves every stage.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    /// Point at an OpenAI-compatible gateway (SiliconFlow, vLLM, ...).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
        )
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, AiError> {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| AiError::Config(format!("invalid API key header: {e}")))?;

        debug!(
            model = request.model,
            json_mode = request.response_format.is_some(),
            "Chat completion request"
        );

        let response = self
            .http
            .post(self.completions_url())
            .header(AUTHORIZATION, bearer)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        if let Some(ref usage) = parsed.usage {
            debug!(
                model = request.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat completion usage"
            );
        }
        Ok(parsed)
    }
}

#[async_trait]
impl TextGenerator for OpenAi {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, AiError> {
        let request = ChatRequest::user_prompt(model, prompt, options);
        self.complete(&request)
            .await?
            .into_text()
            .ok_or_else(|| AiError::EmptyResponse(model.to_string()))
    }
}
