use async_trait::async_trait;

use crate::error::AiError;

// =============================================================================
// Generation Options
// =============================================================================

/// Output mode requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Text,
    /// Provider-enforced single JSON object (`response_format: json_object`).
    JsonObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub response_mode: ResponseMode,
    pub max_tokens: Option<u32>,
}

impl GenerateOptions {
    pub fn json_object() -> Self {
        Self {
            response_mode: ResponseMode::JsonObject,
            ..Self::default()
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            response_mode: ResponseMode::Text,
            max_tokens: None,
        }
    }
}

// =============================================================================
// TextGenerator Trait
// =============================================================================

/// Single-prompt text generation. Implementations may fail transiently;
/// callers own the retry policy.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, AiError>;
}
