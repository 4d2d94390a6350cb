use ai_client::OpenAi;
use anyhow::{anyhow, Result};

/// Secrets and endpoint loaded from the environment (after `.env`).
/// Models, paths and tuning live in the TOML `FileConfig`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            llm_api_key: non_empty_env("LLM_API_KEY"),
            llm_base_url: non_empty_env("LLM_BASE_URL"),
        };

        config.log_keys();
        config
    }

    /// Model client for the stages that need one. Scoring alone never does.
    pub fn generator(&self) -> Result<OpenAi> {
        let api_key = self
            .llm_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("LLM_API_KEY environment variable not set"))?;
        let client = OpenAi::new(api_key);
        Ok(match self.llm_base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        })
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val.len().min(5);
            let head = ai_client::truncate_to_char_boundary(val, n);
            format!("{}...({} chars)", head, val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!(
            "  LLM_API_KEY: {}",
            self.llm_api_key
                .as_deref()
                .map(preview)
                .unwrap_or_else(|| "<not set>".to_string())
        );
        tracing::info!(
            "  LLM_BASE_URL: {}",
            self.llm_base_url.as_deref().unwrap_or("<default>")
        );
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_requires_api_key() {
        let config = AppConfig {
            llm_api_key: None,
            llm_base_url: None,
        };
        assert!(config.generator().is_err());
    }

    #[test]
    fn generator_applies_base_url() {
        let config = AppConfig {
            llm_api_key: Some("sk-test".into()),
            llm_base_url: Some("https://api.siliconflow.cn/v1".into()),
        };
        let client = config.generator().unwrap();
        assert_eq!(client.base_url(), Some("https://api.siliconflow.cn/v1"));
    }
}
