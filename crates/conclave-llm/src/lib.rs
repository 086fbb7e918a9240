pub mod providers;
pub mod reply;
pub mod retry;
pub mod streaming;

use conclave_core::config::ModelConfig;
use conclave_core::error::{ConclaveError, Result};
use conclave_core::traits::LlmClient;

pub use providers::openai::OpenAiClient;
pub use reply::{collect_reply, ModelReply};
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
///
/// Every supported provider speaks the OpenAI chat-completions protocol;
/// they differ only in `base_url` and credentials.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai" | "ollama" | "groq" | "openrouter" | "vllm" | "together" => {
            Ok(Box::new(OpenAiClient::new()))
        }
        other => Err(ConclaveError::UnsupportedProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_known_providers() {
        assert!(create_client(&ModelConfig::new("gpt-4o")).is_ok());
        let mut cfg = ModelConfig::new("llama3");
        cfg.provider = "ollama".into();
        assert!(create_client(&cfg).is_ok());
    }

    #[test]
    fn test_create_client_unknown_provider() {
        let mut cfg = ModelConfig::new("x");
        cfg.provider = "carrier-pigeon".into();
        assert!(matches!(
            create_client(&cfg),
            Err(ConclaveError::UnsupportedProvider(p)) if p == "carrier-pigeon"
        ));
    }
}
