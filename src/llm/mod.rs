//! LLM 层：Decision Provider 抽象与实现（Ollama / OpenAI 兼容 / Mock）

pub mod mock;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod traits;

use std::sync::Arc;

pub use mock::{MockDecisionProvider, MockStep};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use prompt::{load_system_prompt, render_system_prompt, DEFAULT_SYSTEM_PROMPT};
pub use traits::{DecisionProvider, LlmError};

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::tools::ToolDefinition;

/// 按 [llm].provider 创建 Decision Provider，并绑定可用工具
pub fn create_provider_from_config(
    cfg: &AppConfig,
    tools: &[ToolDefinition],
) -> Result<Arc<dyn DecisionProvider>, AgentError> {
    let template = load_system_prompt(cfg.agent.system_prompt_path.as_deref());
    let llm = &cfg.llm;
    let time_zone = cfg.google.time_zone.clone();
    let provider: Arc<dyn DecisionProvider> = match llm.provider.to_lowercase().as_str() {
        "ollama" => Arc::new(OllamaClient::new(
            llm.base_url.as_deref(),
            &llm.model,
            llm.timeouts.request,
            tools,
            template,
            time_zone,
        )?),
        "openai" | "deepseek" => Arc::new(OpenAiClient::new(
            llm.base_url.as_deref(),
            &llm.model,
            llm.api_key.as_deref(),
            llm.timeouts.request,
            tools,
            template,
            time_zone,
        )),
        "mock" => Arc::new(MockDecisionProvider::new()),
        other => {
            return Err(AgentError::Config(format!(
                "unknown llm provider '{other}' (expected ollama, openai or mock)"
            )))
        }
    };
    tracing::info!(provider = %llm.provider, model = %provider.model_name(), "LLM provider ready");
    Ok(provider)
}
