//! 组件装配：按配置选择 LLM 后端、注册工具、构建编排器
//!
//! CLI 与 HTTP 两种接入方式共用这里的初始化逻辑，保证工具集一致。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::{AgentError, Orchestrator};
use crate::llm::{create_gemini_client, LlmClient, OpenAiClient};
use crate::tools::{GitHubTool, ToolRegistry, WeatherTool};

/// 根据配置与环境变量选择 LLM 后端（Gemini / OpenAI 兼容）；缺少 API Key 视为配置错误
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.timeouts.request;

    match provider.as_str() {
        "gemini" => {
            let key = api_key("GEMINI_API_KEY")?;
            let model = cfg
                .llm
                .gemini
                .model
                .clone()
                .unwrap_or_else(|| cfg.llm.model.clone());
            tracing::info!("Using Gemini LLM ({})", model);
            Ok(Arc::new(create_gemini_client(&key, Some(&model), timeout)))
        }
        "openai" => {
            let key = api_key("OPENAI_API_KEY")?;
            let model = cfg
                .llm
                .openai
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string());
            tracing::info!("Using OpenAI LLM ({})", model);
            Ok(Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &model,
                &key,
                timeout,
            )))
        }
        other => Err(AgentError::ConfigError(format!(
            "unknown LLM provider: {other}"
        ))),
    }
}

fn api_key(var: &str) -> Result<String, AgentError> {
    std::env::var(var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AgentError::ConfigError(format!("{var} environment variable not set")))
}

/// 统一的工具注册表：github、weather
pub fn build_tool_registry(cfg: &AppConfig) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(GitHubTool::from_config(&cfg.tools.github));
    tools.register(WeatherTool::from_config(&cfg.tools.weather));
    tracing::info!(tools = ?tools.tool_names(), "tool registry ready");
    tools
}

/// 一站式构建编排器
pub fn build_orchestrator(cfg: &AppConfig) -> Result<Orchestrator, AgentError> {
    let llm = create_llm_from_config(cfg)?;
    let registry = Arc::new(build_tool_registry(cfg));
    Ok(Orchestrator::new(llm, registry, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_both_tools() {
        let registry = build_tool_registry(&AppConfig::default());
        assert_eq!(registry.tool_names(), vec!["github", "weather"]);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "carrier-pigeon".into();
        let err = create_llm_from_config(&cfg).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Config error: unknown LLM provider: carrier-pigeon"
        );
    }
}
