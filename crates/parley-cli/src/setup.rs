//! Turn the on-disk configuration into a running agent

use std::sync::Arc;
use std::time::Duration;

use parley_agent::{AgentConfig, AgentLoop, RetryPolicy};
use parley_config::{AgentSettings, Config, LlmConfig, RetrySettings};
use parley_llm::{OpenAiProvider, ProviderConfig, ProviderGateway};
use parley_tool::ToolCoordinator;
use tracing::warn;

use crate::tools::builtin_registry;

pub fn provider_config(llm: &LlmConfig) -> ProviderConfig {
    let mut config = ProviderConfig::new(&llm.provider_id, &llm.base_url)
        .with_model(&llm.model)
        .with_timeout(Duration::from_secs(llm.timeout_secs))
        .with_headers(llm.headers.clone());

    match llm.resolve_api_key() {
        Some(key) => config = config.with_api_key(key),
        None => warn!(env = %llm.api_key_env, "no API key configured, sending unauthenticated requests"),
    }
    config
}

pub fn retry_policy(retry: &RetrySettings) -> RetryPolicy {
    RetryPolicy {
        respect_retry_after: retry.respect_retry_after,
        ..RetryPolicy::default()
    }
    .with_max_attempts(retry.max_attempts)
    .with_delay(Duration::from_millis(retry.delay_ms))
}

pub fn agent_config(settings: &AgentSettings, model: Option<String>) -> AgentConfig {
    AgentConfig {
        model,
        max_rounds: settings.max_rounds,
        event_buffer: settings.event_buffer,
        retry: retry_policy(&settings.retry),
    }
}

/// Build the agent loop; `model` overrides the configured model
pub fn build_agent(config: &Config, model: Option<String>) -> anyhow::Result<Arc<AgentLoop>> {
    let provider = OpenAiProvider::with_config(provider_config(&config.llm))?;
    let gateway = ProviderGateway::new(Arc::new(provider)).with_default_model(&config.llm.model);

    let registry = Arc::new(builtin_registry()?);
    let coordinator = ToolCoordinator::new(registry)
        .with_timeout(Duration::from_secs(config.agent.tool_timeout_secs));

    Ok(Arc::new(AgentLoop::new(
        agent_config(&config.agent, model),
        Arc::new(gateway),
        coordinator,
    )))
}
