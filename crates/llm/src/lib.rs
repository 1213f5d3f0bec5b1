//! LLM client for conversation synthesis and extraction
//!
//! Thin chat-completion wrapper over OpenAI-compatible endpoints. The
//! pipeline only needs prompt-in, text-out; provider plumbing stays here
//! so the harness never touches the API types directly.

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client as OpenAIClient,
};
use serde::{Deserialize, Serialize};

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (currently only openai-compatible endpoints)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model to use for chat completions
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (optional if using env var or local provider)
    pub api_key: Option<String>,
    /// Base URL override (for custom endpoints)
    pub base_url: Option<String>,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
        }
    }
}

/// A message in a chat conversation
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat-completion client
pub struct LlmClient {
    config: LlmConfig,
    client: OpenAIClient<OpenAIConfig>,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.provider != "openai" {
            anyhow::bail!("Unsupported LLM provider: {}", config.provider);
        }

        let mut openai_config = OpenAIConfig::new();
        if let Some(api_key) = &config.api_key {
            openai_config = openai_config.with_api_key(api_key);
        }
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Ok(Self {
            client: OpenAIClient::with_config(openai_config),
            config,
        })
    }

    /// Create a client from environment variables alone
    ///
    /// Reads OPENAI_API_KEY, and optionally OPENAI_BASE_URL and
    /// OPENAI_MODEL.
    pub fn from_env() -> Result<Self> {
        let mut config = LlmConfig {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
            ..Default::default()
        };
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.model = model;
        }
        Self::new(config)
    }

    /// Generate a chat completion
    pub async fn chat(&self, messages: Vec<Message>) -> Result<String> {
        let openai_messages = messages
            .into_iter()
            .map(to_openai_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .temperature(self.config.temperature)
            .messages(openai_messages)
            .build()
            .context("Failed to build chat completion request")?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("Failed to create chat completion")?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }

    /// Simple completion with a system prompt and user message
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.chat(vec![Message::system(system), Message::user(user)])
            .await
    }

    /// Get the configured model name
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

fn to_openai_message(msg: Message) -> Result<ChatCompletionRequestMessage> {
    let built = match msg.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(msg.content)
            .build()
            .context("Failed to build system message")?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(msg.content)
            .build()
            .context("Failed to build user message")?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(msg.content)
            .build()
            .context("Failed to build assistant message")?
            .into(),
    };
    Ok(built)
}
