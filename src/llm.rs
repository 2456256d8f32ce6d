//! Cliente del LLM de análisis (API de chat compatible con OpenAI; Perplexity
//! por defecto).

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{config::AppConfig, models::ModelTier, prompts::PromptPair};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("chat API response has no message content")]
    MalformedResponse,
}

/// Respuesta de una llamada de chat: el texto extraído y el sobre completo.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub envelope: Value,
}

/// Servicio de "complete chat": system + user + modelo → texto.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, tier: ModelTier, prompt: &PromptPair)
        -> Result<ChatCompletion, LlmError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Gestor del LLM de análisis.
#[derive(Debug, Clone)]
pub struct LlmManager {
    client: Client,
    api_url: Url,
    api_key: String,
    standard_model: String,
    deep_model: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.http_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            api_url: cfg.summary_api_url.clone(),
            api_key: cfg.summary_api_key.clone(),
            standard_model: cfg.model_for(ModelTier::Standard).to_string(),
            deep_model: cfg.model_for(ModelTier::Deep).to_string(),
        })
    }

    fn model(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.standard_model,
            ModelTier::Deep => &self.deep_model,
        }
    }
}

#[async_trait]
impl ChatCompleter for LlmManager {
    async fn complete(
        &self,
        tier: ModelTier,
        prompt: &PromptPair,
    ) -> Result<ChatCompletion, LlmError> {
        let model = self.model(tier);
        info!("Llamando al LLM de análisis (modelo {model})");

        let body = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };

        let response = self
            .client
            .post(self.api_url.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let envelope: Value = response.json().await?;
        let content = extract_content(&envelope).ok_or(LlmError::MalformedResponse)?;
        debug!("Respuesta del LLM: {} caracteres", content.len());

        Ok(ChatCompletion { content, envelope })
    }
}

/// `choices[0].message.content` del sobre de respuesta.
pub fn extract_content(envelope: &Value) -> Option<String> {
    envelope
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}
