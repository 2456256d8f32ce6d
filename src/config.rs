//! Carga y gestión de configuración de la aplicación (backend de inferencia + LLM).

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use url::Url;

use crate::models::ModelTier;

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub open_browser: bool,

    pub inference_base_url: Url,

    pub summary_api_url: Url,
    pub summary_api_key: String,
    pub summary_model: String,
    pub deep_research_model: String,

    /// `None` = sin timeout en las llamadas externas.
    pub http_timeout: Option<Duration>,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env`, pero leyendo de una función arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:3322".to_string());

        let open_browser = match lookup("OPEN_BROWSER") {
            None => true,
            Some(v) => parse_bool(&v)
                .ok_or_else(|| anyhow!("OPEN_BROWSER no es un booleano válido: {v}"))?,
        };

        let inference_raw =
            lookup("INFERENCE_BASE_URL").unwrap_or_else(|| "http://127.0.0.1:5000".to_string());
        let inference_base_url = Url::parse(&inference_raw)
            .map_err(|e| anyhow!("INFERENCE_BASE_URL inválida ({inference_raw}): {e}"))?;

        let summary_raw = lookup("SUMMARY_API_URL")
            .unwrap_or_else(|| "https://api.perplexity.ai/chat/completions".to_string());
        let summary_api_url = Url::parse(&summary_raw)
            .map_err(|e| anyhow!("SUMMARY_API_URL inválida ({summary_raw}): {e}"))?;

        let summary_api_key = lookup("SUMMARY_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("Falta SUMMARY_API_KEY en el entorno"))?;

        let summary_model = lookup("SUMMARY_MODEL").unwrap_or_else(|| "sonar-pro".to_string());
        let deep_research_model =
            lookup("DEEP_RESEARCH_MODEL").unwrap_or_else(|| "sonar-deep-research".to_string());

        let http_timeout = match lookup("HTTP_TIMEOUT_SECS") {
            None => None,
            Some(v) => {
                let secs: u64 = v
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("HTTP_TIMEOUT_SECS no es un número válido: {v}"))?;
                Some(Duration::from_secs(secs))
            }
        };

        Ok(Self {
            server_addr,
            open_browser,
            inference_base_url,
            summary_api_url,
            summary_api_key,
            summary_model,
            deep_research_model,
            http_timeout,
        })
    }

    /// Nombre del modelo de chat para cada nivel.
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.summary_model,
            ModelTier::Deep => &self.deep_research_model,
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
