//! Cliente HTTP del backend de inferencia biomédica (secuencias PDB,
//! generación de compuestos, afinidad de unión y consultas al grafo).

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{config::AppConfig, models::ActionKind, query::InferenceRequest};

/// Marcador que el backend devuelve cuando no hay dataset para la proteína.
pub const DATASET_NOT_FOUND_MARKER: &str = "Dataset not found";

#[derive(Debug, Error)]
pub enum InferenceClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend returned an error: {0}")]
    Envelope(String),

    #[error("backend response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Sobre de error con el marcador de dataset inexistente
    /// (sólo en `generate-compounds`).
    #[error("dataset not found for the requested protein")]
    DatasetNotFound,
}

/// Backend de inferencia. Devuelve el JSON de respuesta sin procesar.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn call(&self, request: &InferenceRequest) -> Result<Value, InferenceClientError>;
}

/// Implementación sobre `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: Client,
    base_url: Url,
}

impl HttpInferenceClient {
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.http_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::new(builder.build()?, cfg.inference_base_url.clone()))
    }

    pub fn new(client: Client, mut base_url: Url) -> Self {
        // Sin barra final, `Url::join` sustituiría el último segmento.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    pub fn endpoint_url(&self, action: ActionKind) -> Result<Url, InferenceClientError> {
        Ok(self.base_url.join(action.endpoint())?)
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceClient {
    async fn call(&self, request: &InferenceRequest) -> Result<Value, InferenceClientError> {
        let action = request.action();
        let url = self.endpoint_url(action)?;
        info!("Llamando al backend de inferencia: {} ({})", action.as_str(), url);

        let builder = match request {
            InferenceRequest::GetSequence { pdb_id } => {
                self.client.get(url).query(&[("pdb_id", pdb_id)])
            }
            _ => match request.body() {
                Some(body) => self.client.post(url).json(&body),
                None => self.client.post(url),
            },
        };

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!("Respuesta del backend ({}): {} bytes", status, text.len());

        let parsed = serde_json::from_str::<Value>(&text);
        if let Some(message) = parsed.as_ref().ok().and_then(error_message) {
            if action == ActionKind::GenerateCompounds && message.contains(DATASET_NOT_FOUND_MARKER) {
                return Err(InferenceClientError::DatasetNotFound);
            }
            return Err(InferenceClientError::Envelope(message));
        }

        if !status.is_success() {
            return Err(InferenceClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(parsed?)
    }
}

/// Mensaje de un sobre de error `{"error": "..."}`, si lo hay.
fn error_message(value: &Value) -> Option<String> {
    value.get("error")?.as_str().map(str::to_string)
}
