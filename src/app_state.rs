use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::{
    config::AppConfig, inference_client::InferenceBackend, llm::ChatCompleter,
    session::SessionStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub sessions: Arc<SessionStore>,
    pub inference: Arc<dyn InferenceBackend>,
    pub llm: Arc<dyn ChatCompleter>,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    /// Crea el estado compartido y el receptor de la señal de apagado.
    pub fn new(
        config: AppConfig,
        inference: Arc<dyn InferenceBackend>,
        llm: Arc<dyn ChatCompleter>,
    ) -> (Self, oneshot::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = Self {
            config,
            sessions: Arc::new(SessionStore::new()),
            inference,
            llm,
            status: Arc::new(Mutex::new(Status {
                message: "Servidor listo.".to_string(),
                started_at: Utc::now(),
            })),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
        };
        (state, shutdown_rx)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Status {
    pub message: String,
    pub started_at: DateTime<Utc>,
}
