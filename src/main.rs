// Módulos de la aplicación
mod api;
mod app_state;
mod config;
mod error;
mod inference_client;
mod llm;
mod models;
mod orchestrator;
mod prompts;
mod query;
mod report;
mod session;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{app_state::AppState, inference_client::HttpInferenceClient, llm::LlmManager};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Clientes externos: backend de inferencia y LLM de análisis
    let inference = HttpInferenceClient::from_config(&cfg)
        .context("Error inicializando el cliente de inferencia")?;
    let llm = LlmManager::from_config(&cfg).context("Error inicializando LLM Manager")?;
    info!("Backend de inferencia: {}", cfg.inference_base_url);
    info!("API de análisis: {}", cfg.summary_api_url);

    // 4. Crear estado compartido de la aplicación
    let (app_state, shutdown_rx) = AppState::new(cfg.clone(), Arc::new(inference), Arc::new(llm));

    // 5. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new("frontend"))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if app_state.config.open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .context("Error en el servidor HTTP")?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
