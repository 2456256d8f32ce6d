//! Orquestación de un ciclo de consulta.
//!
//! Flujo en modo conocimiento:
//!   1. Validación de la entrada y construcción de la petición (sin red).
//!   2. Llamada al backend de inferencia.
//!   3. Análisis del resultado con el LLM; si falla se usa un texto fijo y se
//!      conservan los datos en bruto.
//!   4. Registro de la entrada en la conversación.
//!
//! En modo investigación profunda sólo hay una llamada, directa al LLM, y su
//! fallo aborta el ciclo.
//!
//! Sólo un ciclo por sesión: una consulta enviada mientras otra está en curso
//! se ignora (no se encola).

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    error::ResearchError,
    inference_client::{InferenceBackend, InferenceClientError},
    llm::ChatCompleter,
    models::{ActionKind, ModelTier, QueryAction, QueryResult},
    prompts::{analysis_prompt, deep_research_prompt},
    query::build_request,
    session::{CycleGuard, CyclePhase, SharedSession},
};

/// Texto de análisis cuando el LLM falla en modo conocimiento.
pub const ANALYSIS_FALLBACK: &str = "Failed to process analysis. Raw data is shown below.";

/// Resultado de `submit`.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Completed(QueryResult),
    /// Entrada vacía o ciclo ya en curso: no se hace nada.
    Ignored,
}

/// Lanza un ciclo de consulta sobre la sesión.
pub async fn submit(
    inference: &dyn InferenceBackend,
    llm: &dyn ChatCompleter,
    session: &SharedSession,
    action: QueryAction,
    raw_input: &str,
) -> Result<Submission, ResearchError> {
    if raw_input.trim().is_empty() {
        debug!("Consulta vacía ignorada");
        return Ok(Submission::Ignored);
    }

    let Some(cycle) = CycleGuard::begin(session)? else {
        return Ok(Submission::Ignored);
    };
    info!("Nueva consulta: acción {}", action.as_str());

    match run_cycle(inference, llm, &cycle, action, raw_input).await {
        Ok((summary, raw)) => Ok(Submission::Completed(cycle.complete(raw_input, summary, raw))),
        Err(err) => {
            error!("Consulta {} fallida: {}", action.as_str(), err);
            cycle.fail(&err);
            Err(err)
        }
    }
}

async fn run_cycle(
    inference: &dyn InferenceBackend,
    llm: &dyn ChatCompleter,
    cycle: &CycleGuard,
    action: QueryAction,
    raw_input: &str,
) -> Result<(String, Value), ResearchError> {
    let mode = cycle.mode();
    if action.mode() != mode {
        return Err(ResearchError::validation(format!(
            "Action '{}' is not available in {} mode",
            action.as_str(),
            mode.as_str()
        )));
    }

    match action {
        QueryAction::Knowledge(kind) => knowledge_cycle(inference, llm, cycle, kind, raw_input).await,
        QueryAction::Deep(_) => deep_cycle(llm, cycle, raw_input).await,
    }
}

async fn knowledge_cycle(
    inference: &dyn InferenceBackend,
    llm: &dyn ChatCompleter,
    cycle: &CycleGuard,
    kind: ActionKind,
    raw_input: &str,
) -> Result<(String, Value), ResearchError> {
    let request = build_request(kind, raw_input)?;

    cycle.set_phase(CyclePhase::AwaitingPrimary);
    let raw = inference.call(&request).await.map_err(|e| match e {
        InferenceClientError::DatasetNotFound => ResearchError::NoLigandData,
        other => ResearchError::Inference(other.to_string()),
    })?;

    cycle.set_phase(CyclePhase::AwaitingSummary);
    let prompt = analysis_prompt(&request, &raw);
    let summary = match llm.complete(ModelTier::Standard, &prompt).await {
        Ok(completion) => completion.content,
        Err(e) => {
            warn!("Análisis del LLM fallido, se muestran los datos en bruto: {}", e);
            ANALYSIS_FALLBACK.to_string()
        }
    };

    Ok((summary, raw))
}

async fn deep_cycle(
    llm: &dyn ChatCompleter,
    cycle: &CycleGuard,
    raw_input: &str,
) -> Result<(String, Value), ResearchError> {
    cycle.set_phase(CyclePhase::AwaitingPrimary);
    let completion = llm
        .complete(ModelTier::Deep, &deep_research_prompt(raw_input))
        .await
        .map_err(|e| ResearchError::Summary(e.to_string()))?;
    Ok((completion.content, completion.envelope))
}
