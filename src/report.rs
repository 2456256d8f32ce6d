//! Exportación del informe final de una sesión de investigación.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{error, info};

use crate::{
    error::ResearchError,
    llm::ChatCompleter,
    models::{ModelTier, Step},
    prompts::report_prompt,
    session::{lock, ReportGuard, SharedSession},
};

/// Documento descargable generado a partir de la conversación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub filename: String,
    pub content: String,
}

/// `<nombre con espacios como _>_report.txt`. Cada tramo de espacios en
/// blanco se convierte en un único `_`.
pub fn report_filename(research_name: &str) -> String {
    static WS: OnceLock<Regex> = OnceLock::new();
    let ws = WS.get_or_init(|| Regex::new(r"\s+").expect("regex de espacios válida"));
    format!("{}_report.txt", ws.replace_all(research_name, "_"))
}

/// Sintetiza el informe con el LLM a partir del registro completo.
///
/// El registro se copia al empezar; una consulta que termine mientras se genera
/// el informe no aparece en él. Sólo puede haber una exportación en curso por
/// sesión.
pub async fn export_report(
    llm: &dyn ChatCompleter,
    session: &SharedSession,
) -> Result<ReportArtifact, ResearchError> {
    let (name, entries) = {
        let s = lock(session);
        if s.step != Step::Querying {
            return Err(ResearchError::NotNamed);
        }
        if s.log.is_empty() {
            return Err(ResearchError::EmptyLog);
        }
        (s.name.clone(), s.log.entries().to_vec())
    };

    let _guard = ReportGuard::begin(session)?;
    info!("Generando informe '{}' con {} entradas", name, entries.len());

    let prompt =
        report_prompt(&name, &entries).map_err(|e| ResearchError::ReportGeneration(e.to_string()))?;
    let completion = llm.complete(ModelTier::Deep, &prompt).await.map_err(|e| {
        error!("Error generando el informe: {}", e);
        ResearchError::ReportGeneration(e.to_string())
    })?;

    Ok(ReportArtifact {
        filename: report_filename(&name),
        content: completion.content,
    })
}
