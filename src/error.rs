//! Taxonomía de errores del flujo de investigación.

use thiserror::Error;

/// Mensaje mostrado cuando el backend no tiene datos de ligandos para la proteína.
pub const NO_LIGAND_DATA_MESSAGE: &str =
    "This protein does not have appropriate ligands or is missing from the RCSB PDB database.";

/// Errores visibles para el usuario. El `Display` de cada variante es el texto
/// corto que se devuelve al cliente.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Entrada mal formada; nunca llega a la red.
    #[error("{0}")]
    Validation(String),

    #[error("Inference request failed: {0}")]
    Inference(String),

    #[error("{}", NO_LIGAND_DATA_MESSAGE)]
    NoLigandData,

    #[error("Failed to process deep research query: {0}")]
    Summary(String),

    #[error("The conversation is empty; run at least one query before generating a report")]
    EmptyLog,

    #[error("Failed to generate report: {0}")]
    ReportGeneration(String),

    #[error("Research session not found")]
    SessionNotFound,

    #[error("Name the research session before querying")]
    NotNamed,

    #[error("The research session is already named")]
    AlreadyNamed,

    #[error("A report is already being generated for this session")]
    ReportInProgress,
}

impl ResearchError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
