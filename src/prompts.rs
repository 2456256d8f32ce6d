//! Plantillas de prompts para el LLM de análisis.

use serde_json::Value;

use crate::{models::ConversationEntry, query::InferenceRequest};

pub const DEEP_RESEARCH_SYSTEM: &str =
    "You are an expert biomedical research assistant. Provide detailed scientific analysis.";

/// Par system/user listo para enviar al cliente de chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Prompt de análisis de un resultado de inferencia, según la acción.
pub fn analysis_prompt(request: &InferenceRequest, data: &Value) -> PromptPair {
    let data = pretty(data);
    match request {
        InferenceRequest::GenerateCompounds { pdb_id } => PromptPair {
            system: "You are an expert in drug discovery and compound generation. Focus on \
                     highlighting interesting properties and potential applications of the \
                     generated compounds."
                .to_string(),
            user: format!(
                "Analyze these generated compounds for PDB ID: {pdb_id}.\n\
                 Explain their potential relevance for drug discovery, highlighting interesting \
                 chemical properties and patterns: {data}"
            ),
        },
        InferenceRequest::GetSequence { pdb_id } => PromptPair {
            system: "You are an expert in protein sequence analysis. Focus on highlighting \
                     interesting patterns and potential functional implications."
                .to_string(),
            user: format!(
                "Analyze this protein sequence for PDB ID: {pdb_id}.\n\
                 Provide insights about its structure and potential function, highlighting \
                 notable sequence patterns or motifs: {data}"
            ),
        },
        InferenceRequest::FindRelation { query } => PromptPair {
            system: "You are an expert in biomedical knowledge graphs. Focus on explaining the \
                     discovered relationships in a clear and insightful way."
                .to_string(),
            user: format!(
                "For the query: \"{query}\", analyze these knowledge graph relationships.\n\
                 Explain the connections found and their scientific significance: {data}"
            ),
        },
        InferenceRequest::PredictAffinity {
            smile,
            target_sequence,
        } => PromptPair {
            system: "You are an expert in molecular binding affinity analysis. Focus on \
                     highlighting positive insights and potential opportunities in the results."
                .to_string(),
            user: format!(
                "Analyze these binding affinity prediction results for SMILES: {smile} and \
                 protein sequence: {target_sequence}.\n\
                 Explain what they mean for drug discovery, focusing on the positive aspects and \
                 potential opportunities.\n\
                 Include interpretation of the scores and their implications: {data}"
            ),
        },
    }
}

/// Investigación profunda: la pregunta es el mensaje completo.
pub fn deep_research_prompt(question: &str) -> PromptPair {
    PromptPair {
        system: DEEP_RESEARCH_SYSTEM.to_string(),
        user: question.to_string(),
    }
}

/// Síntesis del informe final con todo el historial serializado.
pub fn report_prompt(
    research_name: &str,
    entries: &[ConversationEntry],
) -> Result<PromptPair, serde_json::Error> {
    Ok(PromptPair {
        system: format!(
            "Generate a detailed scientific report based on the following research \
             conversation. Research name: {research_name}"
        ),
        user: serde_json::to_string(entries)?,
    })
}

fn pretty(data: &Value) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
}
