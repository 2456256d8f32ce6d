//! Validación de la entrada de cada acción y construcción de la petición al
//! backend de inferencia. Nada de lo que falla aquí llega a la red.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::{error::ResearchError, models::ActionKind};

const PDB_ID_ERROR: &str = "Please enter a valid 4-character PDB ID";
const AFFINITY_ERROR: &str = "Please enter SMILES and sequence separated by comma";

/// Petición ya validada para el backend de inferencia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceRequest {
    GenerateCompounds { pdb_id: String },
    GetSequence { pdb_id: String },
    FindRelation { query: String },
    PredictAffinity { smile: String, target_sequence: String },
}

impl InferenceRequest {
    pub fn action(&self) -> ActionKind {
        match self {
            InferenceRequest::GenerateCompounds { .. } => ActionKind::GenerateCompounds,
            InferenceRequest::GetSequence { .. } => ActionKind::GetSequence,
            InferenceRequest::FindRelation { .. } => ActionKind::FindRelation,
            InferenceRequest::PredictAffinity { .. } => ActionKind::PredictAffinity,
        }
    }

    /// Cuerpo JSON de la petición; `None` para las acciones que van por GET.
    pub fn body(&self) -> Option<Value> {
        match self {
            InferenceRequest::GenerateCompounds { pdb_id } => Some(json!({ "pdb_id": pdb_id })),
            InferenceRequest::GetSequence { .. } => None,
            InferenceRequest::FindRelation { query } => Some(json!({ "query": query })),
            InferenceRequest::PredictAffinity {
                smile,
                target_sequence,
            } => Some(json!({ "smile": smile, "target_sequence": target_sequence })),
        }
    }
}

/// Valida `raw_input` según la acción y construye la petición.
pub fn build_request(action: ActionKind, raw_input: &str) -> Result<InferenceRequest, ResearchError> {
    match action {
        ActionKind::GenerateCompounds => Ok(InferenceRequest::GenerateCompounds {
            pdb_id: parse_pdb_id(raw_input)?,
        }),
        ActionKind::GetSequence => Ok(InferenceRequest::GetSequence {
            pdb_id: parse_pdb_id(raw_input)?,
        }),
        ActionKind::FindRelation => {
            if raw_input.trim().is_empty() {
                return Err(ResearchError::validation("Please enter a query"));
            }
            Ok(InferenceRequest::FindRelation {
                query: raw_input.to_string(),
            })
        }
        ActionKind::PredictAffinity => {
            let (smile, target_sequence) = parse_affinity_input(raw_input)?;
            Ok(InferenceRequest::PredictAffinity {
                smile,
                target_sequence,
            })
        }
    }
}

fn pdb_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9]{4}$").expect("regex de PDB ID válida"))
}

/// Identificador PDB: exactamente 4 caracteres alfanuméricos (tras `trim`).
pub fn parse_pdb_id(raw_input: &str) -> Result<String, ResearchError> {
    let candidate = raw_input.trim();
    if pdb_id_regex().is_match(candidate) {
        Ok(candidate.to_string())
    } else {
        Err(ResearchError::validation(PDB_ID_ERROR))
    }
}

/// `"SMILES, secuencia"`: se parte por la primera coma y se limpian corchetes
/// y comillas simples de cada parte.
pub fn parse_affinity_input(raw_input: &str) -> Result<(String, String), ResearchError> {
    let (smiles_raw, sequence_raw) = raw_input
        .split_once(',')
        .ok_or_else(|| ResearchError::validation(AFFINITY_ERROR))?;

    let smiles = strip_brackets(smiles_raw.trim());
    let sequence = strip_brackets(sequence_raw.trim());
    if smiles.trim().is_empty() || sequence.trim().is_empty() {
        return Err(ResearchError::validation(AFFINITY_ERROR));
    }
    Ok((smiles, sequence))
}

fn strip_brackets(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, '[' | ']' | '\'')).collect()
}
