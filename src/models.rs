//! Modelos de dominio de una sesión de investigación (modos, acciones y
//! registro de conversación).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fase de la sesión. Sólo avanza de `Naming` a `Querying`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Naming,
    Querying,
}

/// Modo de consulta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Backend de inferencia estructurada + análisis del LLM.
    #[default]
    Knowledge,
    /// Pregunta directa al LLM.
    Deep,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Knowledge => "knowledge",
            Mode::Deep => "deep",
        }
    }
}

/// Acciones disponibles en modo `Knowledge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    GenerateCompounds,
    FindRelation,
    GetSequence,
    PredictAffinity,
}

impl ActionKind {
    /// Ruta del endpoint correspondiente en el backend de inferencia.
    pub fn endpoint(self) -> &'static str {
        match self {
            ActionKind::GenerateCompounds => "generate-compounds",
            ActionKind::FindRelation => "natural-to-aql",
            ActionKind::GetSequence => "pdb-sequence",
            ActionKind::PredictAffinity => "predict-binding-affinity",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::GenerateCompounds => "generate-compounds",
            ActionKind::FindRelation => "find-relation",
            ActionKind::GetSequence => "get-sequence",
            ActionKind::PredictAffinity => "predict-affinity",
        }
    }
}

/// Acción enviada por el usuario: una de las acciones de conocimiento o la
/// investigación profunda. Se (de)serializa como una etiqueta plana
/// (`"get-sequence"`, `"deep-research"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryAction {
    Knowledge(ActionKind),
    Deep(DeepResearch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeepResearch {
    DeepResearch,
}

impl QueryAction {
    pub const DEEP_RESEARCH: QueryAction = QueryAction::Deep(DeepResearch::DeepResearch);

    /// Modo al que pertenece la acción.
    pub fn mode(self) -> Mode {
        match self {
            QueryAction::Knowledge(_) => Mode::Knowledge,
            QueryAction::Deep(_) => Mode::Deep,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryAction::Knowledge(kind) => kind.as_str(),
            QueryAction::Deep(_) => "deep-research",
        }
    }
}

/// Modelo de chat a usar en el cliente de resumen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Análisis por consulta.
    Standard,
    /// Investigación profunda y síntesis de informes.
    Deep,
}

/// Un ciclo consulta/respuesta completado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: i64,
    pub query: String,
    pub summary: String,
    pub raw: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Resultado visible de un ciclo (análisis + datos en bruto).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub entry_id: i64,
    pub summary: String,
    pub raw: serde_json::Value,
}

/// Registro de conversación: sólo admite añadir, en orden de inserción.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Añade una entrada con id basado en el reloj (milisegundos). Si el reloj
    /// no ha avanzado respecto a la última entrada, se usa `último + 1`.
    pub fn append(
        &mut self,
        query: impl Into<String>,
        summary: impl Into<String>,
        raw: serde_json::Value,
    ) -> &ConversationEntry {
        let timestamp = Utc::now();
        let mut id = timestamp.timestamp_millis();
        if let Some(last) = self.entries.last() {
            if id <= last.id {
                id = last.id + 1;
            }
        }

        self.entries.push(ConversationEntry {
            id,
            query: query.into(),
            summary: summary.into(),
            raw,
            timestamp,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
