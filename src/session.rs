//! Almacén de sesiones de investigación: identidad, fase y modo de cada
//! sesión, su registro de conversación y los indicadores de "en curso".

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::ResearchError,
    models::{ConversationLog, Mode, QueryResult, Step},
};

/// Longitud mínima (tras `trim`) del nombre de la investigación.
pub const MIN_NAME_LEN: usize = 3;

/// Estado del ciclo de consulta en curso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    #[default]
    Idle,
    Validating,
    AwaitingPrimary,
    AwaitingSummary,
}

/// Lo último que se mostró al usuario tras un ciclo.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    None,
    Result(QueryResult),
    Error { message: String },
}

/// Una sesión de investigación activa.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub step: Step,
    pub mode: Mode,
    pub log: ConversationLog,
    pub phase: CyclePhase,
    pub outcome: Outcome,
    pub generating_report: bool,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            step: Step::Naming,
            mode: Mode::default(),
            log: ConversationLog::new(),
            phase: CyclePhase::Idle,
            outcome: Outcome::None,
            generating_report: false,
            created_at: Utc::now(),
        }
    }

    /// Fija el nombre y pasa a `Querying`. No hay vuelta atrás a `Naming` y
    /// el nombre no se puede cambiar después.
    pub fn set_name(&mut self, name: &str) -> Result<(), ResearchError> {
        if self.step == Step::Querying {
            return Err(ResearchError::AlreadyNamed);
        }
        let trimmed = name.trim();
        if trimmed.chars().count() < MIN_NAME_LEN {
            return Err(ResearchError::validation(
                "Research name must be at least 3 characters long",
            ));
        }
        self.name = trimmed.to_string();
        self.step = Step::Querying;
        Ok(())
    }

    /// Cambia de modo sin tocar el registro de conversación.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn loading(&self) -> bool {
        self.phase != CyclePhase::Idle
    }

    /// Vista serializable para la API.
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            name: self.name.clone(),
            step: self.step,
            mode: self.mode,
            phase: self.phase,
            loading: self.loading(),
            generating_report: self.generating_report,
            entries: self.log.len(),
            outcome: self.outcome.clone(),
            created_at: self.created_at,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub name: String,
    pub step: Step,
    pub mode: Mode,
    pub phase: CyclePhase,
    pub loading: bool,
    pub generating_report: bool,
    pub entries: usize,
    pub outcome: Outcome,
    pub created_at: DateTime<Utc>,
}

pub type SharedSession = Arc<Mutex<Session>>;

/// Bloquea la sesión. Un panic previo con el lock tomado no invalida el estado,
/// que sólo se modifica en asignaciones completas.
pub fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reserva del único ciclo de consulta permitido por sesión. Al soltarse sin
/// completar (p.ej. si el cliente HTTP se desconecta) libera la sesión.
pub struct CycleGuard {
    session: SharedSession,
    finished: bool,
}

impl CycleGuard {
    /// Devuelve `Ok(None)` si ya hay un ciclo en curso.
    pub fn begin(session: &SharedSession) -> Result<Option<Self>, ResearchError> {
        let mut s = lock(session);
        if s.step != Step::Querying {
            return Err(ResearchError::NotNamed);
        }
        if s.loading() {
            debug!(session = %s.id, "Consulta ignorada: ya hay un ciclo en curso");
            return Ok(None);
        }
        s.phase = CyclePhase::Validating;
        if matches!(s.outcome, Outcome::Error { .. }) {
            s.outcome = Outcome::None;
        }
        Ok(Some(Self {
            session: session.clone(),
            finished: false,
        }))
    }

    pub fn set_phase(&self, phase: CyclePhase) {
        lock(&self.session).phase = phase;
    }

    /// Modo actual de la sesión.
    pub fn mode(&self) -> Mode {
        lock(&self.session).mode
    }

    /// Cierra el ciclo con éxito: añade la entrada y expone el resultado.
    pub fn complete(mut self, query: &str, summary: String, raw: serde_json::Value) -> QueryResult {
        let mut s = lock(&self.session);
        let entry = s.log.append(query, summary, raw);
        let result = QueryResult {
            entry_id: entry.id,
            summary: entry.summary.clone(),
            raw: entry.raw.clone(),
        };
        s.outcome = Outcome::Result(result.clone());
        s.phase = CyclePhase::Idle;
        info!(session = %s.id, entries = s.log.len(), "Ciclo de consulta completado");
        drop(s);
        self.finished = true;
        result
    }

    /// Cierra el ciclo con error, sin tocar el registro.
    pub fn fail(mut self, err: &ResearchError) {
        let mut s = lock(&self.session);
        s.outcome = Outcome::Error {
            message: err.to_string(),
        };
        s.phase = CyclePhase::Idle;
        drop(s);
        self.finished = true;
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if !self.finished {
            lock(&self.session).phase = CyclePhase::Idle;
        }
    }
}

/// Reserva de la generación de informe (una a la vez por sesión).
pub struct ReportGuard {
    session: SharedSession,
}

impl ReportGuard {
    pub fn begin(session: &SharedSession) -> Result<Self, ResearchError> {
        let mut s = lock(session);
        if s.generating_report {
            return Err(ResearchError::ReportInProgress);
        }
        s.generating_report = true;
        Ok(Self {
            session: session.clone(),
        })
    }
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        lock(&self.session).generating_report = false;
    }
}

/// Sesiones activas, indexadas por id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> SharedSession {
        let session = Session::new();
        let id = session.id;
        let shared = Arc::new(Mutex::new(session));
        self.map().insert(id, shared.clone());
        info!(session = %id, "Sesión de investigación creada");
        shared
    }

    pub fn get(&self, id: Uuid) -> Result<SharedSession, ResearchError> {
        self.map()
            .get(&id)
            .cloned()
            .ok_or(ResearchError::SessionNotFound)
    }

    /// Termina la sesión; su registro de conversación se descarta.
    pub fn remove(&self, id: Uuid) -> Result<(), ResearchError> {
        match self.map().remove(&id) {
            Some(_) => {
                info!(session = %id, "Sesión de investigación finalizada");
                Ok(())
            }
            None => Err(ResearchError::SessionNotFound),
        }
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<Uuid, SharedSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
