use std::sync::PoisonError;

use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::ResearchError,
    models::{ConversationEntry, Mode, QueryAction, QueryResult, Step},
    orchestrator::{self, Submission},
    report,
    session::{lock, SessionView},
};

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct SetNamePayload {
    name: String,
}

#[derive(Deserialize)]
pub struct SetModePayload {
    mode: Mode,
}

#[derive(Deserialize)]
pub struct QueryPayload {
    action: QueryAction,
    input: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    message: String,
    started_at: chrono::DateTime<chrono::Utc>,
    active_sessions: usize,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

/// Traduce un error de dominio a código HTTP + mensaje corto.
fn api_error(err: ResearchError) -> ApiError {
    let status = match &err {
        ResearchError::Validation(_) => StatusCode::BAD_REQUEST,
        ResearchError::NoLigandData | ResearchError::SessionNotFound => StatusCode::NOT_FOUND,
        ResearchError::NotNamed
        | ResearchError::AlreadyNamed
        | ResearchError::EmptyLog
        | ResearchError::ReportInProgress => StatusCode::CONFLICT,
        ResearchError::Inference(_)
        | ResearchError::Summary(_)
        | ResearchError::ReportGeneration(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        error!("{}", err);
    } else {
        warn!("{}", err);
    }
    (status, Json(json!({ "error": err.to_string() })))
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session_handler))
        .route(
            "/api/sessions/:id",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/api/sessions/:id/name", post(set_name_handler))
        .route("/api/sessions/:id/mode", post(set_mode_handler))
        .route("/api/sessions/:id/query", post(query_handler))
        .route("/api/sessions/:id/conversation", get(conversation_handler))
        .route("/api/sessions/:id/report", post(report_handler))
        .route("/api/status", get(status_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn create_session_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions.create();
    let view = lock(&session).view();
    (StatusCode::CREATED, Json(view))
}

#[axum::debug_handler]
async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get(id).map_err(api_error)?;
    let view = lock(&session).view();
    Ok(Json(view))
}

#[axum::debug_handler]
async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(id).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
async fn set_name_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetNamePayload>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get(id).map_err(api_error)?;
    let mut s = lock(&session);
    s.set_name(&payload.name).map_err(api_error)?;
    info!(session = %id, "Investigación nombrada: {}", s.name);
    Ok(Json(s.view()))
}

#[axum::debug_handler]
async fn set_mode_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetModePayload>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.sessions.get(id).map_err(api_error)?;
    let mut s = lock(&session);
    if s.step != Step::Querying {
        return Err(api_error(ResearchError::NotNamed));
    }
    s.set_mode(payload.mode);
    Ok(Json(s.view()))
}

#[axum::debug_handler]
async fn query_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QueryPayload>,
) -> Result<axum::response::Response, ApiError> {
    let session = state.sessions.get(id).map_err(api_error)?;
    let submission = orchestrator::submit(
        state.inference.as_ref(),
        state.llm.as_ref(),
        &session,
        payload.action,
        &payload.input,
    )
    .await
    .map_err(api_error)?;

    Ok(match submission {
        Submission::Completed(result) => Json::<QueryResult>(result).into_response(),
        Submission::Ignored => {
            (StatusCode::ACCEPTED, Json(json!({ "status": "ignored" }))).into_response()
        }
    })
}

#[axum::debug_handler]
async fn conversation_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ConversationEntry>>, ApiError> {
    let session = state.sessions.get(id).map_err(api_error)?;
    let entries = lock(&session).log.entries().to_vec();
    Ok(Json(entries))
}

#[axum::debug_handler]
async fn report_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.sessions.get(id).map_err(api_error)?;
    let artifact = report::export_report(state.llm.as_ref(), &session)
        .await
        .map_err(api_error)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&artifact.filename),
            ),
        ],
        artifact.content,
    ))
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state
        .status
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    Json(StatusResponse {
        message: status.message,
        started_at: status.started_at,
        active_sessions: state.sessions.len(),
    })
}

// --- Handler de Apagado y Utilidades ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    let sender = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(sender) = sender {
        let _ = sender.send(());
    }
    StatusCode::OK
}

/// Cabecera `Content-Disposition` sin comillas ni caracteres de control en el nombre.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        orchestrator::tests::{FakeInference, FakeLlm, Reply},
    };
    use axum::{
        body::Body,
        http::{HeaderMap, Request},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        inference: Arc<FakeInference>,
        llm: Arc<FakeLlm>,
    }

    fn harness(reply: Reply, llm: FakeLlm) -> Harness {
        let config = AppConfig::from_lookup(|key| {
            (key == "SUMMARY_API_KEY").then(|| "test-key".to_string())
        })
        .unwrap();
        let inference = Arc::new(FakeInference::new(reply));
        let llm = Arc::new(llm);
        let (state, _shutdown_rx) = AppState::new(config, inference.clone(), llm.clone());
        Harness {
            app: create_router(state),
            inference,
            llm,
        }
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }

    fn json_of(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn named_session(app: &Router) -> String {
        let (status, _, body) = send(app, "POST", "/api/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = json_of(&body)["id"].as_str().unwrap().to_string();
        let (status, _, _) = send(
            app,
            "POST",
            &format!("/api/sessions/{id}/name"),
            Some(json!({ "name": "EGFR inhibitors" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        id
    }

    #[tokio::test]
    async fn full_research_flow() {
        let h = harness(Reply::Data(json!({ "sequence": "MKTAYIAK" })), FakeLlm::ok());

        let (status, _, body) = send(&h.app, "POST", "/api/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let view = json_of(&body);
        assert_eq!(view["step"], "naming");
        assert_eq!(view["mode"], "knowledge");
        let id = view["id"].as_str().unwrap().to_string();

        // Sin nombre no se puede consultar.
        let query = json!({ "action": "get-sequence", "input": "1abc" });
        let (status, _, _) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/query"),
            Some(query.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _, body) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/name"),
            Some(json!({ "name": "ab" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json_of(&body)["error"],
            "Research name must be at least 3 characters long"
        );

        let (status, _, body) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/name"),
            Some(json!({ "name": "EGFR  inhibitors" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["step"], "querying");

        let (status, _, body) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/query"),
            Some(query),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let result = json_of(&body);
        assert_eq!(result["summary"], "analysis #1");
        assert_eq!(result["raw"]["sequence"], "MKTAYIAK");

        let (status, _, body) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/mode"),
            Some(json!({ "mode": "deep" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["entries"], 1);

        let (status, _, _) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/query"),
            Some(json!({ "action": "deep-research", "input": "What binds to EGFR?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.inference.call_count(), 1);

        let (status, _, body) =
            send(&h.app, "GET", &format!("/api/sessions/{id}/conversation"), None).await;
        assert_eq!(status, StatusCode::OK);
        let entries = json_of(&body);
        assert_eq!(entries.as_array().unwrap().len(), 2);
        assert_eq!(entries[0]["query"], "1abc");
        assert_eq!(entries[1]["query"], "What binds to EGFR?");

        let (status, headers, body) =
            send(&h.app, "POST", &format!("/api/sessions/{id}/report"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"EGFR_inhibitors_report.txt\""
        );
        assert_eq!(String::from_utf8(body).unwrap(), "analysis #3");
        assert_eq!(h.llm.call_count(), 3);

        let (status, _, _) = send(&h.app, "DELETE", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _, _) = send(&h.app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_pdb_id_is_a_bad_request_without_backend_call() {
        let h = harness(Reply::Data(json!({})), FakeLlm::ok());
        let id = named_session(&h.app).await;

        let (status, _, body) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/query"),
            Some(json!({ "action": "generate-compounds", "input": "1A" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body)["error"], "Please enter a valid 4-character PDB ID");
        assert_eq!(h.inference.call_count(), 0);

        let (_, _, body) = send(&h.app, "GET", &format!("/api/sessions/{id}"), None).await;
        let view = json_of(&body);
        assert_eq!(view["entries"], 0);
        assert_eq!(view["outcome"]["kind"], "error");
    }

    #[tokio::test]
    async fn successful_query_is_exposed_as_outcome() {
        let h = harness(Reply::Data(json!({ "sequence": "MKT" })), FakeLlm::ok());
        let id = named_session(&h.app).await;

        let (_, _, body) = send(&h.app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(json_of(&body)["outcome"]["kind"], "none");

        let (status, _, _) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/query"),
            Some(json!({ "action": "get-sequence", "input": "1abc" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, _, body) = send(&h.app, "GET", &format!("/api/sessions/{id}"), None).await;
        let view = json_of(&body);
        assert_eq!(view["outcome"]["kind"], "result");
        assert_eq!(view["outcome"]["summary"], "analysis #1");
        assert_eq!(view["outcome"]["raw"]["sequence"], "MKT");
    }

    #[tokio::test]
    async fn renaming_a_named_session_is_a_conflict() {
        let h = harness(Reply::Data(json!({})), FakeLlm::ok());
        let id = named_session(&h.app).await;

        let (status, _, body) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/name"),
            Some(json!({ "name": "Something else" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json_of(&body)["error"], "The research session is already named");

        let (_, _, body) = send(&h.app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(json_of(&body)["name"], "EGFR inhibitors");
    }

    #[tokio::test]
    async fn empty_input_is_ignored() {
        let h = harness(Reply::Data(json!({})), FakeLlm::ok());
        let id = named_session(&h.app).await;

        let (status, _, body) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/query"),
            Some(json!({ "action": "find-relation", "input": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json_of(&body)["status"], "ignored");
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let h = harness(Reply::Data(json!({})), FakeLlm::ok());
        let id = named_session(&h.app).await;

        let (status, _, _) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/query"),
            Some(json!({ "action": "pdb-sequence", "input": "1abc" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(h.inference.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_ligand_data_has_its_own_message() {
        let h = harness(Reply::DatasetNotFound, FakeLlm::ok());
        let id = named_session(&h.app).await;

        let (status, _, body) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/query"),
            Some(json!({ "action": "generate-compounds", "input": "0000" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            json_of(&body)["error"],
            crate::error::NO_LIGAND_DATA_MESSAGE
        );
    }

    #[tokio::test]
    async fn report_on_empty_conversation_is_a_conflict() {
        let h = harness(Reply::Data(json!({})), FakeLlm::ok());
        let id = named_session(&h.app).await;

        let (status, headers, _) =
            send(&h.app, "POST", &format!("/api/sessions/{id}/report"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(headers.get(header::CONTENT_DISPOSITION).is_none());
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn mode_cannot_change_before_naming() {
        let h = harness(Reply::Data(json!({})), FakeLlm::ok());
        let (_, _, body) = send(&h.app, "POST", "/api/sessions", None).await;
        let id = json_of(&body)["id"].as_str().unwrap().to_string();

        let (status, _, _) = send(
            &h.app,
            "POST",
            &format!("/api/sessions/{id}/mode"),
            Some(json!({ "mode": "deep" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn status_counts_sessions() {
        let h = harness(Reply::Data(json!({})), FakeLlm::ok());
        named_session(&h.app).await;
        named_session(&h.app).await;

        let (status, _, body) = send(&h.app, "GET", "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["active_sessions"], 2);
    }

    #[test]
    fn content_disposition_strips_quotes() {
        assert_eq!(
            content_disposition("a\"b\n_report.txt"),
            "attachment; filename=\"ab_report.txt\""
        );
    }
}
