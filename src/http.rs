//! Axum front end: a single static page plus a small JSON API under `/api`.

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{AggregationRequest, AggregationResult, QaRecord, QueryStatistics};
use crate::schema::SchemaCatalog;
use crate::service::{AskOptions, AskResponse, DashboardService, ServiceStatus};

const INDEX_HTML: &str = include_str!("../static/index.html");
const EMPTY_QUESTION: &str = "질문을 입력해주세요.";
const MAX_HISTORY_LIMIT: usize = 100;

type AppState = Arc<DashboardService>;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Falls back to a fresh session id when absent
    #[serde(default)]
    pub user_id: Option<String>,
    pub question: String,
    #[serde(flatten)]
    pub options: AskOptions,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub user_id: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenParams {
    access_token: Option<String>,
    token: Option<String>,
}

pub fn router(service: Arc<DashboardService>, bearer_token: Option<String>) -> Router {
    let mut api = Router::new()
        .route("/status", get(status))
        .route("/session", post(create_session))
        .route("/ask", post(ask))
        .route("/history", get(history))
        .route("/stats", get(stats))
        .route("/schema", get(schema))
        .route("/aggregate", post(aggregate));

    if let Some(expected) = bearer_token {
        api = api.layer(middleware::from_fn_with_state(
            Arc::new(expected),
            require_bearer,
        ));
    }

    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .with_state(service)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(service): State<AppState>) -> Json<ServiceStatus> {
    Json(service.status())
}

async fn create_session(State(service): State<AppState>) -> Json<SessionResponse> {
    let user_id = service.new_session();
    tracing::info!("Started session {}", user_id);
    Json(SessionResponse { user_id })
}

async fn ask(
    State(service): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, String)> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, EMPTY_QUESTION.to_string()));
    }

    let user_id = req
        .user_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| service.new_session());
    Ok(Json(service.ask(&user_id, question, req.options).await))
}

async fn history(
    State(service): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<Vec<QaRecord>> {
    let limit = params
        .limit
        .unwrap_or_else(|| service.history_limit())
        .min(MAX_HISTORY_LIMIT);
    Json(service.history(&params.user_id, limit).await)
}

async fn stats(State(service): State<AppState>) -> Json<QueryStatistics> {
    Json(service.statistics().await)
}

async fn schema(State(service): State<AppState>) -> Json<SchemaCatalog> {
    Json(service.schema().clone())
}

async fn aggregate(
    State(service): State<AppState>,
    Json(req): Json<AggregationRequest>,
) -> Json<AggregationResult> {
    Json(service.aggregate(&req).await)
}

async fn require_bearer(
    State(expected): State<Arc<String>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let headers: &HeaderMap = req.headers();
    let by_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", expected.as_str()));

    // Clients that cannot set headers may pass access_token or token in the query
    let by_query = Query::<TokenParams>::try_from_uri(req.uri()).is_ok_and(|Query(params)| {
        [params.access_token, params.token]
            .iter()
            .flatten()
            .any(|token| token == expected.as_str())
    });

    if !(by_header || by_query) {
        tracing::warn!("Rejected unauthorised request to {}", req.uri().path());
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(req).await
}
