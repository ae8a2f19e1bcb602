//! The HTTP front-end: a static chat page and the question endpoint.

use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::pipeline::RagPipeline;

const CHAT_PAGE: &str = include_str!("../assets/chat.html");

/// Shared handler state: the pipeline built once at startup.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RagPipeline>,
}

/// Builds the router with the pipeline injected as shared state.
pub fn router(pipeline: Arc<RagPipeline>) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route("/get", get(ask).post(ask))
        .with_state(AppState { pipeline })
}

/// `GET /` — the static chat page. No parameters, no side effects,
/// served regardless of upstream health.
async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// The `msg` field, accepted from either the query string (GET) or an
/// urlencoded form body (POST).
#[derive(Debug, Deserialize)]
struct AskParams {
    msg: Option<String>,
}

/// `GET|POST /get` — runs the question through the pipeline and returns
/// the answer as plain text.
async fn ask(
    State(state): State<AppState>,
    Query(query): Query<AskParams>,
    form: Result<Form<AskParams>, FormRejection>,
) -> Response {
    let msg = form
        .ok()
        .and_then(|Form(params)| params.msg)
        .or(query.msg);
    let Some(msg) = msg else {
        return (StatusCode::BAD_REQUEST, "missing form field `msg`").into_response();
    };

    let request_id = Uuid::new_v4();
    info!(%request_id, question = %msg, "incoming question");

    match state.pipeline.answer(&msg).await {
        Ok(answer) => {
            info!(%request_id, chars = answer.len(), "question answered");
            answer.into_response()
        }
        Err(err) => {
            error!(%request_id, error = %err, "pipeline failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "the assistant is temporarily unavailable",
            )
                .into_response()
        }
    }
}
