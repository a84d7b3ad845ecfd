//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; status codes follow the evaluation outcome.

use std::sync::Arc;
use axum::{
  extract::{rejection::JsonRejection, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{instrument, warn};

use crate::domain::Failure;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

/// 200 for graded submissions, 400 for gate rejections, 500 for internal failures.
pub fn status_for(failure: Option<Failure>) -> StatusCode {
  match failure {
    None => StatusCode::OK,
    Some(Failure::Security | Failure::Syntax) => StatusCode::BAD_REQUEST,
    Some(Failure::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

fn input_error(e: InputError) -> Response {
  (StatusCode::BAD_REQUEST, Json(ErrorOut::new(e.label(), e.to_string()))).into_response()
}

fn body_error(rejection: JsonRejection) -> Response {
  warn!(target: "devforge_backend", error = %rejection.body_text(), "Unparsable request body");
  input_error(InputError::Body(rejection.body_text()))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, payload))]
pub async fn http_post_execute(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<ExecuteIn>, JsonRejection>,
) -> Response {
  let body = match payload {
    Ok(Json(body)) => body,
    Err(rejection) => return body_error(rejection),
  };
  match execute_submission(&state, body) {
    Ok(result) => (status_for(result.failure), Json(result)).into_response(),
    Err(e) => input_error(e),
  }
}

#[instrument(level = "info", skip(state, payload))]
pub async fn http_post_submit(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<SubmitIn>, JsonRejection>,
) -> Response {
  let body = match payload {
    Ok(Json(body)) => body,
    Err(rejection) => return body_error(rejection),
  };
  match submit_submission(&state, body) {
    Ok(report) => (status_for(report.evaluation.failure), Json(report)).into_response(),
    Err(e) => input_error(e),
  }
}
