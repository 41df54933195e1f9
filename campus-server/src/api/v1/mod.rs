use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Extension, Router,
};
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

use campus_core::auth::Role;

use crate::{
    api::Json, app::App, auth::Identity, repository::RepositoryError, storage::StorageError,
};

use super::{ReportRenderer, ReportType};

pub mod attendance;
pub mod classes;
pub mod fees;
pub mod session;
pub mod students;
pub mod subjects;
pub mod teachers;

#[derive(Error, Diagnostic, Debug)]
pub enum ApiError {
    #[error("repository error")]
    #[diagnostic(code(campus::error::repository))]
    Repository(#[from] RepositoryError),
    #[error("{0}")]
    #[diagnostic(code(campus::error::bad_request))]
    BadRequest(String),
    #[error("{0}")]
    #[diagnostic(code(campus::error::unauthorized))]
    Unauthorized(String),
    #[error("insufficient permissions")]
    #[diagnostic(code(campus::error::forbidden))]
    Forbidden,
    #[error("multipart request is invalid: {0}")]
    #[diagnostic(code(campus::error::bad_request))]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error("storage error: {0}")]
    #[diagnostic(code(campus::error::storage))]
    Storage(#[from] StorageError),
    #[error("token error: {0}")]
    #[diagnostic(code(campus::error::token))]
    Token(#[from] campus_core::Error),
}

pub const HEALTH_URI: &str = "/health";

pub(crate) const MIN_PASSWORD_LENGTH: usize = 8;

/// Routes anyone may call, without a bearer token.
pub fn public_router() -> Router {
    Router::new()
        .route(HEALTH_URI, get(health_handler))
        .route("/api/v1/register", post(session::register))
        .route("/api/v1/login", post(session::login))
        .route("/api/v1/session/refresh", post(session::refresh))
}

/// Routes guarded by [`crate::auth::require_auth`]. Role checks happen in
/// the handlers, on top of the resolved [`Identity`].
pub fn protected_router() -> Router {
    Router::new()
        .route("/api/v1/identity", get(identity_handler))
        .route("/api/v1/session/logout", post(session::logout))
        .route("/api/v1/students", get(students::read_all))
        .route("/api/v1/students", post(students::create))
        .route("/api/v1/students/:id", get(students::read_one))
        .route("/api/v1/students/:id", patch(students::update))
        .route("/api/v1/students/:id", delete(students::delete))
        .route("/api/v1/students/:id/fees", get(fees::ledger))
        .route("/api/v1/students/:id/fees", post(fees::collect))
        .route("/api/v1/students/:id/fees/summary", get(fees::summary))
        .route("/api/v1/attendance", get(attendance::read_day))
        .route("/api/v1/attendance", post(attendance::record))
        .route("/api/v1/classes", get(classes::read_all))
        .route("/api/v1/classes", post(classes::create))
        .route("/api/v1/classes/:id", get(classes::read_one))
        .route("/api/v1/classes/:id", patch(classes::update))
        .route("/api/v1/classes/:id", delete(classes::delete))
        .route("/api/v1/subjects", get(subjects::read_all))
        .route("/api/v1/subjects", post(subjects::create))
        .route("/api/v1/subjects/:id", get(subjects::read_one))
        .route("/api/v1/subjects/:id", patch(subjects::update))
        .route("/api/v1/subjects/:id", delete(subjects::delete))
        .route("/api/v1/teachers", get(teachers::read_all))
        .route("/api/v1/teachers", post(teachers::create))
        .route("/api/v1/teachers/:id", get(teachers::read_one))
        .route("/api/v1/teachers/:id", patch(teachers::update))
        .route("/api/v1/teachers/:id", delete(teachers::delete))
        .route(
            "/api/v1/teachers/:id/assignments",
            get(teachers::read_assignments),
        )
        .route(
            "/api/v1/teachers/:id/assignments",
            post(teachers::create_assignment),
        )
        .route(
            "/api/v1/teachers/:id/assignments/:assignment_id",
            delete(teachers::delete_assignment),
        )
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn identity_handler(Extension(identity): Extension<Identity>) -> impl IntoResponse {
    Json(identity)
}

/// Fails with 403 unless the caller holds one of `roles`.
pub(crate) fn require_role(identity: &Identity, roles: &[Role]) -> Result<(), ApiError> {
    if identity.has_any_role(roles) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

pub(crate) fn parse_date(value: &str, field: &str) -> Result<chrono::NaiveDate, ApiError> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{} must be a date in YYYY-MM-DD form", field)))
}

fn print_error_report(err: &dyn Diagnostic) {
    if App::json_output() {
        println!("{}", ReportRenderer(ReportType::Json, err));
    } else {
        println!("Error: {}", ReportRenderer(ReportType::Graphical, err));
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details: Vec<String> = Vec::new();

        let (status, message) = match self {
            ApiError::Repository(e) => {
                if e.is_unique_constraint_violation() {
                    (
                        StatusCode::CONFLICT,
                        "already exists with this name/number".to_string(),
                    )
                } else {
                    print_error_report(&e);

                    match e {
                        RepositoryError::NotFound { entity_type, id } => (
                            StatusCode::NOT_FOUND,
                            format!("{} with ID {} does not exist", entity_type, id),
                        ),
                        RepositoryError::InvalidArgument(_, _) => {
                            (StatusCode::BAD_REQUEST, format!("{}", e))
                        }
                        _ => {
                            let mut messages: Vec<String> =
                                format!("{}", ReportRenderer(ReportType::Narratable, &e))
                                    .split('\n')
                                    .map(|s| s.trim())
                                    .filter(|s| !s.is_empty())
                                    .map(|s| s.to_string())
                                    .collect();

                            let message = messages.remove(0);
                            for detail in messages.into_iter() {
                                details.push(detail);
                            }

                            (StatusCode::INTERNAL_SERVER_ERROR, message)
                        }
                    }
                }
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "insufficient permissions".to_string(),
            ),
            ApiError::Multipart(e) => (
                StatusCode::BAD_REQUEST,
                format!("multipart request is invalid: {}", e),
            ),
            ApiError::Storage(e) => {
                print_error_report(&e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{}", e))
            }
            ApiError::Token(e) => {
                print_error_report(&e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to issue token".to_string(),
                )
            }
        };

        let body = if details.is_empty() {
            Json(json!({
                "result": "failure",
                "message": message
            }))
        } else {
            Json(json!({
                "result": "failure",
                "message": message,
                "details": details
            }))
        };

        (status, body).into_response()
    }
}
