use std::fmt::{self, Display};
use std::sync::Arc;

use axum::{
    body::{boxed, Bytes},
    handler::Handler,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get_service,
    Extension, Router,
};
use hyper::{Body, Uri};
use miette::{Diagnostic, GraphicalReportHandler, JSONReportHandler, NarratableReportHandler};
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};

mod json;
pub mod v1;

pub use json::Json;

use campus_core::jwt::{Generator, Verifier};

use crate::{auth, database::Database, repository::Repository, storage::UploadStore};

pub enum ReportType {
    Graphical,
    Narratable,
    Json,
}

/// Renders a [`Diagnostic`] with one of miette's report handlers, for
/// printing server-side when a request fails unexpectedly.
pub struct ReportRenderer<'e>(pub ReportType, pub &'e dyn Diagnostic);

impl Display for ReportRenderer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ReportType::Graphical => GraphicalReportHandler::new().render_report(f, self.1),
            ReportType::Narratable => NarratableReportHandler::new().render_report(f, self.1),
            ReportType::Json => JSONReportHandler::new().render_report(f, self.1),
        }
    }
}

pub fn build(
    database: Database,
    verifier: Verifier,
    generator: Generator,
    uploads: UploadStore,
) -> Router {
    let repository = Repository::new(database);

    let protected = v1::protected_router().route_layer(middleware::from_fn(auth::require_auth));

    Router::new()
        .merge(v1::public_router())
        .merge(protected)
        .nest(
            "/uploads",
            get_service(ServeDir::new(uploads.root())).handle_error(uploads_error_handler),
        )
        .layer(Extension(repository))
        .layer(Extension(Arc::new(verifier)))
        .layer(Extension(Arc::new(generator)))
        .layer(Extension(uploads))
        .layer(middleware::from_fn(error_middleware))
        .layer(TraceLayer::new_for_http())
        .fallback(not_found_handler.into_service())
}

async fn not_found_handler(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "result": "failure",
            "message": "not found",
            "uri": uri.to_string()
        })),
    )
}

async fn uploads_error_handler(error: std::io::Error) -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "result": "failure",
            "message": format!("failed to read upload: {}", error)
        })),
    )
}

async fn error_middleware<B>(req: Request<B>, next: Next<B>) -> Response {
    let response = next.run(req).await;
    let (head, body) = response.into_parts();
    let body_bytes = hyper::body::to_bytes(body)
        .await
        .expect("failed to convert error response into bytes");

    let body = if head.status == StatusCode::UNPROCESSABLE_ENTITY {
        let json_body = serde_json::to_string(&json!({
            "result": "failure",
            "message": std::str::from_utf8(&body_bytes).expect("failed to parse error response"),
        }))
        .expect("failed to create error JSON body");

        Body::from(Bytes::from(json_body.as_bytes().to_vec()))
    } else {
        Body::from(body_bytes)
    };

    Response::from_parts(head, boxed(body))
}
