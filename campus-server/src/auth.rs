use std::sync::Arc;

use axum::{
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use campus_core::{auth::Role, jwt::Verifier};

use crate::{api::Json, repository::Repository, shortid::ShortId};

/// The authenticated caller. Resolved once per request by [`require_auth`]
/// and made available to handlers as a request extension. The role comes
/// from the user row, not from the token, so a revoked role takes effect on
/// the next request.
#[derive(Clone, Serialize)]
pub struct Identity {
    #[serde(skip)]
    pub user_id: i64,
    #[serde(skip)]
    pub user_uuid: Uuid,
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

/// Middleware guarding every route behind `/api/v1` except the public ones.
/// Verifies the bearer token against the configured JWKS, resolves its
/// subject to a live user, and stores the resulting [`Identity`].
pub async fn require_auth<B>(mut req: Request<B>, next: Next<B>) -> Response {
    let token = match bearer_token(&req) {
        Some(token) => token,
        None => return failure(StatusCode::UNAUTHORIZED, "missing bearer token"),
    };

    let verifier = req
        .extensions()
        .get::<Arc<Verifier>>()
        .expect("JWT verifier extension not configured");

    let claims = match verifier.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("bearer token failed verification: {}", e);
            return failure(StatusCode::UNAUTHORIZED, "invalid bearer token");
        }
    };

    let subject = match claims.subject.as_deref() {
        Some(subject) => subject,
        None => return failure(StatusCode::UNAUTHORIZED, "token has no subject"),
    };

    let user_uuid = match subject.parse::<ShortId>() {
        Ok(short_id) => short_id.into_uuid(),
        Err(_) => return failure(StatusCode::UNAUTHORIZED, "token subject is not a known ID"),
    };

    let repository = req
        .extensions()
        .get::<Repository>()
        .expect("repository extension not configured")
        .clone();

    let user = match repository.user().find_by_uuid(&user_uuid).await {
        Ok(Some(user)) => user,
        Ok(None) => return failure(StatusCode::UNAUTHORIZED, "no such user"),
        Err(e) => {
            tracing::error!("identity lookup failed: {}", e);
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to resolve identity",
            );
        }
    };

    let identity = Identity {
        user_id: user.id,
        user_uuid: user.uuid,
        id: ShortId::from_uuid(&user.uuid).to_string(),
        email: user.email,
        role: user.role.into(),
    };

    req.extensions_mut().insert(identity);

    next.run(req).await
}

fn bearer_token<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "result": "failure",
            "message": message
        })),
    )
        .into_response()
}
