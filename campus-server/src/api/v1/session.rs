use std::sync::Arc;

use axum::body::Empty;
use axum::response::IntoResponse;
use axum::Extension;
use chrono::{Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use campus_core::{
    auth::Role,
    jwt::{Generator, ACCESS_TOKEN_EXPIRY_MINUTES},
    session::{self, RefreshToken, REFRESH_TOKEN_EXPIRY_DAYS},
};

use crate::api::v1::{ApiError, MIN_PASSWORD_LENGTH};
use crate::api::Json;
use crate::repository::{user::CreateUser, Repository};
use crate::shortid::ShortId;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

// Verbatim message expected by existing clients on any login mismatch.
const INVALID_CREDENTIALS: &str = "Invalid Credentials";

/// Handler for `POST /api/v1/register`
pub async fn register(
    Extension(repository): Extension<Repository>,
    request: Json<Register>,
) -> Result<Json<Account>, ApiError> {
    if !EMAIL.is_match(&request.email) {
        return Err(ApiError::BadRequest(
            "email address is malformed".to_string(),
        ));
    }

    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let user = repository
        .user()
        .create(CreateUser {
            email: request.email.clone(),
            password: request.password.clone(),
            role: Role::Administrator,
        })
        .await?;

    let account = Account {
        id: user.uuid.into(),
        email: user.email,
        role: user.role.into(),
    };
    Ok(account.into())
}

/// Handler for `POST /api/v1/login`
pub async fn login(
    Extension(repository): Extension<Repository>,
    Extension(generator): Extension<Arc<Generator>>,
    request: Json<Login>,
) -> Result<Json<TokenPair>, ApiError> {
    let user = repository
        .user()
        .verify_credentials(&request.email, &request.password)
        .await?
        .ok_or_else(|| ApiError::BadRequest(INVALID_CREDENTIALS.to_string()))?;

    let role: Role = user.role.into();
    let subject = ShortId::from_uuid(&user.uuid).to_string();
    let access_token =
        generator.generate(&subject, ACCESS_TOKEN_EXPIRY_MINUTES, Some(vec![role]))?;

    let refresh_token = RefreshToken::generate()?;
    let expires_at = Utc::now().naive_utc() + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);

    repository
        .user()
        .start_session(user.id, &refresh_token.digest, expires_at)
        .await?;

    let pair = TokenPair {
        access_token,
        refresh_token: refresh_token.token,
        token_type: "Bearer".to_string(),
        expires_in: ACCESS_TOKEN_EXPIRY_MINUTES * 60,
        role,
    };
    Ok(pair.into())
}

/// Handler for `POST /api/v1/session/refresh`
pub async fn refresh(
    Extension(repository): Extension<Repository>,
    Extension(generator): Extension<Arc<Generator>>,
    request: Json<Refresh>,
) -> Result<Json<TokenPair>, ApiError> {
    let digest = session::digest(&request.refresh_token)?;

    let new_token = RefreshToken::generate()?;
    let expires_at = Utc::now().naive_utc() + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);

    let user = repository
        .user()
        .rotate_session(&digest, &new_token.digest, expires_at)
        .await?
        .ok_or_else(|| {
            ApiError::Unauthorized("refresh token is expired or revoked".to_string())
        })?;

    let role: Role = user.role.into();
    let subject = ShortId::from_uuid(&user.uuid).to_string();
    let access_token =
        generator.generate(&subject, ACCESS_TOKEN_EXPIRY_MINUTES, Some(vec![role]))?;

    let pair = TokenPair {
        access_token,
        refresh_token: new_token.token,
        token_type: "Bearer".to_string(),
        expires_in: ACCESS_TOKEN_EXPIRY_MINUTES * 60,
        role,
    };
    Ok(pair.into())
}

/// Handler for `POST /api/v1/session/logout`
pub async fn logout(
    Extension(repository): Extension<Repository>,
    request: Json<Logout>,
) -> Result<impl IntoResponse, ApiError> {
    let digest = session::digest(&request.refresh_token)?;

    if !repository.user().revoke_session(&digest).await? {
        return Err(ApiError::BadRequest(
            "refresh token is not active".to_string(),
        ));
    }

    Ok(Empty::new())
}

/// Body for `POST /api/v1/register`
#[derive(Debug, Serialize, Deserialize)]
pub struct Register {
    pub email: String,
    pub password: String,
}

/// Body for `POST /api/v1/login`
#[derive(Debug, Serialize, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

/// Body for `POST /api/v1/session/refresh`
#[derive(Debug, Serialize, Deserialize)]
pub struct Refresh {
    pub refresh_token: String,
}

/// Body for `POST /api/v1/session/logout`
#[derive(Debug, Serialize, Deserialize)]
pub struct Logout {
    pub refresh_token: String,
}

/// A registered account.
#[derive(Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: ShortId,
    pub email: String,
    pub role: Role,
}

/// The tokens issued by a successful login or refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub role: Role,
}
