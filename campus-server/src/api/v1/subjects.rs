use axum::{body::Empty, extract::Path, response::IntoResponse, Extension};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use campus_core::auth::Role;

use crate::api::v1::{require_role, ApiError};
use crate::api::Json;
use crate::auth::Identity;
use crate::repository::{subject, Repository};
use crate::shortid::ShortId;

/// Handler for `POST /api/v1/subjects`
pub async fn create(
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    request: Json<CreateSubject>,
) -> Result<Json<Subject>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let subject = repository
        .subject()
        .create(subject::CreateSubject {
            name: request.name.clone(),
        })
        .await?;

    let subject: Subject = subject.into();
    Ok(subject.into())
}

/// Handler for `GET /api/v1/subjects`
pub async fn read_all(
    Extension(repository): Extension<Repository>,
) -> Result<Json<Vec<Subject>>, ApiError> {
    let subjects: Vec<Subject> = repository
        .subject()
        .read_all()
        .await?
        .into_iter()
        .map(|s| s.into())
        .collect();

    Ok(subjects.into())
}

/// Handler for `GET /api/v1/subjects/:id`
pub async fn read_one(
    Path(id): Path<ShortId>,
    Extension(repository): Extension<Repository>,
) -> Result<Json<Subject>, ApiError> {
    let subject: Subject = repository.subject().read_one(id.as_uuid()).await?.into();
    Ok(subject.into())
}

/// Handler for `PATCH /api/v1/subjects/:id`
pub async fn update(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    request: Json<UpdateSubject>,
) -> Result<Json<Subject>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let subject = repository
        .subject()
        .update(
            id.as_uuid(),
            subject::UpdateSubject {
                name: request.name.clone(),
            },
        )
        .await?;

    let subject: Subject = subject.into();
    Ok(subject.into())
}

/// Handler for `DELETE /api/v1/subjects/:id`
pub async fn delete(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    repository.subject().delete(id.as_uuid()).await?;

    Ok(Empty::new())
}

/// Conversion from repository [`subject::Subject`] to API [`Subject`].
impl From<subject::Subject> for Subject {
    fn from(subject: subject::Subject) -> Self {
        Self {
            id: subject.uuid.into(),
            name: subject.name,
            created_at: Utc.from_utc_datetime(&subject.created_at),
            updated_at: subject.updated_at.map(|at| Utc.from_utc_datetime(&at)),
        }
    }
}

/// Body for `POST /api/v1/subjects`
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CreateSubject {
    pub name: String,
}

/// Body for `PATCH /api/v1/subjects/:id`
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UpdateSubject {
    pub name: Option<String>,
}

/// An API [`Subject`] type.
#[derive(Debug, Serialize, Deserialize)]
pub struct Subject {
    pub id: ShortId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
