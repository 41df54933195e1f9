use axum::{
    body::Empty,
    extract::Path,
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use campus_core::auth::Role;

use crate::api::v1::{require_role, ApiError};
use crate::api::Json;
use crate::auth::Identity;
use crate::repository::{class, Repository};
use crate::shortid::ShortId;

/// Handler for `POST /api/v1/classes`
pub async fn create(
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    request: Json<CreateClass>,
) -> Result<Json<Class>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let class = repository
        .class()
        .create(class::CreateClass {
            name: request.name.clone(),
            section: request.section.clone(),
            tuition_fee: request.tuition_fee,
            teacher_uuid: request.teacher_id.map(|id| id.into_uuid()),
        })
        .await?;

    let class: Class = class.into();
    Ok(class.into())
}

/// Handler for `GET /api/v1/classes`
pub async fn read_all(
    Extension(repository): Extension<Repository>,
) -> Result<Json<Vec<Class>>, ApiError> {
    let classes: Vec<Class> = repository
        .class()
        .read_all()
        .await?
        .into_iter()
        .map(|c| c.into())
        .collect();

    Ok(classes.into())
}

/// Handler for `GET /api/v1/classes/:id`
pub async fn read_one(
    Path(id): Path<ShortId>,
    Extension(repository): Extension<Repository>,
) -> Result<Json<Class>, ApiError> {
    let class: Class = repository.class().read_one(id.as_uuid()).await?.into();
    Ok(class.into())
}

/// Handler for `PATCH /api/v1/classes/:id`
pub async fn update(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    request: Json<UpdateClass>,
) -> Result<Json<Class>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let class = repository
        .class()
        .update(
            id.as_uuid(),
            class::UpdateClass {
                name: request.name.clone(),
                section: request.section.clone(),
                tuition_fee: request.tuition_fee,
                teacher_uuid: request.teacher_id.map(|id| id.into_uuid()),
            },
        )
        .await?;

    let class: Class = class.into();
    Ok(class.into())
}

/// Handler for `DELETE /api/v1/classes/:id`
pub async fn delete(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    repository.class().delete(id.as_uuid()).await?;

    Ok(Empty::new())
}

/// Conversion from repository [`class::Class`] to API [`Class`].
impl From<class::Class> for Class {
    fn from(class: class::Class) -> Self {
        Self {
            id: class.uuid.into(),
            name: class.name,
            section: class.section,
            tuition_fee: class.tuition_fee,
            teacher_id: class.teacher_uuid.map(|uuid| uuid.into()),
            teacher_name: class.teacher_name,
            created_at: Utc.from_utc_datetime(&class.created_at),
            updated_at: class.updated_at.map(|at| Utc.from_utc_datetime(&at)),
        }
    }
}

/// Body for `POST /api/v1/classes`
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CreateClass {
    pub name: String,
    pub section: String,
    #[serde(default)]
    pub tuition_fee: i64,
    pub teacher_id: Option<ShortId>,
}

/// Body for `PATCH /api/v1/classes/:id`
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UpdateClass {
    pub name: Option<String>,
    pub section: Option<String>,
    pub tuition_fee: Option<i64>,
    pub teacher_id: Option<ShortId>,
}

/// An API [`Class`] type, carrying the class teacher's name when one
/// is assigned.
#[derive(Debug, Serialize, Deserialize)]
pub struct Class {
    pub id: ShortId,
    pub name: String,
    pub section: String,
    pub tuition_fee: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<ShortId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
