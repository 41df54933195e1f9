use axum::{body::Empty, extract::Path, response::IntoResponse, Extension};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use campus_core::auth::Role;

use crate::api::v1::{require_role, ApiError};
use crate::api::Json;
use crate::auth::Identity;
use crate::repository::{teacher, Repository};
use crate::shortid::ShortId;

/// Handler for `POST /api/v1/teachers`
pub async fn create(
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    request: Json<CreateTeacher>,
) -> Result<Json<Teacher>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let teacher = repository
        .teacher()
        .create(teacher::CreateTeacher {
            name: request.name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
        })
        .await?;

    let teacher: Teacher = teacher.into();
    Ok(teacher.into())
}

/// Handler for `GET /api/v1/teachers`
pub async fn read_all(
    Extension(repository): Extension<Repository>,
) -> Result<Json<Vec<Teacher>>, ApiError> {
    let teachers: Vec<Teacher> = repository
        .teacher()
        .read_all()
        .await?
        .into_iter()
        .map(|t| t.into())
        .collect();

    Ok(teachers.into())
}

/// Handler for `GET /api/v1/teachers/:id`
pub async fn read_one(
    Path(id): Path<ShortId>,
    Extension(repository): Extension<Repository>,
) -> Result<Json<Teacher>, ApiError> {
    let teacher: Teacher = repository.teacher().read_one(id.as_uuid()).await?.into();
    Ok(teacher.into())
}

/// Handler for `PATCH /api/v1/teachers/:id`
pub async fn update(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    request: Json<UpdateTeacher>,
) -> Result<Json<Teacher>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let teacher = repository
        .teacher()
        .update(
            id.as_uuid(),
            teacher::UpdateTeacher {
                name: request.name.clone(),
                email: request.email.clone(),
                phone: request.phone.clone(),
            },
        )
        .await?;

    let teacher: Teacher = teacher.into();
    Ok(teacher.into())
}

/// Handler for `DELETE /api/v1/teachers/:id`
pub async fn delete(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    repository.teacher().delete(id.as_uuid()).await?;

    Ok(Empty::new())
}

/// Handler for `GET /api/v1/teachers/:id/assignments`
pub async fn read_assignments(
    Path(id): Path<ShortId>,
    Extension(repository): Extension<Repository>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
    let assignments: Vec<Assignment> = repository
        .teacher()
        .read_assignments(id.as_uuid())
        .await?
        .into_iter()
        .map(|a| a.into())
        .collect();

    Ok(assignments.into())
}

/// Handler for `POST /api/v1/teachers/:id/assignments`
pub async fn create_assignment(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    request: Json<CreateAssignment>,
) -> Result<Json<Assignment>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let assignment = repository
        .teacher()
        .create_assignment(
            id.as_uuid(),
            request.class_id.as_uuid(),
            request.subject_id.as_uuid(),
        )
        .await?;

    let assignment: Assignment = assignment.into();
    Ok(assignment.into())
}

/// Handler for `DELETE /api/v1/teachers/:id/assignments/:assignment_id`
pub async fn delete_assignment(
    Path((id, assignment_id)): Path<(ShortId, ShortId)>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    repository
        .teacher()
        .delete_assignment(id.as_uuid(), assignment_id.as_uuid())
        .await?;

    Ok(Empty::new())
}

/// Conversion from repository [`teacher::Teacher`] to API [`Teacher`].
impl From<teacher::Teacher> for Teacher {
    fn from(teacher: teacher::Teacher) -> Self {
        Self {
            id: teacher.uuid.into(),
            name: teacher.name,
            email: teacher.email,
            phone: teacher.phone,
            created_at: Utc.from_utc_datetime(&teacher.created_at),
            updated_at: teacher.updated_at.map(|at| Utc.from_utc_datetime(&at)),
        }
    }
}

/// Conversion from repository [`teacher::Assignment`] to API [`Assignment`].
impl From<teacher::Assignment> for Assignment {
    fn from(assignment: teacher::Assignment) -> Self {
        Self {
            id: assignment.uuid.into(),
            teacher_id: assignment.teacher_uuid.into(),
            class_id: assignment.class_uuid.into(),
            class: assignment.class_name,
            section: assignment.class_section,
            subject_id: assignment.subject_uuid.into(),
            subject: assignment.subject_name,
            created_at: Utc.from_utc_datetime(&assignment.created_at),
        }
    }
}

/// Body for `POST /api/v1/teachers`
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CreateTeacher {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Body for `PATCH /api/v1/teachers/:id`
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UpdateTeacher {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Body for `POST /api/v1/teachers/:id/assignments`
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAssignment {
    pub class_id: ShortId,
    pub subject_id: ShortId,
}

/// An API [`Teacher`] type.
#[derive(Debug, Serialize, Deserialize)]
pub struct Teacher {
    pub id: ShortId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An API [`Assignment`] type: which subject a teacher takes in which
/// class.
#[derive(Debug, Serialize, Deserialize)]
pub struct Assignment {
    pub id: ShortId,
    pub teacher_id: ShortId,
    pub class_id: ShortId,
    pub class: String,
    pub section: String,
    pub subject_id: ShortId,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}
