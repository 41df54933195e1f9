use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query},
    Extension,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use campus_core::auth::Role;

use crate::api::v1::{parse_date, require_role, ApiError, MIN_PASSWORD_LENGTH};
use crate::api::Json;
use crate::auth::Identity;
use crate::repository::{student, Repository};
use crate::shortid::ShortId;
use crate::storage::UploadStore;

/// Handler for `POST /api/v1/students`. Registration is a multipart form:
/// the student's particulars, the guardian's login credentials, and the two
/// document files.
pub async fn create(
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    Extension(uploads): Extension<UploadStore>,
    multipart: Multipart,
) -> Result<Json<Student>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let form = RegistrationForm::parse(multipart).await?;

    let date_of_birth = required_text(form.date_of_birth, "date_of_birth")?;
    let date_of_birth = parse_date(&date_of_birth, "date_of_birth")?;
    let (photo_name, photo_bytes) = required_file(form.student_photo, "student_photo")?;
    let (certificate_name, certificate_bytes) =
        required_file(form.birth_certificate, "birth_certificate")?;

    let name = required_text(form.student_name, "student_name")?;
    let registration_number = required_text(form.registration_number, "registration_number")?;
    let gender = required_text(form.gender, "gender")?;
    let country = required_text(form.country, "country")?;
    let address = required_text(form.address, "address")?;
    let class_name = required_text(form.assigned_class, "assigned_class")?;
    let class_section = required_text(form.assigned_section, "assigned_section")?;
    let father_name = required_text(form.father_name, "father_name")?;
    let mother_name = required_text(form.mother_name, "mother_name")?;
    let parent_username = required_text(form.username, "username")?;
    let parent_password = required_text(form.password, "password")?;

    if parent_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let photo = uploads.save(photo_name.as_deref(), &photo_bytes).await?;
    let birth_certificate = uploads
        .save(certificate_name.as_deref(), &certificate_bytes)
        .await?;

    let created = repository
        .student()
        .create(student::CreateStudent {
            name,
            registration_number,
            date_of_birth,
            gender,
            country,
            address,
            class_name,
            class_section,
            father_name,
            mother_name,
            email: form.email.filter(|v| !v.trim().is_empty()),
            phone: form.phone.filter(|v| !v.trim().is_empty()),
            photo_path: photo.name.clone(),
            birth_certificate_path: birth_certificate.name.clone(),
            parent_username,
            parent_password,
            created_by: identity.user_id,
        })
        .await;

    match created {
        Ok(student) => {
            let student: Student = student.into();
            Ok(student.into())
        }
        Err(e) => {
            // the row never landed, take the stored files back out
            uploads.remove(&photo.name).await;
            uploads.remove(&birth_certificate.name).await;
            Err(e.into())
        }
    }
}

/// Handler for `GET /api/v1/students`
pub async fn read_all(
    Query(query): Query<ListStudents>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
) -> Result<Json<Vec<Student>>, ApiError> {
    let parent_scope = match identity.role {
        Role::Administrator | Role::Teacher => None,
        Role::Parent => Some(identity.user_id),
    };

    let students: Vec<Student> = repository
        .student()
        .read_all(
            query.class.as_deref(),
            query.section.as_deref(),
            parent_scope,
        )
        .await?
        .into_iter()
        .map(|s| s.into())
        .collect();

    Ok(students.into())
}

/// Handler for `GET /api/v1/students/:id`
pub async fn read_one(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
) -> Result<Json<Student>, ApiError> {
    let student = repository.student().read_one(id.as_uuid()).await?;

    require_student_access(&identity, &student)?;

    let student: Student = student.into();
    Ok(student.into())
}

/// Handler for `PATCH /api/v1/students/:id`
pub async fn update(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    request: Json<UpdateStudent>,
) -> Result<Json<Student>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let date_of_birth = match request.date_of_birth.as_deref() {
        Some(value) => Some(parse_date(value, "date_of_birth")?),
        None => None,
    };

    let student = repository
        .student()
        .update(
            id.as_uuid(),
            student::UpdateStudent {
                name: request.student_name.clone(),
                registration_number: request.registration_number.clone(),
                date_of_birth,
                gender: request.gender.clone(),
                country: request.country.clone(),
                address: request.address.clone(),
                class_name: request.assigned_class.clone(),
                class_section: request.assigned_section.clone(),
                father_name: request.father_name.clone(),
                mother_name: request.mother_name.clone(),
                email: request.email.clone(),
                phone: request.phone.clone(),
            },
        )
        .await?;

    let student: Student = student.into();
    Ok(student.into())
}

/// Handler for `DELETE /api/v1/students/:id`. The response reports what was
/// removed; a file that could not be removed is reported, not an error.
pub async fn delete(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    Extension(uploads): Extension<UploadStore>,
) -> Result<Json<DeletionReport>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let deleted = repository.student().delete(id.as_uuid()).await?;

    let mut files = Vec::with_capacity(2);
    for name in [&deleted.photo_path, &deleted.birth_certificate_path] {
        let removal = uploads.remove(name).await;
        files.push(FileRemovalReport {
            file: removal.file,
            removed: removal.removed,
            error: removal.error,
        });
    }

    let report = DeletionReport {
        students_deleted: 1,
        attendance_rows_deleted: deleted.attendance_rows,
        files,
    };
    Ok(report.into())
}

fn require_student_access(identity: &Identity, student: &student::Student) -> Result<(), ApiError> {
    match identity.role {
        Role::Administrator | Role::Teacher => Ok(()),
        Role::Parent if student.parent_user_id == identity.user_id => Ok(()),
        Role::Parent => Err(ApiError::Forbidden),
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::BadRequest(format!("{} is required", field))),
    }
}

type FilePart = (Option<String>, Bytes);

fn required_file(value: Option<FilePart>, field: &str) -> Result<FilePart, ApiError> {
    match value {
        Some((_, ref bytes)) if bytes.is_empty() => {
            Err(ApiError::BadRequest(format!("{} is required", field)))
        }
        Some(part) => Ok(part),
        None => Err(ApiError::BadRequest(format!("{} is required", field))),
    }
}

#[derive(Default)]
struct RegistrationForm {
    student_name: Option<String>,
    registration_number: Option<String>,
    date_of_birth: Option<String>,
    gender: Option<String>,
    country: Option<String>,
    address: Option<String>,
    assigned_class: Option<String>,
    assigned_section: Option<String>,
    father_name: Option<String>,
    mother_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    username: Option<String>,
    password: Option<String>,
    student_photo: Option<FilePart>,
    birth_certificate: Option<FilePart>,
}

impl RegistrationForm {
    async fn parse(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = match field.name() {
                Some(name) => name.to_string(),
                None => continue,
            };

            match name.as_str() {
                "student_photo" => {
                    let file_name = field.file_name().map(|s| s.to_string());
                    form.student_photo = Some((file_name, field.bytes().await?));
                }
                "birth_certificate" => {
                    let file_name = field.file_name().map(|s| s.to_string());
                    form.birth_certificate = Some((file_name, field.bytes().await?));
                }
                _ => {
                    let value = field.text().await?;
                    match name.as_str() {
                        "student_name" => form.student_name = Some(value),
                        "registration_number" => form.registration_number = Some(value),
                        "date_of_birth" => form.date_of_birth = Some(value),
                        "gender" => form.gender = Some(value),
                        "country" => form.country = Some(value),
                        "address" => form.address = Some(value),
                        "assigned_class" => form.assigned_class = Some(value),
                        "assigned_section" => form.assigned_section = Some(value),
                        "father_name" => form.father_name = Some(value),
                        "mother_name" => form.mother_name = Some(value),
                        "email" => form.email = Some(value),
                        "phone" => form.phone = Some(value),
                        "username" => form.username = Some(value),
                        "password" => form.password = Some(value),
                        _ => {
                            tracing::debug!(field = name.as_str(), "ignoring unknown form field")
                        }
                    }
                }
            }
        }

        Ok(form)
    }
}

/// Conversion from repository [`student::Student`] to API [`Student`].
impl From<student::Student> for Student {
    fn from(student: student::Student) -> Self {
        Self {
            id: student.uuid.into(),
            name: student.name,
            registration_number: student.registration_number,
            date_of_birth: student.date_of_birth,
            gender: student.gender,
            country: student.country,
            address: student.address,
            class: student.class_name,
            section: student.class_section,
            father_name: student.father_name,
            mother_name: student.mother_name,
            email: student.email,
            phone: student.phone,
            photo: format!("/uploads/{}", student.photo_path),
            birth_certificate: format!("/uploads/{}", student.birth_certificate_path),
            created_at: Utc.from_utc_datetime(&student.created_at),
            updated_at: student.updated_at.map(|t| Utc.from_utc_datetime(&t)),
        }
    }
}

/// Query string for `GET /api/v1/students`
#[derive(Debug, Deserialize)]
pub struct ListStudents {
    pub class: Option<String>,
    pub section: Option<String>,
}

/// Body for `PATCH /api/v1/students/:id`
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UpdateStudent {
    pub student_name: Option<String>,
    pub registration_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub assigned_class: Option<String>,
    pub assigned_section: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// An API [`Student`] type.
#[derive(Debug, Serialize, Deserialize)]
pub struct Student {
    pub id: ShortId,
    pub name: String,
    pub registration_number: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub country: String,
    pub address: String,
    pub class: String,
    pub section: String,
    pub father_name: String,
    pub mother_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub photo: String,
    pub birth_certificate: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-file outcome in a [`DeletionReport`].
#[derive(Debug, Serialize, Deserialize)]
pub struct FileRemovalReport {
    pub file: String,
    pub removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response for `DELETE /api/v1/students/:id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletionReport {
    pub students_deleted: u64,
    pub attendance_rows_deleted: u64,
    pub files: Vec<FileRemovalReport>,
}
