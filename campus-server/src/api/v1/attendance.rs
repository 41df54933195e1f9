use axum::{extract::Query, Extension};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use campus_core::auth::Role;

use crate::api::v1::{parse_date, require_role, ApiError};
use crate::api::Json;
use crate::auth::Identity;
use crate::repository::{attendance, Repository};
use crate::shortid::ShortId;

const STATUS_PRESENT: &str = "Present";
const STATUS_ABSENT: &str = "Absent";

/// Handler for `POST /api/v1/attendance`. Takes a whole day's marking for a
/// class as one batch; either every record is acceptable or nothing is
/// written.
pub async fn record(
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    request: Json<Vec<AttendanceRecord>>,
) -> Result<Json<AttendanceOutcome>, ApiError> {
    require_role(&identity, &[Role::Administrator, Role::Teacher])?;

    if request.is_empty() {
        return Err(ApiError::BadRequest(
            "attendance batch is empty".to_string(),
        ));
    }

    let mut records = Vec::with_capacity(request.len());
    for record in request.iter() {
        records.push(attendance::RecordAttendance {
            student_uuid: record.student_id.into_uuid(),
            class_name: record.class.clone(),
            class_section: record.section.clone(),
            occurred_on: parse_date(&record.date, "date")?,
            present: parse_status(&record.status)?,
        });
    }

    let outcome = repository
        .attendance()
        .record(&records, identity.user_id)
        .await?;

    let outcome = AttendanceOutcome {
        recorded: outcome.recorded,
        duplicates: outcome.duplicates,
    };
    Ok(outcome.into())
}

/// Handler for `GET /api/v1/attendance`
pub async fn read_day(
    Query(query): Query<ReadAttendance>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
) -> Result<Json<Vec<AttendanceEntry>>, ApiError> {
    require_role(&identity, &[Role::Administrator, Role::Teacher])?;

    let date = query
        .date
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("date is required".to_string()))?;
    let class = query
        .class
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("class is required".to_string()))?;
    let section = query
        .section
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("section is required".to_string()))?;

    let date = parse_date(date, "date")?;

    let entries: Vec<AttendanceEntry> = repository
        .attendance()
        .read_day(date, class, section)
        .await?
        .into_iter()
        .map(|e| e.into())
        .collect();

    Ok(entries.into())
}

fn parse_status(value: &str) -> Result<bool, ApiError> {
    match value {
        STATUS_PRESENT => Ok(true),
        STATUS_ABSENT => Ok(false),
        _ => Err(ApiError::BadRequest(format!(
            "status must be {} or {}, not {}",
            STATUS_PRESENT, STATUS_ABSENT, value
        ))),
    }
}

/// Conversion from repository [`attendance::AttendanceEntry`] to
/// API [`AttendanceEntry`].
impl From<attendance::AttendanceEntry> for AttendanceEntry {
    fn from(entry: attendance::AttendanceEntry) -> Self {
        Self {
            id: entry.uuid.into(),
            student_id: entry.student_uuid.into(),
            student_name: entry.student_name,
            registration_number: entry.registration_number,
            date: entry.occurred_on,
            status: if entry.present {
                STATUS_PRESENT.to_string()
            } else {
                STATUS_ABSENT.to_string()
            },
        }
    }
}

/// One record of the body for `POST /api/v1/attendance`
#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: ShortId,
    pub date: String,
    pub class: String,
    pub section: String,
    pub status: String,
}

/// Response for `POST /api/v1/attendance`
#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceOutcome {
    pub recorded: u64,
    pub duplicates: u64,
}

/// Query string for `GET /api/v1/attendance`
#[derive(Debug, Deserialize)]
pub struct ReadAttendance {
    pub date: Option<String>,
    pub class: Option<String>,
    pub section: Option<String>,
}

/// An API [`AttendanceEntry`] type.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub id: ShortId,
    pub student_id: ShortId,
    pub student_name: String,
    pub registration_number: String,
    pub date: NaiveDate,
    pub status: String,
}
