use axum::{
    extract::{Path, Query},
    Extension,
};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use campus_core::auth::Role;

use crate::api::v1::{require_role, ApiError};
use crate::api::Json;
use crate::auth::Identity;
use crate::repository::{fee, student, Repository};
use crate::shortid::ShortId;

/// Handler for `POST /api/v1/students/:id/fees`
pub async fn collect(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
    request: Json<CollectFee>,
) -> Result<Json<FeePayment>, ApiError> {
    require_role(&identity, &[Role::Administrator])?;

    let month_for = parse_month(&request.month)?;

    let paid_on = match request.paid_on.as_deref() {
        Some(value) => super::parse_date(value, "paid_on")?,
        None => Utc::now().naive_utc().date(),
    };

    let payment = repository
        .fee()
        .collect(fee::CollectFee {
            student_uuid: id.into_uuid(),
            month_for,
            paid_on,
            amounts: fee::FeeAmounts {
                monthly_fee: request.monthly_fee,
                admission_fee: request.admission_fee,
                registration_fee: request.registration_fee,
                uniform_fee: request.uniform_fee,
                transport_fee: request.transport_fee,
                books_fee: request.books_fee,
                fine: request.fine,
                other: request.other,
            },
            deposit: request.deposit,
            remark: request.remark.clone().filter(|r| !r.trim().is_empty()),
            new_admission: request.new_admission,
            collected_by: identity.user_id,
        })
        .await?;

    let payment: FeePayment = payment.into();
    Ok(payment.into())
}

/// Handler for `GET /api/v1/students/:id/fees`
pub async fn ledger(
    Path(id): Path<ShortId>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
) -> Result<Json<Vec<FeePayment>>, ApiError> {
    let student = repository.student().read_one(id.as_uuid()).await?;
    require_fee_access(&identity, &student)?;

    let payments: Vec<FeePayment> = repository
        .fee()
        .ledger(id.as_uuid())
        .await?
        .into_iter()
        .map(|p| p.into())
        .collect();

    Ok(payments.into())
}

/// Handler for `GET /api/v1/students/:id/fees/summary`
pub async fn summary(
    Path(id): Path<ShortId>,
    Query(query): Query<SummaryQuery>,
    Extension(identity): Extension<Identity>,
    Extension(repository): Extension<Repository>,
) -> Result<Json<FeeSummary>, ApiError> {
    let student = repository.student().read_one(id.as_uuid()).await?;
    require_fee_access(&identity, &student)?;

    let year = query.year.unwrap_or_else(|| Utc::now().year());

    let summary = repository.fee().summary(id.as_uuid(), year).await?;

    let summary = FeeSummary {
        one_time: OneTimeFees {
            admission: summary.one_time.admission,
            registration: summary.one_time.registration,
            uniform: summary.one_time.uniform,
        },
        previous_balance: summary.previous_balance,
        year,
        months: summary
            .months
            .into_iter()
            .map(|m| MonthStatus {
                month: m.month,
                paid: m.paid,
            })
            .collect(),
    };
    Ok(summary.into())
}

/// Fee records are money; only the office and the student's own guardian
/// may see them.
fn require_fee_access(identity: &Identity, student: &student::Student) -> Result<(), ApiError> {
    match identity.role {
        Role::Administrator => Ok(()),
        Role::Parent if student.parent_user_id == identity.user_id => Ok(()),
        _ => Err(ApiError::Forbidden),
    }
}

fn parse_month(value: &str) -> Result<NaiveDate, ApiError> {
    let month = if value.len() == 7 {
        NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d")
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
    };

    match month {
        Ok(month) if month.day() == 1 => Ok(month),
        Ok(_) => Err(ApiError::BadRequest(
            "month must be the first day of a month".to_string(),
        )),
        Err(_) => Err(ApiError::BadRequest(
            "month must be YYYY-MM or YYYY-MM-01".to_string(),
        )),
    }
}

/// Conversion from repository [`fee::FeePayment`] to API [`FeePayment`].
impl From<fee::FeePayment> for FeePayment {
    fn from(payment: fee::FeePayment) -> Self {
        Self {
            id: payment.uuid.into(),
            student_id: payment.student_uuid.into(),
            month: payment.month_for,
            paid_on: payment.paid_on,
            monthly_fee: payment.monthly_fee,
            admission_fee: payment.admission_fee,
            registration_fee: payment.registration_fee,
            uniform_fee: payment.uniform_fee,
            transport_fee: payment.transport_fee,
            books_fee: payment.books_fee,
            fine: payment.fine,
            other: payment.other,
            previous_balance: payment.previous_balance,
            total: payment.total,
            deposit: payment.deposit,
            due_balance: payment.due_balance,
            remark: payment.remark,
            new_admission: payment.new_admission,
            created_at: Utc.from_utc_datetime(&payment.created_at),
        }
    }
}

/// Body for `POST /api/v1/students/:id/fees`. Categories not being
/// collected can simply be left out.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CollectFee {
    pub month: String,
    #[serde(default)]
    pub monthly_fee: i64,
    #[serde(default)]
    pub admission_fee: i64,
    #[serde(default)]
    pub registration_fee: i64,
    #[serde(default)]
    pub uniform_fee: i64,
    #[serde(default)]
    pub transport_fee: i64,
    #[serde(default)]
    pub books_fee: i64,
    #[serde(default)]
    pub fine: i64,
    #[serde(default)]
    pub other: i64,
    #[serde(default)]
    pub deposit: i64,
    pub remark: Option<String>,
    #[serde(default)]
    pub new_admission: bool,
    pub paid_on: Option<String>,
}

/// Query string for `GET /api/v1/students/:id/fees/summary`
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub year: Option<i32>,
}

/// An API [`FeePayment`] type, one ledger row.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeePayment {
    pub id: ShortId,
    pub student_id: ShortId,
    pub month: NaiveDate,
    pub paid_on: NaiveDate,
    pub monthly_fee: i64,
    pub admission_fee: i64,
    pub registration_fee: i64,
    pub uniform_fee: i64,
    pub transport_fee: i64,
    pub books_fee: i64,
    pub fine: i64,
    pub other: i64,
    pub previous_balance: i64,
    pub total: i64,
    pub deposit: i64,
    pub due_balance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    pub new_admission: bool,
    pub created_at: DateTime<Utc>,
}

/// Whether each one-time fee has been collected already.
#[derive(Debug, Serialize, Deserialize)]
pub struct OneTimeFees {
    pub admission: bool,
    pub registration: bool,
    pub uniform: bool,
}

/// Paid/unpaid state of one month in a [`FeeSummary`].
#[derive(Debug, Serialize, Deserialize)]
pub struct MonthStatus {
    pub month: u32,
    pub paid: bool,
}

/// Response for `GET /api/v1/students/:id/fees/summary`
#[derive(Debug, Serialize, Deserialize)]
pub struct FeeSummary {
    pub one_time: OneTimeFees,
    pub previous_balance: i64,
    pub year: i32,
    pub months: Vec<MonthStatus>,
}
