use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::{
    database::Database,
    repository::{RepositoryError, Result},
    shortid::ShortId,
};

const ENTITY_STUDENT: &str = "student";

/// One row of the append-only fee ledger.
#[derive(sqlx::FromRow)]
pub struct FeePayment {
    pub uuid: Uuid,
    pub student_uuid: Uuid,
    pub month_for: NaiveDate,
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
    pub remark: Option<String>,
    pub new_admission: bool,
    pub created_at: NaiveDateTime,
}

/// The flat per-category amounts of one collection.
#[derive(Clone, Copy, Default)]
pub struct FeeAmounts {
    pub monthly_fee: i64,
    pub admission_fee: i64,
    pub registration_fee: i64,
    pub uniform_fee: i64,
    pub transport_fee: i64,
    pub books_fee: i64,
    pub fine: i64,
    pub other: i64,
}

impl FeeAmounts {
    pub fn category_total(&self) -> i64 {
        self.monthly_fee
            + self.admission_fee
            + self.registration_fee
            + self.uniform_fee
            + self.transport_fee
            + self.books_fee
            + self.fine
            + self.other
    }

    /// The first negative amount, by field name, if any.
    pub fn negative_field(&self) -> Option<&'static str> {
        let fields = [
            (self.monthly_fee, "monthly_fee"),
            (self.admission_fee, "admission_fee"),
            (self.registration_fee, "registration_fee"),
            (self.uniform_fee, "uniform_fee"),
            (self.transport_fee, "transport_fee"),
            (self.books_fee, "books_fee"),
            (self.fine, "fine"),
            (self.other, "other"),
        ];

        fields
            .into_iter()
            .find(|(amount, _)| *amount < 0)
            .map(|(_, name)| name)
    }
}

pub struct CollectFee {
    pub student_uuid: Uuid,
    pub month_for: NaiveDate,
    pub paid_on: NaiveDate,
    pub amounts: FeeAmounts,
    pub deposit: i64,
    pub remark: Option<String>,
    pub new_admission: bool,
    pub collected_by: i64,
}

/// Whether each one-time fee has already been collected for a student.
pub struct OneTimeFees {
    pub admission: bool,
    pub registration: bool,
    pub uniform: bool,
}

pub struct MonthStatus {
    pub month: u32,
    pub paid: bool,
}

pub struct FeeSummary {
    pub one_time: OneTimeFees,
    pub previous_balance: i64,
    pub months: Vec<MonthStatus>,
}

/// `total` is everything charged this time plus what was still owed;
/// `due_balance` is what remains after the deposit. A deposit larger than
/// the total leaves a negative due balance, a credit carried forward.
pub fn compute_totals(amounts: &FeeAmounts, previous_balance: i64, deposit: i64) -> (i64, i64) {
    let total = amounts.category_total() + previous_balance;
    let due_balance = total - deposit;
    (total, due_balance)
}

// One-time sums and the running balance, in a single pass over the ledger.
// balance = everything charged so far minus everything deposited so far.
const LEDGER_STATE: &str = r"
    SELECT
        COALESCE(SUM(admission_fee), 0)::BIGINT AS admission,
        COALESCE(SUM(registration_fee), 0)::BIGINT AS registration,
        COALESCE(SUM(uniform_fee), 0)::BIGINT AS uniform,
        (COALESCE(SUM(monthly_fee + admission_fee + registration_fee + uniform_fee
                      + transport_fee + books_fee + fine + other), 0)
            - COALESCE(SUM(deposit), 0))::BIGINT AS balance
    FROM
        fee_payments
    WHERE
        student_id = $1
";

const SELECT_FEE_PAYMENT: &str = r"
    SELECT
        f.uuid,
        st.uuid AS student_uuid,
        f.month_for,
        f.paid_on,
        f.monthly_fee,
        f.admission_fee,
        f.registration_fee,
        f.uniform_fee,
        f.transport_fee,
        f.books_fee,
        f.fine,
        f.other,
        f.previous_balance,
        f.total,
        f.deposit,
        f.due_balance,
        f.remark,
        f.new_admission,
        f.created_at
    FROM
        fee_payments f
        INNER JOIN students st ON st.id = f.student_id
";

#[derive(Clone)]
pub struct FeeRepository {
    database: Database,
}

impl FeeRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Appends one collection to the ledger. The previous balance is always
    /// recomputed from the stored rows, never taken from the caller, and
    /// one-time fees (admission, registration, uniform) are refused once the
    /// ledger already carries them.
    pub async fn collect(&self, request: CollectFee) -> Result<FeePayment> {
        if let Some(field) = request.amounts.negative_field() {
            return Err(RepositoryError::InvalidArgument(
                field.to_string(),
                "must not be negative".to_string(),
            ));
        }

        if request.deposit < 0 {
            return Err(RepositoryError::InvalidArgument(
                "deposit".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let mut tx = self.database.transaction().await?;

        let student_id: i64 =
            sqlx::query_scalar(r"SELECT id FROM students WHERE uuid = $1 AND deleted = false")
                .bind(request.student_uuid)
                .fetch_optional(&mut tx)
                .await?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity_type: ENTITY_STUDENT.to_string(),
                    id: ShortId::from_uuid(&request.student_uuid).to_string(),
                })?;

        let (admission, registration, uniform, previous_balance): (i64, i64, i64, i64) =
            sqlx::query_as(LEDGER_STATE)
                .bind(student_id)
                .fetch_one(&mut tx)
                .await?;

        let already_collected = [
            (request.amounts.admission_fee, admission, "admission_fee"),
            (
                request.amounts.registration_fee,
                registration,
                "registration_fee",
            ),
            (request.amounts.uniform_fee, uniform, "uniform_fee"),
        ];

        for (requested, collected, field) in already_collected {
            if requested > 0 && collected > 0 {
                return Err(RepositoryError::InvalidArgument(
                    field.to_string(),
                    "already collected for this student".to_string(),
                ));
            }
        }

        let (total, due_balance) =
            compute_totals(&request.amounts, previous_balance, request.deposit);

        let id = Uuid::new_v4();

        let sql = r"
            INSERT INTO fee_payments (
                uuid,
                student_id,
                month_for,
                paid_on,
                monthly_fee,
                admission_fee,
                registration_fee,
                uniform_fee,
                transport_fee,
                books_fee,
                fine,
                other,
                previous_balance,
                total,
                deposit,
                due_balance,
                remark,
                new_admission,
                collected_by
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
        ";

        sqlx::query(sql)
            .bind(id)
            .bind(student_id)
            .bind(request.month_for)
            .bind(request.paid_on)
            .bind(request.amounts.monthly_fee)
            .bind(request.amounts.admission_fee)
            .bind(request.amounts.registration_fee)
            .bind(request.amounts.uniform_fee)
            .bind(request.amounts.transport_fee)
            .bind(request.amounts.books_fee)
            .bind(request.amounts.fine)
            .bind(request.amounts.other)
            .bind(previous_balance)
            .bind(total)
            .bind(request.deposit)
            .bind(due_balance)
            .bind(request.remark.as_ref())
            .bind(request.new_admission)
            .bind(request.collected_by)
            .execute(&mut tx)
            .await?;

        let sql = format!(r"{} WHERE f.uuid = $1", SELECT_FEE_PAYMENT);

        let payment: FeePayment = sqlx::query_as(&sql).bind(id).fetch_one(&mut tx).await?;

        tx.commit().await?;

        tracing::trace!(
            uuid = id.to_string(),
            student_uuid = request.student_uuid.to_string(),
            month_for = request.month_for.to_string(),
            total = total,
            due_balance = due_balance,
            "fee collected"
        );

        Ok(payment)
    }

    /// The full ledger of one student, oldest month first.
    pub async fn ledger(&self, student_uuid: &Uuid) -> Result<Vec<FeePayment>> {
        let mut conn = self.database.connection().await?;

        tracing::trace!(student_uuid = student_uuid.to_string(), "reading ledger");

        let sql = format!(
            r"{}
            WHERE
                st.uuid = $1
            ORDER BY
                f.month_for",
            SELECT_FEE_PAYMENT
        );

        Ok(sqlx::query_as(&sql)
            .bind(student_uuid)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// One-time-fee eligibility, the balance still owed, and which months
    /// of `year` have a collection recorded.
    pub async fn summary(&self, student_uuid: &Uuid, year: i32) -> Result<FeeSummary> {
        let mut conn = self.database.connection().await?;

        tracing::trace!(
            student_uuid = student_uuid.to_string(),
            year = year,
            "reading fee summary"
        );

        let student_id: i64 =
            sqlx::query_scalar(r"SELECT id FROM students WHERE uuid = $1 AND deleted = false")
                .bind(student_uuid)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity_type: ENTITY_STUDENT.to_string(),
                    id: ShortId::from_uuid(student_uuid).to_string(),
                })?;

        let (admission, registration, uniform, previous_balance): (i64, i64, i64, i64) =
            sqlx::query_as(LEDGER_STATE)
                .bind(student_id)
                .fetch_one(&mut *conn)
                .await?;

        let sql = r"
            SELECT
                EXTRACT(MONTH FROM month_for)::INT
            FROM
                fee_payments
            WHERE
                student_id = $1
                AND
                EXTRACT(YEAR FROM month_for)::INT = $2
        ";

        let paid_months: Vec<i32> = sqlx::query_scalar(sql)
            .bind(student_id)
            .bind(year)
            .fetch_all(&mut *conn)
            .await?;

        let months = (1..=12u32)
            .map(|month| MonthStatus {
                month,
                paid: paid_months.contains(&(month as i32)),
            })
            .collect();

        Ok(FeeSummary {
            one_time: OneTimeFees {
                admission: admission > 0,
                registration: registration > 0,
                uniform: uniform > 0,
            },
            previous_balance,
            months,
        })
    }
}
