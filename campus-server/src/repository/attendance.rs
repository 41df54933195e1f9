use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::{
    database::Database,
    repository::{RepositoryError, Result},
    shortid::ShortId,
};

/// One record of a submitted batch, already parsed at the API boundary.
pub struct RecordAttendance {
    pub student_uuid: Uuid,
    pub class_name: String,
    pub class_section: String,
    pub occurred_on: NaiveDate,
    pub present: bool,
}

/// How a batch landed: rows written vs. rows skipped because the same
/// (student, day) was already marked.
pub struct AttendanceOutcome {
    pub recorded: u64,
    pub duplicates: u64,
}

#[derive(sqlx::FromRow)]
pub struct AttendanceEntry {
    pub uuid: Uuid,
    pub student_uuid: Uuid,
    pub student_name: String,
    pub registration_number: String,
    pub occurred_on: NaiveDate,
    pub present: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Clone)]
pub struct AttendanceRepository {
    database: Database,
}

impl AttendanceRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Writes a batch in one transaction. The whole batch is resolved
    /// against live students and classes first; any unknown reference fails
    /// everything with no rows written. Inserts use
    /// `ON CONFLICT (student_id, occurred_on) DO NOTHING`, so a record for
    /// an already-marked day counts as a duplicate instead of an error, and
    /// two identical batches racing each other cannot double-mark a student.
    pub async fn record(
        &self,
        records: &[RecordAttendance],
        marked_by: i64,
    ) -> Result<AttendanceOutcome> {
        let mut tx = self.database.transaction().await?;

        let mut class_ids: HashMap<(String, String), i64> = HashMap::new();
        let mut resolved: Vec<(i64, i64, NaiveDate, bool)> = Vec::with_capacity(records.len());

        for record in records {
            let class_key = (
                record.class_name.to_lowercase(),
                record.class_section.to_lowercase(),
            );

            let class_id = match class_ids.get(&class_key) {
                Some(class_id) => *class_id,
                None => {
                    let sql = r"
                        SELECT
                            id
                        FROM
                            classes
                        WHERE
                            LOWER(name) = LOWER($1)
                            AND
                            LOWER(section) = LOWER($2)
                            AND
                            deleted = false
                    ";

                    let class_id: i64 = sqlx::query_scalar(sql)
                        .bind(&record.class_name)
                        .bind(&record.class_section)
                        .fetch_optional(&mut tx)
                        .await?
                        .ok_or_else(|| {
                            RepositoryError::InvalidArgument(
                                "class".to_string(),
                                format!(
                                    "no class {} with section {}",
                                    record.class_name, record.class_section
                                ),
                            )
                        })?;

                    class_ids.insert(class_key, class_id);
                    class_id
                }
            };

            let student_id: i64 =
                sqlx::query_scalar(r"SELECT id FROM students WHERE uuid = $1 AND deleted = false")
                    .bind(record.student_uuid)
                    .fetch_optional(&mut tx)
                    .await?
                    .ok_or_else(|| {
                        RepositoryError::InvalidArgument(
                            "student_id".to_string(),
                            format!(
                                "no student with ID {}",
                                ShortId::from_uuid(&record.student_uuid).to_string()
                            ),
                        )
                    })?;

            resolved.push((student_id, class_id, record.occurred_on, record.present));
        }

        let mut recorded = 0u64;

        for (student_id, class_id, occurred_on, present) in resolved {
            let sql = r"
                INSERT INTO attendance (
                    uuid,
                    student_id,
                    class_id,
                    occurred_on,
                    present,
                    marked_by
                ) VALUES (
                    $1,
                    $2,
                    $3,
                    $4,
                    $5,
                    $6
                ) ON CONFLICT (student_id, occurred_on) DO NOTHING
            ";

            recorded += sqlx::query(sql)
                .bind(Uuid::new_v4())
                .bind(student_id)
                .bind(class_id)
                .bind(occurred_on)
                .bind(present)
                .bind(marked_by)
                .execute(&mut tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;

        let duplicates = records.len() as u64 - recorded;

        tracing::trace!(
            recorded = recorded,
            duplicates = duplicates,
            "attendance recorded"
        );

        Ok(AttendanceOutcome {
            recorded,
            duplicates,
        })
    }

    /// The marked attendance of one class/section on one day.
    pub async fn read_day(
        &self,
        occurred_on: NaiveDate,
        class_name: &str,
        class_section: &str,
    ) -> Result<Vec<AttendanceEntry>> {
        let mut conn = self.database.connection().await?;

        tracing::trace!(
            occurred_on = occurred_on.to_string(),
            class = class_name,
            section = class_section,
            "reading attendance"
        );

        let sql = r"
            SELECT
                a.uuid,
                st.uuid AS student_uuid,
                st.name AS student_name,
                st.registration_number,
                a.occurred_on,
                a.present,
                a.created_at
            FROM
                attendance a
                INNER JOIN students st ON st.id = a.student_id
                INNER JOIN classes c ON c.id = a.class_id
            WHERE
                a.occurred_on = $1
                AND
                LOWER(c.name) = LOWER($2)
                AND
                LOWER(c.section) = LOWER($3)
            ORDER BY
                st.name
        ";

        Ok(sqlx::query_as(sql)
            .bind(occurred_on)
            .bind(class_name)
            .bind(class_section)
            .fetch_all(&mut *conn)
            .await?)
    }
}
