use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::{
    database::Database,
    mask,
    repository::{RepositoryError, Result},
    shortid::ShortId,
};

const ENTITY_STUDENT: &str = "student";

/// A student row joined with its class. `id` and `parent_user_id` are the
/// internal keys; the API layer never serializes them.
#[derive(sqlx::FromRow)]
pub struct Student {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub registration_number: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub country: String,
    pub address: String,
    pub class_uuid: Uuid,
    pub class_name: String,
    pub class_section: String,
    pub father_name: String,
    pub mother_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_path: String,
    pub birth_certificate_path: String,
    pub parent_user_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

pub struct CreateStudent {
    pub name: String,
    pub registration_number: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub country: String,
    pub address: String,
    pub class_name: String,
    pub class_section: String,
    pub father_name: String,
    pub mother_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo_path: String,
    pub birth_certificate_path: String,
    pub parent_username: String,
    pub parent_password: String,
    pub created_by: i64,
}

pub struct UpdateStudent {
    pub name: Option<String>,
    pub registration_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub class_name: Option<String>,
    pub class_section: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// What a deletion touched; the caller still owns removing the two files.
pub struct DeletedStudent {
    pub photo_path: String,
    pub birth_certificate_path: String,
    pub attendance_rows: u64,
}

const SELECT_STUDENT: &str = r"
    SELECT
        s.id,
        s.uuid,
        s.name,
        s.registration_number,
        s.date_of_birth,
        s.gender,
        s.country,
        s.address,
        c.uuid AS class_uuid,
        c.name AS class_name,
        c.section AS class_section,
        s.father_name,
        s.mother_name,
        s.email,
        s.phone,
        s.photo_path,
        s.birth_certificate_path,
        s.parent_user_id,
        s.created_at,
        s.updated_at
    FROM
        students s
        INNER JOIN classes c ON c.id = s.class_id
";

#[derive(Clone)]
pub struct StudentRepository {
    database: Database,
}

impl StudentRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn read_one(&self, uuid: &Uuid) -> Result<Student> {
        let mut conn = self.database.connection().await?;

        tracing::trace!(uuid = uuid.to_string(), "reading student");

        let sql = format!(
            r"{}
            WHERE
                s.uuid = $1
                AND
                s.deleted = false",
            SELECT_STUDENT
        );

        sqlx::query_as(&sql)
            .bind(uuid)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: ENTITY_STUDENT.to_string(),
                id: ShortId::from_uuid(uuid).to_string(),
            })
    }

    /// Lists live students, optionally narrowed to one class/section, and
    /// optionally scoped to the students of one parent user.
    pub async fn read_all(
        &self,
        class_name: Option<&str>,
        class_section: Option<&str>,
        parent_user_id: Option<i64>,
    ) -> Result<Vec<Student>> {
        let mut conn = self.database.connection().await?;

        tracing::trace!("reading students");

        let sql = format!(
            r"{}
            WHERE
                s.deleted = false
                AND ($1::TEXT IS NULL OR LOWER(c.name) = LOWER($1))
                AND ($2::TEXT IS NULL OR LOWER(c.section) = LOWER($2))
                AND ($3::BIGINT IS NULL OR s.parent_user_id = $3)
            ORDER BY
                s.name",
            SELECT_STUDENT
        );

        Ok(sqlx::query_as(&sql)
            .bind(class_name)
            .bind(class_section)
            .bind(parent_user_id)
            .fetch_all(&mut *conn)
            .await?)
    }

    /// Registers a student. The student row and the PARENT login for its
    /// guardian are created in one transaction, so a failure (for example a
    /// duplicate registration number) leaves neither behind.
    pub async fn create(&self, request: CreateStudent) -> Result<Student> {
        let password_hash = bcrypt::hash(&request.parent_password, bcrypt::DEFAULT_COST)?;

        let mut tx = self.database.transaction().await?;

        let class_id =
            resolve_class_id(&mut tx, &request.class_name, &request.class_section).await?;

        let parent_uuid = Uuid::new_v4();

        let sql = r"
            INSERT INTO users (
                uuid,
                email,
                password_hash,
                role
            ) VALUES (
                $1,
                $2,
                $3,
                'PARENT'
            ) RETURNING id
        ";

        let parent_user_id: i64 = sqlx::query_scalar(sql)
            .bind(parent_uuid)
            .bind(&request.parent_username)
            .bind(&password_hash)
            .fetch_one(&mut tx)
            .await?;

        let id = Uuid::new_v4();

        let sql = r"
            INSERT INTO students (
                uuid,
                name,
                registration_number,
                date_of_birth,
                gender,
                country,
                address,
                class_id,
                father_name,
                mother_name,
                email,
                phone,
                photo_path,
                birth_certificate_path,
                parent_user_id,
                created_by
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16
            )
        ";

        sqlx::query(sql)
            .bind(id)
            .bind(&request.name)
            .bind(&request.registration_number)
            .bind(request.date_of_birth)
            .bind(&request.gender)
            .bind(&request.country)
            .bind(&request.address)
            .bind(class_id)
            .bind(&request.father_name)
            .bind(&request.mother_name)
            .bind(request.email.as_ref())
            .bind(request.phone.as_ref())
            .bind(&request.photo_path)
            .bind(&request.birth_certificate_path)
            .bind(parent_user_id)
            .bind(request.created_by)
            .execute(&mut tx)
            .await?;

        let sql = format!(r"{} WHERE s.uuid = $1", SELECT_STUDENT);

        let student: Student = sqlx::query_as(&sql).bind(id).fetch_one(&mut tx).await?;

        tx.commit().await?;

        tracing::trace!(
            uuid = id.to_string(),
            registration_number = request.registration_number,
            parent = mask::email(&request.parent_username),
            "student registered"
        );

        Ok(student)
    }

    pub async fn update(&self, uuid: &Uuid, request: UpdateStudent) -> Result<Student> {
        let mut tx = self.database.transaction().await?;

        let class_id = match (request.class_name.as_ref(), request.class_section.as_ref()) {
            (Some(name), Some(section)) => Some(resolve_class_id(&mut tx, name, section).await?),
            (None, None) => None,
            _ => {
                return Err(RepositoryError::InvalidArgument(
                    "assigned_class".to_string(),
                    "class and section must be provided together".to_string(),
                ))
            }
        };

        let sql = r"
            UPDATE
                students
            SET
                name = COALESCE($2,name),
                registration_number = COALESCE($3,registration_number),
                date_of_birth = COALESCE($4,date_of_birth),
                gender = COALESCE($5,gender),
                country = COALESCE($6,country),
                address = COALESCE($7,address),
                class_id = COALESCE($8,class_id),
                father_name = COALESCE($9,father_name),
                mother_name = COALESCE($10,mother_name),
                email = COALESCE($11,email),
                phone = COALESCE($12,phone),
                updated_at = NOW() AT TIME ZONE 'UTC'
            WHERE
                uuid = $1
                AND
                deleted = false
            RETURNING uuid
        ";

        let updated: Option<Uuid> = sqlx::query_scalar(sql)
            .bind(uuid)
            .bind(request.name.as_ref())
            .bind(request.registration_number.as_ref())
            .bind(request.date_of_birth)
            .bind(request.gender.as_ref())
            .bind(request.country.as_ref())
            .bind(request.address.as_ref())
            .bind(class_id)
            .bind(request.father_name.as_ref())
            .bind(request.mother_name.as_ref())
            .bind(request.email.as_ref())
            .bind(request.phone.as_ref())
            .fetch_optional(&mut tx)
            .await?;

        if updated.is_none() {
            return Err(RepositoryError::NotFound {
                entity_type: ENTITY_STUDENT.to_string(),
                id: ShortId::from_uuid(uuid).to_string(),
            });
        }

        let sql = format!(r"{} WHERE s.uuid = $1", SELECT_STUDENT);

        let student: Student = sqlx::query_as(&sql).bind(uuid).fetch_one(&mut tx).await?;

        tx.commit().await?;

        tracing::trace!(uuid = uuid.to_string(), "student updated");

        Ok(student)
    }

    /// Soft-deletes the student and hard-deletes its attendance rows in one
    /// transaction. Fee rows are a ledger and stay. Returns the stored file
    /// paths so the caller can attempt their removal.
    pub async fn delete(&self, uuid: &Uuid) -> Result<DeletedStudent> {
        let mut tx = self.database.transaction().await?;

        let sql = r"
            SELECT
                id,
                photo_path,
                birth_certificate_path
            FROM
                students
            WHERE
                uuid = $1
                AND
                deleted = false
        ";

        let row: Option<(i64, String, String)> = sqlx::query_as(sql)
            .bind(uuid)
            .fetch_optional(&mut tx)
            .await?;

        let (id, photo_path, birth_certificate_path) =
            row.ok_or_else(|| RepositoryError::NotFound {
                entity_type: ENTITY_STUDENT.to_string(),
                id: ShortId::from_uuid(uuid).to_string(),
            })?;

        let attendance_rows = sqlx::query(r"DELETE FROM attendance WHERE student_id = $1")
            .bind(id)
            .execute(&mut tx)
            .await?
            .rows_affected();

        let sql = r"
            UPDATE students
            SET
                deleted = true,
                deleted_at = NOW() AT TIME ZONE 'UTC'
            WHERE
                id = $1
        ";

        sqlx::query(sql).bind(id).execute(&mut tx).await?;

        tx.commit().await?;

        tracing::trace!(
            uuid = uuid.to_string(),
            attendance_rows = attendance_rows,
            "student deleted"
        );

        Ok(DeletedStudent {
            photo_path,
            birth_certificate_path,
            attendance_rows,
        })
    }

    /// Every file name still referenced by a live student row. The uploads
    /// sweeper treats anything outside this set as removable.
    pub async fn referenced_files(&self) -> Result<Vec<String>> {
        let mut conn = self.database.connection().await?;

        let sql = r"
            SELECT photo_path FROM students WHERE deleted = false
            UNION
            SELECT birth_certificate_path FROM students WHERE deleted = false
        ";

        Ok(sqlx::query_scalar(sql).fetch_all(&mut *conn).await?)
    }
}

async fn resolve_class_id(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    class_name: &str,
    class_section: &str,
) -> Result<i64> {
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

    sqlx::query_scalar(sql)
        .bind(class_name)
        .bind(class_section)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| {
            RepositoryError::InvalidArgument(
                "assigned_class".to_string(),
                format!("no class {} with section {}", class_name, class_section),
            )
        })
}
