use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    database::Database,
    repository::{RepositoryError, Result},
    shortid::ShortId,
};

const ENTITY_TEACHER: &str = "teacher";
const ENTITY_CLASS: &str = "class";
const ENTITY_SUBJECT: &str = "subject";
const ENTITY_ASSIGNMENT: &str = "assignment";

#[derive(sqlx::FromRow)]
pub struct Teacher {
    pub uuid: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

/// A teacher/class/subject triple, joined with the names of all three.
#[derive(sqlx::FromRow)]
pub struct Assignment {
    pub uuid: Uuid,
    pub teacher_uuid: Uuid,
    pub class_uuid: Uuid,
    pub class_name: String,
    pub class_section: String,
    pub subject_uuid: Uuid,
    pub subject_name: String,
    pub created_at: NaiveDateTime,
}

pub struct CreateTeacher {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

pub struct UpdateTeacher {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone)]
pub struct TeacherRepository {
    database: Database,
}

impl TeacherRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn read_one(&self, uuid: &Uuid) -> Result<Teacher> {
        let mut conn = self.database.connection().await?;

        tracing::trace!(uuid = uuid.to_string(), "reading teacher");

        let sql = r"
            SELECT
                *
            FROM
                teachers
            WHERE
                uuid = $1
                AND
                deleted = false
        ";

        sqlx::query_as(sql)
            .bind(uuid)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: ENTITY_TEACHER.to_string(),
                id: ShortId::from_uuid(uuid).to_string(),
            })
    }

    pub async fn read_all(&self) -> Result<Vec<Teacher>> {
        let mut conn = self.database.connection().await?;

        tracing::trace!("reading teachers");

        let sql = r"
            SELECT
                *
            FROM
                teachers
            WHERE
                deleted = false
            ORDER BY
                LOWER(name)
        ";

        Ok(sqlx::query_as(sql).fetch_all(&mut *conn).await?)
    }

    pub async fn create(&self, request: CreateTeacher) -> Result<Teacher> {
        let mut tx = self.database.transaction().await?;

        let id = Uuid::new_v4();

        let sql = r"
            INSERT INTO teachers (
                uuid,
                name,
                email,
                phone
            ) VALUES (
                $1,
                $2,
                $3,
                $4
            ) RETURNING *
        ";

        let teacher: Teacher = sqlx::query_as(sql)
            .bind(id)
            .bind(&request.name)
            .bind(&request.email)
            .bind(request.phone.as_ref())
            .fetch_one(&mut tx)
            .await?;

        tx.commit().await?;

        tracing::trace!(
            uuid = id.to_string(),
            name = request.name,
            "teacher created"
        );

        Ok(teacher)
    }

    pub async fn update(&self, uuid: &Uuid, request: UpdateTeacher) -> Result<Teacher> {
        let mut tx = self.database.transaction().await?;

        let sql = r"
            UPDATE
                teachers
            SET
                name = COALESCE($2,name),
                email = COALESCE($3,email),
                phone = COALESCE($4,phone),
                updated_at = NOW() AT TIME ZONE 'UTC'
            WHERE
                uuid = $1
                AND
                deleted = false
            RETURNING *
        ";

        let teacher: Option<Teacher> = sqlx::query_as(sql)
            .bind(uuid)
            .bind(request.name.as_ref())
            .bind(request.email.as_ref())
            .bind(request.phone.as_ref())
            .fetch_optional(&mut tx)
            .await?;

        let teacher = teacher.ok_or_else(|| RepositoryError::NotFound {
            entity_type: ENTITY_TEACHER.to_string(),
            id: ShortId::from_uuid(uuid).to_string(),
        })?;

        tx.commit().await?;

        tracing::trace!(uuid = uuid.to_string(), "teacher updated");

        Ok(teacher)
    }

    pub async fn delete(&self, uuid: &Uuid) -> Result<()> {
        let mut tx = self.database.transaction().await?;

        let sql = r"
            UPDATE teachers
            SET
                deleted = true,
                deleted_at = NOW() AT TIME ZONE 'UTC'
            WHERE
                uuid = $1
                AND
                deleted = false
        ";

        let deleted = sqlx::query(sql)
            .bind(uuid)
            .execute(&mut tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;

        if !deleted {
            tracing::trace!(uuid = uuid.to_string(), "no such teacher, nothing deleted");
            return Err(RepositoryError::NotFound {
                entity_type: ENTITY_TEACHER.to_string(),
                id: ShortId::from_uuid(uuid).to_string(),
            });
        }

        tracing::trace!(uuid = uuid.to_string(), "teacher deleted");

        Ok(())
    }

    pub async fn read_assignments(&self, teacher_uuid: &Uuid) -> Result<Vec<Assignment>> {
        let mut conn = self.database.connection().await?;

        tracing::trace!(
            teacher_uuid = teacher_uuid.to_string(),
            "reading assignments"
        );

        let exists: bool = sqlx::query_scalar(
            r"SELECT EXISTS(SELECT 1 FROM teachers WHERE uuid = $1 AND deleted = false)",
        )
        .bind(teacher_uuid)
        .fetch_one(&mut *conn)
        .await?;

        if !exists {
            return Err(RepositoryError::NotFound {
                entity_type: ENTITY_TEACHER.to_string(),
                id: ShortId::from_uuid(teacher_uuid).to_string(),
            });
        }

        let sql = r"
            SELECT
                ta.uuid,
                t.uuid AS teacher_uuid,
                c.uuid AS class_uuid,
                c.name AS class_name,
                c.section AS class_section,
                s.uuid AS subject_uuid,
                s.name AS subject_name,
                ta.created_at
            FROM
                teacher_assignments ta
                INNER JOIN teachers t ON t.id = ta.teacher_id
                INNER JOIN classes c ON c.id = ta.class_id
                INNER JOIN subjects s ON s.id = ta.subject_id
            WHERE
                t.uuid = $1
            ORDER BY
                ta.created_at
        ";

        Ok(sqlx::query_as(sql)
            .bind(teacher_uuid)
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn create_assignment(
        &self,
        teacher_uuid: &Uuid,
        class_uuid: &Uuid,
        subject_uuid: &Uuid,
    ) -> Result<Assignment> {
        let mut tx = self.database.transaction().await?;

        let teacher_id: i64 =
            sqlx::query_scalar(r"SELECT id FROM teachers WHERE uuid = $1 AND deleted = false")
                .bind(teacher_uuid)
                .fetch_optional(&mut tx)
                .await?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity_type: ENTITY_TEACHER.to_string(),
                    id: ShortId::from_uuid(teacher_uuid).to_string(),
                })?;

        let class_id: i64 =
            sqlx::query_scalar(r"SELECT id FROM classes WHERE uuid = $1 AND deleted = false")
                .bind(class_uuid)
                .fetch_optional(&mut tx)
                .await?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity_type: ENTITY_CLASS.to_string(),
                    id: ShortId::from_uuid(class_uuid).to_string(),
                })?;

        let subject_id: i64 =
            sqlx::query_scalar(r"SELECT id FROM subjects WHERE uuid = $1 AND deleted = false")
                .bind(subject_uuid)
                .fetch_optional(&mut tx)
                .await?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity_type: ENTITY_SUBJECT.to_string(),
                    id: ShortId::from_uuid(subject_uuid).to_string(),
                })?;

        let id = Uuid::new_v4();

        let sql = r"
            INSERT INTO teacher_assignments (
                uuid,
                teacher_id,
                class_id,
                subject_id
            ) VALUES (
                $1,
                $2,
                $3,
                $4
            )
        ";

        sqlx::query(sql)
            .bind(id)
            .bind(teacher_id)
            .bind(class_id)
            .bind(subject_id)
            .execute(&mut tx)
            .await?;

        let sql = r"
            SELECT
                ta.uuid,
                t.uuid AS teacher_uuid,
                c.uuid AS class_uuid,
                c.name AS class_name,
                c.section AS class_section,
                s.uuid AS subject_uuid,
                s.name AS subject_name,
                ta.created_at
            FROM
                teacher_assignments ta
                INNER JOIN teachers t ON t.id = ta.teacher_id
                INNER JOIN classes c ON c.id = ta.class_id
                INNER JOIN subjects s ON s.id = ta.subject_id
            WHERE
                ta.uuid = $1
        ";

        let assignment: Assignment = sqlx::query_as(sql).bind(id).fetch_one(&mut tx).await?;

        tx.commit().await?;

        tracing::trace!(
            teacher_uuid = teacher_uuid.to_string(),
            class_uuid = class_uuid.to_string(),
            subject_uuid = subject_uuid.to_string(),
            "assignment created"
        );

        Ok(assignment)
    }

    pub async fn delete_assignment(
        &self,
        teacher_uuid: &Uuid,
        assignment_uuid: &Uuid,
    ) -> Result<()> {
        let mut tx = self.database.transaction().await?;

        let sql = r"
            DELETE FROM teacher_assignments ta
            USING teachers t
            WHERE
                ta.uuid = $2
                AND
                ta.teacher_id = t.id
                AND
                t.uuid = $1
        ";

        let deleted = sqlx::query(sql)
            .bind(teacher_uuid)
            .bind(assignment_uuid)
            .execute(&mut tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;

        if !deleted {
            tracing::trace!(
                uuid = assignment_uuid.to_string(),
                "no such assignment, nothing deleted"
            );
            return Err(RepositoryError::NotFound {
                entity_type: ENTITY_ASSIGNMENT.to_string(),
                id: ShortId::from_uuid(assignment_uuid).to_string(),
            });
        }

        tracing::trace!(uuid = assignment_uuid.to_string(), "assignment deleted");

        Ok(())
    }
}
