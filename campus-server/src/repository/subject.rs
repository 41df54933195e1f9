use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    database::Database,
    repository::{RepositoryError, Result},
    shortid::ShortId,
};

const ENTITY_SUBJECT: &str = "subject";

#[derive(sqlx::FromRow)]
pub struct Subject {
    pub uuid: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

pub struct CreateSubject {
    pub name: String,
}

pub struct UpdateSubject {
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct SubjectRepository {
    database: Database,
}

impl SubjectRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn read_one(&self, uuid: &Uuid) -> Result<Subject> {
        let mut conn = self.database.connection().await?;

        tracing::trace!(uuid = uuid.to_string(), "reading subject");

        let sql = r"
            SELECT
                *
            FROM
                subjects
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
                entity_type: ENTITY_SUBJECT.to_string(),
                id: ShortId::from_uuid(uuid).to_string(),
            })
    }

    pub async fn read_all(&self) -> Result<Vec<Subject>> {
        let mut conn = self.database.connection().await?;

        tracing::trace!("reading subjects");

        let sql = r"
            SELECT
                *
            FROM
                subjects
            WHERE
                deleted = false
            ORDER BY
                LOWER(name)
        ";

        Ok(sqlx::query_as(sql).fetch_all(&mut *conn).await?)
    }

    pub async fn create(&self, request: CreateSubject) -> Result<Subject> {
        let mut tx = self.database.transaction().await?;

        let id = Uuid::new_v4();

        let sql = r"
            INSERT INTO subjects (
                uuid,
                name
            ) VALUES (
                $1,
                $2
            ) RETURNING *
        ";

        let subject: Subject = sqlx::query_as(sql)
            .bind(id)
            .bind(&request.name)
            .fetch_one(&mut tx)
            .await?;

        tx.commit().await?;

        tracing::trace!(
            uuid = id.to_string(),
            name = request.name,
            "subject created"
        );

        Ok(subject)
    }

    pub async fn update(&self, uuid: &Uuid, request: UpdateSubject) -> Result<Subject> {
        let mut tx = self.database.transaction().await?;

        let sql = r"
            UPDATE
                subjects
            SET
                name = COALESCE($2,name),
                updated_at = NOW() AT TIME ZONE 'UTC'
            WHERE
                uuid = $1
                AND
                deleted = false
            RETURNING *
        ";

        let subject: Option<Subject> = sqlx::query_as(sql)
            .bind(uuid)
            .bind(request.name.as_ref())
            .fetch_optional(&mut tx)
            .await?;

        let subject = subject.ok_or_else(|| RepositoryError::NotFound {
            entity_type: ENTITY_SUBJECT.to_string(),
            id: ShortId::from_uuid(uuid).to_string(),
        })?;

        tx.commit().await?;

        tracing::trace!(uuid = uuid.to_string(), "subject updated");

        Ok(subject)
    }

    pub async fn delete(&self, uuid: &Uuid) -> Result<()> {
        let mut tx = self.database.transaction().await?;

        let sql = r"
            UPDATE subjects
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
            tracing::trace!(uuid = uuid.to_string(), "no such subject, nothing deleted");
            return Err(RepositoryError::NotFound {
                entity_type: ENTITY_SUBJECT.to_string(),
                id: ShortId::from_uuid(uuid).to_string(),
            });
        }

        tracing::trace!(uuid = uuid.to_string(), "subject deleted");

        Ok(())
    }
}
