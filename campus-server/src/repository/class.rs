use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    database::Database,
    repository::{RepositoryError, Result},
    shortid::ShortId,
};

const ENTITY_CLASS: &str = "class";
const ENTITY_TEACHER: &str = "teacher";

/// A class with its assigned class teacher joined in, when one is set.
#[derive(sqlx::FromRow)]
pub struct Class {
    pub uuid: Uuid,
    pub name: String,
    pub section: String,
    pub tuition_fee: i64,
    pub teacher_uuid: Option<Uuid>,
    pub teacher_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

pub struct CreateClass {
    pub name: String,
    pub section: String,
    pub tuition_fee: i64,
    pub teacher_uuid: Option<Uuid>,
}

pub struct UpdateClass {
    pub name: Option<String>,
    pub section: Option<String>,
    pub tuition_fee: Option<i64>,
    pub teacher_uuid: Option<Uuid>,
}

const SELECT_CLASS: &str = r"
    SELECT
        c.uuid,
        c.name,
        c.section,
        c.tuition_fee,
        t.uuid AS teacher_uuid,
        t.name AS teacher_name,
        c.created_at,
        c.updated_at
    FROM
        classes c
        LEFT JOIN teachers t ON t.id = c.teacher_id AND t.deleted = false
";

#[derive(Clone)]
pub struct ClassRepository {
    database: Database,
}

impl ClassRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn read_one(&self, uuid: &Uuid) -> Result<Class> {
        let mut conn = self.database.connection().await?;

        tracing::trace!(uuid = uuid.to_string(), "reading class");

        let sql = format!(
            r"{}
            WHERE
                c.uuid = $1
                AND
                c.deleted = false",
            SELECT_CLASS
        );

        sqlx::query_as(&sql)
            .bind(uuid)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: ENTITY_CLASS.to_string(),
                id: ShortId::from_uuid(uuid).to_string(),
            })
    }

    pub async fn read_all(&self) -> Result<Vec<Class>> {
        let mut conn = self.database.connection().await?;

        tracing::trace!("reading classes");

        let sql = format!(
            r"{}
            WHERE
                c.deleted = false
            ORDER BY
                LOWER(c.name), LOWER(c.section)",
            SELECT_CLASS
        );

        Ok(sqlx::query_as(&sql).fetch_all(&mut *conn).await?)
    }

    pub async fn create(&self, request: CreateClass) -> Result<Class> {
        if request.tuition_fee < 0 {
            return Err(RepositoryError::InvalidArgument(
                "tuition_fee".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let mut tx = self.database.transaction().await?;

        let teacher_id = match request.teacher_uuid.as_ref() {
            Some(teacher_uuid) => Some(resolve_teacher_id(&mut tx, teacher_uuid).await?),
            None => None,
        };

        let id = Uuid::new_v4();

        let sql = r"
            INSERT INTO classes (
                uuid,
                name,
                section,
                tuition_fee,
                teacher_id
            ) VALUES (
                $1,
                $2,
                $3,
                $4,
                $5
            )
        ";

        sqlx::query(sql)
            .bind(id)
            .bind(&request.name)
            .bind(&request.section)
            .bind(request.tuition_fee)
            .bind(teacher_id)
            .execute(&mut tx)
            .await?;

        let sql = format!(r"{} WHERE c.uuid = $1", SELECT_CLASS);

        let class: Class = sqlx::query_as(&sql).bind(id).fetch_one(&mut tx).await?;

        tx.commit().await?;

        tracing::trace!(
            uuid = id.to_string(),
            name = request.name,
            section = request.section,
            "class created"
        );

        Ok(class)
    }

    pub async fn update(&self, uuid: &Uuid, request: UpdateClass) -> Result<Class> {
        if let Some(tuition_fee) = request.tuition_fee {
            if tuition_fee < 0 {
                return Err(RepositoryError::InvalidArgument(
                    "tuition_fee".to_string(),
                    "must not be negative".to_string(),
                ));
            }
        }

        let mut tx = self.database.transaction().await?;

        let teacher_id = match request.teacher_uuid.as_ref() {
            Some(teacher_uuid) => Some(resolve_teacher_id(&mut tx, teacher_uuid).await?),
            None => None,
        };

        let sql = r"
            UPDATE
                classes
            SET
                name = COALESCE($2,name),
                section = COALESCE($3,section),
                tuition_fee = COALESCE($4,tuition_fee),
                teacher_id = COALESCE($5,teacher_id),
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
            .bind(request.section.as_ref())
            .bind(request.tuition_fee)
            .bind(teacher_id)
            .fetch_optional(&mut tx)
            .await?;

        if updated.is_none() {
            return Err(RepositoryError::NotFound {
                entity_type: ENTITY_CLASS.to_string(),
                id: ShortId::from_uuid(uuid).to_string(),
            });
        }

        let sql = format!(r"{} WHERE c.uuid = $1", SELECT_CLASS);

        let class: Class = sqlx::query_as(&sql).bind(uuid).fetch_one(&mut tx).await?;

        tx.commit().await?;

        tracing::trace!(uuid = uuid.to_string(), "class updated");

        Ok(class)
    }

    pub async fn delete(&self, uuid: &Uuid) -> Result<()> {
        let mut tx = self.database.transaction().await?;

        let sql = r"
            UPDATE classes
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
            tracing::trace!(uuid = uuid.to_string(), "no such class, nothing deleted");
            return Err(RepositoryError::NotFound {
                entity_type: ENTITY_CLASS.to_string(),
                id: ShortId::from_uuid(uuid).to_string(),
            });
        }

        tracing::trace!(uuid = uuid.to_string(), "class deleted");

        Ok(())
    }
}

async fn resolve_teacher_id(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    teacher_uuid: &Uuid,
) -> Result<i64> {
    sqlx::query_scalar(r"SELECT id FROM teachers WHERE uuid = $1 AND deleted = false")
        .bind(teacher_uuid)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound {
            entity_type: ENTITY_TEACHER.to_string(),
            id: ShortId::from_uuid(teacher_uuid).to_string(),
        })
}
