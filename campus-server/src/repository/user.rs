use chrono::NaiveDateTime;
use uuid::Uuid;

use campus_core::auth::Role;

use crate::{database::Database, mask, repository::Result};

#[derive(sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub email: String,
    pub role: UserRole,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Administrator,
    Teacher,
    Parent,
}

impl From<UserRole> for Role {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Administrator => Role::Administrator,
            UserRole::Teacher => Role::Teacher,
            UserRole::Parent => Role::Parent,
        }
    }
}

impl From<Role> for UserRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Administrator => UserRole::Administrator,
            Role::Teacher => UserRole::Teacher,
            Role::Parent => UserRole::Parent,
        }
    }
}

pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub role: Role,
}

// users.* minus nothing: carries the hash, never leaves this module.
#[derive(sqlx::FromRow)]
struct CredentialsRow {
    id: i64,
    uuid: Uuid,
    email: String,
    password_hash: String,
    role: UserRole,
    created_at: NaiveDateTime,
    updated_at: Option<NaiveDateTime>,
}

#[derive(Clone)]
pub struct UserRepository {
    database: Database,
}

impl UserRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn create(&self, request: CreateUser) -> Result<User> {
        let mut tx = self.database.transaction().await?;

        let id = Uuid::new_v4();
        let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)?;

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
                $4
            ) RETURNING *
        ";

        let user: User = sqlx::query_as(sql)
            .bind(id)
            .bind(&request.email)
            .bind(&password_hash)
            .bind(UserRole::from(request.role))
            .fetch_one(&mut tx)
            .await?;

        tx.commit().await?;

        tracing::trace!(
            uuid = id.to_string(),
            email = mask::email(&request.email),
            "user created"
        );

        Ok(user)
    }

    pub async fn find_by_uuid(&self, uuid: &Uuid) -> Result<Option<User>> {
        let mut conn = self.database.connection().await?;

        let sql = r"
            SELECT
                *
            FROM
                users
            WHERE
                uuid = $1
                AND
                deleted = false
        ";

        Ok(sqlx::query_as(sql)
            .bind(uuid)
            .fetch_optional(&mut *conn)
            .await?)
    }

    /// Exact-match login check against the signup table. Returns `None` on
    /// unknown address and on password mismatch alike, so callers cannot
    /// distinguish the two.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let mut conn = self.database.connection().await?;

        tracing::trace!(email = mask::email(email), "verifying credentials");

        let sql = r"
            SELECT
                *
            FROM
                users
            WHERE
                LOWER(email) = LOWER($1)
                AND
                deleted = false
        ";

        let row: Option<CredentialsRow> = sqlx::query_as(sql)
            .bind(email)
            .fetch_optional(&mut *conn)
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        if !bcrypt::verify(password, &row.password_hash)? {
            return Ok(None);
        }

        Ok(Some(User {
            id: row.id,
            uuid: row.uuid,
            email: row.email,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    pub async fn start_session(
        &self,
        user_id: i64,
        token_digest: &str,
        expires_at: NaiveDateTime,
    ) -> Result<()> {
        let mut tx = self.database.transaction().await?;

        let sql = r"
            INSERT INTO sessions (
                user_id,
                token_digest,
                expires_at
            ) VALUES (
                $1,
                $2,
                $3
            )
        ";

        sqlx::query(sql)
            .bind(user_id)
            .bind(token_digest)
            .bind(expires_at)
            .execute(&mut tx)
            .await?;

        tx.commit().await?;

        tracing::trace!(
            user_id = user_id,
            token = mask::token(token_digest),
            "session started"
        );

        Ok(())
    }

    /// Revokes the session identified by `token_digest` and opens a new one
    /// for the same user in a single transaction. Returns `None` when the
    /// digest does not match a live, unexpired session.
    pub async fn rotate_session(
        &self,
        token_digest: &str,
        new_token_digest: &str,
        expires_at: NaiveDateTime,
    ) -> Result<Option<User>> {
        let mut tx = self.database.transaction().await?;

        let sql = r"
            UPDATE sessions
            SET
                revoked = true,
                revoked_at = NOW() AT TIME ZONE 'UTC'
            WHERE
                token_digest = $1
                AND
                revoked = false
                AND
                expires_at > NOW() AT TIME ZONE 'UTC'
            RETURNING user_id
        ";

        let user_id: Option<i64> = sqlx::query_scalar(sql)
            .bind(token_digest)
            .fetch_optional(&mut tx)
            .await?;

        let user_id = match user_id {
            Some(user_id) => user_id,
            None => return Ok(None),
        };

        let sql = r"
            INSERT INTO sessions (
                user_id,
                token_digest,
                expires_at
            ) VALUES (
                $1,
                $2,
                $3
            )
        ";

        sqlx::query(sql)
            .bind(user_id)
            .bind(new_token_digest)
            .bind(expires_at)
            .execute(&mut tx)
            .await?;

        let sql = r"
            SELECT
                *
            FROM
                users
            WHERE
                id = $1
                AND
                deleted = false
        ";

        let user: Option<User> = sqlx::query_as(sql)
            .bind(user_id)
            .fetch_optional(&mut tx)
            .await?;

        tx.commit().await?;

        if user.is_some() {
            tracing::trace!(user_id = user_id, "session rotated");
        }

        Ok(user)
    }

    pub async fn revoke_session(&self, token_digest: &str) -> Result<bool> {
        let mut tx = self.database.transaction().await?;

        let sql = r"
            UPDATE sessions
            SET
                revoked = true,
                revoked_at = NOW() AT TIME ZONE 'UTC'
            WHERE
                token_digest = $1
                AND
                revoked = false
        ";

        let revoked = sqlx::query(sql)
            .bind(token_digest)
            .execute(&mut tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;

        if revoked {
            tracing::trace!(token = mask::token(token_digest), "session revoked");
        }

        Ok(revoked)
    }
}
