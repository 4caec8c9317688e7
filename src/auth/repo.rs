use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::repo_types::{NewUser, ProfileChanges, User};
use crate::db::{self, RepoResult};

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Liveness of the backing store.
    async fn ping(&self) -> RepoResult<()>;
    async fn create(&self, new: &NewUser) -> RepoResult<User>;
    async fn find_by_id(&self, id: i64) -> RepoResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn update_profile(&self, id: i64, changes: &ProfileChanges) -> RepoResult<Option<User>>;
    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expires: OffsetDateTime,
    ) -> RepoResult<()>;
    /// Only returns a user whose token has not expired at `now`.
    async fn find_by_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> RepoResult<Option<User>>;
    /// Sets a new hash and clears the reset token in one statement.
    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<()>;
    /// Removes the account; its tasks go with it. Returns whether a row was deleted.
    async fn delete(&self, id: i64) -> RepoResult<bool>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn ping(&self) -> RepoResult<()> {
        db::ping(&self.db).await?;
        Ok(())
    }

    async fn create(&self, new: &NewUser) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_profile(&self, id: i64, changes: &ProfileChanges) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username            = COALESCE($1, username),
                   email               = COALESCE($2, email),
                   password_hash       = COALESCE($3, password_hash),
                   reset_token         = CASE WHEN $3 IS NULL THEN reset_token ELSE NULL END,
                   reset_token_expires = CASE WHEN $3 IS NULL THEN reset_token_expires ELSE NULL END
             WHERE id = $4
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(changes.username.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.password_hash.as_deref())
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expires: OffsetDateTime,
    ) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_token = $1, reset_token_expires = $2
             WHERE id = $3
            "#,
        )
        .bind(token)
        .bind(expires)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE reset_token = $1 AND reset_token_expires > $2
            "#
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $1, reset_token = NULL, reset_token_expires = NULL
             WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> RepoResult<bool> {
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
