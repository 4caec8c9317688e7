use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::{Date, Time};

use crate::db::RepoResult;
use crate::tasks::repo_types::{NewTask, Task, TaskChanges};

/// Name of the partial unique index guarding one open task per user and slot.
pub const OPEN_SLOT_CONSTRAINT: &str = "tasks_open_slot_key";

const TASK_COLUMNS: &str = "id, user_id, title, description, completed, category, priority, \
                            due_date, start_time, created_at, updated_at";

/// Owner-scoped task storage. Every method takes the owner's id and never touches
/// another user's rows.
#[async_trait]
pub trait TaskRepo: Send + Sync {
    /// All of the user's tasks, newest first.
    async fn list_for_user(&self, user_id: i64) -> RepoResult<Vec<Task>>;
    async fn count_for_user(&self, user_id: i64) -> RepoResult<usize>;
    async fn find(&self, user_id: i64, id: i64) -> RepoResult<Option<Task>>;
    /// Whether another open task of the user already holds `(due_date, start_time)`.
    async fn slot_taken(
        &self,
        user_id: i64,
        due_date: Date,
        start_time: Time,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool>;
    async fn insert(&self, user_id: i64, new: &NewTask) -> RepoResult<Task>;
    async fn update(&self, user_id: i64, id: i64, changes: &TaskChanges) -> RepoResult<Option<Task>>;
    async fn delete(&self, user_id: i64, id: i64) -> RepoResult<Option<Task>>;
    async fn toggle(&self, user_id: i64, id: i64) -> RepoResult<Option<Task>>;
}

#[derive(Clone)]
pub struct PgTaskRepo {
    db: PgPool,
}

impl PgTaskRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskRepo for PgTaskRepo {
    async fn list_for_user(&self, user_id: i64) -> RepoResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
              FROM tasks
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count_for_user(&self, user_id: i64) -> RepoResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn find(&self, user_id: i64, id: i64) -> RepoResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(task)
    }

    async fn slot_taken(
        &self,
        user_id: i64,
        due_date: Date,
        start_time: Time,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        let (taken,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                  FROM tasks
                 WHERE user_id = $1
                   AND completed = FALSE
                   AND due_date = $2
                   AND start_time = $3
                   AND ($4::BIGINT IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(user_id)
        .bind(due_date)
        .bind(start_time)
        .bind(exclude_id)
        .fetch_one(&self.db)
        .await?;
        Ok(taken)
    }

    async fn insert(&self, user_id: i64, new: &NewTask) -> RepoResult<Task> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (user_id, title, description, category, priority, due_date, start_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&new.title)
        .bind(new.description.as_deref())
        .bind(new.category.as_str())
        .bind(new.priority)
        .bind(new.due_date)
        .bind(new.start_time)
        .fetch_one(&self.db)
        .await?;
        Ok(task)
    }

    async fn update(&self, user_id: i64, id: i64, changes: &TaskChanges) -> RepoResult<Option<Task>> {
        if changes.is_empty() {
            return self.find(user_id, id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tasks SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(title) = &changes.title {
                set.push("title = ").push_bind_unseparated(title.clone());
            }
            if let Some(description) = &changes.description {
                set.push("description = ")
                    .push_bind_unseparated(description.clone());
            }
            if let Some(completed) = changes.completed {
                set.push("completed = ").push_bind_unseparated(completed);
            }
            if let Some(category) = changes.category {
                set.push("category = ").push_bind_unseparated(category.as_str());
            }
            if let Some(priority) = changes.priority {
                set.push("priority = ").push_bind_unseparated(priority);
            }
            if let Some(due_date) = changes.due_date {
                set.push("due_date = ").push_bind_unseparated(due_date);
            }
            if let Some(start_time) = changes.start_time {
                set.push("start_time = ").push_bind_unseparated(start_time);
            }
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(TASK_COLUMNS);

        let task = qb
            .build_query_as::<Task>()
            .fetch_optional(&self.db)
            .await?;
        Ok(task)
    }

    async fn delete(&self, user_id: i64, id: i64) -> RepoResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "DELETE FROM tasks WHERE id = $1 AND user_id = $2 RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(task)
    }

    async fn toggle(&self, user_id: i64, id: i64) -> RepoResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
               SET completed = NOT completed
             WHERE id = $1 AND user_id = $2
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(task)
    }
}
