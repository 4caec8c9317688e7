//! In-memory repositories and helpers shared by the unit and router tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use time::{Date, Duration, OffsetDateTime, Time};

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::UserRepo,
        repo_types::{NewUser, ProfileChanges, User},
        AuthUser,
    },
    config::{AppConfig, JwtConfig},
    db::{RepoError, RepoResult},
    mail::{Mailer, ResetMail},
    state::AppState,
    tasks::{
        repo::{TaskRepo, OPEN_SLOT_CONSTRAINT},
        repo_types::{NewTask, Task, TaskChanges},
    },
};

const TEST_SECRET: &str = "test-secret";

fn duplicate(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

struct StoredUser {
    user: User,
    reset: Option<(String, OffsetDateTime)>,
}

#[derive(Default)]
struct UserRows {
    rows: Vec<StoredUser>,
    next_id: i64,
}

/// Mirrors the `users` table constraints: unique username and unique email.
#[derive(Default)]
pub struct MemoryUsers {
    inner: Mutex<UserRows>,
}

impl MemoryUsers {
    pub fn reset_token_of(&self, id: i64) -> Option<(String, OffsetDateTime)> {
        let inner = self.inner.lock().unwrap();
        inner
            .rows
            .iter()
            .find(|r| r.user.id == id)
            .and_then(|r| r.reset.clone())
    }

    fn check_unique(rows: &[StoredUser], id: i64, username: &str, email: &str) -> RepoResult<()> {
        let others = rows.iter().filter(|r| r.user.id != id);
        for other in others {
            if other.user.username == username {
                return Err(duplicate("users_username_key"));
            }
            if other.user.email == email {
                return Err(duplicate("users_email_key"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryUsers {
    async fn ping(&self) -> RepoResult<()> {
        Ok(())
    }

    async fn create(&self, new: &NewUser) -> RepoResult<User> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_unique(&inner.rows, 0, &new.username, &new.email)?;
        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            username: new.username.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.rows.push(StoredUser {
            user: user.clone(),
            reset: None,
        });
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().find(|r| r.user.id == id).map(|r| r.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .find(|r| r.user.email == email)
            .map(|r| r.user.clone()))
    }

    async fn update_profile(&self, id: i64, changes: &ProfileChanges) -> RepoResult<Option<User>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner.rows.iter().position(|r| r.user.id == id) else {
            return Ok(None);
        };
        let mut next = inner.rows[pos].user.clone();
        if let Some(username) = &changes.username {
            next.username = username.clone();
        }
        if let Some(email) = &changes.email {
            next.email = email.clone();
        }
        if let Some(hash) = &changes.password_hash {
            next.password_hash = hash.clone();
        }
        Self::check_unique(&inner.rows, id, &next.username, &next.email)?;
        let row = &mut inner.rows[pos];
        if changes.password_hash.is_some() {
            row.reset = None;
        }
        row.user = next.clone();
        Ok(Some(next))
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expires: OffsetDateTime,
    ) -> RepoResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner.rows.iter_mut().find(|r| r.user.id == id) {
            row.reset = Some((token.to_string(), expires));
        }
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> RepoResult<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .find(|r| matches!(&r.reset, Some((t, expires)) if t == token && *expires > now))
            .map(|r| r.user.clone()))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(row) = inner.rows.iter_mut().find(|r| r.user.id == id) {
            row.user.password_hash = password_hash.to_string();
            row.reset = None;
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> RepoResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.rows.len();
        inner.rows.retain(|r| r.user.id != id);
        Ok(inner.rows.len() < before)
    }
}

#[derive(Default)]
struct TaskRows {
    rows: Vec<Task>,
    next_id: i64,
}

/// Mirrors the `tasks` table, including the partial unique index on open slots.
#[derive(Default)]
pub struct MemoryTasks {
    inner: Mutex<TaskRows>,
}

impl MemoryTasks {
    fn holds_slot(task: &Task, user_id: i64, date: Date, time: Time) -> bool {
        task.user_id == user_id
            && !task.completed
            && task.due_date == Some(date)
            && task.start_time == Some(time)
    }

    fn check_slot(rows: &[Task], candidate: &Task) -> RepoResult<()> {
        if candidate.completed {
            return Ok(());
        }
        let (Some(date), Some(time)) = (candidate.due_date, candidate.start_time) else {
            return Ok(());
        };
        let clash = rows
            .iter()
            .any(|t| t.id != candidate.id && Self::holds_slot(t, candidate.user_id, date, time));
        if clash {
            return Err(duplicate(OPEN_SLOT_CONSTRAINT));
        }
        Ok(())
    }

    /// Validates and stores a modified copy of the row at `pos`.
    fn replace(rows: &mut [Task], pos: usize, mut next: Task) -> RepoResult<Task> {
        Self::check_slot(rows, &next)?;
        next.updated_at = OffsetDateTime::now_utc();
        rows[pos] = next.clone();
        Ok(next)
    }
}

#[async_trait]
impl TaskRepo for MemoryTasks {
    async fn list_for_user(&self, user_id: i64) -> RepoResult<Vec<Task>> {
        let inner = self.inner.lock().unwrap();
        let mut tasks: Vec<Task> = inner
            .rows
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn count_for_user(&self, user_id: i64) -> RepoResult<usize> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().filter(|t| t.user_id == user_id).count())
    }

    async fn find(&self, user_id: i64, id: i64) -> RepoResult<Option<Task>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .find(|t| t.id == id && t.user_id == user_id)
            .cloned())
    }

    async fn slot_taken(
        &self,
        user_id: i64,
        due_date: Date,
        start_time: Time,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().any(|t| {
            Some(t.id) != exclude_id && Self::holds_slot(t, user_id, due_date, start_time)
        }))
    }

    async fn insert(&self, user_id: i64, new: &NewTask) -> RepoResult<Task> {
        let mut inner = self.inner.lock().unwrap();
        let now = OffsetDateTime::now_utc();
        let task = Task {
            id: inner.next_id + 1,
            user_id,
            title: new.title.clone(),
            description: new.description.clone(),
            completed: false,
            category: new.category,
            priority: new.priority,
            due_date: new.due_date,
            start_time: new.start_time,
            created_at: now,
            updated_at: now,
        };
        Self::check_slot(&inner.rows, &task)?;
        inner.next_id += 1;
        inner.rows.push(task.clone());
        Ok(task)
    }

    async fn update(&self, user_id: i64, id: i64, changes: &TaskChanges) -> RepoResult<Option<Task>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner
            .rows
            .iter()
            .position(|t| t.id == id && t.user_id == user_id)
        else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(inner.rows[pos].clone()));
        }
        let mut next = inner.rows[pos].clone();
        if let Some(title) = &changes.title {
            next.title = title.clone();
        }
        if let Some(description) = &changes.description {
            next.description = description.clone();
        }
        if let Some(completed) = changes.completed {
            next.completed = completed;
        }
        if let Some(category) = changes.category {
            next.category = category;
        }
        if let Some(priority) = changes.priority {
            next.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            next.due_date = due_date;
        }
        if let Some(start_time) = changes.start_time {
            next.start_time = start_time;
        }
        Self::replace(&mut inner.rows, pos, next).map(Some)
    }

    async fn delete(&self, user_id: i64, id: i64) -> RepoResult<Option<Task>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner
            .rows
            .iter()
            .position(|t| t.id == id && t.user_id == user_id)
        else {
            return Ok(None);
        };
        Ok(Some(inner.rows.remove(pos)))
    }

    async fn toggle(&self, user_id: i64, id: i64) -> RepoResult<Option<Task>> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner
            .rows
            .iter()
            .position(|t| t.id == id && t.user_id == user_id)
        else {
            return Ok(None);
        };
        let mut next = inner.rows[pos].clone();
        next.completed = !next.completed;
        Self::replace(&mut inner.rows, pos, next).map(Some)
    }
}

/// Records every reset mail; can be switched to fail deliveries.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<ResetMail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<ResetMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_deliveries(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_reset(&self, mail: &ResetMail) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("relay unavailable");
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

fn jwt_config(secret: &str) -> JwtConfig {
    JwtConfig {
        secret: secret.into(),
        issuer: "taskdesk".into(),
        audience: "taskdesk-users".into(),
        ttl_minutes: 60,
        refresh_grace_minutes: None,
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        max_connections: 1,
        jwt: jwt_config(TEST_SECRET),
        password_cost: 1,
        frontend_url: "http://localhost:3000".into(),
        mail: None,
        cookie_secure: false,
    }
}

/// An [`AppState`] over in-memory repositories, with handles to inspect them.
pub struct TestEnv {
    pub state: AppState,
    pub users: Arc<MemoryUsers>,
    pub tasks: Arc<MemoryTasks>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestEnv {
    pub fn new() -> Self {
        let users = Arc::new(MemoryUsers::default());
        let tasks = Arc::new(MemoryTasks::default());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::from_parts(
            users.clone(),
            tasks.clone(),
            mailer.clone(),
            Arc::new(test_config()),
        )
        .expect("test state");
        Self {
            state,
            users,
            tasks,
            mailer,
        }
    }

    /// Stores a user directly, bypassing registration rules.
    pub async fn user(&self, username: &str, email: &str, password: &str) -> User {
        let password_hash = self.state.passwords.hash(password).expect("hash");
        self.state
            .users
            .create(&NewUser {
                username: username.into(),
                email: email.into(),
                password_hash,
            })
            .await
            .expect("create user")
    }

    pub fn token_for(&self, user: &User) -> String {
        self.state.jwt.sign(user.id, &user.email).expect("sign")
    }
}

/// A correctly signed token whose expiry passed `seconds_ago` seconds ago.
pub fn expired_token(state: &AppState, id: i64, email: &str, seconds_ago: i64) -> String {
    let issued_at = OffsetDateTime::now_utc()
        - Duration::seconds(state.jwt.ttl().as_secs() as i64)
        - Duration::seconds(seconds_ago);
    state.jwt.sign_at(id, email, issued_at).expect("sign")
}

/// A well-formed token signed with a different secret.
pub fn foreign_token(id: i64, email: &str) -> String {
    JwtKeys::new(&jwt_config("not-the-test-secret"))
        .sign(id, email)
        .expect("sign")
}

pub fn auth_user(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
    }
}
