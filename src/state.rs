use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::jwt::JwtKeys;
use crate::auth::password::Passwords;
use crate::auth::repo::{PgUserRepo, UserRepo};
use crate::config::AppConfig;
use crate::db;
use crate::mail::{LogMailer, Mailer, RelayMailer};
use crate::tasks::repo::{PgTaskRepo, TaskRepo};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepo>,
    pub tasks: Arc<dyn TaskRepo>,
    pub mailer: Arc<dyn Mailer>,
    pub passwords: Passwords,
    pub jwt: JwtKeys,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Production wiring: Postgres repositories plus the configured mail transport.
    /// Returns the pool as well so the caller can run migrations on it.
    pub async fn init() -> anyhow::Result<(Self, sqlx::PgPool)> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config).await?;

        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => {
                info!(relay = %mail.relay_url, "mail relay configured");
                Arc::new(RelayMailer::new(mail.clone())?)
            }
            None => {
                warn!("MAIL_RELAY_URL not set; reset links will only be logged");
                Arc::new(LogMailer)
            }
        };

        let state = Self::from_parts(
            Arc::new(PgUserRepo::new(db.clone())),
            Arc::new(PgTaskRepo::new(db.clone())),
            mailer,
            config,
        )?;
        Ok((state, db))
    }

    pub fn from_parts(
        users: Arc<dyn UserRepo>,
        tasks: Arc<dyn TaskRepo>,
        mailer: Arc<dyn Mailer>,
        config: Arc<AppConfig>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            users,
            tasks,
            mailer,
            passwords: Passwords::new(config.password_cost)?,
            jwt: JwtKeys::new(&config.jwt),
            config,
        })
    }
}
