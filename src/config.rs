use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    /// How long after `exp` a token may still be refreshed. `None` means no bound.
    pub refresh_grace_minutes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub relay_url: String,
    pub relay_token: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub password_cost: u32,
    pub frontend_url: String,
    pub mail: Option<MailConfig>,
    pub cookie_secure: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "taskdesk".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "taskdesk-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60 * 24),
            refresh_grace_minutes: env_parse("JWT_REFRESH_GRACE_MINUTES"),
        };
        let mail = std::env::var("MAIL_RELAY_URL").ok().map(|relay_url| MailConfig {
            relay_url,
            relay_token: std::env::var("MAIL_RELAY_TOKEN").ok(),
            from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Taskdesk <no-reply@taskdesk.local>".into()),
        });
        Ok(Self {
            database_url,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(10),
            jwt,
            password_cost: env_parse("PASSWORD_HASH_COST").unwrap_or(2),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            mail,
            cookie_secure: env_parse("COOKIE_SECURE").unwrap_or(false),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
