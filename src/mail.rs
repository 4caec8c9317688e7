use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::MailConfig;

#[derive(Debug, Clone, Serialize)]
pub struct ResetMail {
    pub to: String,
    pub reset_url: String,
}

impl ResetMail {
    pub fn subject(&self) -> &'static str {
        "Password Reset Request - Taskdesk"
    }

    pub fn body(&self) -> String {
        format!(
            "Hello,\n\n\
             You requested a password reset for your Taskdesk account.\n\
             Open the link below to choose a new password:\n\n\
             {}\n\n\
             This link will expire in 1 hour.\n\
             If you didn't request this password reset, please ignore this email.\n",
            self.reset_url
        )
    }
}

/// Outgoing mail. Delivery is best-effort: callers log failures and carry on.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_reset(&self, mail: &ResetMail) -> anyhow::Result<()>;
}

/// Used when no transport is configured: the link only goes to the log.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_reset(&self, mail: &ResetMail) -> anyhow::Result<()> {
        warn!(
            reset_url = %mail.reset_url,
            "mail transport not configured; password reset link logged instead"
        );
        Ok(())
    }
}

/// Posts messages to an HTTP mail relay.
#[derive(Clone)]
pub struct RelayMailer {
    client: reqwest::Client,
    config: MailConfig,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: String,
}

impl RelayMailer {
    pub fn new(config: MailConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build mail relay client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send_reset(&self, mail: &ResetMail) -> anyhow::Result<()> {
        let message = RelayMessage {
            from: &self.config.from,
            to: &mail.to,
            subject: mail.subject(),
            text: mail.body(),
        };
        let mut req = self.client.post(&self.config.relay_url).json(&message);
        if let Some(token) = &self.config.relay_token {
            req = req.bearer_auth(token);
        }
        req.send()
            .await
            .context("mail relay request")?
            .error_for_status()
            .context("mail relay rejected message")?;
        info!(to = %mail.to, "password reset email sent");
        Ok(())
    }
}
