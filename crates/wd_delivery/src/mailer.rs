use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::Mutex;
use tracing::info;

use wd_core::{Error, Result};

const SMTP_RELAY: &str = "smtp.gmail.com";

/// Outbound mail seam. The orchestrator and tests talk to this trait; the
/// SMTP implementation below is the only production impl.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Fails when the transport cannot be built at all (missing
    /// credentials). Checked once before any retry loop.
    fn check_configured(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// Gmail SMTP mailer with a lazily built, process-cached transport.
pub struct SmtpMailer {
    user: Option<String>,
    password: Option<String>,
    transport: Mutex<Option<AsyncSmtpTransport<Tokio1Executor>>>,
}

impl SmtpMailer {
    pub fn new(user: Option<String>, password: Option<String>) -> Self {
        Self {
            user,
            password,
            transport: Mutex::new(None),
        }
    }

    /// Drop the cached transport. Test isolation hook.
    pub async fn reset(&self) {
        *self.transport.lock().await = None;
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Ok((user, password))
            }
            _ => Err(Error::Delivery(
                "GMAIL_USER or GMAIL_APP_PASSWORD is not configured".into(),
            )),
        }
    }

    async fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut cached = self.transport.lock().await;
        if let Some(transport) = cached.as_ref() {
            return Ok(transport.clone());
        }
        let (user, password) = self.credentials()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(SMTP_RELAY)
            .map_err(|e| Error::Delivery(format!("failed to build transport: {}", e)))?
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();
        *cached = Some(transport.clone());
        Ok(transport)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn check_configured(&self) -> Result<()> {
        self.credentials().map(|_| ())
    }

    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let transport = self.transport().await?;
        let (user, _) = self.credentials()?;

        let message = Message::builder()
            .from(
                user.parse()
                    .map_err(|e| Error::Delivery(format!("invalid sender address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| Error::Delivery(format!("invalid recipient address: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| Error::Delivery(format!("failed to build message: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| Error::Delivery(format!("smtp send failed: {}", e)))?;
        info!(to, subject, "email sent");
        Ok(())
    }
}
