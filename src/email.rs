use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;

pub mod templates;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("delivery to {0} refused")]
    Refused(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        relay: &str,
        username: &str,
        password: &str,
        from_name: &str,
    ) -> Result<Self, MailError> {
        let from = Mailbox::new(Some(from_name.to_string()), username.parse::<Address>()?);
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(relay)?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(Self { transport, from })
    }

    pub async fn sanity_check(&self) -> Result<(), MailError> {
        if self.transport.test_connection().await? {
            Ok(())
        } else {
            Err(MailError::Refused(self.from.email.to_string()))
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(email.to_name, email.to.parse::<Address>()?))
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Keeps sent mail in memory instead of delivering it. Used when no SMTP
/// account is configured and by tests.
#[derive(Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<Email>>,
    refused: Mutex<Vec<String>>,
}

impl OutboxMailer {
    /// Makes every later send to `address` fail.
    pub fn refuse(&self, address: impl Into<String>) {
        self.refused
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(address.into());
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let refused = self
            .refused
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|a| a.eq_ignore_ascii_case(&email.to));
        if refused {
            return Err(MailError::Refused(email.to));
        }

        tracing::info!(to = %email.to, subject = %email.subject, "email queued in outbox");
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Handle to emails being sent in the background. Dropping it detaches the
/// task; awaiting `settled` waits for every send to finish.
#[derive(Debug)]
#[must_use = "drop the handle explicitly to send in the background"]
pub struct Dispatch(Option<JoinHandle<DispatchReport>>);

impl Dispatch {
    pub fn none() -> Self {
        Dispatch(None)
    }

    pub async fn settled(self) -> DispatchReport {
        match self.0 {
            Some(handle) => handle.await.unwrap_or_default(),
            None => DispatchReport::default(),
        }
    }
}

/// Sends `emails` on a spawned task. Failures are logged, never returned.
pub fn dispatch(mailer: Arc<dyn Mailer>, emails: Vec<Email>) -> Dispatch {
    if emails.is_empty() {
        return Dispatch::none();
    }

    Dispatch(Some(tokio::spawn(async move {
        let mut report = DispatchReport::default();
        for email in emails {
            let to = email.to.clone();
            match mailer.send(email).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    tracing::warn!(to = %to, error = %e, "failed to send email");
                    report.failed += 1;
                }
            }
        }
        report
    })))
}

/// Escapes text for interpolation into an HTML body.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
