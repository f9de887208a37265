//! Notification dispatch
//!
//! Workflow transitions hand an [`Email`] to the [`Notifier`], which delivers it
//! on a spawned task. Delivery failures are logged and dropped; they never
//! reach the operation that triggered them.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::MailConfig;

/// Mail delivery errors
#[derive(Error, Debug)]
pub enum MailError {
    #[error("SMTP configuration error: {0}")]
    Configuration(String),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to send email: {0}")]
    Send(String),
}

/// An outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub recipients: Vec<String>,
    pub text_body: String,
    pub html_body: String,
}

/// Email collaborator
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Development mailer: writes the message to the log
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(
            recipients = %email.recipients.join(", "),
            subject = %email.subject,
            "EMAIL (development mode)"
        );
        info!("{}", email.text_body);
        Ok(())
    }
}

/// SMTP mailer backed by lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        if config.smtp_host.is_empty() {
            return Err(MailError::Configuration("SMTP host is required".to_string()));
        }
        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|_| MailError::InvalidAddress(config.from_email.clone()))?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| MailError::Configuration(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        let mut builder = builder.port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(email.subject.clone());
        for recipient in &email.recipients {
            let to = recipient
                .parse::<Mailbox>()
                .map_err(|_| MailError::InvalidAddress(recipient.clone()))?;
            builder = builder.to(to);
        }

        let message = builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body),
                    ),
            )
            .map_err(|e| MailError::Send(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;
        Ok(())
    }
}

/// Build the mailer selected by configuration
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    if config.development_mode {
        return Ok(Arc::new(LogMailer));
    }
    Ok(Arc::new(SmtpMailer::new(config)?))
}

/// Fire-and-forget dispatcher shared through the application state
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Queue `email` for delivery; blank recipients are dropped
    pub fn dispatch(&self, mut email: Email) {
        email.recipients.retain(|r| !r.trim().is_empty());
        if email.recipients.is_empty() {
            return;
        }
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let subject = email.subject.clone();
            if let Err(e) = mailer.send(email).await {
                warn!(subject = %subject, "Notification delivery failed: {}", e);
            }
        });
    }
}

/// Message templates for workflow transitions
pub mod templates {
    use super::Email;

    fn email(subject: String, recipients: Vec<String>, lines: &[String]) -> Email {
        let text_body = lines.join("\n");
        let html_body = format!(
            "<html><body>{}</body></html>",
            lines
                .iter()
                .map(|l| format!("<p>{}</p>", escape(l)))
                .collect::<String>()
        );
        Email {
            subject,
            recipients,
            text_body,
            html_body,
        }
    }

    fn escape(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }

    pub fn access_requested(admins: Vec<String>, requester: &str, reason: &str) -> Email {
        email(
            format!("Access request from {}", requester),
            admins,
            &[
                format!("{} has requested access.", requester),
                format!("Reason: {}", reason),
            ],
        )
    }

    pub fn access_decided(to: String, approved: bool) -> Email {
        let verdict = if approved { "approved" } else { "denied" };
        email(
            format!("Your access request was {}", verdict),
            vec![to],
            &[format!("An administrator has {} your access request.", verdict)],
        )
    }

    pub fn task_submitted(to: String, task: &str, assignee: &str) -> Email {
        email(
            format!("Task submitted: {}", task),
            vec![to],
            &[format!("{} marked the task \"{}\" as submitted.", assignee, task)],
        )
    }

    pub fn task_reviewed(assignees: Vec<String>, task: &str, score: i32, comments: &str) -> Email {
        email(
            format!("Task reviewed: {}", task),
            assignees,
            &[
                format!("The task \"{}\" received a review.", task),
                format!("Score: {}", score),
                format!("Comments: {}", comments),
            ],
        )
    }
}
