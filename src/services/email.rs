//! Email delivery for notifications that are also mailed

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::notification::NewNotification,
};

/// Outgoing mail
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// SMTP mailer built from the `[email]` configuration
#[derive(Clone)]
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> AppResult<Message> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("LibraryHub");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body(body)),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}

/// Notification text carries user-entered titles and notes
fn html_body(body: &str) -> String {
    format!(
        "<html><body><p>{}</p></body></html>",
        html_escape::encode_text(body)
    )
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let email = self.build_message(to, subject, body)?;
        let transport = self.transport()?;

        // lettre's SMTP transport blocks
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

/// Mails a notification when email is enabled and its type is mailed.
/// Failures are logged and reported as `false`.
pub async fn deliver_email(
    mailer: &Arc<dyn Mailer>,
    enabled: bool,
    to: &str,
    notification: &NewNotification,
) -> bool {
    if !enabled || !notification.notification_type.is_mailed() {
        return false;
    }
    match mailer
        .send(to, notification.notification_type.subject(), &notification.message)
        .await
    {
        Ok(()) => {
            tracing::debug!(user_id = notification.user_id, "Notification mailed");
            true
        }
        Err(e) => {
            tracing::warn!(user_id = notification.user_id, "Failed to mail notification: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationType;
    use mockall::predicate::eq;

    fn available() -> NewNotification {
        NewNotification::new(4, NotificationType::BookAvailable, "'Atlas' is now available!".into())
    }

    #[test]
    fn html_part_escapes_markup() {
        let html = html_body("'<script>alert(1)</script>' & co is now available!");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("&amp; co"));
        assert!(html.starts_with("<html><body><p>"));
    }

    #[tokio::test]
    async fn mails_available_books() {
        let mut mock = MockMailer::new();
        mock.expect_send()
            .with(
                eq("pupil@school.test"),
                eq("A reserved book is available"),
                eq("'Atlas' is now available!"),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mailer: Arc<dyn Mailer> = Arc::new(mock);

        assert!(deliver_email(&mailer, true, "pupil@school.test", &available()).await);
    }

    #[tokio::test]
    async fn skips_when_disabled_or_not_mailed() {
        let mut mock = MockMailer::new();
        mock.expect_send().times(0);
        let mailer: Arc<dyn Mailer> = Arc::new(mock);

        assert!(!deliver_email(&mailer, false, "pupil@school.test", &available()).await);

        let issued = NewNotification::new(4, NotificationType::BookIssued, "issued".into());
        assert!(!deliver_email(&mailer, true, "pupil@school.test", &issued).await);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let mut mock = MockMailer::new();
        mock.expect_send()
            .returning(|_, _, _| Err(AppError::Internal("connection refused".into())));
        let mailer: Arc<dyn Mailer> = Arc::new(mock);

        assert!(!deliver_email(&mailer, true, "pupil@school.test", &available()).await);
    }

    #[test]
    fn builds_multipart_message() {
        let mailer = SmtpMailer::new(EmailConfig::default());
        assert!(mailer.build_message("pupil@school.test", "Subject", "Body").is_ok());
        assert!(mailer.build_message("not an address", "Subject", "Body").is_err());
    }
}
