//! Outbound email over SMTP (lettre). Delivery failures surface as `AppError::Email`, no retry.

use crate::config::SmtpSettings;
use crate::error::AppError;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub recipient: String,
    pub subject: String,
    /// Plain-text body.
    pub message: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, AppError> {
        let credentials = match (&settings.username, &settings.password) {
            (Some(user), Some(pass)) => Some(Credentials::new(user.clone(), pass.clone())),
            _ => None,
        };
        let mut builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| AppError::Email(format!("smtp relay {}: {}", settings.host, e)))?
        } else {
            // plain SMTP, e.g. a local Mailpit
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        builder = builder.port(settings.port);
        if let Some(creds) = credentials {
            builder = builder.credentials(creds);
        }
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| AppError::Email(format!("invalid sender {}: {}", settings.from, e)))?;
        Ok(SmtpMailer {
            transport: builder.build(),
            from,
        })
    }
}

/// Plain-text message from `from` to the email's recipient.
pub fn build_message(from: &Mailbox, email: &EmailMessage) -> Result<Message, AppError> {
    let to: Mailbox = email
        .recipient
        .parse()
        .map_err(|e| AppError::Email(format!("invalid recipient {}: {}", email.recipient, e)))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.message.clone())
        .map_err(|e| AppError::Email(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError> {
        let message = build_message(&self.from, email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;
        tracing::info!(to = %email.recipient, subject = %email.subject, "email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(recipient: &str) -> EmailMessage {
        EmailMessage {
            recipient: recipient.into(),
            subject: "Your reset code".into(),
            message: "Code: 123456".into(),
        }
    }

    #[test]
    fn builds_plain_text_message() {
        let from: Mailbox = "Catalog <noreply@example.com>".parse().unwrap();
        let message = build_message(&from, &email("ada@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: ada@example.com"));
        assert!(raw.contains("Subject: Your reset code"));
        assert!(raw.contains("Code: 123456"));
    }

    #[test]
    fn bad_recipient_is_an_email_error() {
        let from: Mailbox = "noreply@example.com".parse().unwrap();
        assert!(matches!(build_message(&from, &email("not an address")), Err(AppError::Email(_))));
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: std::sync::Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &EmailMessage) -> Result<(), AppError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn mailer_is_usable_as_trait_object() {
        let recorder = std::sync::Arc::new(RecordingMailer::default());
        let mailer: std::sync::Arc<dyn Mailer> = recorder.clone();
        mailer.send(&email("ada@example.com")).await.unwrap();
        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "ada@example.com");
    }

    #[test]
    fn smtp_mailer_rejects_bad_sender() {
        let settings = SmtpSettings {
            host: "localhost".into(),
            port: 1025,
            username: None,
            password: None,
            from: "nobody".into(),
            use_tls: false,
        };
        assert!(matches!(SmtpMailer::new(&settings), Err(AppError::Email(_))));
    }
}
