use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use podium_core::mailer::{EmailBody, Mailer, OutboundEmail};
use podium_core::{CoreError, CoreResult};
use tracing::info;

use crate::app_config::SmtpConfig;

/// SMTP delivery through a pooled lettre transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> CoreResult<Self> {
        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|e| CoreError::InternalError(format!("Invalid SMTP sender '{}': {}", config.sender, e)))?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| CoreError::InternalError(format!("SMTP relay setup failed: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        info!("SMTP mailer targeting {}:{} (starttls: {})", config.host, config.port, config.starttls);
        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

fn body_part(body: EmailBody) -> SinglePart {
    match body {
        EmailBody::Html(html) => SinglePart::html(html),
        EmailBody::Text(text) => SinglePart::plain(text),
    }
}

/// Builds the MIME message. A message with an attachment becomes
/// multipart/mixed with the body first.
pub fn build_message(sender: &Mailbox, email: OutboundEmail) -> CoreResult<Message> {
    let recipient: Mailbox = email
        .to
        .expose()
        .parse()
        .map_err(|e| CoreError::ValidationError(format!("Invalid recipient address: {}", e)))?;

    let builder = Message::builder()
        .from(sender.clone())
        .to(recipient)
        .subject(email.subject);

    let message = match email.attachment {
        None => builder.singlepart(body_part(email.body)),
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                CoreError::InternalError(format!(
                    "Invalid attachment content type '{}': {}",
                    attachment.content_type, e
                ))
            })?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(body_part(email.body))
                    .singlepart(Attachment::new(attachment.filename).body(attachment.content, content_type)),
            )
        }
    };

    message.map_err(|e| CoreError::InternalError(format!("Email build failed: {}", e)))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutboundEmail) -> CoreResult<()> {
        let subject = email.subject.clone();
        let message = build_message(&self.sender, email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| CoreError::UnavailableError(format!("SMTP send failed: {}", e)))?;

        info!("Email '{}' handed to SMTP relay", subject);
        Ok(())
    }
}

/// Used when SMTP is disabled: logs the envelope instead of sending.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutboundEmail) -> CoreResult<()> {
        info!(
            "SMTP disabled, not sending '{}' to {} (attachment: {})",
            email.subject,
            email.to,
            email
                .attachment
                .as_ref()
                .map(|a| a.filename.as_str())
                .unwrap_or("none")
        );
        Ok(())
    }
}
