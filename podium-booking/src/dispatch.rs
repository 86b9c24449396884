use chrono::Utc;
use podium_core::mailer::{EmailAttachment, EmailBody, Mailer, OutboundEmail};
use podium_core::notify::Notification;
use podium_core::{bounded, CoreResult};
use podium_shared::models::events::{SlotReservedEvent, VerificationRequestedEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::calendar::{build_invite, INVITE_CONTENT_TYPE, INVITE_FILENAME};

/// Renders notifications into emails and hands them to the mailer.
/// Failures are logged and dropped; nothing is retried.
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    io_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, io_timeout: Duration) -> Self {
        Self { mailer, io_timeout }
    }

    pub async fn dispatch(&self, notification: Notification) {
        let kind = notification.kind();
        let emails = match notification {
            Notification::SlotReserved(event) => vec![confirmation_email(&event), invite_email(&event)],
            Notification::VerificationRequested(event) => vec![verification_email(&event)],
        };

        for email in emails {
            let subject = email.subject.clone();
            match self.send(email).await {
                Ok(()) => info!("Sent '{}' ({})", subject, kind),
                Err(e) => error!("Failed to send '{}' ({}): {}", subject, kind, e),
            }
        }
    }

    async fn send(&self, email: OutboundEmail) -> CoreResult<()> {
        bounded(self.io_timeout, "email send", self.mailer.send(email)).await
    }
}

pub fn confirmation_email(event: &SlotReservedEvent) -> OutboundEmail {
    let html = format!(
        "<h1>Booking Confirmation</h1>\
         <p>Your booking has been confirmed.</p>\
         <p>Booking ID: {}</p>\
         <p>Thank you for choosing Podium!</p>",
        event.slot_id
    );

    OutboundEmail {
        to: event.recipient_email.clone(),
        subject: "Booking Confirmation".to_string(),
        body: EmailBody::Html(html),
        attachment: None,
    }
}

pub fn invite_email(event: &SlotReservedEvent) -> OutboundEmail {
    let summary = format!("Podium session with {}", event.recipient_name);
    let text = format!(
        "You have been invited to {}\n\nStart Time: {}\nEnd Time: {}",
        summary,
        event.session_start_time.format("%Y-%m-%d %H:%M UTC"),
        event.session_end_time.format("%Y-%m-%d %H:%M UTC"),
    );
    let ics = build_invite(
        event.slot_id,
        &summary,
        event.session_start_time,
        event.session_end_time,
        Utc::now(),
    );

    OutboundEmail {
        to: event.recipient_email.clone(),
        subject: format!("Calendar Invite: {}", summary),
        body: EmailBody::Text(text),
        attachment: Some(EmailAttachment {
            filename: INVITE_FILENAME.to_string(),
            content_type: INVITE_CONTENT_TYPE.to_string(),
            content: ics,
        }),
    }
}

pub fn verification_email(event: &VerificationRequestedEvent) -> OutboundEmail {
    let minutes = event.expires_in_seconds / 60;
    let html = format!(
        "<h1>Email Verification</h1>\
         <p>Your verification code is: <strong>{}</strong></p>\
         <p>This code will expire in {} minutes.</p>",
        event.code.expose(),
        minutes
    );

    OutboundEmail {
        to: event.recipient_email.clone(),
        subject: "Verify Your Email".to_string(),
        body: EmailBody::Html(html),
        attachment: None,
    }
}
