use podium_shared::models::events::{SlotReservedEvent, VerificationRequestedEvent};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub enum Notification {
    SlotReserved(SlotReservedEvent),
    VerificationRequested(VerificationRequestedEvent),
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::SlotReserved(_) => "slot_reserved",
            Notification::VerificationRequested(_) => "verification_requested",
        }
    }
}

/// Producer side of the outbound-notification queue.
///
/// `notify` never waits: when the queue is full or the worker is gone the
/// message is dropped and logged, so callers are not slowed by the mailer.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Returns whether the message was queued.
    pub fn notify(&self, notification: Notification) -> bool {
        let kind = notification.kind();
        match self.tx.try_send(notification) {
            Ok(()) => {
                debug!("Queued {} notification", kind);
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Notification queue full, dropping {} notification", kind);
                false
            }
            Err(TrySendError::Closed(_)) => {
                error!("Notification worker stopped, dropping {} notification", kind);
                false
            }
        }
    }
}
