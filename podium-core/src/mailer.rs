use async_trait::async_trait;
use podium_shared::Masked;

use crate::CoreResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailBody {
    Html(String),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub filename: String,
    /// Full MIME type including parameters, e.g. `text/calendar; method=REQUEST`.
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: Masked<String>,
    pub subject: String,
    pub body: EmailBody,
    pub attachment: Option<EmailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Hand one message to the outbound transport. Delivery is not confirmed
    /// beyond the transport accepting it.
    async fn send(&self, email: OutboundEmail) -> CoreResult<()>;
}
