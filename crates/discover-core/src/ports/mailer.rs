use async_trait::async_trait;
use thiserror::Error;

use crate::domain::RenderedSuggestion;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("delivery to {to} failed: {message}")]
    Delivery { to: String, message: String },
}

/// Delivers a rendered suggestion. The transport lives outside the core.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, notification: &RenderedSuggestion) -> Result<(), MailerError>;
}
