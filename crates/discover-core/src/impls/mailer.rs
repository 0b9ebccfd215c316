//! Mailer implementations that stay inside the process.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::RenderedSuggestion;
use crate::ports::{Mailer, MailerError};

/// Emits each notification as a tracing event instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, notification: &RenderedSuggestion) -> Result<(), MailerError> {
        tracing::info!(
            to,
            subject = %notification.subject,
            body = %notification.text,
            "suggestion mail"
        );
        Ok(())
    }
}

/// Keeps every delivery for later inspection.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<(String, RenderedSuggestion)>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(recipient, notification)` pairs in delivery order.
    pub fn deliveries(&self) -> Vec<(String, RenderedSuggestion)> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, to: &str, notification: &RenderedSuggestion) -> Result<(), MailerError> {
        self.sent
            .lock()
            .map_err(|_| MailerError::Delivery {
                to: to.to_string(),
                message: "outbox poisoned".to_string(),
            })?
            .push((to.to_string(), notification.clone()));
        Ok(())
    }
}
