//! Pluggable delivery transports.
//!
//! A provider delivers one rendered message and reports a classified
//! outcome. Which implementation is constructed is driven by the
//! `email_provider` configuration option.

pub mod console;
pub mod smtp;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{EmailConfig, EmailProviderKind};
use crate::error::{AppError, AppResult};

pub use console::ConsoleProvider;
pub use smtp::SmtpProvider;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver one message. Both bodies are optional but at least one must
    /// be present.
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        plain_text: Option<&str>,
        html_text: Option<&str>,
    ) -> Result<(), ProviderError>;
}

/// Shared send-parameter validation for every provider.
pub(crate) fn validate_send_params(
    recipient: &str,
    subject: &str,
    plain_text: Option<&str>,
    html_text: Option<&str>,
) -> Result<(), ProviderError> {
    if recipient.is_empty() {
        return Err(ProviderError::InvalidParameter("recipient is empty"));
    }
    if subject.is_empty() {
        return Err(ProviderError::InvalidParameter("subject is empty"));
    }
    if plain_text.map_or(true, str::is_empty) && html_text.map_or(true, str::is_empty) {
        return Err(ProviderError::InvalidParameter("message has no body"));
    }
    Ok(())
}

/// Construct the provider selected by configuration.
pub fn build_provider(config: &EmailConfig) -> AppResult<Arc<dyn Provider>> {
    match config.provider {
        EmailProviderKind::Console => Ok(Arc::new(ConsoleProvider::new(&config.from_email))),
        EmailProviderKind::Smtp => {
            let provider = SmtpProvider::new(&config.smtp, &config.from_email)
                .map_err(|e| AppError::Config(e.to_string()))?;
            Ok(Arc::new(provider))
        }
    }
}
