use async_trait::async_trait;

use super::{validate_send_params, Provider, ProviderError};

/// Development provider: writes the message to the debug log instead of
/// contacting any network. This is the default.
pub struct ConsoleProvider {
    from_email: String,
}

impl ConsoleProvider {
    pub fn new(from_email: &str) -> Self {
        Self {
            from_email: from_email.to_string(),
        }
    }
}

#[async_trait]
impl Provider for ConsoleProvider {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        plain_text: Option<&str>,
        html_text: Option<&str>,
    ) -> Result<(), ProviderError> {
        validate_send_params(recipient, subject, plain_text, html_text)?;

        tracing::debug!(
            from = %self.from_email,
            to = %recipient,
            subject = %subject,
            plain_text = plain_text.unwrap_or(""),
            html_text = html_text.unwrap_or(""),
            "console email delivery"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_accepts_a_complete_message() {
        let provider = ConsoleProvider::new("support@localhost");
        provider
            .send("alice@example.com", "Hi", Some("body"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn send_rejects_missing_recipient() {
        let provider = ConsoleProvider::new("support@localhost");
        let err = provider.send("", "Hi", Some("body"), None).await;
        assert!(matches!(err, Err(ProviderError::InvalidParameter(_))));
    }
}
