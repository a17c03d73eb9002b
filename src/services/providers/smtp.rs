use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use super::{validate_send_params, Provider, ProviderError};
use crate::config::SmtpConfig;

/// SMTP delivery via lettre. The transport connects on demand per send and
/// releases the connection on every exit path.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpProvider {
    pub fn new(config: &SmtpConfig, from_email: &str) -> Result<Self, ProviderError> {
        let from = from_email
            .parse::<Mailbox>()
            .map_err(|e| ProviderError::Message(format!("invalid from address: {}", e)))?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| ProviderError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        }
        .port(config.port);

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

/// Assemble the MIME message: `multipart/alternative` with the plain part
/// first and the html part last when both bodies are present (RFC 2046 puts
/// the preferred variant last), a single part otherwise. All parts are
/// UTF-8.
fn build_message(
    from: &Mailbox,
    recipient: &str,
    subject: &str,
    plain_text: Option<&str>,
    html_text: Option<&str>,
) -> Result<Message, ProviderError> {
    let to = recipient
        .parse::<Mailbox>()
        .map_err(|e| ProviderError::Message(format!("invalid recipient address: {}", e)))?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject);

    let plain = plain_text.filter(|s| !s.is_empty());
    let html = html_text.filter(|s| !s.is_empty());

    let message = match (plain, html) {
        (Some(plain), Some(html)) => builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(header::ContentType::TEXT_PLAIN)
                        .body(plain.to_string()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(header::ContentType::TEXT_HTML)
                        .body(html.to_string()),
                ),
        ),
        (Some(plain), None) => builder
            .header(header::ContentType::TEXT_PLAIN)
            .body(plain.to_string()),
        (None, Some(html)) => builder
            .header(header::ContentType::TEXT_HTML)
            .body(html.to_string()),
        (None, None) => return Err(ProviderError::InvalidParameter("message has no body")),
    };

    message.map_err(|e| ProviderError::Message(e.to_string()))
}

#[async_trait]
impl Provider for SmtpProvider {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        plain_text: Option<&str>,
        html_text: Option<&str>,
    ) -> Result<(), ProviderError> {
        validate_send_params(recipient, subject, plain_text, html_text)?;

        let message = build_message(&self.from, recipient, subject, plain_text, html_text)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(())
    }
}
