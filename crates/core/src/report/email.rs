use crate::config::Settings;
use crate::domain::recommendation::Report;
use crate::report::ReportSink;
use anyhow::Context;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP delivery over implicit TLS.
pub struct EmailSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipient: Mailbox,
}

impl EmailSink {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let server = settings
            .smtp_server
            .as_deref()
            .context("SMTP_SERVER is required")?;
        let sender = settings
            .email_sender
            .as_deref()
            .context("EMAIL_SENDER is required")?;
        let password = settings
            .email_password
            .as_deref()
            .context("EMAIL_PASSWORD is required")?;
        let recipient = settings
            .email_recipient
            .as_deref()
            .context("EMAIL_RECIPIENT is required")?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(server)
            .with_context(|| format!("invalid SMTP relay {server}"))?
            .port(settings.smtp_port)
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .build();

        Ok(Self {
            transport,
            sender: parse_mailbox("EMAIL_SENDER", sender)?,
            recipient: parse_mailbox("EMAIL_RECIPIENT", recipient)?,
        })
    }
}

fn parse_mailbox(key: &str, raw: &str) -> anyhow::Result<Mailbox> {
    raw.parse::<Mailbox>()
        .with_context(|| format!("{key} is not a valid address: {raw:?}"))
}

fn build_message(
    sender: &Mailbox,
    recipient: &Mailbox,
    subject: &str,
    body: &str,
) -> anyhow::Result<Message> {
    Message::builder()
        .from(sender.clone())
        .to(recipient.clone())
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .context("failed to build report email")
}

#[async_trait::async_trait]
impl ReportSink for EmailSink {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, subject: &str, body: &str, report: &Report) -> anyhow::Result<()> {
        let message = build_message(&self.sender, &self.recipient, subject, body)?;
        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        tracing::info!(
            run_id = %report.id,
            recipient = %self.recipient,
            items = report.items.len(),
            "report emailed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_carries_subject_and_plain_body() {
        let sender = parse_mailbox("EMAIL_SENDER", "bot@sitscout.example").unwrap();
        let recipient = parse_mailbox("EMAIL_RECIPIENT", "Desk <desk@sitscout.example>").unwrap();
        let message = build_message(
            &sender,
            &recipient,
            "Daily Trade Recommendations",
            "Recommendation:\nBuy X\nScore:\n8",
        )
        .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Daily Trade Recommendations"));
        assert!(raw.contains("To: Desk <desk@sitscout.example>"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains("Buy X"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(parse_mailbox("EMAIL_SENDER", "not an address").is_err());
    }
}
