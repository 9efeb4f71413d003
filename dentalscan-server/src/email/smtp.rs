//! SMTP-based email sender for production

use dentalscan_core::EmailTemplate;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

use super::EmailSender;

const DEFAULT_SMTP_PORT: u16 = 465;

/// Connection and sender identity for SMTP delivery
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    /// 465 for implicit TLS, 587 for STARTTLS
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

impl SmtpConfig {
    /// Read `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD` and `SMTP_FROM_EMAIL`
    /// (all required) plus optional `SMTP_PORT` and `SMTP_FROM_NAME`.
    ///
    /// Returns `None` when any required variable is missing or empty.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Some(Self {
            host: get("SMTP_HOST")?,
            port: get("SMTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            username: get("SMTP_USERNAME")?,
            password: get("SMTP_PASSWORD")?,
            from_email: get("SMTP_FROM_EMAIL")?,
            from_name: get("SMTP_FROM_NAME"),
        })
    }

    fn sender(&self) -> Result<Mailbox, String> {
        let address = self
            .from_email
            .parse()
            .map_err(|e| format!("Invalid from address: {}", e))?;
        Ok(Mailbox::new(self.from_name.clone(), address))
    }
}

/// Build a multipart (plain text + HTML) message
fn build_message(from: Mailbox, to: &str, email: &EmailTemplate) -> Result<Message, String> {
    let to: Mailbox = to
        .parse()
        .map_err(|e| format!("Invalid to address: {}", e))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.as_str())
        .multipart(MultiPart::alternative_plain_html(
            email.text.clone(),
            email.html.clone(),
        ))
        .map_err(|e| format!("Failed to build email: {}", e))
}

/// SMTP email sender for production use
pub struct SmtpEmailSender {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Connect to the relay and verify it accepts our credentials
    pub fn new(config: SmtpConfig) -> Result<Self, String> {
        let from = config.sender()?;
        let creds = Credentials::new(config.username, config.password);

        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| format!("Failed to create SMTP transport: {}", e))?
            .port(config.port)
            .credentials(creds)
            .build();

        transport
            .test_connection()
            .map_err(|e| format!("SMTP connection test failed: {}", e))?;

        tracing::info!(host = %config.host, port = config.port, "SMTP connection established");

        Ok(Self { transport, from })
    }
}

impl EmailSender for SmtpEmailSender {
    fn send(&self, to: &str, email: &EmailTemplate) -> Result<(), String> {
        let message = build_message(self.from.clone(), to, email)?;

        self.transport
            .send(&message)
            .map_err(|e| format!("Failed to send email: {}", e))?;

        tracing::info!(to = %to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_requires_credentials() {
        let config = SmtpConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "mailer"),
            ("SMTP_FROM_EMAIL", "noreply@example.com"),
        ]));
        assert!(config.is_none());

        let config = SmtpConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "mailer"),
            ("SMTP_PASSWORD", ""),
            ("SMTP_FROM_EMAIL", "noreply@example.com"),
        ]));
        assert!(config.is_none());
    }

    #[test]
    fn test_config_defaults() {
        let config = SmtpConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "mailer"),
            ("SMTP_PASSWORD", "secret"),
            ("SMTP_FROM_EMAIL", "noreply@example.com"),
            ("SMTP_PORT", "not-a-port"),
        ]))
        .unwrap();
        assert_eq!(config.port, DEFAULT_SMTP_PORT);
        assert!(config.from_name.is_none());
    }

    #[test]
    fn test_build_message() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: "secret".to_string(),
            from_email: "noreply@example.com".to_string(),
            from_name: Some("DentalScan".to_string()),
        };
        let email = EmailTemplate {
            subject: "Results ready".to_string(),
            html: "<p>Hi</p>".to_string(),
            text: "Hi".to_string(),
        };

        let message = build_message(config.sender().unwrap(), "ana@example.com", &email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Results ready"));
        assert!(raw.contains("multipart/alternative"));

        assert!(build_message(config.sender().unwrap(), "not an address", &email).is_err());
    }
}
