//! Console-based email sender for development

use dentalscan_core::EmailTemplate;

use super::EmailSender;

/// Email sender that logs to console (for development)
pub struct ConsoleEmailSender;

impl ConsoleEmailSender {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailSender for ConsoleEmailSender {
    fn send(&self, to: &str, email: &EmailTemplate) -> Result<(), String> {
        println!();
        println!("========================================");
        println!("  TO:      {}", to);
        println!("  SUBJECT: {}", email.subject);
        println!("----------------------------------------");
        println!("{}", email.text);
        println!("========================================");
        println!();

        tracing::info!(to = %to, subject = %email.subject, "Email written to console");

        Ok(())
    }
}
