//! Email sending abstractions

pub mod console;
pub mod smtp;

pub use console::ConsoleEmailSender;
pub use smtp::{SmtpConfig, SmtpEmailSender};

use dentalscan_core::EmailTemplate;

/// Trait for delivering rendered notification emails
pub trait EmailSender: Send + Sync {
    /// Deliver `email` to a single recipient address
    fn send(&self, to: &str, email: &EmailTemplate) -> Result<(), String>;
}

/// Allow using Box<dyn EmailSender> as an EmailSender
impl EmailSender for Box<dyn EmailSender> {
    fn send(&self, to: &str, email: &EmailTemplate) -> Result<(), String> {
        (**self).send(to, email)
    }
}
