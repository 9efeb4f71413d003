//! DentalScan backend
//!
//! HTTP API for students to upload dental photographs and review the
//! results of a (mocked) damage analysis, plus admin analytics and an
//! audit trail of privileged actions.

pub mod config;
pub mod email;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod storage;
pub mod store;

pub use config::Config;
pub use email::{ConsoleEmailSender, EmailSender, SmtpConfig, SmtpEmailSender};
pub use error::ApiError;
pub use state::{AppState, Settings};
pub use storage::{BlobStore, FsBlobStore, InMemoryBlobStore};
pub use store::{InMemoryStore, SqliteStore, Store};
