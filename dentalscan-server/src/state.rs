//! Application state shared by all handlers

use std::sync::Arc;

use dentalscan_core::MockAnalyzer;

use crate::email::EmailSender;
use crate::storage::BlobStore;
use crate::store::Store;

/// Settings the handlers read at request time
#[derive(Debug, Clone)]
pub struct Settings {
    /// External identity promoted to admin on sign-in
    pub owner_open_id: Option<String>,
    /// Base URL for links in emails and stored image URLs
    pub public_url: String,
    /// Shared secret the identity provider presents on `auth.signIn`;
    /// sign-in is refused while unset
    pub identity_secret: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            owner_open_id: None,
            public_url: "http://localhost:3000".to_string(),
            identity_secret: None,
        }
    }
}

/// Application state: persistence, image storage, email and the analyzer
pub struct AppState<S, B, E>
where
    S: Store,
    B: BlobStore,
    E: EmailSender,
{
    pub store: Arc<S>,
    pub blobs: Arc<B>,
    pub email_sender: Arc<E>,
    pub analyzer: MockAnalyzer,
    pub settings: Settings,
}

impl<S, B, E> AppState<S, B, E>
where
    S: Store,
    B: BlobStore,
    E: EmailSender,
{
    pub fn new(
        store: S,
        blobs: B,
        email_sender: E,
        analyzer: MockAnalyzer,
        settings: Settings,
    ) -> Self {
        Self {
            store: Arc::new(store),
            blobs: Arc::new(blobs),
            email_sender: Arc::new(email_sender),
            analyzer,
            settings,
        }
    }

    /// Link to the results page for a submission
    pub fn analysis_url(&self, submission_id: u64) -> String {
        format!("{}/analysis/{}", self.settings.public_url, submission_id)
    }

    /// Link to the admin dashboard
    pub fn admin_url(&self) -> String {
        format!("{}/admin", self.settings.public_url)
    }
}
