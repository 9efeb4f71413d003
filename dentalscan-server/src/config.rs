//! Server configuration

use std::fmt;

use serde::Deserialize;

use crate::state::Settings;

#[derive(Clone, Deserialize)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// SQLite database location; `None` keeps everything in memory
    pub database_url: Option<String>,

    /// External identity that is granted the admin role on sign-in
    pub owner_open_id: Option<String>,

    /// Base URL used when building image and result links
    pub public_url: String,

    /// Directory backing the filesystem image store
    pub upload_dir: String,

    /// Secret the identity provider sends with each sign-in callback
    pub identity_secret: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("owner_open_id", &self.owner_open_id)
            .field("public_url", &self.public_url)
            .field("upload_dir", &self.upload_dir)
            .field("identity_secret", &self.identity_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: None,
            owner_open_id: None,
            public_url: "http://localhost:3000".to_string(),
            upload_dir: "uploads".to_string(),
            identity_secret: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// - PORT (default: 3000)
    /// - DATABASE_URL (SQLite path, optionally prefixed with `sqlite://`)
    /// - OWNER_OPEN_ID
    /// - PUBLIC_URL (default: http://localhost:{PORT})
    /// - UPLOAD_DIR (default: uploads)
    /// - IDENTITY_SECRET (required for sign-in)
    pub fn from_env() -> Self {
        fn get_env(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }

        let defaults = Self::default();
        let port = get_env("PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        Self {
            port,
            database_url: get_env("DATABASE_URL"),
            owner_open_id: get_env("OWNER_OPEN_ID"),
            public_url: get_env("PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            upload_dir: get_env("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            identity_secret: get_env("IDENTITY_SECRET"),
        }
    }

    /// Prefix of the URLs stored images are served from
    pub fn files_url(&self) -> String {
        format!("{}/files", self.public_url)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            owner_open_id: self.owner_open_id.clone(),
            public_url: self.public_url.clone(),
            identity_secret: self.identity_secret.clone(),
        }
    }

    /// Database path with any `sqlite://` scheme removed
    pub fn database_path(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(|url| url.strip_prefix("sqlite://").unwrap_or(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_strips_scheme() {
        let config = Config {
            database_url: Some("sqlite://data/app.db".to_string()),
            ..Config::default()
        };
        assert_eq!(config.database_path(), Some("data/app.db"));

        let config = Config {
            database_url: Some("app.db".to_string()),
            ..Config::default()
        };
        assert_eq!(config.database_path(), Some("app.db"));
        assert_eq!(Config::default().database_path(), None);
    }

    #[test]
    fn test_files_url() {
        let config = Config {
            public_url: "https://scan.example.edu".to_string(),
            ..Config::default()
        };
        assert_eq!(config.files_url(), "https://scan.example.edu/files");
        assert_eq!(config.settings().public_url, "https://scan.example.edu");
    }

    #[test]
    fn test_debug_hides_identity_secret() {
        let config = Config {
            identity_secret: Some("hunter2".to_string()),
            ..Config::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
