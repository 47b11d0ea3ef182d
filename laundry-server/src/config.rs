use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

use crate::store::FirestoreConfig;

/// Which remote store backend to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// SQLite database under `STATE_DIR`.
    Sqlite,
    /// Cloud Firestore over its REST API.
    Firestore(FirestoreConfig),
    /// Process memory; contents are lost on restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: StoreBackend,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let backend_name = env::var("STORE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());
        let backend = match backend_name.trim().to_lowercase().as_str() {
            "" | "sqlite" => StoreBackend::Sqlite,
            "memory" => StoreBackend::Memory,
            "firestore" => {
                let project_id = parse_optional(env::var("FIRESTORE_PROJECT_ID").ok())
                    .context("FIRESTORE_PROJECT_ID environment variable is required for the firestore backend")?;
                StoreBackend::Firestore(FirestoreConfig {
                    project_id,
                    api_key: parse_optional(env::var("FIRESTORE_API_KEY").ok()),
                    auth_token: parse_optional(env::var("FIRESTORE_AUTH_TOKEN").ok()),
                    base_url: parse_optional(env::var("FIRESTORE_BASE_URL").ok()),
                })
            }
            other => bail!(
                "STORE_BACKEND must be one of sqlite, firestore, memory (got {})",
                other
            ),
        };

        Ok(Config {
            port,
            backend,
            state_dir,
        })
    }

    /// Path of the SQLite database file.
    pub fn sqlite_path(&self) -> PathBuf {
        self.state_dir.join("laundry.db")
    }
}

/// Parse an optional setting.
///
/// Returns None if the value is missing, empty, or contains only whitespace.
pub fn parse_optional(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_none() {
        assert_eq!(parse_optional(None), None);
    }

    #[test]
    fn test_parse_optional_blank() {
        assert_eq!(parse_optional(Some("".to_string())), None);
        assert_eq!(parse_optional(Some(" \t\n".to_string())), None);
    }

    #[test]
    fn test_parse_optional_valid() {
        assert_eq!(
            parse_optional(Some("  token  ".to_string())),
            Some("  token  ".to_string())
        );
    }

    #[test]
    fn test_sqlite_path_under_state_dir() {
        let config = Config {
            port: 3000,
            backend: StoreBackend::Sqlite,
            state_dir: PathBuf::from("/var/lib/laundry"),
        };
        assert_eq!(
            config.sqlite_path(),
            PathBuf::from("/var/lib/laundry/laundry.db")
        );
    }
}
