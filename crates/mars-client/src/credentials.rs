use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Token lifetime, matching the original seven-day cookie window.
pub const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub saved_at: String,
    pub expires_at: String,
}

impl Credential {
    pub fn new(token: &str) -> Self {
        Self::with_saved_at(token, Utc::now())
    }

    fn with_saved_at(token: &str, saved_at: DateTime<Utc>) -> Self {
        let expires_at = saved_at + Duration::days(TOKEN_TTL_DAYS);
        Self {
            token: token.to_string(),
            saved_at: saved_at.to_rfc3339_opts(SecondsFormat::Micros, false),
            expires_at: expires_at.to_rfc3339_opts(SecondsFormat::Micros, false),
        }
    }

    pub fn is_expired(&self) -> bool {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .map(|expires| expires <= Utc::now())
            .unwrap_or(true)
    }
}

/// Source of the bearer token attached to outgoing requests. Injected into
/// the client so call sites share no hidden global state; the 401 handler
/// clears it through the same interface.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<String>;
    fn store(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;

    fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

/// Token persisted as a small JSON file under the state directory, the CLI
/// analog of the original's client-side cookie.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<Credential> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&raw).ok()
    }
}

impl CredentialProvider for FileCredentialStore {
    fn token(&self) -> Option<String> {
        let credential = self.read()?;
        if credential.is_expired() {
            return None;
        }
        Some(credential.token)
    }

    fn store(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let credential = Credential::new(token);
        std::fs::write(&self.path, serde_json::to_string_pretty(&credential)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory provider for tests and one-off scripted use.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    credential: Mutex<Option<Credential>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        let store = Self::new();
        let _ = store.store(token);
        store
    }
}

impl CredentialProvider for MemoryCredentials {
    fn token(&self) -> Option<String> {
        let guard = self.credential.lock().ok()?;
        guard
            .as_ref()
            .filter(|credential| !credential.is_expired())
            .map(|credential| credential.token.clone())
    }

    fn store(&self, token: &str) -> Result<()> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|_| anyhow::anyhow!("credential lock poisoned"))?;
        *guard = Some(Credential::new(token));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .credential
            .lock()
            .map_err(|_| anyhow::anyhow!("credential lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}
