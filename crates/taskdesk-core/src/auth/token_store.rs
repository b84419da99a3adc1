//! Access/refresh token persistence.
//!
//! The file-backed store keeps both tokens in `<base>/session.json` with
//! restricted permissions (0600), keyed by two fixed names. Tokens are never
//! logged. Expiry is not tracked here; the API client discovers it from a 401.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use taskdesk_types::TokenPair;

use crate::config::paths;

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Which of the two persisted tokens to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn key(self) -> &'static str {
        match self {
            TokenKind::Access => ACCESS_TOKEN_KEY,
            TokenKind::Refresh => REFRESH_TOKEN_KEY,
        }
    }
}

/// Durable storage for the session's token pair.
pub trait TokenStore: Send + Sync {
    /// Returns the stored token of the given kind, if any.
    fn get(&self, kind: TokenKind) -> Option<String>;

    /// Replaces both tokens.
    ///
    /// # Errors
    /// Returns an error if the pair cannot be persisted.
    fn set(&self, tokens: &TokenPair) -> Result<()>;

    /// Removes both tokens. Clearing an empty store succeeds.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be updated.
    fn clear(&self) -> Result<()>;
}

/// Token store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store at the default location (`${TASKDESK_HOME}/session.json`).
    pub fn new() -> Self {
        Self::at(paths::session_path())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session from {}", self.path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session from {}", self.path.display()))
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(entries).context("Failed to serialize session")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        Ok(())
    }
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, kind: TokenKind) -> Option<String> {
        match self.load() {
            Ok(mut entries) => entries.remove(kind.key()).filter(|t| !t.is_empty()),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "Ignoring unreadable session file");
                None
            }
        }
    }

    fn set(&self, tokens: &TokenPair) -> Result<()> {
        let entries = HashMap::from([
            (ACCESS_TOKEN_KEY.to_string(), tokens.access_token.clone()),
            (REFRESH_TOKEN_KEY.to_string(), tokens.refresh_token.clone()),
        ]);
        self.save(&entries)
    }

    fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove {}", self.path.display()))
    }
}

/// In-process token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<&'static str, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: &TokenPair) -> Self {
        let store = Self::default();
        store.write(tokens);
        store
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, tokens: &TokenPair) {
        let mut entries = self.lock();
        entries.insert(ACCESS_TOKEN_KEY, tokens.access_token.clone());
        entries.insert(REFRESH_TOKEN_KEY, tokens.refresh_token.clone());
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, kind: TokenKind) -> Option<String> {
        self.lock().get(kind.key()).cloned()
    }

    fn set(&self, tokens: &TokenPair) -> Result<()> {
        self.write(tokens);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}

/// Returns a masked version of a token for display (first 8 chars + ...).
pub fn mask_token(token: &str) -> String {
    match token.char_indices().nth(8) {
        Some((idx, _)) if token.chars().count() > 12 => format!("{}...", &token[..idx]),
        _ => "***".to_string(),
    }
}
