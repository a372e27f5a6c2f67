use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, RwLock},
};

use {anyhow::Result, tempfile::NamedTempFile, tracing::debug};

use crate::types::OAuthTokens;

/// Per-user token persistence. At most one token set is kept per user.
pub trait CredentialStore: Send + Sync {
    fn load(&self, user: &str) -> Option<OAuthTokens>;
    /// Store `tokens` for `user`, replacing whatever was there.
    fn save(&self, user: &str, tokens: &OAuthTokens) -> Result<()>;
    /// Remove the user's tokens. Removing an absent entry is not an error.
    fn delete(&self, user: &str) -> Result<()>;
    fn list(&self) -> Vec<String>;
}

/// File-based token storage, by default at `~/.snowgate/oauth_tokens.json`.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file.
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new() -> Self {
        Self::with_path(snowgate_config::data_dir().join("oauth_tokens.json"))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_map(&self) -> Option<HashMap<String, OAuthTokens>> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Replace the file atomically: readers see the old map or the new one,
    /// never a truncated file.
    fn write_map(&self, map: &HashMap<String, OAuthTokens>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;

        let data = serde_json::to_string_pretty(map)?;
        let mut tmp = NamedTempFile::new_in(parent)?;

        // Set file permissions to 0600 on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        tmp.write_all(data.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Default for FileTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for FileTokenStore {
    fn load(&self, user: &str) -> Option<OAuthTokens> {
        self.read_map()?.remove(user)
    }

    fn save(&self, user: &str, tokens: &OAuthTokens) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map().unwrap_or_default();
        map.insert(user.to_string(), tokens.clone());
        self.write_map(&map)?;
        debug!(path = %self.path.display(), "saved oauth tokens");
        Ok(())
    }

    fn delete(&self, user: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(_) => return Ok(()),
        };

        let mut map: HashMap<String, OAuthTokens> = serde_json::from_str(&data)?;
        if map.remove(user).is_some() {
            self.write_map(&map)?;
            debug!(path = %self.path.display(), "deleted oauth tokens");
        }
        Ok(())
    }

    fn list(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .read_map()
            .map(|m| m.into_keys().collect())
            .unwrap_or_default();
        users.sort();
        users
    }
}

/// In-process token storage. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, OAuthTokens>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryTokenStore {
    fn load(&self, user: &str) -> Option<OAuthTokens> {
        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user)
            .cloned()
    }

    fn save(&self, user: &str, tokens: &OAuthTokens) -> Result<()> {
        self.tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user.to_string(), tokens.clone());
        Ok(())
    }

    fn delete(&self, user: &str) -> Result<()> {
        self.tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(user);
        Ok(())
    }

    fn list(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        users.sort();
        users
    }
}
