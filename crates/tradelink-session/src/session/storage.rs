/*
[INPUT]:  User record and token triad; a key/value backend
[OUTPUT]: Durable session entries restored at boot
[POS]:    Session layer - persistence of the four session artifacts
[UPDATE]: When persisted keys, value encoding or backends change
*/

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::types::{TokenTriad, User};

pub const USER_KEY: &str = "session.user";
pub const ACCESS_TOKEN_KEY: &str = "session.accessToken";
pub const REFRESH_TOKEN_KEY: &str = "session.refreshToken";
pub const TOKEN_ID_KEY: &str = "session.tokenId";

const SESSION_KEYS: [&str; 4] = [USER_KEY, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_ID_KEY];

/// Minimal string key/value backend. Keys are independent; no transactions.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| io::Error::other("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// One file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Get the file path backing `key`
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        let path = self.entry_path(key);
        fs::write(&path, value)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.entry_path(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// Restored session entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub user: User,
    pub tokens: TokenTriad,
}

/// Session-shaped view over a [`KeyValueStore`]
#[derive(Clone)]
pub struct SessionStorage {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SessionStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStorage").finish_non_exhaustive()
    }
}

impl SessionStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Write all four entries. Each key is attempted even if an earlier one fails.
    pub fn save(&self, user: &User, tokens: &TokenTriad) -> io::Result<()> {
        let user_result = self.save_user(user);
        let tokens_result = self.save_tokens(tokens);
        user_result.and(tokens_result)
    }

    pub fn save_user(&self, user: &User) -> io::Result<()> {
        let record = serde_json::to_string(user)?;
        self.store.set(USER_KEY, &record)
    }

    /// Replace the triad entries, attempting every key and returning the first error
    pub fn save_tokens(&self, tokens: &TokenTriad) -> io::Result<()> {
        let entries = [
            (ACCESS_TOKEN_KEY, tokens.access_token.as_str()),
            (REFRESH_TOKEN_KEY, tokens.refresh_token.as_str()),
            (TOKEN_ID_KEY, tokens.token_id.as_str()),
        ];
        let mut first_error = None;
        for (key, value) in entries {
            if let Err(err) = self.store.set(key, value) {
                warn!(key, error = %err, "failed to write session entry");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Restore a session if every entry is present and the user record parses.
    ///
    /// A user record that fails to parse clears all entries. Read failures
    /// count as absent.
    pub fn load(&self) -> Option<StoredSession> {
        let read = |key: &str| match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                warn!(key, error = %err, "failed to read session entry");
                None
            }
        };

        let record = read(USER_KEY);
        let access_token = read(ACCESS_TOKEN_KEY);
        let refresh_token = read(REFRESH_TOKEN_KEY);
        let token_id = read(TOKEN_ID_KEY);

        let (Some(record), Some(access_token), Some(refresh_token), Some(token_id)) =
            (record, access_token, refresh_token, token_id)
        else {
            debug!("no complete persisted session");
            return None;
        };

        let user = match serde_json::from_str::<User>(&record) {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "persisted user record is malformed, clearing session");
                if let Err(err) = self.clear() {
                    warn!(error = %err, "failed to clear malformed session");
                }
                return None;
            }
        };

        Some(StoredSession {
            user,
            tokens: TokenTriad {
                access_token,
                refresh_token,
                token_id,
            },
        })
    }

    /// Remove all four entries, attempting every key even if one fails
    pub fn clear(&self) -> io::Result<()> {
        let mut first_error = None;
        for key in SESSION_KEYS {
            if let Err(err) = self.store.remove(key) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
