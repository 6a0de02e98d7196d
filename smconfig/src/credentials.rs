use crate::{Result, APP_NAME};
use smctf::{AuthState, AuthUser, CredentialStore, MemoryCredentialStore, TokenPair};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

const AUTH_CONFIG_NAME: &str = "auth";

/// Session store backed by a file next to the config.
///
/// Every mutation is written through. A failed write is logged and the
/// in-memory session stays authoritative for the rest of the process.
#[derive(Debug)]
pub struct PersistentCredentialStore {
    path: PathBuf,
    inner: MemoryCredentialStore,
    write_lock: Mutex<()>,
}

impl PersistentCredentialStore {
    /// Opens the store at the standard OS location.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or deserialized.
    pub fn open() -> Result<Self> {
        let path = confy::get_configuration_file_path(APP_NAME, Some(AUTH_CONFIG_NAME))?;
        Self::open_path(path)
    }

    /// # Errors
    /// Returns an error if the file exists but cannot be read or deserialized.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state: AuthState = confy::load_path(&path)?;
        Ok(Self {
            path,
            inner: MemoryCredentialStore::with_state(state),
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_through(&self, mutate: impl FnOnce(&MemoryCredentialStore)) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        mutate(&self.inner);
        if let Err(err) = confy::store_path(&self.path, self.inner.snapshot()) {
            warn!(path = %self.path.display(), error = %err, "failed to persist session");
        }
    }
}

impl CredentialStore for PersistentCredentialStore {
    fn read(&self) -> Option<TokenPair> {
        self.inner.read()
    }

    fn replace(&self, tokens: TokenPair) {
        self.write_through(|inner| inner.replace(tokens));
    }

    fn user(&self) -> Option<AuthUser> {
        self.inner.user()
    }

    fn set_user(&self, user: Option<AuthUser>) {
        self.write_through(|inner| inner.set_user(user));
    }

    fn clear(&self) {
        self.write_through(MemoryCredentialStore::clear);
    }
}
