//! Token stores
//!
//! `MemoryTokenStore` is the process-wide store shared by every component of a
//! running client. `FileTokenStore` keeps the session across runs of the CLI.

use sourcing_core::{storage_error, Session, SourcingError, SourcingResult, TokenStore};
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// In-memory token store; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<RwLock<Option<Session>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a session
    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(session))),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> SourcingResult<Option<Session>> {
        Ok(self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &Session) -> SourcingResult<()> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> SourcingResult<()> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file holding `accessToken` and `refreshToken`
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path)?;
        file.write_all(contents)?;
        file.sync_all()
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> SourcingResult<Option<Session>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(storage_error!(
                    format!("Failed to read session file {}: {}", self.path.display(), e),
                    "file_token_store",
                    e
                ))
            }
        };

        // A damaged file means no usable session, not a crash
        match serde_json::from_str::<Session>(&contents) {
            Ok(session) if !session.access_token.is_empty() => Ok(Some(session)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    fn save(&self, session: &Session) -> SourcingResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                storage_error!(
                    format!("Failed to create {}: {}", parent.display(), e),
                    "file_token_store",
                    e
                )
            })?;
        }

        let contents = serde_json::to_vec_pretty(session).map_err(SourcingError::Serialization)?;
        let temp = self.temp_path();
        Self::write_private(&temp, &contents)
            .and_then(|_| fs::rename(&temp, &self.path))
            .map_err(|e| {
                storage_error!(
                    format!("Failed to write session file {}: {}", self.path.display(), e),
                    "file_token_store",
                    e
                )
            })?;

        debug!(path = %self.path.display(), "Session written");
        Ok(())
    }

    fn clear(&self) -> SourcingResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error!(
                format!("Failed to remove session file {}: {}", self.path.display(), e),
                "file_token_store",
                e
            )),
        }
    }
}
