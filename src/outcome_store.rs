use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::{AuthError, OutcomeMessage};

/// Same-origin storage where a callback page without an opener leaves its
/// outcome for the application to pick up on its next load.
pub trait OutcomeStore: Send + Sync {
    fn save(&self, outcome: &OutcomeMessage) -> Result<(), AuthError>;

    /// Removes and returns the stored outcome, if any.
    fn take(&self) -> Result<Option<OutcomeMessage>, AuthError>;
}

#[derive(Debug, Default)]
pub struct InMemoryOutcomeStore {
    inner: Mutex<Option<OutcomeMessage>>,
}

impl InMemoryOutcomeStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl OutcomeStore for InMemoryOutcomeStore {
    fn save(&self, outcome: &OutcomeMessage) -> Result<(), AuthError> {
        *self.inner.lock().map_err(storage_poisoned)? = Some(outcome.clone());
        Ok(())
    }

    fn take(&self) -> Result<Option<OutcomeMessage>, AuthError> {
        Ok(self.inner.lock().map_err(storage_poisoned)?.take())
    }
}

/// Keeps the pending outcome as a JSON file.
#[derive(Debug, Clone)]
pub struct FileOutcomeStore {
    path: PathBuf,
}

impl FileOutcomeStore {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OutcomeStore for FileOutcomeStore {
    fn save(&self, outcome: &OutcomeMessage) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(outcome).map_err(|err| AuthError::Storage {
            message: err.to_string(),
        })?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn take(&self) -> Result<Option<OutcomeMessage>, AuthError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        fs::remove_file(&self.path)?;

        match serde_json::from_slice(&bytes) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(err) => {
                tracing::warn!(?err, path = %self.path.display(), "Dropping unreadable stored outcome.");
                Ok(None)
            }
        }
    }
}

fn storage_poisoned<T>(_: std::sync::PoisonError<T>) -> AuthError {
    AuthError::Storage {
        message: "outcome store lock poisoned".to_string(),
    }
}
