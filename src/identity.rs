//! Persisted local player identity, the process-wide value set at login.

use std::{fs, io::ErrorKind, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// File-backed store for the single local player identity.
///
/// The identity is written once at login and read at every session start.
/// A missing file is not an error: the session degrades to an
/// unauthenticated observer instead of failing outright.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    player_id: String,
}

impl IdentityStore {
    /// Create a store reading and writing the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the persisted player id, if any.
    ///
    /// A corrupt or unreadable file degrades to `None` with a warning so a
    /// broken identity never blocks the client from running as an observer.
    pub fn load(&self) -> Option<String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read identity file");
                return None;
            }
        };

        match serde_json::from_str::<StoredIdentity>(&contents) {
            Ok(identity) if !identity.player_id.is_empty() => Some(identity.player_id),
            Ok(_) => None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to parse identity file");
                None
            }
        }
    }

    /// Persist the player id issued by the server at login.
    pub fn save(&self, player_id: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let identity = StoredIdentity {
            player_id: player_id.to_string(),
        };
        let contents =
            serde_json::to_string_pretty(&identity).expect("identity serialization cannot fail");
        fs::write(&self.path, contents)?;
        info!(path = %self.path.display(), "saved player identity");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("quiz-party-identity-{name}-{}", std::process::id()))
    }

    #[test]
    fn load_returns_none_when_file_is_missing() {
        let store = IdentityStore::new(temp_path("missing"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = temp_path("round-trip");
        let store = IdentityStore::new(path.clone());
        store.save("user-42").unwrap();
        assert_eq!(store.load(), Some("user-42".to_string()));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_degrades_to_none() {
        let path = temp_path("corrupt");
        fs::write(&path, "not json").unwrap();
        let store = IdentityStore::new(path.clone());
        assert_eq!(store.load(), None);
        let _ = fs::remove_file(path);
    }
}
