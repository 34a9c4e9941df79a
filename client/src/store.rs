//! Local credential cache, one token file per username.
//!
//! Default location: `~/.config/salsa/credentials/<username>.token`.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Where the client keeps credentials between runs.
pub trait CredentialStore {
    fn load(&self, username: &str) -> Result<Option<String>>;
    fn save(&self, username: &str, token: &str) -> Result<()>;
}

pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the user's config directory.
    pub fn default_location() -> Self {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("salsa")
            .join("credentials");
        Self::new(dir)
    }

    pub fn path_for(&self, username: &str) -> Result<PathBuf> {
        validate_username(username)?;
        Ok(self.dir.join(format!("{username}.token")))
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, username: &str) -> Result<Option<String>> {
        let path = self.path_for(username)?;
        if !path.exists() {
            return Ok(None);
        }
        let token = std::fs::read_to_string(&path)
            .with_context(|| format!("can't read {}", path.display()))?;
        let token = token.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    fn save(&self, username: &str, token: &str) -> Result<()> {
        let path = self.path_for(username)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("can't create {}", self.dir.display()))?;
        std::fs::write(&path, token).with_context(|| format!("can't write {}", path.display()))?;
        Ok(())
    }
}

/// Usernames become file names, so keep them to a safe alphabet.
fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        bail!("username must not be empty");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        || username.starts_with('.')
    {
        bail!("username {username:?} may only contain letters, digits, '-', '_' and '.'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(tmp.path().join("creds"));

        assert_eq!(store.load("alice").unwrap(), None);
        store.save("alice", "token-a").unwrap();
        store.save("bob", "token-b").unwrap();

        assert_eq!(store.load("alice").unwrap().as_deref(), Some("token-a"));
        assert_eq!(store.load("bob").unwrap().as_deref(), Some("token-b"));
    }

    #[test]
    fn test_blank_file_counts_as_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(tmp.path());
        std::fs::write(tmp.path().join("alice.token"), "\n").unwrap();
        assert_eq!(store.load("alice").unwrap(), None);
    }

    #[test]
    fn test_rejects_path_like_usernames() {
        let store = FileCredentialStore::new("/nonexistent");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("a/b").is_err());
        assert!(store.path_for(".hidden").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("alice_01.x").is_ok());
    }
}
