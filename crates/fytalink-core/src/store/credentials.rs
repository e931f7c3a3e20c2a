use std::path::Path;

use tracing::debug;

use super::JsonFile;
use crate::error::CoreError;
use crate::model::Credentials;

pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Owns `<config_home>/credentials.json`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    file: JsonFile,
}

impl CredentialStore {
    pub fn new(config_home: &Path) -> Self {
        Self {
            file: JsonFile::new(config_home.join(CREDENTIALS_FILE)),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), CoreError> {
        self.file.save(credentials)?;
        debug!(path = %self.path().display(), "credentials saved");
        Ok(())
    }

    pub fn load(&self) -> Result<Option<Credentials>, CoreError> {
        self.file.load()
    }

    pub fn remove(&self) -> Result<(), CoreError> {
        self.file.remove()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(&dir.path().join("nested"));

        let mut creds = Credentials::new("ann@example.com", "hunter2");
        creds.access_token = Some("tok".into());
        creds.token_expires_at = Some(1_700_000_000_000);
        creds.poll_interval_secs = Some(120);

        store.save(&creds).unwrap();
        assert_eq!(store.load().unwrap(), Some(creds));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        assert_eq!(store.load().unwrap(), None);
        store.remove().unwrap();
    }

    #[test]
    fn corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CREDENTIALS_FILE), "{ not json").unwrap();
        let store = CredentialStore::new(dir.path());
        assert!(matches!(store.load(), Err(CoreError::Parse { .. })));
    }

    #[test]
    fn uncreatable_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let store = CredentialStore::new(&blocker.join("sub"));

        let result = store.save(&Credentials::new("a", "b"));
        assert!(matches!(result, Err(CoreError::Io { .. })));
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&Credentials::new("a", "b")).unwrap();
        store.remove().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
