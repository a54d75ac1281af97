//! JSON settings document and its on-disk store.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::{domain::UserId, errors::Error, users::User, Result};

pub const DEFAULT_SILENCE_TIMEOUT_MINUTES: u64 = 60;
/// One year.
pub const MAX_SILENCE_TIMEOUT_MINUTES: u64 = 365 * 24 * 60;

/// The persisted settings document.
///
/// Processor configuration blocks sit next to the bot keys, one top-level key
/// per processor scope (see [`scope_key`]). Keys nobody claims survive a
/// load/save cycle untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsDocument {
    pub secure_token: String,
    pub recover_old_updates: bool,
    pub command_word: String,
    pub process_group_messages: bool,
    pub silence_timeout_minutes: u64,
    #[serde(rename = "ownerID")]
    pub owner_id: UserId,
    pub users: Vec<User>,
    #[serde(flatten)]
    pub scopes: BTreeMap<String, serde_json::Value>,
}

impl Default for SettingsDocument {
    fn default() -> Self {
        Self {
            secure_token: String::new(),
            recover_old_updates: false,
            command_word: String::new(),
            process_group_messages: false,
            silence_timeout_minutes: DEFAULT_SILENCE_TIMEOUT_MINUTES,
            owner_id: UserId(0),
            users: Vec::new(),
            scopes: BTreeMap::new(),
        }
    }
}

/// Top-level key of a processor's block: the scope with its first letter upper-cased.
pub fn scope_key(scope: &str) -> String {
    let mut chars = scope.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Reads and writes the settings file. Writes are serialized.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Relative paths are resolved against the running executable's directory.
    pub fn new(filename: impl AsRef<Path>) -> Result<Self> {
        let filename = filename.as_ref();
        if filename.as_os_str().is_empty() {
            return Err(Error::InvalidPath {
                path: filename.to_path_buf(),
                reason: "empty settings filename".to_string(),
            });
        }

        let path = if filename.is_absolute() {
            filename.to_path_buf()
        } else {
            let exe = std::env::current_exe()?;
            let dir = exe.parent().ok_or_else(|| Error::InvalidPath {
                path: exe.clone(),
                reason: "executable has no parent directory".to_string(),
            })?;
            dir.join(filename)
        };

        info!(path = %path.display(), "settings file");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<SettingsDocument> {
        info!("load settings");
        let txt = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", self.path.display()))
        })?;
        if txt.trim().is_empty() || txt.trim() == "null" {
            return Err(Error::Config(format!(
                "null settings in {}",
                self.path.display()
            )));
        }
        let doc: SettingsDocument = serde_json::from_str(&txt)?;
        if doc.silence_timeout_minutes > MAX_SILENCE_TIMEOUT_MINUTES {
            return Err(Error::Config(format!(
                "silenceTimeoutMinutes {} exceeds {MAX_SILENCE_TIMEOUT_MINUTES}",
                doc.silence_timeout_minutes
            )));
        }
        Ok(doc)
    }

    pub async fn save(&self, doc: &SettingsDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)?;
        let _guard = self.write_lock.lock().await;
        info!("save settings");
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Write a fresh document with default values, overwriting any file.
    pub async fn create_blank(&self) -> Result<()> {
        info!(path = %self.path.display(), "create a blank config file");
        self.save(&SettingsDocument::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Role;
    use serde_json::json;

    #[test]
    fn scope_key_capitalizes_first_letter() {
        assert_eq!(scope_key("myscope"), "Myscope");
        assert_eq!(scope_key("Already"), "Already");
        assert_eq!(scope_key(""), "");
    }

    #[test]
    fn document_keeps_scopes_and_defaults() {
        let doc: SettingsDocument = serde_json::from_value(json!({
            "secureToken": "tok",
            "ownerID": 9,
            "users": [{"id": 9, "username": "own", "role": "owner"}],
            "Myscope": {"foo": 1, "bar": "x"}
        }))
        .unwrap();

        assert_eq!(doc.secure_token, "tok");
        assert_eq!(doc.owner_id, UserId(9));
        assert_eq!(doc.silence_timeout_minutes, DEFAULT_SILENCE_TIMEOUT_MINUTES);
        assert_eq!(doc.users[0].role, Role::Owner);
        assert_eq!(doc.scopes["Myscope"], json!({"foo": 1, "bar": "x"}));

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["Myscope"]["foo"], 1);
        assert_eq!(back["commandWord"], "");
        assert!(back.get("scopes").is_none());
    }

    #[tokio::test]
    async fn blank_file_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        store.create_blank().await.unwrap();

        let doc = store.load().await.unwrap();
        assert_eq!(doc, SettingsDocument::default());
    }

    #[tokio::test]
    async fn load_reports_missing_and_null_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("missing.json")).unwrap();
        assert!(matches!(store.load().await, Err(Error::Config(_))));

        std::fs::write(store.path(), "null").unwrap();
        assert!(matches!(store.load().await, Err(Error::Config(_))));

        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load().await, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn load_rejects_oversized_silence_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        let doc = json!({"silenceTimeoutMinutes": MAX_SILENCE_TIMEOUT_MINUTES + 1});
        std::fs::write(store.path(), doc.to_string()).unwrap();
        assert!(matches!(store.load().await, Err(Error::Config(_))));

        let doc = json!({"silenceTimeoutMinutes": MAX_SILENCE_TIMEOUT_MINUTES});
        std::fs::write(store.path(), doc.to_string()).unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.silence_timeout_minutes, MAX_SILENCE_TIMEOUT_MINUTES);
    }

    #[test]
    fn relative_paths_resolve_next_to_executable() {
        let store = SettingsStore::new("settings.bot.json").unwrap();
        let exe_dir = std::env::current_exe().unwrap().parent().unwrap().to_path_buf();
        assert_eq!(store.path(), exe_dir.join("settings.bot.json"));
        assert!(SettingsStore::new("").is_err());
    }
}
