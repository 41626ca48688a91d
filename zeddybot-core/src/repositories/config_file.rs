//! Credential store backed by the bot's JSON config file.
//!
//! The record shares the file with every other setting. A save reads the
//! current document, replaces only the credential keys and renames a fully
//! written temp file over the original.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

use zeddybot_common::models::CredentialRecord;
use zeddybot_common::traits::CredentialStore;

use crate::Error;

pub const ACCESS_TOKEN_KEY: &str = "twitch_bot_access_token";
pub const REFRESH_TOKEN_KEY: &str = "twitch_bot_refresh_token";
pub const ISSUED_AT_KEY: &str = "twitch_bot_token_issued_at";
pub const SCOPES_KEY: &str = "twitch_bot_scopes";

pub struct ConfigFileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigFileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_document(path: &Path) -> Result<Map<String, Value>, Error> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(Error::Io(e)),
    };
    match serde_json::from_str::<Value>(&raw)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Config(format!(
            "{} must hold a JSON object, found {}",
            path.display(),
            kind_of(&other)
        ))),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn record_from_document(doc: &Map<String, Value>) -> Option<CredentialRecord> {
    let access_token = doc
        .get(ACCESS_TOKEN_KEY)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?
        .to_string();
    let refresh_token = doc
        .get(REFRESH_TOKEN_KEY)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    // A record written by hand has no timestamp; treat it as ancient so the
    // proactive refresh task picks it up.
    let issued_at = doc
        .get(ISSUED_AT_KEY)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let scopes = doc
        .get(SCOPES_KEY)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(CredentialRecord {
        access_token,
        refresh_token,
        issued_at,
        scopes,
    })
}

fn write_document_atomically(path: &Path, doc: &Map<String, Value>) -> Result<(), Error> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let body = serde_json::to_string_pretty(doc)?;

    // Same directory so the final rename never crosses filesystems.
    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(body.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl CredentialStore for ConfigFileCredentialStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, Error> {
        let path = self.path.clone();
        let doc = tokio::task::spawn_blocking(move || read_document(&path))
            .await
            .map_err(|e| Error::Platform(format!("credential load task failed: {e}")))??;
        Ok(record_from_document(&doc))
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        let path = self.path.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || {
            let mut doc = read_document(&path)?;
            doc.insert(ACCESS_TOKEN_KEY.into(), Value::String(record.access_token));
            doc.insert(REFRESH_TOKEN_KEY.into(), Value::String(record.refresh_token));
            doc.insert(ISSUED_AT_KEY.into(), Value::String(record.issued_at.to_rfc3339()));
            doc.insert(
                SCOPES_KEY.into(),
                Value::Array(record.scopes.into_iter().map(Value::String).collect()),
            );
            write_document_atomically(&path, &doc)
        })
        .await
        .map_err(|e| Error::Platform(format!("credential save task failed: {e}")))??;

        info!("Persisted refreshed bot credential to {}", self.path.display());
        debug!("Credential keys rewritten: {ACCESS_TOKEN_KEY}, {REFRESH_TOKEN_KEY}, {ISSUED_AT_KEY}, {SCOPES_KEY}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(body: &str) -> (tempfile::TempDir, ConfigFileCredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, body).unwrap();
        let store = ConfigFileCredentialStore::new(path);
        (dir, store)
    }

    #[tokio::test]
    async fn test_load_absent_token_is_none() {
        let (_dir, store) = store_with(r#"{ "disc_token": "x" }"#);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_hand_written_record_has_epoch_issued_at() {
        let (_dir, store) = store_with(r#"{
            "twitch_bot_access_token": "A1",
            "twitch_bot_refresh_token": "R1"
        }"#);
        let rec = store.load().await.unwrap().unwrap();
        assert_eq!(rec.access_token, "A1");
        assert_eq!(rec.refresh_token, "R1");
        assert_eq!(rec.issued_at, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_save_preserves_unrelated_fields() {
        let (_dir, store) = store_with(r#"{
            "disc_token": "discord-secret",
            "watchlist": ["zeddy", "friend"],
            "obs": { "port": 4455 },
            "twitch_bot_access_token": "A1",
            "twitch_bot_refresh_token": "R1"
        }"#);

        let mut rec = CredentialRecord::new("A2", "R2");
        rec.scopes = vec!["chat:edit".into(), "chat:read".into()];
        store.save(&rec).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["disc_token"], "discord-secret");
        assert_eq!(doc["watchlist"][1], "friend");
        assert_eq!(doc["obs"]["port"], 4455);
        assert_eq!(doc[ACCESS_TOKEN_KEY], "A2");
        assert_eq!(doc[REFRESH_TOKEN_KEY], "R2");

        let back = store.load().await.unwrap().unwrap();
        assert_eq!(back, rec);
    }

    #[tokio::test]
    async fn test_save_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigFileCredentialStore::new(dir.path().join("fresh.json"));
        store.save(&CredentialRecord::new("A", "R")).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().access_token, "A");
    }

    #[tokio::test]
    async fn test_non_object_document_is_rejected() {
        let (_dir, store) = store_with("[1, 2, 3]");
        let err = store.load().await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
