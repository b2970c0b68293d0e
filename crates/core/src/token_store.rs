//! File-backed clearance token cache.
//!
//! One JSON object maps the URL/domain used at acquisition time to an ordered
//! array of token snapshots, oldest first. The file is appended to between
//! runs, never rewritten destructively; readers always take the most recent
//! snapshot for their domain.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::HarvestError;
use crate::types::{ClearanceToken, TokenSnapshot};

#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the most recent usable token.
    ///
    /// Key selection: the first key containing `domain_hint` as a substring
    /// wins; with no match, the first key in file order is used. Within the
    /// chosen key the last snapshot is returned. Downstream behavior depends
    /// on this exact rule, including the file-order fallback.
    pub fn load(&self, domain_hint: &str) -> Result<ClearanceToken, HarvestError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            HarvestError::CredentialMissing(format!("{}: {}", self.path.display(), e))
        })?;

        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| HarvestError::CorruptTokenFile(e.to_string()))?;
        let map = value.as_object().ok_or_else(|| {
            HarvestError::CorruptTokenFile("top level is not an object".to_string())
        })?;

        let key = map
            .keys()
            .find(|k| k.contains(domain_hint))
            .or_else(|| map.keys().next())
            .ok_or_else(|| HarvestError::CredentialMissing("token file has no entries".to_string()))?
            .clone();

        let snapshots: Vec<TokenSnapshot> = serde_json::from_value(map[&key].clone())
            .map_err(|e| HarvestError::CorruptTokenFile(format!("entry {key}: {e}")))?;

        let latest = snapshots.last().ok_or_else(|| {
            HarvestError::CredentialMissing(format!("no snapshots recorded for {key}"))
        })?;

        debug!(key = %key, snapshots = snapshots.len(), "loaded clearance token");
        ClearanceToken::from_snapshot(&key, latest)
    }

    /// Append a snapshot to the sequence for `key`, creating the file and the
    /// key as needed. The write goes through a temp file and a rename so a
    /// reader never observes a partially written file.
    pub fn append_and_save(&self, key: &str, snapshot: &TokenSnapshot) -> Result<(), HarvestError> {
        let mut map = match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                _ => {
                    warn!(path = %self.path.display(), "existing token file unreadable, starting fresh");
                    serde_json::Map::new()
                }
            },
            Err(_) => serde_json::Map::new(),
        };

        let snapshot_value = serde_json::to_value(snapshot)
            .map_err(|e| HarvestError::Storage(e.to_string()))?;
        match map
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(items) => items.push(snapshot_value),
            other => *other = Value::Array(vec![snapshot_value]),
        }

        let serialized = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| HarvestError::Storage(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized)
            .map_err(|e| HarvestError::Storage(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| HarvestError::Storage(format!("{}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), key = %key, "appended token snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CookieRecord, CLEARANCE_COOKIE};

    fn snapshot(value: &str, user_agent: &str) -> TokenSnapshot {
        TokenSnapshot {
            cookies: vec![CookieRecord {
                name: CLEARANCE_COOKIE.to_string(),
                value: value.to_string(),
                domain: ".example.com".to_string(),
                path: "/".to_string(),
                expires: 1_900_000_000_000.0,
                secure: true,
                http_only: true,
            }],
            user_agent: user_agent.to_string(),
            expires: "8 hours, 0 minutes and 0 seconds".to_string(),
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(dir.path().join("tokens.json"))
    }

    #[test]
    fn load_returns_last_snapshot_of_hint_matched_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.append_and_save("https://other.net/", &snapshot("old", "agent-a")).unwrap();
        store.append_and_save("https://www.example.com/", &snapshot("first", "agent-b")).unwrap();
        store.append_and_save("https://www.example.com/", &snapshot("second", "agent-c")).unwrap();

        let token = store.load("example.com").unwrap();
        assert_eq!(token.value, "second");
        assert_eq!(token.client_identity, "agent-c");
    }

    #[test]
    fn load_falls_back_to_first_declared_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.append_and_save("https://first.net/", &snapshot("from-first", "agent-a")).unwrap();
        store.append_and_save("https://second.net/", &snapshot("from-second", "agent-b")).unwrap();

        let token = store.load("nomatch.example").unwrap();
        assert_eq!(token.value, "from-first");
    }

    #[test]
    fn load_missing_file_is_credential_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let err = store.load("example.com").unwrap_err();
        assert!(matches!(err, HarvestError::CredentialMissing(_)));
    }

    #[test]
    fn load_empty_sequence_is_credential_missing_not_partial_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"https://www.example.com/": []}"#).unwrap();

        let err = store.load("example.com").unwrap_err();
        assert!(matches!(err, HarvestError::CredentialMissing(_)));
    }

    #[test]
    fn load_without_clearance_cookie_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{"https://www.example.com/": [{
                "cookies": [{"name": "session", "value": "x", "domain": ".example.com", "expires": 0.0}],
                "user_agent": "agent",
                "expires": ""
            }]}"#,
        )
        .unwrap();

        let err = store.load("example.com").unwrap_err();
        assert!(matches!(err, HarvestError::MalformedToken(_)));
    }

    #[test]
    fn load_corrupt_json_is_corrupt_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{not json").unwrap();

        let err = store.load("example.com").unwrap_err();
        assert!(matches!(err, HarvestError::CorruptTokenFile(_)));
    }

    #[test]
    fn append_keeps_prior_snapshots_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let key = "https://www.example.com/";

        store.append_and_save(key, &snapshot("one", "agent-a")).unwrap();
        store.append_and_save(key, &snapshot("two", "agent-b")).unwrap();
        store.append_and_save(key, &snapshot("three", "agent-c")).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        let entries = value[key].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["cookies"][0]["value"], "one");
        assert_eq!(entries[2]["cookies"][0]["value"], "three");

        let token = store.load("example.com").unwrap();
        assert_eq!(token.value, "three");
    }

    #[test]
    fn append_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.append_and_save("https://www.example.com/", &snapshot("one", "agent-a")).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["tokens.json".to_string()]);
    }
}
