// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable storage of usage records, one JSON file per user.
//!
//! Files live at `<data_dir>/<user_id>.json` and use the layout
//! `{"UserName": "...", "UsageHistory": {"ChatCost": {"YYYY-MM-DD": cost}}}`.
//! Writes go to a sibling `.json.tmp` file which is then renamed over the
//! target, so readers never observe a half-written ledger.
//!
//! Every file operation for a user holds that user's async file lock. The
//! lock also tracks the newest snapshot revision written, which lets
//! [`UsageFiles::save_revision`] drop snapshots that arrive out of order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tollgate_core::TollgateError;
use tracing::{debug, warn};

use crate::ledger::CostLedger;
use crate::record::UsageRecord;

/// Longest accepted user identifier.
const MAX_USER_ID_LEN: usize = 128;

/// On-disk layout of a usage file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UsageFile {
    #[serde(rename = "UserName", default)]
    user_name: String,
    #[serde(rename = "UsageHistory", default)]
    usage_history: UsageHistory,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsageHistory {
    // Older files may carry `null` here.
    #[serde(rename = "ChatCost", default)]
    chat_cost: Option<CostLedger>,
}

impl UsageFile {
    fn from_record(record: &UsageRecord) -> Self {
        Self {
            user_name: record.display_name.clone(),
            usage_history: UsageHistory {
                chat_cost: Some(record.ledger.clone()),
            },
        }
    }

    fn into_record(self, user_id: &str, fallback_name: &str) -> UsageRecord {
        let display_name = if self.user_name.is_empty() {
            fallback_name.to_string()
        } else {
            self.user_name
        };
        UsageRecord {
            user_id: user_id.to_string(),
            display_name,
            ledger: self.usage_history.chat_cost.unwrap_or_default(),
        }
    }
}

/// Result of loading a user's file.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The file existed and parsed.
    Loaded(UsageRecord),
    /// No file existed; an empty record was created and written.
    Created(UsageRecord),
    /// The file existed but could not be used. The record is empty and the
    /// file on disk is left as it was.
    Recovered {
        record: UsageRecord,
        error: TollgateError,
    },
}

impl LoadOutcome {
    pub fn record(&self) -> &UsageRecord {
        match self {
            Self::Loaded(record) | Self::Created(record) => record,
            Self::Recovered { record, .. } => record,
        }
    }

    pub fn into_record(self) -> UsageRecord {
        match self {
            Self::Loaded(record) | Self::Created(record) => record,
            Self::Recovered { record, .. } => record,
        }
    }

    /// Whether the on-disk file was unreadable.
    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::Recovered { .. })
    }
}

/// Whether a revisioned save reached the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// A newer revision was already on disk.
    Stale,
}

/// Reject identifiers that cannot safely name a file.
pub fn validate_user_id(user_id: &str) -> Result<(), TollgateError> {
    let valid = !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && !user_id.starts_with('.')
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if valid {
        Ok(())
    } else {
        Err(TollgateError::InvalidUserId(user_id.to_string()))
    }
}

/// Per-user JSON files under one directory.
pub struct UsageFiles {
    dir: PathBuf,
    /// Per-user file locks guarding the last revision written.
    locks: DashMap<String, Arc<Mutex<u64>>>,
}

impl UsageFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `user_id`'s file, after validating the identifier.
    pub fn path_for(&self, user_id: &str) -> Result<PathBuf, TollgateError> {
        validate_user_id(user_id)?;
        Ok(self.dir.join(format!("{user_id}.json")))
    }

    fn lock_for(&self, user_id: &str) -> Arc<Mutex<u64>> {
        self.locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Load `user_id`'s record, creating the file if it does not exist.
    ///
    /// `display_name` is used for new records and for files without a name.
    pub async fn load(
        &self,
        user_id: &str,
        display_name: &str,
    ) -> Result<LoadOutcome, TollgateError> {
        let path = self.path_for(user_id)?;
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let record = UsageRecord::new(user_id, display_name);
                if let Err(e) = write_atomic(&path, &record).await {
                    warn!(user_id, error = %e, "failed to create usage file");
                }
                return Ok(LoadOutcome::Created(record));
            }
            Err(e) => return Err(TollgateError::storage(e)),
        };

        match parse_usage_file(&bytes) {
            Ok(file) => Ok(LoadOutcome::Loaded(file.into_record(user_id, display_name))),
            Err(source) => {
                let error = TollgateError::CorruptLedger {
                    path: path.clone(),
                    source,
                };
                warn!(user_id, error = %error, "usage file unreadable, starting from an empty ledger");
                Ok(LoadOutcome::Recovered {
                    record: UsageRecord::new(user_id, display_name),
                    error,
                })
            }
        }
    }

    /// Overwrite `record`'s file with its full contents.
    pub async fn save(&self, record: &UsageRecord) -> Result<(), TollgateError> {
        let path = self.path_for(&record.user_id)?;
        let lock = self.lock_for(&record.user_id);
        let _guard = lock.lock().await;
        write_atomic(&path, record).await
    }

    /// Write `record` unless a snapshot with a higher `revision` has already
    /// been written for this user.
    pub async fn save_revision(
        &self,
        record: &UsageRecord,
        revision: u64,
    ) -> Result<SaveOutcome, TollgateError> {
        let path = self.path_for(&record.user_id)?;
        let lock = self.lock_for(&record.user_id);
        let mut written = lock.lock().await;
        if revision <= *written {
            debug!(user_id = %record.user_id, revision, written = *written, "skipping stale snapshot");
            return Ok(SaveOutcome::Stale);
        }
        write_atomic(&path, record).await?;
        *written = revision;
        Ok(SaveOutcome::Written)
    }
}

fn parse_usage_file(bytes: &[u8]) -> Result<UsageFile, Box<dyn std::error::Error + Send + Sync>> {
    let file: UsageFile = serde_json::from_slice(bytes)?;
    let invalid = file
        .usage_history
        .chat_cost
        .as_ref()
        .and_then(CostLedger::find_invalid);
    if let Some((day, cost)) = invalid {
        return Err(format!("entry {day} has invalid cost {cost}").into());
    }
    Ok(file)
}

async fn write_atomic(path: &Path, record: &UsageRecord) -> Result<(), TollgateError> {
    let json = serde_json::to_vec_pretty(&UsageFile::from_record(record))
        .map_err(|e| TollgateError::Internal(format!("failed to serialize usage record: {e}")))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(TollgateError::storage)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(TollgateError::storage)?;
    set_owner_only(&tmp_path).await?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(TollgateError::storage)?;

    debug!(path = %path.display(), bytes = json.len(), "usage file written");
    Ok(())
}

#[cfg(unix)]
async fn set_owner_only(path: &Path) -> Result<(), TollgateError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(TollgateError::storage)
}

#[cfg(not(unix))]
async fn set_owner_only(_path: &Path) -> Result<(), TollgateError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn user_id_validation() {
        for ok in ["42", "-100123", "alice_w", "a.b@c"] {
            assert!(validate_user_id(ok).is_ok(), "{ok} should be valid");
        }
        for bad in ["", ".hidden", "../etc", "a/b", "a\\b", "a b"] {
            assert!(
                matches!(validate_user_id(bad), Err(TollgateError::InvalidUserId(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(validate_user_id(&"x".repeat(MAX_USER_ID_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let files = UsageFiles::new(dir.path());

        let outcome = files.load("42", "alice").await.unwrap();
        assert!(matches!(outcome, LoadOutcome::Created(_)));
        assert_eq!(outcome.record().display_name, "alice");
        assert!(dir.path().join("42.json").exists());

        let again = files.load("42", "ignored").await.unwrap();
        assert!(matches!(again, LoadOutcome::Loaded(_)));
        assert_eq!(again.record().display_name, "alice");
    }

    #[tokio::test]
    async fn save_writes_legacy_layout() {
        let dir = tempfile::tempdir().unwrap();
        let files = UsageFiles::new(dir.path());
        let mut record = UsageRecord::new("7", "bob");
        record.ledger.accumulate(day("2024-05-02"), 1.25).unwrap();

        files.save(&record).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("7.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["UserName"], "bob");
        assert_eq!(json["UsageHistory"]["ChatCost"]["2024-05-02"], 1.25);
        assert!(!dir.path().join("7.json.tmp").exists());
    }

    #[tokio::test]
    async fn null_history_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("9.json"),
            r#"{"UserName":"carol","UsageHistory":{"ChatCost":null},"Extra":true}"#,
        )
        .unwrap();
        let files = UsageFiles::new(dir.path());

        let record = match files.load("9", "").await.unwrap() {
            LoadOutcome::Loaded(record) => record,
            other => panic!("expected Loaded, got {other:?}"),
        };
        assert_eq!(record.display_name, "carol");
        assert!(record.ledger.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("5.json");
        std::fs::write(&path, "{not json").unwrap();
        let files = UsageFiles::new(dir.path());

        let outcome = files.load("5", "dave").await.unwrap();
        match &outcome {
            LoadOutcome::Recovered { record, error } => {
                assert!(record.ledger.is_empty());
                assert!(matches!(error, TollgateError::CorruptLedger { .. }));
            }
            other => panic!("expected Recovered, got {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[tokio::test]
    async fn negative_entry_is_treated_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("5.json"),
            r#"{"UserName":"x","UsageHistory":{"ChatCost":{"2024-01-01":-3.0}}}"#,
        )
        .unwrap();
        let files = UsageFiles::new(dir.path());

        assert!(files.load("5", "x").await.unwrap().is_recovered());
    }

    #[tokio::test]
    async fn stale_revision_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let files = UsageFiles::new(dir.path());
        let mut newer = UsageRecord::new("3", "eve");
        newer.ledger.accumulate(day("2024-01-01"), 2.0).unwrap();
        let mut older = UsageRecord::new("3", "eve");
        older.ledger.accumulate(day("2024-01-01"), 1.0).unwrap();

        assert_eq!(files.save_revision(&newer, 2).await.unwrap(), SaveOutcome::Written);
        assert_eq!(files.save_revision(&older, 1).await.unwrap(), SaveOutcome::Stale);

        let reloaded = files.load("3", "eve").await.unwrap().into_record();
        assert_eq!(reloaded.ledger.total(), 2.0);
    }

    #[tokio::test]
    async fn invalid_user_id_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let files = UsageFiles::new(dir.path().join("usage"));

        let err = files.load("../escape", "x").await.unwrap_err();
        assert!(matches!(err, TollgateError::InvalidUserId(_)));
        assert!(!dir.path().join("escape.json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let files = UsageFiles::new(dir.path());
        files.save(&UsageRecord::new("1", "f")).await.unwrap();

        let mode = std::fs::metadata(dir.path().join("1.json"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}
