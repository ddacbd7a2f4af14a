//! Reminder snapshot persistence.
//!
//! The whole store lives in one JSON document with an `active` list and an
//! `archive` list. Loading is lenient: an unreadable record is skipped with a
//! warning rather than poisoning the rest of the file, so one bad edit never
//! costs a user their reminders.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::Reminder;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("reminder snapshot i/o at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("reminder snapshot at {path:?} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("encoding reminder snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Next id to hand out. Persisted so ids stay unique across restarts.
    pub next_id: u64,
    pub active: Vec<Reminder>,
    pub archive: Vec<Reminder>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            next_id: 1,
            active: Vec::new(),
            archive: Vec::new(),
        }
    }
}

/// Same shape as [`Snapshot`] but with records left as raw JSON, so one
/// malformed entry can be dropped without rejecting the document.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    next_id: Option<u64>,
    #[serde(default)]
    active: Vec<serde_json::Value>,
    #[serde(default)]
    archive: Vec<serde_json::Value>,
}

/// Load the snapshot at `path`. A missing file is an empty store; a file that
/// is not a JSON object at the top level is an error the caller must surface.
pub fn load(path: &Path) -> Result<Snapshot, PersistenceError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::default()),
        Err(err) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source: err,
            })
        }
    };
    let raw: RawSnapshot =
        serde_json::from_str(&text).map_err(|source| PersistenceError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

    let active = collect_records(raw.active, "active", path);
    let archive = collect_records(raw.archive, "archive", path);

    // Guard next_id against hand-edited files: never hand out an id at or
    // below one already on disk.
    let max_seen = active
        .iter()
        .chain(archive.iter())
        .map(|r| r.id.0)
        .max()
        .unwrap_or(0);
    let next_id = raw.next_id.unwrap_or(0).max(max_seen + 1);

    if raw.version.is_some_and(|v| v > SNAPSHOT_VERSION) {
        warn!(
            path = %path.display(),
            version = ?raw.version,
            "reminder snapshot written by a newer version; loading best-effort"
        );
    }

    Ok(Snapshot {
        version: SNAPSHOT_VERSION,
        next_id,
        active,
        archive,
    })
}

fn collect_records(values: Vec<serde_json::Value>, section: &str, path: &Path) -> Vec<Reminder> {
    let mut out = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<Reminder>(value) {
            Ok(reminder) => out.push(reminder),
            Err(err) => warn!(
                path = %path.display(),
                section,
                index,
                error = %err,
                "skipping malformed reminder record"
            ),
        }
    }
    out
}

/// Write `snapshot` to `path`, creating parent directories as needed. The
/// document is written to a sibling temp file and renamed into place so a
/// crash mid-write leaves the previous snapshot intact.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let text = serde_json::to_string_pretty(snapshot).map_err(PersistenceError::Encode)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, text).map_err(|source| PersistenceError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}
