//! Per-problem progress: a self-assessed status and the last saved code
//!
//! Data is keyed by problem id. The current schema (v2) stores
//! `{id: {status, code?}}`; the older v1 schema stored `{id: status}` and is
//! migrated the first time a store is opened over it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// File holding the current schema
pub const PROGRESS_FILE: &str = "progress_v2.json";

/// File of the v1 schema, migrated on open
pub const LEGACY_PROGRESS_FILE: &str = "progress.json";

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("failed to write progress to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize progress: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unknown status '{0}' (expected needs-work, comfortable or complete)")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    NeedsWork,
    Comfortable,
    Complete,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::NeedsWork => "needs-work",
            Status::Comfortable => "comfortable",
            Status::Complete => "complete",
        })
    }
}

impl FromStr for Status {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "needs-work" => Ok(Status::NeedsWork),
            "comfortable" => Ok(Status::Comfortable),
            "complete" => Ok(Status::Complete),
            other => Err(ProgressError::UnknownStatus(other.to_string())),
        }
    }
}

/// Stored data for one problem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemProgress {
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

type ProgressMap = BTreeMap<String, ProblemProgress>;

/// Read and write access to progress
pub trait ProgressStore {
    fn status(&self, id: &str) -> Option<Status>;

    /// Set or (with `None`) clear the status, keeping saved code
    fn set_status(&mut self, id: &str, status: Option<Status>) -> Result<(), ProgressError>;

    fn code(&self, id: &str) -> Option<&str>;

    /// Save code, keeping the status
    fn save_code(&mut self, id: &str, code: &str) -> Result<(), ProgressError>;

    /// Forget everything
    fn reset(&mut self) -> Result<(), ProgressError>;
}

/// Progress kept as JSON files in a directory
///
/// Every change is written through immediately.
#[derive(Debug)]
pub struct FileProgressStore {
    dir: PathBuf,
    progress: ProgressMap,
}

impl FileProgressStore {
    /// Open the store in `dir`, migrating v1 data if that is all there is
    ///
    /// Unreadable or corrupt data is treated as empty.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let progress = load(&dir);
        Self { dir, progress }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every problem with stored data
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ProblemProgress)> {
        self.progress.iter().map(|(id, p)| (id.as_str(), p))
    }

    fn save(&self) -> Result<(), ProgressError> {
        write_map(&self.dir, &self.progress)
    }
}

impl ProgressStore for FileProgressStore {
    fn status(&self, id: &str) -> Option<Status> {
        self.progress.get(id).and_then(|p| p.status)
    }

    fn set_status(&mut self, id: &str, status: Option<Status>) -> Result<(), ProgressError> {
        self.progress.entry(id.to_string()).or_default().status = status;
        self.save()
    }

    fn code(&self, id: &str) -> Option<&str> {
        self.progress.get(id).and_then(|p| p.code.as_deref())
    }

    fn save_code(&mut self, id: &str, code: &str) -> Result<(), ProgressError> {
        self.progress.entry(id.to_string()).or_default().code = Some(code.to_string());
        self.save()
    }

    fn reset(&mut self) -> Result<(), ProgressError> {
        self.progress.clear();
        for name in [PROGRESS_FILE, LEGACY_PROGRESS_FILE] {
            let path = self.dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => debug!(?path, "removed progress file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(ProgressError::Write { path, source }),
            }
        }
        Ok(())
    }
}

fn load(dir: &Path) -> ProgressMap {
    let current = dir.join(PROGRESS_FILE);
    if let Ok(content) = fs::read_to_string(&current) {
        return serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = ?current, error = %e, "ignoring unreadable progress file");
            ProgressMap::new()
        });
    }

    let legacy = dir.join(LEGACY_PROGRESS_FILE);
    let Ok(content) = fs::read_to_string(&legacy) else {
        return ProgressMap::new();
    };
    let old: HashMap<String, Option<Status>> = match serde_json::from_str(&content) {
        Ok(old) => old,
        Err(e) => {
            warn!(path = ?legacy, error = %e, "ignoring unreadable v1 progress file");
            return ProgressMap::new();
        }
    };
    let migrated: ProgressMap = old
        .into_iter()
        .map(|(id, status)| (id, ProblemProgress { status, code: None }))
        .collect();

    match write_map(dir, &migrated) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(&legacy) {
                warn!(path = ?legacy, error = %e, "failed to remove migrated v1 progress file");
            }
            info!(problems = migrated.len(), "migrated v1 progress");
        }
        Err(e) => warn!(error = %e, "failed to save migrated progress"),
    }
    migrated
}

fn write_map(dir: &Path, progress: &ProgressMap) -> Result<(), ProgressError> {
    let path = dir.join(PROGRESS_FILE);
    let content = serde_json::to_string_pretty(progress)?;
    let write = || -> io::Result<()> {
        fs::create_dir_all(dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)
    };
    write().map_err(|source| ProgressError::Write {
        path: path.clone(),
        source,
    })
}
