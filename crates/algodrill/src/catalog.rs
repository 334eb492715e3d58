//! Problem catalog
//!
//! The catalog is read-only data: the built-in problem set is embedded at
//! compile time, and a JSON file with the same shape may replace it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::progress::Status;
use crate::types::{SubmissionRequest, TestCase};

/// Built-in problem set
pub const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate problem id '{0}'")]
    DuplicateId(String),

    #[error("unknown problem '{0}'")]
    UnknownProblem(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        })
    }
}

/// One drill: a starting stub, a reference solution and optional tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub stub: String,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<Vec<TestCase>>,
}

impl Problem {
    /// Check if the problem can be judged
    pub fn has_tests(&self) -> bool {
        self.test_cases.as_ref().is_some_and(|cases| !cases.is_empty())
    }

    /// Request judging `source` against this problem's tests
    pub fn request(&self, source: impl Into<String>) -> SubmissionRequest {
        SubmissionRequest {
            source: source.into(),
            test_cases: self.test_cases.clone().unwrap_or_default(),
        }
    }
}

/// Criteria for listing problems; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct ProblemFilter {
    /// Substring of the category, any case
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// Substring of the name or of any tag, any case
    pub search: Option<String>,
    pub status: Option<Status>,
}

impl ProblemFilter {
    /// Check `problem`, whose recorded status is `status`
    pub fn matches(&self, problem: &Problem, status: Option<Status>) -> bool {
        let contains = |haystack: &str, needle: &str| haystack.to_lowercase().contains(&needle.to_lowercase());

        if self
            .category
            .as_deref()
            .is_some_and(|category| !contains(&problem.category, category))
        {
            return false;
        }
        if self.difficulty.is_some_and(|d| problem.difficulty != d) {
            return false;
        }
        if let Some(needle) = self.search.as_deref()
            && !contains(&problem.name, needle)
            && !problem.tags.iter().any(|tag| contains(tag, needle))
        {
            return false;
        }
        self.status.is_none_or(|wanted| status == Some(wanted))
    }
}

/// Read access to a set of problems
pub trait Catalog {
    /// All problems, in catalog order
    fn problems(&self) -> &[Problem];

    /// Look up a problem by id
    fn get(&self, id: &str) -> Option<&Problem> {
        self.problems().iter().find(|p| p.id == id)
    }

    /// Like [`Catalog::get`], but an unknown id is an error
    fn require(&self, id: &str) -> Result<&Problem, CatalogError> {
        self.get(id)
            .ok_or_else(|| CatalogError::UnknownProblem(id.to_string()))
    }
}

/// Catalog held in memory
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    problems: Vec<Problem>,
}

impl StaticCatalog {
    /// The embedded problem set
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Load a catalog file (a JSON array of problems)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "loading catalog file");
        Self::from_json(&content)
    }

    /// Load `path` if given, the embedded set otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let problems: Vec<Problem> = serde_json::from_str(content)?;
        Self::new(problems)
    }

    pub fn new(problems: Vec<Problem>) -> Result<Self, CatalogError> {
        for (i, problem) in problems.iter().enumerate() {
            if problems[..i].iter().any(|p| p.id == problem.id) {
                return Err(CatalogError::DuplicateId(problem.id.clone()));
            }
        }
        Ok(Self { problems })
    }
}

impl Catalog for StaticCatalog {
    fn problems(&self) -> &[Problem] {
        &self.problems
    }
}
