//! Ledger document model

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{ProblemPayload, ResultRecord};
use crate::Result;

/// Results of one benchmark run over a problem set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerGroup {
    /// Run label.
    pub label: String,
    /// When the first record of the group was written.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Problem payloads keyed by row name.
    pub problems: BTreeMap<String, ProblemPayload>,
    /// Records in the order they were produced.
    pub results: Vec<ResultRecord>,
    /// Problems where every configuration failed.
    #[serde(default)]
    pub failed_problems: Vec<String>,
    /// Software → minimizers skipped as unknown or incompatible.
    #[serde(default)]
    pub unselected_minimizers: BTreeMap<String, Vec<String>>,
}

impl LedgerGroup {
    /// Empty group.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            created_at: None,
            problems: BTreeMap::new(),
            results: Vec::new(),
            failed_problems: Vec::new(),
            unselected_minimizers: BTreeMap::new(),
        }
    }

    /// Payload a record refers to.
    #[must_use]
    pub fn problem_for(&self, record: &ResultRecord) -> Option<&ProblemPayload> {
        self.problems.get(record.problem())
    }
}

/// A persisted ledger: labelled groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerDocument {
    groups: BTreeMap<String, LedgerGroup>,
}

impl LedgerDocument {
    /// Empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Group labels in sorted order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Get a group by label.
    #[must_use]
    pub fn group(&self, label: &str) -> Option<&LedgerGroup> {
        self.groups.get(label)
    }

    /// Get a group by label, mutably.
    pub fn group_mut(&mut self, label: &str) -> Option<&mut LedgerGroup> {
        self.groups.get_mut(label)
    }

    /// All groups.
    pub fn groups(&self) -> impl Iterator<Item = &LedgerGroup> {
        self.groups.values()
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the document has no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Insert a group, replacing any group with the same label.
    pub fn insert(&mut self, group: LedgerGroup) -> Option<LedgerGroup> {
        self.groups.insert(group.label.clone(), group)
    }

    /// Remove a group.
    pub fn remove(&mut self, label: &str) -> Option<LedgerGroup> {
        self.groups.remove(label)
    }

    /// Consume into groups.
    #[must_use]
    pub fn into_groups(self) -> Vec<LedgerGroup> {
        self.groups.into_values().collect()
    }

    /// Read a document from a file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the document, replacing `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = sibling(path, "tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, self)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// `path` with `.<suffix>` appended to its file name.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
