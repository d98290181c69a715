//! Ledger Writer - incremental, crash-tolerant result persistence
//!
//! Records are appended to a JSON-lines journal next to the ledger file the
//! moment they are produced. Finalizing replays the journal into the ledger
//! document and removes it. A lock file keeps a second writer off the same
//! ledger; a journal left behind by a killed process is turned into a
//! document with [`recover`].

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::document::{sibling, LedgerDocument, LedgerGroup};
use crate::config::BenchmarkOptions;
use crate::record::{ProblemPayload, ResultRecord};
use crate::{Error, Result};

/// Label given to records never closed by `finalize_group`.
pub const INCOMPLETE_GROUP: &str = "incomplete_group";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum JournalEntry {
    Problem(ProblemPayload),
    Result(ResultRecord),
    GroupEnd {
        label: String,
        created_at: Option<DateTime<Utc>>,
        failed_problems: Vec<String>,
        unselected_minimizers: BTreeMap<String, Vec<String>>,
    },
}

/// Single writer of one ledger file.
///
/// Lifecycle: `create` → `add_result`* → `finalize_group` → ... → `finalize`.
/// Dropping an unfinalized writer finalizes it.
#[derive(Debug)]
pub struct LedgerWriter {
    path: PathBuf,
    journal_path: PathBuf,
    lock_path: PathBuf,
    journal: File,
    group_problems: FxHashSet<String>,
    group_started: Option<DateTime<Utc>>,
    group_results: usize,
    closed_labels: Vec<String>,
    finalized: bool,
}

impl LedgerWriter {
    /// Open a writer for the ledger at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::LedgerLocked` if another writer holds the file, or
    /// I/O errors creating the journal
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock_path = sibling(&path, "lock");
        let mut lock = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(lock) => lock,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::LedgerLocked {
                    path: path.display().to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        writeln!(lock, "{}", std::process::id())?;

        let journal_path = sibling(&path, "journal");
        let journal = match File::create(&journal_path) {
            Ok(journal) => journal,
            Err(err) => {
                let _ = fs::remove_file(&lock_path);
                return Err(err.into());
            }
        };

        tracing::debug!(path = %path.display(), "opened ledger");
        Ok(Self {
            path,
            journal_path,
            lock_path,
            journal,
            group_problems: FxHashSet::default(),
            group_started: None,
            group_results: 0,
            closed_labels: Vec::new(),
            finalized: false,
        })
    }

    /// Open a writer at the checkpoint path of `options`.
    ///
    /// # Errors
    ///
    /// See [`LedgerWriter::create`]
    pub fn from_options(options: &BenchmarkOptions) -> Result<Self> {
        Self::create(options.checkpoint_path())
    }

    /// Get the ledger path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `finalize` has run.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Append a record. Its problem payload is written once per group.
    ///
    /// # Errors
    ///
    /// Returns `Error::LedgerFinalized` after `finalize`, or I/O errors
    pub fn add_result(&mut self, record: &ResultRecord, problem: &ProblemPayload) -> Result<()> {
        if self.finalized {
            return Err(Error::LedgerFinalized);
        }
        if self.group_started.is_none() {
            self.group_started = Some(Utc::now());
        }
        if self.group_problems.insert(problem.name().to_string()) {
            self.append(&JournalEntry::Problem(problem.clone()))?;
        }
        self.append(&JournalEntry::Result(record.clone()))?;
        self.group_results += 1;
        Ok(())
    }

    /// Close the open group under `label`.
    ///
    /// Does nothing if the group is empty or the label was already closed.
    ///
    /// # Errors
    ///
    /// Returns `Error::LedgerFinalized` after `finalize`, or I/O errors
    pub fn finalize_group(
        &mut self,
        label: &str,
        failed_problems: &[String],
        unselected_minimizers: &BTreeMap<String, Vec<String>>,
    ) -> Result<()> {
        if self.finalized {
            return Err(Error::LedgerFinalized);
        }
        if self.group_results == 0 || self.closed_labels.iter().any(|l| l == label) {
            return Ok(());
        }
        let created_at = self.group_started.take();
        self.append(&JournalEntry::GroupEnd {
            label: label.to_string(),
            created_at,
            failed_problems: failed_problems.to_vec(),
            unselected_minimizers: unselected_minimizers.clone(),
        })?;
        self.group_problems.clear();
        self.group_results = 0;
        self.closed_labels.push(label.to_string());
        Ok(())
    }

    /// Write the ledger document and release the file. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns I/O or serialization errors
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        if self.group_results > 0 {
            self.finalize_group(INCOMPLETE_GROUP, &[], &BTreeMap::new())?;
        }
        self.journal.sync_all()?;
        let document = replay(&self.journal_path)?;
        document.write_to(&self.path)?;
        fs::remove_file(&self.journal_path)?;
        fs::remove_file(&self.lock_path)?;
        self.finalized = true;
        tracing::info!(path = %self.path.display(), groups = document.len(), "ledger finalized");
        Ok(())
    }

    fn append(&mut self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.journal.write_all(&line)?;
        self.journal.flush()?;
        Ok(())
    }
}

impl Drop for LedgerWriter {
    fn drop(&mut self) {
        if let Err(err) = self.finalize() {
            tracing::error!(path = %self.path.display(), "failed to finalize ledger: {err}");
        }
    }
}

/// Turn a journal left behind by an interrupted writer into the ledger
/// document at `path`, then release the lock.
///
/// # Errors
///
/// Returns `Error::LedgerNotFound` if there is no journal, or I/O errors
pub fn recover(path: impl AsRef<Path>) -> Result<LedgerDocument> {
    let path = path.as_ref();
    let journal_path = sibling(path, "journal");
    if !journal_path.is_file() {
        return Err(Error::LedgerNotFound {
            filename: journal_path.display().to_string(),
            results_dir: path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        });
    }
    let document = replay(&journal_path)?;
    document.write_to(path)?;
    fs::remove_file(&journal_path)?;
    let lock_path = sibling(path, "lock");
    if lock_path.exists() {
        fs::remove_file(lock_path)?;
    }
    tracing::warn!(path = %path.display(), groups = document.len(), "recovered ledger from journal");
    Ok(document)
}

fn replay(journal_path: &Path) -> Result<LedgerDocument> {
    let reader = BufReader::new(File::open(journal_path)?);
    let mut lines = reader.lines().peekable();
    let mut document = LedgerDocument::new();
    let mut current = LedgerGroup::new(INCOMPLETE_GROUP);

    while let Some(line) = lines.next() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = match serde_json::from_str::<JournalEntry>(&line) {
            Ok(entry) => entry,
            // a torn final line is what an interrupted append leaves behind
            Err(err) if lines.peek().is_none() => {
                tracing::warn!("dropping truncated journal entry: {err}");
                break;
            }
            Err(err) => return Err(err.into()),
        };
        match entry {
            JournalEntry::Problem(problem) => {
                current.problems.insert(problem.name().to_string(), problem);
            }
            JournalEntry::Result(record) => current.results.push(record),
            JournalEntry::GroupEnd {
                label,
                created_at,
                failed_problems,
                unselected_minimizers,
            } => {
                let mut group = std::mem::replace(&mut current, LedgerGroup::new(INCOMPLETE_GROUP));
                group.label = label;
                group.created_at = created_at;
                group.failed_problems = failed_problems;
                group.unselected_minimizers = unselected_minimizers;
                document.insert(group);
            }
        }
    }
    if !current.results.is_empty() {
        document.insert(current);
    }
    Ok(document)
}
