//! Combining ledgers from separate runs
//!
//! Groups with distinct labels are copied across. Groups sharing a label are
//! merged: identical problems are shared, same-named problems with different
//! data get a `*` suffix, and records for the same configuration are
//! resolved by a [`MergeStrategy`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{LedgerDocument, LedgerGroup};
use crate::record::ResultRecord;
use crate::Error;

/// Which record wins when both ledgers hold the same configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Keep the record from the first ledger.
    #[default]
    First,
    /// Keep the record from the second ledger.
    Last,
    /// Keep the more accurate record.
    Accuracy,
    /// Keep the faster record.
    Runtime,
    /// Keep the record with lower energy use.
    Emissions,
}

impl FromStr for MergeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "accuracy" => Ok(Self::Accuracy),
            "runtime" => Ok(Self::Runtime),
            "emissions" => Ok(Self::Emissions),
            other => Err(Error::InvalidInput(format!("unknown merge strategy: {other}"))),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::First => "first",
            Self::Last => "last",
            Self::Accuracy => "accuracy",
            Self::Runtime => "runtime",
            Self::Emissions => "emissions",
        };
        f.write_str(name)
    }
}

impl MergeStrategy {
    /// Whether `incoming` should replace `kept`.
    fn prefers(self, kept: &ResultRecord, incoming: &ResultRecord) -> bool {
        match self {
            Self::First | Self::Last => false,
            Self::Accuracy => kept.effective_accuracy() > incoming.effective_accuracy(),
            Self::Runtime => kept.runtime() > incoming.runtime(),
            Self::Emissions => {
                kept.energy().unwrap_or(f64::INFINITY) > incoming.energy().unwrap_or(f64::INFINITY)
            }
        }
    }
}

type RecordKey = (String, Option<usize>, String, String, String, String, String);

fn record_key(record: &ResultRecord) -> RecordKey {
    (
        record.problem().to_string(),
        record.dataset(),
        record.software().to_string(),
        record.minimizer().to_string(),
        record.jacobian().to_string(),
        record.hessian().to_string(),
        record.cost_function().to_string(),
    )
}

/// Merge `b` into `a`.
#[must_use]
pub fn merge(a: LedgerDocument, b: LedgerDocument, strategy: MergeStrategy) -> LedgerDocument {
    let (mut a, b) = if strategy == MergeStrategy::Last {
        (b, a)
    } else {
        (a, b)
    };

    for incoming in b.into_groups() {
        match a.group_mut(&incoming.label) {
            None => {
                a.insert(incoming);
            }
            Some(kept) => {
                tracing::debug!(label = %incoming.label, %strategy, "merging ledger groups");
                merge_group(kept, incoming, strategy);
            }
        }
    }
    a
}

fn merge_group(kept: &mut LedgerGroup, incoming: LedgerGroup, strategy: MergeStrategy) {
    let renames = merge_problems(kept, incoming.problems);

    let mut index: FxHashMap<RecordKey, usize> = kept
        .results
        .iter()
        .enumerate()
        .map(|(i, r)| (record_key(r), i))
        .collect();
    for mut record in incoming.results {
        if let Some(name) = renames.get(record.problem()) {
            record.rename_problem(name.clone());
        }
        let key = record_key(&record);
        match index.get(&key) {
            Some(&i) => {
                if strategy.prefers(&kept.results[i], &record) {
                    kept.results[i] = record;
                }
            }
            None => {
                index.insert(key, kept.results.len());
                kept.results.push(record);
            }
        }
    }

    kept.failed_problems.clear();
    kept.unselected_minimizers = kept
        .results
        .iter()
        .map(|r| (r.software().to_string(), Vec::new()))
        .collect();
}

/// Fold `incoming` problems into `kept`, returning old → new names for any
/// that had to be renamed.
fn merge_problems(
    kept: &mut LedgerGroup,
    incoming: BTreeMap<String, crate::record::ProblemPayload>,
) -> FxHashMap<String, String> {
    let mut renames = FxHashMap::default();
    for (original, mut problem) in incoming {
        let base = original.trim_end_matches('*').to_string();
        let mut name = base.clone();
        loop {
            match kept.problems.get(&name) {
                Some(existing) if existing.same_data(&problem) => break,
                Some(_) => name.push('*'),
                None => {
                    let tag = problem.problem_tag().trim_end_matches('*').to_string();
                    let suffix = &name[base.len()..];
                    problem.rename(name.clone(), format!("{tag}{suffix}"));
                    kept.problems.insert(name.clone(), problem);
                    break;
                }
            }
        }
        if name != original {
            renames.insert(original, name);
        }
    }
    renames
}
