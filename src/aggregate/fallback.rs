//! Placement and best-available collapsing
//!
//! Records are first placed into cells by their tags. Bounds placeholders
//! (wildcard derivative segments) fill every matching literal column of their
//! minimizer in their own row, or a single best-available column when the
//! minimizer has no literal column in that category.
//!
//! A column is *non-full* when it populates fewer rows than the category
//! has, unless it holds nothing but placeholders. Non-full columns that
//! differ in one derivative segment and never share a row are merged into a
//! column with that segment set to best-available: Hessian first, then
//! Jacobian, then both together for whatever is left of a minimizer.
//!
//! A merge only ever turns a literal derivative segment into best-available,
//! and a column has two such segments, so a column is generalized at most
//! twice however many rounds run. The family pass is the Hessian and
//! Jacobian generalizations applied in one step to columns neither single
//! pass could merge. Rounds repeat until nothing merges, so collapsing an
//! already collapsed placement is a no-op.

use rustc_hash::{FxHashMap, FxHashSet};

use super::tags::{ColumnTag, RowTag, Segment};
use crate::controller::DerivativeKind;
use crate::record::{ErrorCode, ResultRecord};

/// One record placed in one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    record: usize,
    row: RowTag,
    category: String,
    column: ColumnTag,
}

impl Placement {
    /// Index of the record in the aggregated record list.
    #[must_use]
    pub const fn record(&self) -> usize {
        self.record
    }

    /// Get the row.
    #[must_use]
    pub const fn row(&self) -> &RowTag {
        &self.row
    }

    /// Get the category (cost function).
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Get the column.
    #[must_use]
    pub const fn column(&self) -> &ColumnTag {
        &self.column
    }
}

type ColumnKey = (String, ColumnTag);

/// Place every record, expanding bounds placeholders.
#[must_use]
pub fn place(records: &[ResultRecord]) -> Vec<Placement> {
    // literal columns per (category, software, minimizer), first-seen order
    let mut literal: FxHashMap<(String, String, String), Vec<ColumnTag>> = FxHashMap::default();
    for record in records {
        let column = ColumnTag::of(record);
        if column.has_wildcard() {
            continue;
        }
        let family = (
            record.cost_function().to_string(),
            column.software().to_string(),
            column.minimizer().to_string(),
        );
        let columns = literal.entry(family).or_default();
        if !columns.contains(&column) {
            columns.push(column);
        }
    }

    let mut placements = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let row = RowTag::of(record);
        let category = record.cost_function().to_string();
        let column = ColumnTag::of(record);
        if !column.has_wildcard() {
            placements.push(Placement {
                record: index,
                row,
                category,
                column,
            });
            continue;
        }

        let family = (
            category.clone(),
            column.software().to_string(),
            column.minimizer().to_string(),
        );
        let matches: Vec<ColumnTag> = literal
            .get(&family)
            .map(|columns| columns.iter().filter(|c| column.matches(c)).cloned().collect())
            .unwrap_or_default();
        if matches.is_empty() {
            placements.push(Placement {
                record: index,
                row,
                category,
                column: column.best_available(),
            });
        } else {
            placements.extend(matches.into_iter().map(|column| Placement {
                record: index,
                row: row.clone(),
                category: category.clone(),
                column,
            }));
        }
    }
    placements
}

/// Collapse non-full, non-overlapping columns until nothing changes.
///
/// Returns whether anything was merged.
pub fn collapse(placements: &mut [Placement], records: &[ResultRecord]) -> bool {
    let mut changed = false;
    loop {
        let mut round = false;
        round |= collapse_segment(placements, records, DerivativeKind::Hessian);
        round |= collapse_segment(placements, records, DerivativeKind::Jacobian);
        round |= collapse_family(placements, records);
        if !round {
            return changed;
        }
        changed = true;
    }
}

/// Occupancy of every column.
struct Occupancy {
    order: Vec<ColumnKey>,
    rows: FxHashMap<ColumnKey, Vec<RowTag>>,
    placeholder_only: FxHashSet<ColumnKey>,
    expected: FxHashMap<String, usize>,
}

impl Occupancy {
    fn new(placements: &[Placement], records: &[ResultRecord]) -> Self {
        let mut order = Vec::new();
        let mut rows: FxHashMap<ColumnKey, Vec<RowTag>> = FxHashMap::default();
        let mut has_real: FxHashSet<ColumnKey> = FxHashSet::default();
        let mut category_rows: FxHashMap<String, FxHashSet<RowTag>> = FxHashMap::default();

        for p in placements {
            let key = (p.category.clone(), p.column.clone());
            let entry = rows.entry(key.clone()).or_insert_with(|| {
                order.push(key.clone());
                Vec::new()
            });
            entry.push(p.row.clone());
            if records[p.record].error_code() != ErrorCode::BoundsUnsupported {
                has_real.insert(key);
            }
            category_rows
                .entry(p.category.clone())
                .or_default()
                .insert(p.row.clone());
        }

        let placeholder_only = order.iter().filter(|k| !has_real.contains(*k)).cloned().collect();
        let expected = category_rows
            .into_iter()
            .map(|(category, rows)| (category, rows.len()))
            .collect();
        Self {
            order,
            rows,
            placeholder_only,
            expected,
        }
    }

    fn distinct_rows(&self, key: &ColumnKey) -> usize {
        self.rows
            .get(key)
            .map_or(0, |rows| rows.iter().collect::<FxHashSet<_>>().len())
    }

    fn non_full(&self, key: &ColumnKey) -> bool {
        !self.placeholder_only.contains(key)
            && self.distinct_rows(key) < self.expected.get(&key.0).copied().unwrap_or(0)
    }

    /// Whether no two members place into the same row (and none repeats a
    /// row on its own).
    fn disjoint(&self, members: &[ColumnKey]) -> bool {
        let mut seen = FxHashSet::default();
        members
            .iter()
            .flat_map(|key| self.rows.get(key).into_iter().flatten())
            .all(|row| seen.insert(row))
    }

    /// Merge each group of two or more disjoint members into its target.
    fn merge_groups(
        &self,
        placements: &mut [Placement],
        groups: Vec<(ColumnKey, Vec<ColumnKey>)>,
    ) -> bool {
        let mut retag: FxHashMap<ColumnKey, ColumnTag> = FxHashMap::default();
        for (target, members) in groups {
            if members.len() < 2 || !self.disjoint(&members) {
                continue;
            }
            tracing::debug!(
                column = %target.1,
                merged = members.len(),
                "collapsing columns to best available"
            );
            for member in members {
                retag.insert(member, target.1.clone());
            }
        }
        if retag.is_empty() {
            return false;
        }
        for p in placements.iter_mut() {
            if let Some(column) = retag.get(&(p.category.clone(), p.column.clone())) {
                p.column = column.clone();
            }
        }
        true
    }
}

fn collapse_segment(
    placements: &mut [Placement],
    records: &[ResultRecord],
    kind: DerivativeKind,
) -> bool {
    let occupancy = Occupancy::new(placements, records);
    let mut groups: Vec<(ColumnKey, Vec<ColumnKey>)> = Vec::new();
    for key in occupancy.order.iter().filter(|k| occupancy.non_full(k)) {
        let target = (
            key.0.clone(),
            key.1.with_segment(kind, Segment::BestAvailable),
        );
        match groups.iter_mut().find(|(t, _)| *t == target) {
            Some((_, members)) => members.push(key.clone()),
            None => groups.push((target, vec![key.clone()])),
        }
    }
    occupancy.merge_groups(placements, groups)
}

fn collapse_family(placements: &mut [Placement], records: &[ResultRecord]) -> bool {
    let occupancy = Occupancy::new(placements, records);
    let mut groups: Vec<(ColumnKey, Vec<ColumnKey>)> = Vec::new();
    for key in occupancy.order.iter().filter(|k| occupancy.non_full(k)) {
        match groups
            .iter_mut()
            .find(|(t, _)| t.0 == key.0 && t.1.same_family(&key.1))
        {
            Some((_, members)) => members.push(key.clone()),
            None => groups.push((key.clone(), vec![key.clone()])),
        }
    }
    // only segments that actually differ become best-available
    let groups = groups
        .into_iter()
        .map(|(first, members)| {
            let mut target = first.1.clone();
            for kind in [DerivativeKind::Jacobian, DerivativeKind::Hessian] {
                if members.iter().any(|m| m.1.segment(kind) != first.1.segment(kind)) {
                    target = target.with_segment(kind, Segment::BestAvailable);
                }
            }
            ((first.0, target), members)
        })
        .collect();
    occupancy.merge_groups(placements, groups)
}
