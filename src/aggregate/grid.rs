//! Grid - reconciled, ordered result table

use rustc_hash::FxHashMap;

use super::fallback::Placement;
use super::tags::{ColumnTag, RowTag};
use crate::record::ResultRecord;

/// Rows × categories × columns of result slots.
///
/// Owns the records; slots hold indexes into them. Every (row, category)
/// pair has a slot for every column of that category.
#[derive(Debug, Clone)]
pub struct Grid {
    records: Vec<ResultRecord>,
    rows: Vec<RowTag>,
    categories: Vec<String>,
    columns: Vec<Vec<ColumnTag>>,
    slots: Vec<Vec<Vec<Option<usize>>>>,
    row_index: FxHashMap<RowTag, usize>,
    category_index: FxHashMap<String, usize>,
    column_index: Vec<FxHashMap<ColumnTag, usize>>,
}

impl Grid {
    pub(crate) fn build(records: Vec<ResultRecord>, placements: &[Placement]) -> Self {
        let mut rows: Vec<RowTag> = Vec::new();
        let mut categories: Vec<String> = Vec::new();
        for p in placements {
            if !rows.contains(p.row()) {
                rows.push(p.row().clone());
            }
            if !categories.iter().any(|c| c == p.category()) {
                categories.push(p.category().to_string());
            }
        }
        rows.sort_by_cached_key(RowTag::sort_key);
        categories.sort_by_cached_key(|c| c.to_lowercase());

        let row_index: FxHashMap<RowTag, usize> =
            rows.iter().enumerate().map(|(i, r)| (r.clone(), i)).collect();
        let category_index: FxHashMap<String, usize> =
            categories.iter().enumerate().map(|(i, c)| (c.clone(), i)).collect();

        let mut columns: Vec<Vec<ColumnTag>> = vec![Vec::new(); categories.len()];
        for p in placements {
            let cat = category_index[p.category()];
            if !columns[cat].contains(p.column()) {
                columns[cat].push(p.column().clone());
            }
        }
        for cols in &mut columns {
            cols.sort_by_cached_key(ColumnTag::sort_key);
        }
        let column_index: Vec<FxHashMap<ColumnTag, usize>> = columns
            .iter()
            .map(|cols| cols.iter().enumerate().map(|(i, c)| (c.clone(), i)).collect())
            .collect();

        let mut slots: Vec<Vec<Vec<Option<usize>>>> = rows
            .iter()
            .map(|_| columns.iter().map(|cols| vec![None; cols.len()]).collect())
            .collect();
        for p in placements {
            let row = row_index[p.row()];
            let cat = category_index[p.category()];
            let col = column_index[cat][p.column()];
            let slot = &mut slots[row][cat][col];
            match *slot {
                None => *slot = Some(p.record()),
                Some(existing) if existing != p.record() => {
                    tracing::debug!(
                        row = %p.row(),
                        column = %p.column(),
                        "duplicate result for one cell; keeping the more accurate"
                    );
                    if records[p.record()].effective_accuracy()
                        < records[existing].effective_accuracy()
                    {
                        *slot = Some(p.record());
                    }
                }
                Some(_) => {}
            }
        }

        Self {
            records,
            rows,
            categories,
            columns,
            slots,
            row_index,
            category_index,
            column_index,
        }
    }

    /// All records, in input order (with anchors and best flags set).
    #[must_use]
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Consume into the records.
    #[must_use]
    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
    }

    /// Rows in display order.
    #[must_use]
    pub fn rows(&self) -> &[RowTag] {
        &self.rows
    }

    /// Categories (cost functions) in display order.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Columns of a category in display order.
    #[must_use]
    pub fn columns(&self, category: &str) -> &[ColumnTag] {
        self.category_index
            .get(category)
            .map_or(&[], |&cat| self.columns[cat].as_slice())
    }

    /// Whether the grid holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row (in display order) with this label.
    #[must_use]
    pub fn row(&self, label: &str) -> Option<&RowTag> {
        self.rows.iter().find(|r| r.label() == label)
    }

    /// Every slot of one (row, category) pair, in column order.
    #[must_use]
    pub fn cells(&self, row: &RowTag, category: &str) -> Vec<Option<&ResultRecord>> {
        let (Some(&row), Some(&cat)) = (self.row_index.get(row), self.category_index.get(category))
        else {
            return Vec::new();
        };
        self.slots[row][cat]
            .iter()
            .map(|slot| slot.map(|i| &self.records[i]))
            .collect()
    }

    /// Record in one cell, looking the row up by label.
    #[must_use]
    pub fn slot(&self, row: &str, category: &str, column: &ColumnTag) -> Option<&ResultRecord> {
        let row = *self.row_index.get(self.row(row)?)?;
        let cat = *self.category_index.get(category)?;
        let col = *self.column_index[cat].get(column)?;
        self.slots[row][cat][col].map(|i| &self.records[i])
    }

    /// Every slot of one (row, category) pair, looking the row up by label.
    #[must_use]
    pub fn row_slots(&self, row: &str, category: &str) -> Vec<Option<&ResultRecord>> {
        self.row(row).map_or_else(Vec::new, |row| self.cells(row, category))
    }

    /// Best record of one (row, category) pair, looking the row up by label.
    #[must_use]
    pub fn best(&self, row: &str, category: &str) -> Option<&ResultRecord> {
        self.row_slots(row, category)
            .into_iter()
            .flatten()
            .find(|r| r.is_best())
    }
}
