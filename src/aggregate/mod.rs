//! Result aggregation
//!
//! Turns a flat list of records into a [`Grid`]:
//!
//! 1. **Tag**: each record gets a row (problem, start, dataset), a column
//!    (`software:minimizer:jacobian:hessian`) and a category (cost function).
//! 2. **Place**: bounds placeholders fill the matching columns of their
//!    minimizer.
//! 3. **Collapse**: sparse, non-overlapping columns of one minimizer are
//!    merged into best-available columns.
//! 4. **Select**: the most accurate record per (row, category) is marked
//!    best and every record gets its normalization anchors.
//!
//! ## Example
//!
//! ```rust
//! use trueno_fit::aggregate::ResultAggregator;
//! use trueno_fit::record::{ErrorCode, ResultRecord};
//!
//! let records = vec![
//!     ResultRecord::builder("cubic", "nlls", "scipy", "lm")
//!         .accuracy(0.5)
//!         .error_code(ErrorCode::Converged)
//!         .build(),
//!     ResultRecord::builder("cubic", "nlls", "scipy", "trf")
//!         .accuracy(0.25)
//!         .error_code(ErrorCode::Converged)
//!         .build(),
//! ];
//! let grid = ResultAggregator::new().aggregate(records);
//! assert_eq!(grid.best("cubic", "nlls").unwrap().minimizer(), "trf");
//! ```

mod best;
mod fallback;
mod grid;
mod tags;

use std::collections::BTreeMap;

pub use best::select_best;
pub use fallback::{collapse, place, Placement};
pub use grid::Grid;
pub use tags::{ColumnTag, RowTag, Segment, BEST_AVAILABLE};

use crate::engine::BenchmarkOutcome;
use crate::ledger::LedgerGroup;
use crate::record::{ProblemPayload, ResultRecord};

/// Builds reconciled grids from result records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    _private: (),
}

impl ResultAggregator {
    /// Create an aggregator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Tag, place, collapse and rank `records`.
    #[must_use]
    pub fn aggregate(&self, mut records: Vec<ResultRecord>) -> Grid {
        let span = tracing::debug_span!("aggregate", records = records.len());
        let _enter = span.enter();

        let mut placements = place(&records);
        if collapse(&mut placements, &records) {
            tracing::debug!("collapsed sparse columns to best available");
        }
        select_best(&mut records, &placements);
        Grid::build(records, &placements)
    }
}

/// A grid plus the side information a renderer needs.
#[derive(Debug, Clone)]
pub struct Report {
    /// Run label.
    pub label: String,
    /// Reconciled results.
    pub grid: Grid,
    /// Problem payloads keyed by row name.
    pub problems: BTreeMap<String, ProblemPayload>,
    /// Problems where every configuration failed.
    pub failed_problems: Vec<String>,
    /// Software → minimizers that were skipped.
    pub unselected_minimizers: BTreeMap<String, Vec<String>>,
}

impl Report {
    /// Aggregate a reloaded ledger group.
    #[must_use]
    pub fn from_group(group: LedgerGroup) -> Self {
        Self {
            grid: ResultAggregator::new().aggregate(group.results),
            label: group.label,
            problems: group.problems,
            failed_problems: group.failed_problems,
            unselected_minimizers: group.unselected_minimizers,
        }
    }

    /// Aggregate the outcome of a run that just finished.
    #[must_use]
    pub fn from_outcome(label: impl Into<String>, outcome: BenchmarkOutcome) -> Self {
        Self {
            label: label.into(),
            grid: ResultAggregator::new().aggregate(outcome.results),
            problems: BTreeMap::new(),
            failed_problems: outcome.failed_problems,
            unselected_minimizers: outcome.unselected_minimizers,
        }
    }
}

/// Consumer of finished reports (tables, plots, HTML pages).
pub trait Renderer {
    /// Render one report.
    ///
    /// # Errors
    ///
    /// Returns whatever the renderer's output sink reports.
    fn render(&mut self, report: &Report) -> anyhow::Result<()>;
}
