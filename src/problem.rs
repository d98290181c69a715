//! Fitting problem definitions
//!
//! Problems arrive already parsed; this module only holds the data the
//! engine needs and derives the static ledger payload from it.

use crate::record::ProblemPayload;
use crate::{Error, Result};

/// One set of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Independent variable samples.
    pub x: Vec<f64>,
    /// Observed values.
    pub y: Vec<f64>,
    /// Observation uncertainties (defaults to all ones).
    pub e: Vec<f64>,
}

impl Dataset {
    /// Create a dataset. Missing errors default to ones.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the sample arrays differ in length
    pub fn new(x: Vec<f64>, y: Vec<f64>, e: Option<Vec<f64>>) -> Result<Self> {
        let e = e.unwrap_or_else(|| vec![1.0; y.len()]);
        if x.len() != y.len() || y.len() != e.len() {
            return Err(Error::InvalidInput(format!(
                "dataset arrays differ in length: x={}, y={}, e={}",
                x.len(),
                y.len(),
                e.len()
            )));
        }
        Ok(Self { x, y, e })
    }

    /// Permutation that sorts `x` ascending.
    #[must_use]
    pub fn sorted_index(&self) -> Vec<usize> {
        let mut index: Vec<usize> = (0..self.x.len()).collect();
        index.sort_by(|&a, &b| self.x[a].total_cmp(&self.x[b]));
        index
    }
}

/// A parsed curve-fitting problem.
#[derive(Debug, Clone, PartialEq)]
pub struct FittingProblem {
    /// Problem name; made unique across a problem set by the enumerator.
    pub name: String,
    /// Problem-definition format tag (e.g. `"nist"`).
    pub format: String,
    /// Free-text description.
    pub description: String,
    /// Parameter names, in parameter order.
    pub param_names: Vec<String>,
    /// Initial parameter vectors, one per start point.
    pub starting_values: Vec<Vec<f64>>,
    /// Observation sets; more than one makes this a multi-dataset problem.
    pub datasets: Vec<Dataset>,
    /// Optional `(lower, upper)` bounds per parameter.
    pub bounds: Option<Vec<(f64, f64)>>,
    /// Whether the independent variable is multidimensional.
    pub multivariate: bool,
}

impl FittingProblem {
    /// Create a single-dataset, unbounded problem.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        param_names: Vec<String>,
        starting_values: Vec<Vec<f64>>,
        dataset: Dataset,
    ) -> Self {
        Self {
            name: name.into(),
            format: "native".to_string(),
            description: String::new(),
            param_names,
            starting_values,
            datasets: vec![dataset],
            bounds: None,
            multivariate: false,
        }
    }

    /// Attach parameter bounds.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Vec<(f64, f64)>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Replace the datasets (two or more makes a multi-dataset problem).
    #[must_use]
    pub fn with_datasets(mut self, datasets: Vec<Dataset>) -> Self {
        self.datasets = datasets;
        self
    }

    /// Whether the problem fits several datasets at once.
    #[must_use]
    pub fn is_multifit(&self) -> bool {
        self.datasets.len() > 1
    }

    /// Whether the problem declares parameter bounds.
    #[must_use]
    pub const fn has_bounds(&self) -> bool {
        self.bounds.is_some()
    }

    /// Whether `params` lies inside the declared bounds (always true when
    /// unbounded).
    #[must_use]
    pub fn within_bounds(&self, params: &[f64]) -> bool {
        self.bounds.as_ref().map_or(true, |bounds| {
            params
                .iter()
                .zip(bounds)
                .all(|(p, (lo, hi))| *lo <= *p && *p <= *hi)
        })
    }

    /// Row name for a start point: `"<name>, Start <k>"` when the problem
    /// has several start points, otherwise the bare name.
    #[must_use]
    pub fn row_name(&self, start_index: usize) -> String {
        if self.starting_values.len() > 1 {
            format!("{}, Start {}", self.name, start_index + 1)
        } else {
            self.name.clone()
        }
    }

    /// Render parameters as `"a=1, b=2"`.
    #[must_use]
    pub fn describe_params(&self, params: &[f64]) -> String {
        self.param_names
            .iter()
            .zip(params)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Static ledger payload for one start point.
    #[must_use]
    pub fn payload(&self, start_index: usize) -> ProblemPayload {
        let initial = self
            .starting_values
            .get(start_index)
            .cloned()
            .unwrap_or_default();
        let display = self.describe_params(&initial);
        ProblemPayload::new(
            self.row_name(start_index),
            self.multivariate,
            self.format.clone(),
            initial,
            display,
            [
                self.datasets.iter().map(|d| d.x.clone()).collect(),
                self.datasets.iter().map(|d| d.y.clone()).collect(),
                self.datasets.iter().map(|d| d.e.clone()).collect(),
            ],
            self.datasets.iter().map(Dataset::sorted_index).collect(),
            self.name.clone(),
            self.description.clone(),
        )
    }
}

/// Give duplicate problem names a ` 1`, ` 2`, ... suffix, in input order.
pub fn make_names_unique(problems: &mut [FittingProblem]) {
    use std::collections::HashMap;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for p in problems.iter() {
        *counts.entry(p.name.clone()).or_default() += 1;
    }
    let mut seen: HashMap<String, usize> = HashMap::new();
    for p in problems.iter_mut() {
        if counts[&p.name] > 1 {
            let index = seen.entry(p.name.clone()).or_default();
            *index += 1;
            p.name = format!("{} {}", p.name, index);
        }
    }
}
