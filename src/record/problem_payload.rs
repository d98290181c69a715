//! Problem Payload - static per-problem data shared by every result

use serde::{Deserialize, Serialize};

use crate::codec;

/// Static data for one problem row, written once per ledger group.
///
/// Results refer to a payload by its `name` (the row name), never by value.
/// Sample arrays hold one entry per dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProblemPayload {
    name: String,
    multivariate: bool,
    format: String,
    #[serde(with = "codec::f64_array")]
    initial_params: Vec<f64>,
    initial_params_display: String,
    #[serde(with = "codec::f64_arrays")]
    x: Vec<Vec<f64>>,
    #[serde(with = "codec::f64_arrays")]
    y: Vec<Vec<f64>>,
    #[serde(with = "codec::f64_arrays")]
    e: Vec<Vec<f64>>,
    #[serde(with = "codec::index_arrays")]
    sorted_index: Vec<Vec<usize>>,
    problem_tag: String,
    description: String,
}

impl ProblemPayload {
    /// Create a payload. Sample arrays are per dataset.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        multivariate: bool,
        format: impl Into<String>,
        initial_params: Vec<f64>,
        initial_params_display: impl Into<String>,
        samples: [Vec<Vec<f64>>; 3],
        sorted_index: Vec<Vec<usize>>,
        problem_tag: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let [x, y, e] = samples;
        Self {
            name: name.into(),
            multivariate,
            format: format.into(),
            initial_params,
            initial_params_display: initial_params_display.into(),
            x,
            y,
            e,
            sorted_index,
            problem_tag: problem_tag.into(),
            description: description.into(),
        }
    }

    /// Get the row name the payload is keyed by.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the problem has more than one independent variable.
    #[must_use]
    pub const fn multivariate(&self) -> bool {
        self.multivariate
    }

    /// Get the problem-definition format tag.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Get the initial parameters of this start point.
    #[must_use]
    pub fn initial_params(&self) -> &[f64] {
        &self.initial_params
    }

    /// Get the initial parameter display string.
    #[must_use]
    pub fn initial_params_display(&self) -> &str {
        &self.initial_params_display
    }

    /// Get the x samples, one array per dataset.
    #[must_use]
    pub fn x(&self) -> &[Vec<f64>] {
        &self.x
    }

    /// Get the y samples, one array per dataset.
    #[must_use]
    pub fn y(&self) -> &[Vec<f64>] {
        &self.y
    }

    /// Get the error samples, one array per dataset.
    #[must_use]
    pub fn e(&self) -> &[Vec<f64>] {
        &self.e
    }

    /// Get the x-sorting permutation, one array per dataset.
    #[must_use]
    pub fn sorted_index(&self) -> &[Vec<usize>] {
        &self.sorted_index
    }

    /// Get the underlying problem tag (unqualified name).
    #[must_use]
    pub fn problem_tag(&self) -> &str {
        &self.problem_tag
    }

    /// Get the free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Rename the payload (used when merging clashing ledgers).
    pub fn rename(&mut self, name: impl Into<String>, problem_tag: impl Into<String>) {
        self.name = name.into();
        self.problem_tag = problem_tag.into();
    }

    /// Whether two payloads describe the same data (parameters and samples,
    /// compared bit-for-bit).
    #[must_use]
    pub fn same_data(&self, other: &Self) -> bool {
        fn bits(v: &[f64]) -> Vec<u64> {
            v.iter().map(|x| x.to_bits()).collect()
        }
        fn nested_bits(v: &[Vec<f64>]) -> Vec<Vec<u64>> {
            v.iter().map(|x| bits(x)).collect()
        }
        bits(&self.initial_params) == bits(&other.initial_params)
            && nested_bits(&self.x) == nested_bits(&other.x)
            && nested_bits(&self.y) == nested_bits(&other.y)
            && nested_bits(&self.e) == nested_bits(&other.e)
    }
}
