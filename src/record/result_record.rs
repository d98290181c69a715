//! Result Record - outcome of one fit configuration

use serde::{Deserialize, Serialize};

use super::ErrorCode;
use crate::codec;
use crate::config::RuntimeMetric;

/// Floor applied to a zero minimum accuracy when normalizing.
pub const MIN_ACCURACY_FLOOR: f64 = 1e-10;

/// Result Record captures one (problem, start point, cost function,
/// software, minimizer, Jacobian, Hessian) combination.
///
/// Records are immutable once built. The aggregator later sets the two
/// normalization anchors and the best flag; those are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    problem: String,
    start_index: usize,
    dataset: Option<usize>,
    cost_function: String,
    software: String,
    minimizer: String,
    jacobian: String,
    hessian: String,
    #[serde(with = "codec::float")]
    accuracy: f64,
    #[serde(with = "codec::float")]
    runtime: f64,
    #[serde(with = "codec::f64_array")]
    runtimes: Vec<f64>,
    runtime_metric: RuntimeMetric,
    #[serde(with = "codec::opt_float")]
    energy: Option<f64>,
    #[serde(with = "codec::opt_f64_array")]
    params: Option<Vec<f64>>,
    params_display: Option<String>,
    error_code: ErrorCode,
    algorithm_types: Vec<String>,
    #[serde(skip)]
    min_accuracy: Option<f64>,
    #[serde(skip)]
    min_runtime: Option<f64>,
    #[serde(skip)]
    is_best: bool,
}

impl ResultRecord {
    /// Create a builder with the tags every record needs.
    ///
    /// # Arguments
    ///
    /// * `problem` - Problem tag (row name, start-qualified when needed)
    /// * `cost_function` - Cost function tag
    /// * `software` - Software package tag
    /// * `minimizer` - Minimizer tag
    #[must_use]
    pub fn builder(
        problem: impl Into<String>,
        cost_function: impl Into<String>,
        software: impl Into<String>,
        minimizer: impl Into<String>,
    ) -> ResultRecordBuilder {
        ResultRecordBuilder::new(problem, cost_function, software, minimizer)
    }

    /// Get the problem tag.
    #[must_use]
    pub fn problem(&self) -> &str {
        &self.problem
    }

    /// Get the start-point index.
    #[must_use]
    pub const fn start_index(&self) -> usize {
        self.start_index
    }

    /// Get the dataset index (multi-dataset problems only).
    #[must_use]
    pub const fn dataset(&self) -> Option<usize> {
        self.dataset
    }

    /// Get the cost function tag.
    #[must_use]
    pub fn cost_function(&self) -> &str {
        &self.cost_function
    }

    /// Get the software tag.
    #[must_use]
    pub fn software(&self) -> &str {
        &self.software
    }

    /// Get the minimizer tag.
    #[must_use]
    pub fn minimizer(&self) -> &str {
        &self.minimizer
    }

    /// Get the Jacobian (derivative method) tag.
    #[must_use]
    pub fn jacobian(&self) -> &str {
        &self.jacobian
    }

    /// Get the Hessian (second-derivative method) tag.
    #[must_use]
    pub fn hessian(&self) -> &str {
        &self.hessian
    }

    /// Get the raw accuracy as evaluated.
    #[must_use]
    pub const fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Accuracy used for ranking: non-positive or NaN counts as infinite.
    #[must_use]
    pub fn effective_accuracy(&self) -> f64 {
        if self.accuracy > 0.0 {
            self.accuracy
        } else {
            f64::INFINITY
        }
    }

    /// Get the aggregated runtime.
    #[must_use]
    pub const fn runtime(&self) -> f64 {
        self.runtime
    }

    /// Get the raw timing samples.
    #[must_use]
    pub fn runtimes(&self) -> &[f64] {
        &self.runtimes
    }

    /// Get the statistic used to aggregate the runtime.
    #[must_use]
    pub const fn runtime_metric(&self) -> RuntimeMetric {
        self.runtime_metric
    }

    /// Get the energy estimate, if it was measured.
    #[must_use]
    pub const fn energy(&self) -> Option<f64> {
        self.energy
    }

    /// Get the fitted parameters, absent on failure.
    #[must_use]
    pub fn params(&self) -> Option<&[f64]> {
        self.params.as_deref()
    }

    /// Get the human-readable fitted parameter string.
    #[must_use]
    pub fn params_display(&self) -> Option<&str> {
        self.params_display.as_deref()
    }

    /// Get the error code.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    /// Get the algorithm categories the minimizer belongs to.
    #[must_use]
    pub fn algorithm_types(&self) -> &[String] {
        &self.algorithm_types
    }

    /// Whether this record failed outright (infinite accuracy).
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.effective_accuracy().is_infinite()
    }

    /// Get the group minimum accuracy, once aggregated.
    #[must_use]
    pub const fn min_accuracy(&self) -> Option<f64> {
        self.min_accuracy
    }

    /// Get the group minimum runtime, once aggregated.
    #[must_use]
    pub const fn min_runtime(&self) -> Option<f64> {
        self.min_runtime
    }

    /// Whether this record is the most accurate in its group.
    #[must_use]
    pub const fn is_best(&self) -> bool {
        self.is_best
    }

    /// Set the normalization anchors for this record's group.
    pub fn set_anchors(&mut self, min_accuracy: f64, min_runtime: f64) {
        self.min_accuracy = Some(min_accuracy);
        self.min_runtime = Some(min_runtime);
    }

    /// Set or clear the best flag.
    pub fn set_best(&mut self, is_best: bool) {
        self.is_best = is_best;
    }

    pub(crate) fn rename_problem(&mut self, problem: impl Into<String>) {
        self.problem = problem.into();
    }

    /// Accuracy relative to the group minimum.
    ///
    /// Returns `None` before aggregation. A zero minimum is floored at
    /// [`MIN_ACCURACY_FLOOR`]; infinite over infinite stays infinite.
    #[must_use]
    pub fn norm_accuracy(&self) -> Option<f64> {
        let min = self.min_accuracy?;
        let accuracy = self.effective_accuracy();
        if accuracy.is_infinite() || min.is_nan() {
            return Some(f64::INFINITY);
        }
        let min = if min == 0.0 {
            tracing::warn!(
                problem = %self.problem,
                "The min accuracy of the dataset is 0. The relative performance will be \
                 approximated using a min of {MIN_ACCURACY_FLOOR:e}."
            );
            MIN_ACCURACY_FLOOR
        } else {
            min
        };
        Some(accuracy / min)
    }

    /// Runtime relative to the group minimum; infinite over infinite stays
    /// infinite.
    #[must_use]
    pub fn norm_runtime(&self) -> Option<f64> {
        let min = self.min_runtime?;
        if self.runtime.is_infinite() || min.is_infinite() {
            return Some(f64::INFINITY);
        }
        Some(self.runtime / min)
    }
}

/// Builder for `ResultRecord`.
#[derive(Debug)]
pub struct ResultRecordBuilder {
    record: ResultRecord,
}

impl ResultRecordBuilder {
    /// Create a new builder with required fields.
    ///
    /// Defaults: start 0, no dataset, empty derivative tags, infinite
    /// accuracy and runtime, no parameters, code 3.
    #[must_use]
    pub fn new(
        problem: impl Into<String>,
        cost_function: impl Into<String>,
        software: impl Into<String>,
        minimizer: impl Into<String>,
    ) -> Self {
        Self {
            record: ResultRecord {
                problem: problem.into(),
                start_index: 0,
                dataset: None,
                cost_function: cost_function.into(),
                software: software.into(),
                minimizer: minimizer.into(),
                jacobian: String::new(),
                hessian: String::new(),
                accuracy: f64::INFINITY,
                runtime: f64::INFINITY,
                runtimes: Vec::new(),
                runtime_metric: RuntimeMetric::default(),
                energy: None,
                params: None,
                params_display: None,
                error_code: ErrorCode::SoftwareException,
                algorithm_types: Vec::new(),
                min_accuracy: None,
                min_runtime: None,
                is_best: false,
            },
        }
    }

    /// Set the start-point index.
    #[must_use]
    pub const fn start_index(mut self, index: usize) -> Self {
        self.record.start_index = index;
        self
    }

    /// Set the dataset index.
    #[must_use]
    pub const fn dataset(mut self, dataset: usize) -> Self {
        self.record.dataset = Some(dataset);
        self
    }

    /// Set the Jacobian tag.
    #[must_use]
    pub fn jacobian(mut self, jacobian: impl Into<String>) -> Self {
        self.record.jacobian = jacobian.into();
        self
    }

    /// Set the Hessian tag.
    #[must_use]
    pub fn hessian(mut self, hessian: impl Into<String>) -> Self {
        self.record.hessian = hessian.into();
        self
    }

    /// Set the accuracy. NaN is stored as infinity.
    #[must_use]
    pub fn accuracy(mut self, accuracy: f64) -> Self {
        self.record.accuracy = if accuracy.is_nan() { f64::INFINITY } else { accuracy };
        self
    }

    /// Set the timing samples and derive the runtime with `metric`.
    #[must_use]
    pub fn runtimes(mut self, samples: Vec<f64>, metric: RuntimeMetric) -> Self {
        self.record.runtime = metric.aggregate(&samples);
        self.record.runtimes = samples;
        self.record.runtime_metric = metric;
        self
    }

    /// Set the energy estimate.
    #[must_use]
    pub const fn energy(mut self, energy: Option<f64>) -> Self {
        self.record.energy = energy;
        self
    }

    /// Set the fitted parameters.
    #[must_use]
    pub fn params(mut self, params: Option<Vec<f64>>) -> Self {
        self.record.params = params;
        self
    }

    /// Set the fitted parameter display string.
    #[must_use]
    pub fn params_display(mut self, display: impl Into<String>) -> Self {
        self.record.params_display = Some(display.into());
        self
    }

    /// Set the error code.
    #[must_use]
    pub const fn error_code(mut self, code: ErrorCode) -> Self {
        self.record.error_code = code;
        self
    }

    /// Set the algorithm categories of the minimizer.
    #[must_use]
    pub fn algorithm_types(mut self, types: Vec<String>) -> Self {
        self.record.algorithm_types = types;
        self
    }

    /// Build the `ResultRecord`.
    #[must_use]
    pub fn build(self) -> ResultRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(accuracy: f64, runtime: f64) -> ResultRecord {
        ResultRecord::builder("cubic", "nlls", "scipy", "lm")
            .accuracy(accuracy)
            .runtimes(vec![runtime], RuntimeMetric::Mean)
            .error_code(ErrorCode::Converged)
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let r = ResultRecord::builder("p", "c", "s", "m").build();
        assert_eq!(r.error_code(), ErrorCode::SoftwareException);
        assert!(r.accuracy().is_infinite());
        assert!(r.params().is_none());
        assert!(r.norm_accuracy().is_none());
        assert!(!r.is_best());
    }

    #[test]
    fn test_effective_accuracy() {
        assert!((record(0.5, 1.0).effective_accuracy() - 0.5).abs() < f64::EPSILON);
        assert!(record(0.0, 1.0).effective_accuracy().is_infinite());
        assert!(record(-1.0, 1.0).effective_accuracy().is_infinite());
        assert!(record(f64::NAN, 1.0).accuracy().is_infinite());
    }

    #[test]
    fn test_norm_accuracy() {
        let cases = [
            (f64::INFINITY, f64::INFINITY, f64::INFINITY),
            (1.0, 0.01, 100.0),
            (1e-10, 0.0, 1.0),
            (2e-10, 0.0, 2.0),
            (1e-5, 0.0, 1e5),
        ];
        for (acc, min, expected) in cases {
            let mut r = record(acc, 1.0);
            r.set_anchors(min, 1.0);
            let norm = r.norm_accuracy().unwrap();
            assert!(
                (norm - expected).abs() <= expected * 1e-9 || norm == expected,
                "{acc}/{min} = {norm}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_norm_runtime() {
        let mut r = record(1.0, 3.0);
        r.set_anchors(1.0, 1.5);
        assert!((r.norm_runtime().unwrap() - 2.0).abs() < f64::EPSILON);

        let mut failed = record(1.0, f64::INFINITY);
        failed.set_anchors(1.0, f64::INFINITY);
        assert!(failed.norm_runtime().unwrap().is_infinite());
    }

    #[test]
    fn test_anchors_not_serialized() {
        let mut r = record(0.5, 1.0);
        r.set_anchors(0.25, 0.5);
        r.set_best(true);
        let json = serde_json::to_string(&r).unwrap();
        let back: ResultRecord = serde_json::from_str(&json).unwrap();
        assert!(back.min_accuracy().is_none());
        assert!(!back.is_best());
        assert_eq!(back.accuracy().to_bits(), r.accuracy().to_bits());
    }
}
