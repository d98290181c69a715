//! Benchmark options
//!
//! Options are plain `serde` data: every field has a default, so a JSON
//! options file only needs to list what it overrides.
//!
//! ```rust
//! use trueno_fit::config::{BenchmarkOptions, RuntimeMetric};
//!
//! let options: BenchmarkOptions = serde_json::from_str(
//!     r#"{ "software": ["scipy"], "num_runs": 3, "runtime_metric": "median" }"#,
//! )?;
//! assert_eq!(options.num_runs, 3);
//! assert_eq!(options.runtime_metric, RuntimeMetric::Median);
//! options.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Report type that switches on energy measurement around the timed block.
pub const ENERGY_REPORT: &str = "energy_usage";

/// Statistic used to reduce repeated timing samples to one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMetric {
    /// Arithmetic mean.
    #[default]
    Mean,
    /// Median (average of the middle pair for even sample counts).
    Median,
    /// Smallest sample.
    Minimum,
    /// Largest sample.
    Maximum,
    /// First sample only (cold-start timing).
    First,
    /// Harmonic mean; 0 if any sample is 0, infinite if any is negative.
    Harmonic,
    /// 20% trimmed mean.
    Trim,
}

impl RuntimeMetric {
    /// Fraction cut from each end of the sorted samples by [`RuntimeMetric::Trim`].
    pub const TRIM_PROPORTION: f64 = 0.2;

    /// Reduce timing samples to a single runtime.
    ///
    /// Returns infinity for an empty sample set.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn aggregate(self, samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return f64::INFINITY;
        }
        let n = samples.len() as f64;
        match self {
            Self::Mean => samples.iter().sum::<f64>() / n,
            Self::Minimum => samples.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Maximum => samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::First => samples[0],
            Self::Median => {
                let sorted = sorted(samples);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            Self::Harmonic => {
                if samples.iter().any(|&s| s < 0.0 || s.is_nan()) {
                    f64::INFINITY
                } else if samples.iter().any(|&s| s == 0.0) {
                    0.0
                } else {
                    n / samples.iter().map(|s| 1.0 / s).sum::<f64>()
                }
            }
            Self::Trim => {
                let sorted = sorted(samples);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let cut = (Self::TRIM_PROPORTION * n).floor() as usize;
                let kept = &sorted[cut..sorted.len() - cut];
                kept.iter().sum::<f64>() / kept.len() as f64
            }
        }
    }
}

fn sorted(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Options driving one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkOptions {
    /// Name of the run; becomes the ledger group label.
    pub label: String,
    /// Software packages to benchmark, in run order.
    pub software: Vec<String>,
    /// Minimizers to try per software package.
    pub minimizers: BTreeMap<String, Vec<String>>,
    /// Algorithm category minimizers must belong to (`"all"` accepts any).
    pub algorithm_type: Vec<String>,
    /// Cost functions, in run order.
    pub cost_functions: Vec<String>,
    /// Jacobian methods, in run order.
    pub jacobian: Vec<String>,
    /// Numerical variants per Jacobian method.
    pub jacobian_variants: BTreeMap<String, Vec<String>>,
    /// Method substituted when an analytic Jacobian cannot be built.
    pub analytic_jacobian_fallback: String,
    /// Hessian methods, in run order.
    pub hessian: Vec<String>,
    /// Numerical variants per Hessian method.
    pub hessian_variants: BTreeMap<String, Vec<String>>,
    /// Timed repetitions per configuration.
    pub num_runs: usize,
    /// Ceiling on cumulative fit time per configuration, in seconds.
    pub max_runtime: f64,
    /// Statistic reducing the timing samples.
    pub runtime_metric: RuntimeMetric,
    /// Report types requested from the renderer.
    pub report_types: Vec<String>,
    /// Directory for results and the checkpoint file.
    pub results_dir: PathBuf,
    /// Checkpoint filename (absolute, relative, or under `results_dir`).
    pub checkpoint_filename: String,
    /// Capture adapter output instead of letting it through.
    pub capture_output: bool,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        let scipy_minimizers = ["Nelder-Mead", "Powell", "CG", "BFGS", "L-BFGS-B", "TNC", "SLSQP"];
        Self {
            label: "benchmark".to_string(),
            software: vec!["scipy".to_string()],
            minimizers: BTreeMap::from([(
                "scipy".to_string(),
                scipy_minimizers.iter().map(ToString::to_string).collect(),
            )]),
            algorithm_type: vec!["all".to_string()],
            cost_functions: vec!["weighted_nlls".to_string()],
            jacobian: vec!["scipy".to_string()],
            jacobian_variants: BTreeMap::from([(
                "scipy".to_string(),
                vec!["2-point".to_string()],
            )]),
            analytic_jacobian_fallback: "scipy".to_string(),
            hessian: vec!["default".to_string()],
            hessian_variants: BTreeMap::new(),
            num_runs: 5,
            max_runtime: 600.0,
            runtime_metric: RuntimeMetric::Mean,
            report_types: ["acc", "runtime", "compare", "local_min"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            results_dir: PathBuf::from("fitbenchmarking_results"),
            checkpoint_filename: "checkpoint.json".to_string(),
            capture_output: true,
            log_level: "info".to_string(),
        }
    }
}

impl BenchmarkOptions {
    /// Load options from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or fails validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let options: Self = serde_json::from_str(&text)?;
        options.validate()?;
        Ok(options)
    }

    /// Check invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` describing the first violated constraint
    pub fn validate(&self) -> Result<()> {
        if self.num_runs == 0 {
            return Err(Error::InvalidInput("num_runs must be at least 1".to_string()));
        }
        if !(self.max_runtime > 0.0) || Duration::try_from_secs_f64(self.max_runtime).is_err() {
            return Err(Error::InvalidInput(format!(
                "max_runtime must be a positive, finite number of seconds, got {}",
                self.max_runtime
            )));
        }
        for (name, list) in [
            ("software", &self.software),
            ("cost_functions", &self.cost_functions),
            ("jacobian", &self.jacobian),
            ("hessian", &self.hessian),
        ] {
            if list.is_empty() {
                return Err(Error::InvalidInput(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Numerical variants configured for a Jacobian method (`[""]` if none).
    #[must_use]
    pub fn jacobian_variants_for(&self, method: &str) -> Vec<String> {
        variants_or_default(&self.jacobian_variants, method)
    }

    /// Numerical variants configured for a Hessian method (`[""]` if none).
    #[must_use]
    pub fn hessian_variants_for(&self, method: &str) -> Vec<String> {
        variants_or_default(&self.hessian_variants, method)
    }

    /// Whether energy usage should be measured around the timed block.
    #[must_use]
    pub fn measures_energy(&self) -> bool {
        self.report_types.iter().any(|r| r == ENERGY_REPORT)
    }

    /// Runtime ceiling as a `Duration`, saturating when `max_runtime` is out
    /// of range.
    #[must_use]
    pub fn max_runtime_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_runtime).unwrap_or(if self.max_runtime > 0.0 {
            Duration::MAX
        } else {
            Duration::ZERO
        })
    }

    /// Full path of the checkpoint file inside `results_dir`.
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.results_dir.join(&self.checkpoint_filename)
    }
}

fn variants_or_default(map: &BTreeMap<String, Vec<String>>, method: &str) -> Vec<String> {
    match map.get(method) {
        Some(variants) if !variants.is_empty() => variants.clone(),
        _ => vec![String::new()],
    }
}
