//! Fit Executor - runs one configuration through the adapter lifecycle
//!
//! ```text
//! Validating → (Preparing → Fitting) × num_runs → CleaningUp → Done
//!      └──────────────┴──────────────────┴───────────→ Failed
//! ```
//!
//! Every adapter call is wrapped in [`OutputCapture`], so panics and errors
//! both end up as error codes on the outcome rather than escaping.

use std::sync::Arc;
use std::time::Duration;

use super::capture::{CapturedOutput, OutputCapture};
use super::energy::{EnergyMeter, EnergyScope};
use super::{Clock, RuntimeBudget, SystemClock};
use crate::config::{BenchmarkOptions, RuntimeMetric};
use crate::controller::{
    check_bounds_support, check_minimizer, Controller, FitSetup, MaxRuntimeExceeded,
    ValidationFailed,
};
use crate::problem::FittingProblem;
use crate::record::{ErrorCode, ResultRecord};

/// Largest tolerated ratio between the slowest and fastest timed run.
pub const OUTLIER_RATIO: f64 = 4.0;

/// Lifecycle stage of one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Compatibility and adapter validation.
    Validating,
    /// Untimed per-run setup.
    Preparing,
    /// Timed fit.
    Fitting,
    /// Result extraction and evaluation.
    CleaningUp,
    /// Finished normally.
    Done,
    /// Stopped early; see [`FitOutcome::failed_in`].
    Failed,
}

/// Non-fatal condition noticed while running a configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum FitWarning {
    /// Slowest run took more than [`OUTLIER_RATIO`] times the fastest.
    TimingOutlier {
        /// Slowest over fastest.
        ratio: f64,
        /// Fastest run in seconds.
        fastest: f64,
    },
}

/// Everything the engine learned from one configuration.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    code: ErrorCode,
    stage: Stage,
    failed_in: Option<Stage>,
    message: Option<String>,
    accuracies: Vec<f64>,
    params: Vec<Option<Vec<f64>>>,
    runtimes: Vec<f64>,
    energy: Option<f64>,
    warnings: Vec<FitWarning>,
    output: CapturedOutput,
    fit_calls: usize,
}

impl FitOutcome {
    fn pending(datasets: usize, measuring: bool) -> Self {
        Self {
            code: ErrorCode::SoftwareException,
            stage: Stage::Validating,
            failed_in: None,
            message: None,
            accuracies: vec![f64::INFINITY; datasets],
            params: vec![None; datasets],
            runtimes: Vec::new(),
            energy: measuring.then_some(f64::INFINITY),
            warnings: Vec::new(),
            output: CapturedOutput::default(),
            fit_calls: 0,
        }
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the final stage (`Done` or `Failed`).
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Stage the configuration failed in, if it failed.
    #[must_use]
    pub const fn failed_in(&self) -> Option<Stage> {
        self.failed_in
    }

    /// Failure message, if it failed.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Accuracy per dataset.
    #[must_use]
    pub fn accuracies(&self) -> &[f64] {
        &self.accuracies
    }

    /// Fitted parameters per dataset.
    #[must_use]
    pub fn params(&self) -> &[Option<Vec<f64>>] {
        &self.params
    }

    /// Timing samples in seconds.
    #[must_use]
    pub fn runtimes(&self) -> &[f64] {
        &self.runtimes
    }

    /// Energy per run, if measured.
    #[must_use]
    pub const fn energy(&self) -> Option<f64> {
        self.energy
    }

    /// Warnings raised while running.
    #[must_use]
    pub fn warnings(&self) -> &[FitWarning] {
        &self.warnings
    }

    /// Output the adapter produced.
    #[must_use]
    pub const fn output(&self) -> &CapturedOutput {
        &self.output
    }

    /// Number of timed fit calls made.
    #[must_use]
    pub const fn fit_calls(&self) -> usize {
        self.fit_calls
    }

    /// Turn the outcome into records: one per dataset, tagged with the
    /// dataset index for multi-dataset problems.
    #[must_use]
    pub fn into_records(
        self,
        setup: &FitSetup<'_>,
        software: &str,
        metric: RuntimeMetric,
        algorithm_types: &[String],
    ) -> Vec<ResultRecord> {
        let problem = setup.problem;
        let multifit = problem.is_multifit();
        let row = problem.row_name(setup.start_index);
        self.accuracies
            .iter()
            .zip(self.params)
            .enumerate()
            .map(|(index, (&accuracy, params))| {
                let mut builder = ResultRecord::builder(
                    row.as_str(),
                    setup.cost_function.name(),
                    software,
                    setup.minimizer,
                )
                .start_index(setup.start_index)
                .jacobian(setup.jacobian.tag())
                .hessian(setup.hessian.tag())
                .accuracy(accuracy)
                .runtimes(self.runtimes.clone(), metric)
                .energy(self.energy)
                .error_code(self.code)
                .algorithm_types(algorithm_types.to_vec());
                if let Some(p) = &params {
                    builder = builder.params_display(problem.describe_params(p));
                }
                if multifit {
                    builder = builder.dataset(index);
                }
                builder.params(params).build()
            })
            .collect()
    }
}

/// Map an adapter error onto an error code by its typed cause.
#[must_use]
pub fn classify(error: &anyhow::Error) -> ErrorCode {
    if error.chain().any(|cause| cause.is::<MaxRuntimeExceeded>()) {
        ErrorCode::MaxRuntimeExceeded
    } else if error.chain().any(|cause| cause.is::<ValidationFailed>()) {
        ErrorCode::ValidationFailed
    } else {
        ErrorCode::SoftwareException
    }
}

/// Slowest-over-fastest ratio when it exceeds [`OUTLIER_RATIO`].
#[must_use]
pub fn timing_outlier(runtimes: &[f64]) -> Option<f64> {
    let fastest = runtimes.iter().copied().fold(f64::INFINITY, f64::min);
    let slowest = runtimes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ratio = slowest / fastest;
    (ratio > OUTLIER_RATIO).then_some(ratio)
}

/// Runs configurations through the adapter lifecycle, sequentially.
pub struct FitExecutor {
    num_runs: usize,
    max_runtime: Duration,
    clock: Arc<dyn Clock>,
    capture: OutputCapture,
}

impl FitExecutor {
    /// Executor timing `num_runs` repetitions against a ceiling, with the
    /// system clock and output capture on.
    #[must_use]
    pub fn new(num_runs: usize, max_runtime: Duration) -> Self {
        Self {
            num_runs,
            max_runtime,
            clock: Arc::new(SystemClock::new()),
            capture: OutputCapture::default(),
        }
    }

    /// Executor configured from benchmark options.
    #[must_use]
    pub fn from_options(options: &BenchmarkOptions) -> Self {
        Self::new(options.num_runs, options.max_runtime_duration())
            .with_capture(OutputCapture::new(options.capture_output))
    }

    /// Use a different clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different capture policy.
    #[must_use]
    pub const fn with_capture(mut self, capture: OutputCapture) -> Self {
        self.capture = capture;
        self
    }

    /// Get the number of timed repetitions.
    #[must_use]
    pub const fn num_runs(&self) -> usize {
        self.num_runs
    }

    /// Outcome for a minimizer that cannot handle the problem's bounds.
    /// Nothing is run.
    #[must_use]
    pub fn placeholder(&self, problem: &FittingProblem) -> FitOutcome {
        let mut outcome = FitOutcome::pending(problem.datasets.len(), false);
        outcome.code = ErrorCode::BoundsUnsupported;
        outcome.stage = Stage::Failed;
        outcome.failed_in = Some(Stage::Validating);
        outcome.message = Some(ErrorCode::BoundsUnsupported.description().to_string());
        outcome
    }

    /// Run one configuration.
    ///
    /// Never fails: adapter errors and panics become error codes.
    pub fn execute(
        &self,
        controller: &mut dyn Controller,
        setup: &FitSetup<'_>,
        energy: Option<&mut dyn EnergyMeter>,
    ) -> FitOutcome {
        let span = tracing::debug_span!(
            "fit",
            minimizer = setup.minimizer,
            jacobian = %setup.jacobian.tag(),
            hessian = %setup.hessian.tag(),
        );
        let _enter = span.enter();

        let datasets = setup.problem.datasets.len();
        let mut outcome = FitOutcome::pending(datasets, energy.is_some());

        tracing::trace!(stage = ?Stage::Validating);
        if let Err(err) = admit(&*controller, setup) {
            tracing::warn!("{err:#}");
            let mut placeholder = self.placeholder(setup.problem);
            placeholder.message = Some(format!("{err:#}"));
            return placeholder;
        }
        let (result, output) = self.capture.run(|| {
            controller.configure(setup)?;
            controller.validate()
        });
        outcome.output.extend(output);
        if let Err((code, message)) = settle(result) {
            return self.fail(outcome, Stage::Validating, code, message);
        }

        let budget = RuntimeBudget::new(Arc::clone(&self.clock), self.max_runtime);
        let scope = energy.map(EnergyScope::start);
        let mut runtimes = Vec::with_capacity(self.num_runs);
        for _ in 0..self.num_runs {
            tracing::trace!(stage = ?Stage::Preparing);
            let (result, output) = self.capture.run(|| controller.prepare());
            outcome.output.extend(output);
            if let Err((code, message)) = settle(result) {
                return self.fail(outcome, Stage::Preparing, code, message);
            }

            tracing::trace!(stage = ?Stage::Fitting);
            let (result, output) = self.capture.run(|| {
                budget.start();
                let result = controller.fit(&budget);
                (result, budget.stop())
            });
            outcome.output.extend(output);
            outcome.fit_calls += 1;
            let result = result.map(|(result, window)| {
                runtimes.push(window.as_secs_f64());
                result
            });
            if let Err((code, message)) = settle(result) {
                return self.fail(outcome, Stage::Fitting, code, message);
            }
            if let Err(exceeded) = budget.check() {
                return self.fail(
                    outcome,
                    Stage::Fitting,
                    ErrorCode::MaxRuntimeExceeded,
                    exceeded.to_string(),
                );
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let energy = scope.map(|scope| scope.finish() / self.num_runs as f64);

        if let Some(ratio) = timing_outlier(&runtimes) {
            let fastest = runtimes.iter().copied().fold(f64::INFINITY, f64::min);
            tracing::warn!(
                "The ratio of the max time to the min is {ratio:.3}, which is larger than the \
                 tolerance of {OUTLIER_RATIO}. The min time is {fastest:.3e}s. This can indicate \
                 that the fitting engine is caching results. If the min time is small this may \
                 just indicate noise."
            );
            outcome.warnings.push(FitWarning::TimingOutlier { ratio, fastest });
        }

        tracing::trace!(stage = ?Stage::CleaningUp);
        let (result, output) = self.capture.run(|| {
            controller.cleanup()?;
            controller.check_attributes()
        });
        outcome.output.extend(output);
        if let Err((code, message)) = settle(result) {
            return self.fail(outcome, Stage::CleaningUp, code, message);
        }

        let Some(final_params) = controller.final_params().map(<[Vec<f64>]>::to_vec) else {
            return self.fail(
                outcome,
                Stage::CleaningUp,
                ErrorCode::SoftwareException,
                "no final parameters".to_string(),
            );
        };
        if final_params.len() != datasets {
            let message = format!(
                "expected parameters for {datasets} datasets, got {}",
                final_params.len()
            );
            return self.fail(outcome, Stage::CleaningUp, ErrorCode::SoftwareException, message);
        }

        let (result, output) = self.capture.run(|| {
            final_params
                .iter()
                .enumerate()
                .map(|(index, params)| setup.cost_function.evaluate(setup.problem, index, params))
                .collect::<Vec<f64>>()
        });
        outcome.output.extend(output);
        let accuracies = match result {
            Ok(accuracies) => accuracies,
            Err(panic) => {
                return self.fail(outcome, Stage::CleaningUp, ErrorCode::SoftwareException, panic)
            }
        };
        if accuracies.iter().chain(&runtimes).any(|v| v.is_nan()) {
            return self.fail(
                outcome,
                Stage::CleaningUp,
                ErrorCode::SoftwareException,
                "accuracy or runtime is NaN".to_string(),
            );
        }

        let mut code = ErrorCode::from(controller.status());
        if setup.problem.has_bounds()
            && code.ran()
            && final_params.iter().any(|p| !setup.problem.within_bounds(p))
        {
            code = ErrorCode::BoundsViolated;
        }

        outcome.code = code;
        outcome.stage = Stage::Done;
        outcome.accuracies = accuracies;
        outcome.params = final_params.into_iter().map(Some).collect();
        outcome.runtimes = runtimes;
        outcome.energy = energy;
        outcome
    }

    fn fail(&self, mut outcome: FitOutcome, stage: Stage, code: ErrorCode, message: String) -> FitOutcome {
        tracing::warn!(stage = ?stage, code = code.code(), "{}: {message}", code.description());
        outcome.code = code;
        outcome.stage = Stage::Failed;
        outcome.failed_in = Some(stage);
        outcome.message = Some(message);
        outcome.accuracies.fill(f64::INFINITY);
        outcome.params.fill(None);
        outcome.runtimes = vec![f64::INFINITY; self.num_runs];
        outcome.energy = outcome.energy.map(|_| f64::INFINITY);
        outcome
    }
}

/// Minimizer must belong to the requested categories and, for a bounded
/// problem, support bounds.
fn admit(controller: &dyn Controller, setup: &FitSetup<'_>) -> anyhow::Result<()> {
    check_minimizer(controller, setup.minimizer, setup.algorithm_type)?;
    if setup.problem.has_bounds() {
        check_bounds_support(controller, setup.minimizer)?;
    }
    Ok(())
}

fn settle(result: Result<anyhow::Result<()>, String>) -> Result<(), (ErrorCode, String)> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err((classify(&error), format!("{error:#}"))),
        Err(panic) => Err((ErrorCode::SoftwareException, panic)),
    }
}
