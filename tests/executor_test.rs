//! Fit Executor Tests
//!
//! Lifecycle, timing, runtime ceiling and failure classification of a single
//! configuration. All timing runs on a manual clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{line_problem, Behavior, CallLog, LinearNlls, ScriptedController};
use trueno_fit::config::RuntimeMetric;
use trueno_fit::controller::{Derivative, FitSetup, FitStatus};
use trueno_fit::engine::{
    EnergyMeter, FitExecutor, FitWarning, FixedEnergyMeter, ManualClock, OutputCapture, Stage,
};
use trueno_fit::problem::{Dataset, FittingProblem};
use trueno_fit::record::ErrorCode;

fn executor(num_runs: usize, max_runtime: f64, clock: &Arc<ManualClock>) -> FitExecutor {
    FitExecutor::new(num_runs, Duration::from_secs_f64(max_runtime)).with_clock(clock.clone())
}

fn setup<'a>(problem: &'a FittingProblem, minimizer: &'a str, none: &'a Derivative) -> FitSetup<'a> {
    FitSetup {
        problem,
        cost_function: &LinearNlls,
        start_index: 0,
        minimizer,
        algorithm_type: &[],
        jacobian: none,
        hessian: none,
    }
}

// =============================================================================
// Successful fits
// =============================================================================

#[test]
fn test_converged_fit() {
    let clock = Arc::new(ManualClock::new());
    let mut controller =
        ScriptedController::new("mock", &["lm"]).with_clock(clock.clone(), vec![0.5]);
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(3, 60.0, &clock).execute(&mut controller, &setup(&problem, "lm", &none), None);

    assert_eq!(outcome.code(), ErrorCode::Converged);
    assert_eq!(outcome.stage(), Stage::Done);
    assert!(outcome.failed_in().is_none());
    assert_eq!(outcome.fit_calls(), 3);
    assert_eq!(outcome.runtimes(), &[0.5, 0.5, 0.5]);
    assert!(outcome.energy().is_none());
    assert!(outcome.warnings().is_empty());
    // residuals of (1.1 + 1.9x) against 1 + 2x at x = 0..3
    let expected = 0.01 + 0.0 + 0.01 + 0.04;
    assert!((outcome.accuracies()[0] - expected).abs() < 1e-12);
    assert_eq!(outcome.params()[0].as_deref(), Some(&[1.1, 1.9][..]));
}

#[test]
fn test_status_maps_to_code() {
    let clock = Arc::new(ManualClock::new());
    let mut controller = ScriptedController::new("mock", &["lm"])
        .behave("lm", Behavior::Converge(vec![1.0, 2.0], FitStatus::MaxIterations));
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(1, 60.0, &clock).execute(&mut controller, &setup(&problem, "lm", &none), None);
    assert_eq!(outcome.code(), ErrorCode::MaxIterations);
}

#[test]
fn test_energy_is_averaged_over_runs() {
    let clock = Arc::new(ManualClock::new());
    let mut controller = ScriptedController::new("mock", &["lm"]);
    let mut meter = FixedEnergyMeter::new(10.0);
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(5, 60.0, &clock).execute(
        &mut controller,
        &setup(&problem, "lm", &none),
        Some(&mut meter as &mut dyn EnergyMeter),
    );

    assert_eq!(outcome.energy(), Some(2.0));
    assert_eq!(meter.measurements(), 1);
}

// =============================================================================
// Timing
// =============================================================================

#[test]
fn test_timing_outlier_warns_without_changing_code() {
    let clock = Arc::new(ManualClock::new());
    let mut controller =
        ScriptedController::new("mock", &["lm"]).with_clock(clock.clone(), vec![1.0, 5.0]);
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(2, 60.0, &clock).execute(&mut controller, &setup(&problem, "lm", &none), None);

    assert_eq!(outcome.code(), ErrorCode::Converged);
    match outcome.warnings() {
        [FitWarning::TimingOutlier { ratio, fastest }] => {
            assert!((ratio - 5.0).abs() < 1e-9);
            assert!((fastest - 1.0).abs() < 1e-9);
        }
        other => panic!("expected one timing warning, got {other:?}"),
    }
}

#[test]
fn test_runtime_ceiling_stops_further_iterations() {
    let clock = Arc::new(ManualClock::new());
    let mut controller =
        ScriptedController::new("mock", &["lm"]).with_clock(clock.clone(), vec![1.0]);
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(5, 1.5, &clock).execute(&mut controller, &setup(&problem, "lm", &none), None);

    assert_eq!(outcome.code(), ErrorCode::MaxRuntimeExceeded);
    assert_eq!(outcome.fit_calls(), 2);
    assert_eq!(outcome.failed_in(), Some(Stage::Fitting));
    assert!(outcome.runtimes().iter().all(|r| r.is_infinite()));
    assert!(outcome.accuracies()[0].is_infinite());
    assert!(outcome.params()[0].is_none());
}

#[test]
fn test_ceiling_counts_every_window() {
    let clock = Arc::new(ManualClock::new());
    let mut controller =
        ScriptedController::new("mock", &["lm"]).with_clock(clock.clone(), vec![0.4]);
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(5, 1.0, &clock).execute(&mut controller, &setup(&problem, "lm", &none), None);

    assert_eq!(outcome.code(), ErrorCode::MaxRuntimeExceeded);
    assert_eq!(outcome.fit_calls(), 3);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_panic_is_software_exception() {
    let clock = Arc::new(ManualClock::new());
    let mut controller = ScriptedController::new("mock", &["lm"]).behave("lm", Behavior::Panic);
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(3, 60.0, &clock).execute(&mut controller, &setup(&problem, "lm", &none), None);

    assert_eq!(outcome.code(), ErrorCode::SoftwareException);
    assert_eq!(outcome.fit_calls(), 1);
    assert_eq!(outcome.message(), Some("Singular matrix encountered"));
    assert!(outcome.output().as_str().contains("iterating"));
}

#[test]
fn test_error_is_software_exception() {
    let clock = Arc::new(ManualClock::new());
    let mut controller = ScriptedController::new("mock", &["lm"]).behave("lm", Behavior::Fail);
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(3, 60.0, &clock).execute(&mut controller, &setup(&problem, "lm", &none), None);
    assert_eq!(outcome.code(), ErrorCode::SoftwareException);
    assert_eq!(outcome.message(), Some("solver diverged"));
}

#[test]
fn test_validation_failure_never_fits() {
    let clock = Arc::new(ManualClock::new());
    let mut controller =
        ScriptedController::new("mock", &["lm"]).behave("lm", Behavior::RejectInputs);
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(3, 60.0, &clock).execute(&mut controller, &setup(&problem, "lm", &none), None);

    assert_eq!(outcome.code(), ErrorCode::ValidationFailed);
    assert_eq!(outcome.failed_in(), Some(Stage::Validating));
    assert_eq!(outcome.fit_calls(), 0);
}

#[test]
fn test_failure_energy_is_infinite_when_measured() {
    let clock = Arc::new(ManualClock::new());
    let mut controller = ScriptedController::new("mock", &["lm"]).behave("lm", Behavior::Fail);
    let mut meter = FixedEnergyMeter::new(1.0);
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(3, 60.0, &clock).execute(
        &mut controller,
        &setup(&problem, "lm", &none),
        Some(&mut meter as &mut dyn EnergyMeter),
    );
    assert!(outcome.energy().unwrap().is_infinite());
    assert!(!meter.running());
}

#[test]
fn test_nan_accuracy_is_software_exception() {
    let clock = Arc::new(ManualClock::new());
    let mut controller = ScriptedController::new("mock", &["lm"])
        .behave("lm", Behavior::Converge(vec![f64::NAN, 2.0], FitStatus::Converged));
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(1, 60.0, &clock).execute(&mut controller, &setup(&problem, "lm", &none), None);
    assert_eq!(outcome.code(), ErrorCode::SoftwareException);
    assert_eq!(outcome.failed_in(), Some(Stage::CleaningUp));
}

#[test]
fn test_out_of_bounds_result_is_flagged() {
    let clock = Arc::new(ManualClock::new());
    let mut controller = ScriptedController::new("mock", &["lm"]);
    let problem = line_problem("line", 1).with_bounds(vec![(0.0, 1.0), (0.0, 1.0)]);
    let none = Derivative::none();

    let outcome = executor(1, 60.0, &clock).execute(&mut controller, &setup(&problem, "lm", &none), None);

    assert_eq!(outcome.code(), ErrorCode::BoundsViolated);
    assert!(outcome.accuracies()[0].is_finite());
    assert!(outcome.params()[0].is_some());
}

#[test]
fn test_bounded_problem_with_unbounded_minimizer_is_not_fitted() {
    let clock = Arc::new(ManualClock::new());
    let log = CallLog::default();
    let mut controller = ScriptedController::new("mock", &["lm", "nm"]).with_log(log.clone());
    controller.no_bounds = vec!["nm".to_string()];
    let problem = line_problem("line", 1).with_bounds(vec![(0.0, 5.0), (0.0, 5.0)]);
    let none = Derivative::none();

    let outcome = executor(3, 60.0, &clock).execute(&mut controller, &setup(&problem, "nm", &none), None);

    assert_eq!(outcome.code(), ErrorCode::BoundsUnsupported);
    assert_eq!(outcome.failed_in(), Some(Stage::Validating));
    assert_eq!(outcome.fit_calls(), 0);
    assert!(outcome.accuracies()[0].is_infinite());
    assert!(outcome.message().unwrap().contains("nm"));
    assert!(log.borrow().is_empty());

    // the same minimizer runs when the problem is unbounded
    let free = line_problem("free", 1);
    let outcome = executor(3, 60.0, &clock).execute(&mut controller, &setup(&free, "nm", &none), None);
    assert_eq!(outcome.code(), ErrorCode::Converged);
    assert_eq!(outcome.fit_calls(), 3);
}

#[test]
fn test_minimizer_outside_algorithm_type_is_not_fitted() {
    let clock = Arc::new(ManualClock::new());
    let mut controller = ScriptedController::new("mock", &["lm"]);
    let problem = line_problem("line", 1);
    let none = Derivative::none();
    let ls = vec!["ls".to_string()];
    let restricted = FitSetup {
        algorithm_type: &ls,
        ..setup(&problem, "lm", &none)
    };

    let outcome = executor(2, 60.0, &clock).execute(&mut controller, &restricted, None);

    assert_eq!(outcome.code(), ErrorCode::BoundsUnsupported);
    assert_eq!(outcome.fit_calls(), 0);
    assert!(outcome.message().unwrap().contains("not in algorithm type ls"));
}

#[test]
fn test_capture_can_be_disabled() {
    let clock = Arc::new(ManualClock::new());
    let mut controller = ScriptedController::new("mock", &["lm"]);
    let problem = line_problem("line", 1);
    let none = Derivative::none();

    let outcome = executor(1, 60.0, &clock)
        .with_capture(OutputCapture::new(false))
        .execute(&mut controller, &setup(&problem, "lm", &none), None);
    assert!(outcome.output().is_empty());
}

// =============================================================================
// Records
// =============================================================================

#[test]
fn test_multifit_yields_one_record_per_dataset() {
    let clock = Arc::new(ManualClock::new());
    let mut controller = ScriptedController::new("mock", &["lm"]);
    let second = Dataset::new(vec![0.0, 1.0], vec![1.0, 3.0], None).unwrap();
    let base = line_problem("multi", 1);
    let datasets = vec![base.datasets[0].clone(), second];
    let problem = base.with_datasets(datasets);
    let none = Derivative::none();
    let jacobian = Derivative::new("scipy", "2-point");
    let multi = FitSetup {
        jacobian: &jacobian,
        ..setup(&problem, "lm", &none)
    };

    let outcome = executor(2, 60.0, &clock).execute(&mut controller, &multi, None);
    let records = outcome.into_records(&multi, "mock", RuntimeMetric::Median, &["ls".to_string()]);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].dataset(), Some(0));
    assert_eq!(records[1].dataset(), Some(1));
    assert_eq!(records[1].jacobian(), "scipy 2-point");
    assert_eq!(records[1].hessian(), "");
    assert_eq!(records[0].params_display(), Some("a=1.1, b=1.9"));
    assert_eq!(records[0].algorithm_types(), &["ls".to_string()]);
    assert_eq!(records[0].runtime_metric(), RuntimeMetric::Median);
}

#[test]
fn test_placeholder_outcome() {
    let clock = Arc::new(ManualClock::new());
    let problem = line_problem("line", 1);
    let outcome = executor(3, 60.0, &clock).placeholder(&problem);
    assert_eq!(outcome.code(), ErrorCode::BoundsUnsupported);
    assert_eq!(outcome.fit_calls(), 0);
    assert!(outcome.accuracies()[0].is_infinite());
}
