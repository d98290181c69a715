//! Configuration Enumerator - walks the benchmark search space
//!
//! ```text
//! problem → start point → cost function → software → minimizer
//!         → Jacobian method × variant → Hessian method × variant → FitExecutor
//! ```
//!
//! Per-configuration failures never stop the walk; they become records with
//! an error code. The only fatal condition is a software package with no
//! minimizer list. Records go to the ledger as soon as they exist.

use std::collections::BTreeMap;

use super::energy::EnergyMeter;
use super::executor::FitExecutor;
use crate::config::BenchmarkOptions;
use crate::controller::{
    check_bounds_support, check_minimizer, minimizer_categories, AdapterRegistry, Controller,
    CostFunction, Derivative, DerivativeKind, FitSetup,
};
use crate::ledger::LedgerWriter;
use crate::problem::{make_names_unique, FittingProblem};
use crate::record::{ProblemPayload, ResultRecord};
use crate::{Error, Result};

/// Method name meaning "no Hessian".
pub const DEFAULT_HESSIAN: &str = "default";
/// Method name of the analytic derivative.
pub const ANALYTIC: &str = "analytic";
/// Suffix marking sparse numerical variants.
pub const SPARSE_SUFFIX: &str = "_sparse";

/// Results of a benchmark run.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkOutcome {
    /// Every record produced, in enumeration order.
    pub results: Vec<ResultRecord>,
    /// Start-qualified names of problems where nothing produced a finite
    /// accuracy.
    pub failed_problems: Vec<String>,
    /// Software → minimizers skipped as unknown or incompatible.
    pub unselected_minimizers: BTreeMap<String, Vec<String>>,
}

/// Drives every configuration of a problem set through a [`FitExecutor`].
pub struct ConfigurationEnumerator<'a> {
    options: &'a BenchmarkOptions,
    registry: &'a AdapterRegistry,
    executor: FitExecutor,
    ledger: Option<&'a mut LedgerWriter>,
    energy: Option<&'a mut dyn EnergyMeter>,
}

/// Fixed context for one minimizer's derivative loops.
struct Leaf<'p> {
    problem: &'p FittingProblem,
    payload: &'p ProblemPayload,
    start_index: usize,
    cost_function: &'p dyn CostFunction,
    minimizer: &'p str,
    algorithm_type: &'p [String],
    algorithm_types: Vec<String>,
}

impl<'a> ConfigurationEnumerator<'a> {
    /// Enumerator over `options`, building adapters from `registry`.
    #[must_use]
    pub fn new(options: &'a BenchmarkOptions, registry: &'a AdapterRegistry) -> Self {
        Self {
            options,
            registry,
            executor: FitExecutor::from_options(options),
            ledger: None,
            energy: None,
        }
    }

    /// Use a custom executor (e.g. one with a manual clock).
    #[must_use]
    pub fn with_executor(mut self, executor: FitExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Append every record to `ledger` as it is produced.
    #[must_use]
    pub fn with_ledger(mut self, ledger: &'a mut LedgerWriter) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Measure energy with `meter` when the options request it.
    #[must_use]
    pub fn with_energy_meter(mut self, meter: &'a mut dyn EnergyMeter) -> Self {
        self.energy = Some(meter);
        self
    }

    /// Benchmark every configuration of `problems`.
    ///
    /// Duplicate problem names are made unique first. When a ledger is
    /// attached, the run's group is finalized under the options label.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingMinimizers` if a software package has no
    /// minimizer list, `Error::UnknownSoftware` or `Error::InvalidInput` for
    /// unregistered adapters, or ledger I/O errors.
    pub fn run(&mut self, mut problems: Vec<FittingProblem>) -> Result<BenchmarkOutcome> {
        if self.options.measures_energy() && self.energy.is_none() {
            tracing::warn!("Energy usage was requested but no energy meter is attached");
        }
        make_names_unique(&mut problems);

        let mut outcome = BenchmarkOutcome::default();
        let total = problems.len();
        for (index, problem) in problems.iter().enumerate() {
            let span = tracing::info_span!("problem", problem = %problem.name);
            let _enter = span.enter();
            tracing::info!("Running problem {}/{total}: {}", index + 1, problem.name);

            let mut problem_results: Vec<ResultRecord> = Vec::new();
            for start_index in 0..problem.starting_values.len() {
                let payload = problem.payload(start_index);
                let records = self.run_start_point(
                    problem,
                    start_index,
                    &payload,
                    &mut outcome.unselected_minimizers,
                )?;
                problem_results.extend(records);
                if problem_results.iter().all(ResultRecord::is_failure) {
                    outcome.failed_problems.push(payload.name().to_string());
                }
            }
            outcome.results.extend(problem_results);
        }

        if let Some(ledger) = self.ledger.as_deref_mut() {
            ledger.finalize_group(
                &self.options.label,
                &outcome.failed_problems,
                &outcome.unselected_minimizers,
            )?;
        }
        Ok(outcome)
    }

    fn run_start_point(
        &mut self,
        problem: &FittingProblem,
        start_index: usize,
        payload: &ProblemPayload,
        unselected: &mut BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<ResultRecord>> {
        let options = self.options;
        let registry = self.registry;
        let span = tracing::debug_span!("start", start = start_index + 1);
        let _enter = span.enter();

        let mut results = Vec::new();
        for cost_name in &options.cost_functions {
            let cost_function = registry.cost_function(cost_name)?;
            let span = tracing::debug_span!("cost_function", cost_function = %cost_name);
            let _enter = span.enter();
            if let Err(err) = cost_function.validate_problem(problem) {
                tracing::info!("Skipping cost function {cost_name}: {err:#}");
                continue;
            }

            for software in &options.software {
                let minimizers = options.minimizers.get(software).ok_or_else(|| {
                    Error::MissingMinimizers {
                        software: software.clone(),
                    }
                })?;
                let mut controller = registry.controller(software)?;
                let span = tracing::debug_span!("software", software = %software);
                let _enter = span.enter();

                let mut skipped = Vec::new();
                for minimizer in minimizers {
                    let span = tracing::debug_span!("minimizer", minimizer = %minimizer);
                    let _enter = span.enter();

                    let check = check_minimizer(
                        controller.as_ref(),
                        minimizer,
                        &options.algorithm_type,
                    )
                    .and_then(|()| {
                        cost_function.validate_algorithm_type(
                            controller.algorithm_compatibility(),
                            minimizer,
                        )
                    });
                    if let Err(err) = check {
                        tracing::warn!("{err:#}");
                        skipped.push(minimizer.clone());
                        continue;
                    }

                    let leaf = Leaf {
                        problem,
                        payload,
                        start_index,
                        cost_function: cost_function.as_ref(),
                        minimizer,
                        algorithm_type: &options.algorithm_type,
                        algorithm_types: minimizer_categories(controller.as_ref(), minimizer),
                    };

                    if problem.has_bounds() {
                        if let Err(err) = check_bounds_support(controller.as_ref(), minimizer) {
                            tracing::warn!("{err:#}");
                            let outcome = self.executor.placeholder(problem);
                            let none = Derivative::none();
                            let setup = leaf.setup(&none, &none);
                            let records = outcome.into_records(
                                &setup,
                                controller.software(),
                                options.runtime_metric,
                                &leaf.algorithm_types,
                            );
                            self.record(&mut results, records, payload)?;
                            continue;
                        }
                    }

                    self.run_jacobians(controller.as_mut(), &leaf, &mut results)?;
                }
                let entry = unselected.entry(software.clone()).or_default();
                for minimizer in skipped {
                    if !entry.contains(&minimizer) {
                        entry.push(minimizer);
                    }
                }
            }
        }
        Ok(results)
    }

    fn run_jacobians(
        &mut self,
        controller: &mut dyn Controller,
        leaf: &Leaf<'_>,
        results: &mut Vec<ResultRecord>,
    ) -> Result<()> {
        if !controller.jacobian_enabled(leaf.minimizer) {
            return self.run_hessians(controller, leaf, &Derivative::none(), results);
        }
        let options = self.options;
        let sparse_ok = controller.sparsity_enabled(leaf.minimizer);

        for requested in &options.jacobian {
            let mut method = requested.clone();
            if let Err(err) =
                controller.supports_derivative(DerivativeKind::Jacobian, &method, leaf.problem)
            {
                if method == ANALYTIC {
                    tracing::info!(
                        "{err:#}; using {} instead",
                        options.analytic_jacobian_fallback
                    );
                    method.clone_from(&options.analytic_jacobian_fallback);
                } else {
                    tracing::info!("Skipping Jacobian {method}: {err:#}");
                    continue;
                }
            }

            for variant in options.jacobian_variants_for(&method) {
                if variant.ends_with(SPARSE_SUFFIX) && !sparse_ok {
                    tracing::debug!("Skipping sparse Jacobian {method} {variant}");
                    continue;
                }
                let jacobian = Derivative::new(method.as_str(), variant);
                let span = tracing::debug_span!("jacobian", jacobian = %jacobian.tag());
                let _enter = span.enter();
                self.run_hessians(controller, leaf, &jacobian, results)?;
            }
        }
        Ok(())
    }

    fn run_hessians(
        &mut self,
        controller: &mut dyn Controller,
        leaf: &Leaf<'_>,
        jacobian: &Derivative,
        results: &mut Vec<ResultRecord>,
    ) -> Result<()> {
        if !controller.hessian_enabled(leaf.minimizer) {
            return self.run_leaf(controller, leaf, jacobian, &Derivative::none(), results);
        }

        let options = self.options;
        for method in &options.hessian {
            if method == DEFAULT_HESSIAN {
                self.run_leaf(controller, leaf, jacobian, &Derivative::none(), results)?;
                continue;
            }
            if let Err(err) =
                controller.supports_derivative(DerivativeKind::Hessian, method, leaf.problem)
            {
                if method == ANALYTIC {
                    tracing::info!("{err:#}; using {DEFAULT_HESSIAN} instead");
                    self.run_leaf(controller, leaf, jacobian, &Derivative::none(), results)?;
                } else {
                    tracing::info!("Skipping Hessian {method}: {err:#}");
                }
                continue;
            }
            for variant in options.hessian_variants_for(method) {
                let hessian = Derivative::new(method.as_str(), variant);
                self.run_leaf(controller, leaf, jacobian, &hessian, results)?;
            }
        }
        Ok(())
    }

    fn run_leaf(
        &mut self,
        controller: &mut dyn Controller,
        leaf: &Leaf<'_>,
        jacobian: &Derivative,
        hessian: &Derivative,
        results: &mut Vec<ResultRecord>,
    ) -> Result<()> {
        let setup = leaf.setup(jacobian, hessian);
        let measuring = self.options.measures_energy();
        let energy: Option<&mut dyn EnergyMeter> = match &mut self.energy {
            Some(meter) if measuring => Some(&mut **meter),
            _ => None,
        };
        let outcome = self.executor.execute(controller, &setup, energy);
        if !outcome.output().is_empty() {
            tracing::debug!(output = %outcome.output().as_str(), "adapter output");
        }
        tracing::debug!(code = outcome.code().code(), "fit finished");
        let software = controller.software().to_string();
        let records = outcome.into_records(
            &setup,
            &software,
            self.options.runtime_metric,
            &leaf.algorithm_types,
        );
        self.record(results, records, leaf.payload)
    }

    fn record(
        &mut self,
        results: &mut Vec<ResultRecord>,
        records: Vec<ResultRecord>,
        payload: &ProblemPayload,
    ) -> Result<()> {
        if let Some(ledger) = self.ledger.as_deref_mut() {
            for record in &records {
                ledger.add_result(record, payload)?;
            }
        }
        results.extend(records);
        Ok(())
    }
}

impl<'p> Leaf<'p> {
    fn setup<'s>(&'s self, jacobian: &'s Derivative, hessian: &'s Derivative) -> FitSetup<'s> {
        FitSetup {
            problem: self.problem,
            cost_function: self.cost_function,
            start_index: self.start_index,
            minimizer: self.minimizer,
            algorithm_type: self.algorithm_type,
            jacobian,
            hessian,
        }
    }
}
