//! Scripted adapters shared by the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use trueno_fit::controller::{
    Controller, CostFunction, DerivativeKind, FitSetup, FitStatus, NoDerivative, ValidationFailed,
};
use trueno_fit::engine::{ManualClock, RuntimeBudget};
use trueno_fit::problem::{Dataset, FittingProblem};

/// What a scripted minimizer does when fitted.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Return these parameters (per dataset) with the given status.
    Converge(Vec<f64>, FitStatus),
    /// Panic inside `fit`.
    Panic,
    /// Return a plain error from `fit`.
    Fail,
    /// Reject the inputs in `validate`.
    RejectInputs,
}

/// Shared call log.
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Controller driven by a per-minimizer script.
pub struct ScriptedController {
    pub name: String,
    pub compatibility: BTreeMap<String, Vec<String>>,
    pub no_bounds: Vec<String>,
    pub jacobian_minimizers: Vec<String>,
    pub hessian_minimizers: Vec<String>,
    pub sparse_minimizers: Vec<String>,
    pub unavailable: Vec<(DerivativeKind, String)>,
    pub behaviors: BTreeMap<String, Behavior>,
    /// Seconds the manual clock advances per fit call, cycled.
    pub fit_seconds: Vec<f64>,
    pub clock: Option<Arc<ManualClock>>,
    pub log: CallLog,
    minimizer: String,
    datasets: usize,
    fit_calls: usize,
    params: Option<Vec<Vec<f64>>>,
    status: FitStatus,
}

impl ScriptedController {
    pub fn new(name: &str, minimizers: &[&str]) -> Self {
        let all: Vec<String> = minimizers.iter().map(ToString::to_string).collect();
        Self {
            name: name.to_string(),
            compatibility: BTreeMap::from([("all".to_string(), all.clone())]),
            no_bounds: Vec::new(),
            jacobian_minimizers: all,
            hessian_minimizers: Vec::new(),
            sparse_minimizers: Vec::new(),
            unavailable: Vec::new(),
            behaviors: BTreeMap::new(),
            fit_seconds: vec![0.01],
            clock: None,
            log: Rc::default(),
            minimizer: String::new(),
            datasets: 1,
            fit_calls: 0,
            params: None,
            status: FitStatus::NotConverged,
        }
    }

    pub fn behave(mut self, minimizer: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(minimizer.to_string(), behavior);
        self
    }

    pub fn with_clock(mut self, clock: Arc<ManualClock>, fit_seconds: Vec<f64>) -> Self {
        self.clock = Some(clock);
        self.fit_seconds = fit_seconds;
        self
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    fn behavior(&self) -> Behavior {
        self.behaviors
            .get(&self.minimizer)
            .cloned()
            .unwrap_or(Behavior::Converge(vec![1.1, 1.9], FitStatus::Converged))
    }
}

impl Controller for ScriptedController {
    fn software(&self) -> &str {
        &self.name
    }

    fn algorithm_compatibility(&self) -> &BTreeMap<String, Vec<String>> {
        &self.compatibility
    }

    fn no_bounds_minimizers(&self) -> &[String] {
        &self.no_bounds
    }

    fn jacobian_enabled(&self, minimizer: &str) -> bool {
        self.jacobian_minimizers.iter().any(|m| m == minimizer)
    }

    fn hessian_enabled(&self, minimizer: &str) -> bool {
        self.hessian_minimizers.iter().any(|m| m == minimizer)
    }

    fn sparsity_enabled(&self, minimizer: &str) -> bool {
        self.sparse_minimizers.iter().any(|m| m == minimizer)
    }

    fn supports_derivative(
        &self,
        kind: DerivativeKind,
        method: &str,
        _problem: &FittingProblem,
    ) -> anyhow::Result<()> {
        if self.unavailable.iter().any(|(k, m)| *k == kind && m == method) {
            return Err(NoDerivative {
                kind,
                method: method.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn configure(&mut self, setup: &FitSetup<'_>) -> anyhow::Result<()> {
        self.minimizer = setup.minimizer.to_string();
        self.datasets = setup.problem.datasets.len();
        self.params = None;
        self.log.borrow_mut().push(format!(
            "configure {}:{}:{}:{}",
            self.name,
            setup.minimizer,
            setup.jacobian.tag(),
            setup.hessian.tag()
        ));
        Ok(())
    }

    fn validate(&mut self) -> anyhow::Result<()> {
        if matches!(self.behavior(), Behavior::RejectInputs) {
            return Err(ValidationFailed("bounds are inverted".to_string()).into());
        }
        Ok(())
    }

    fn prepare(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn fit(&mut self, budget: &RuntimeBudget) -> anyhow::Result<()> {
        self.log.borrow_mut().push(format!("fit {}", self.minimizer));
        if let Some(clock) = &self.clock {
            let secs = self.fit_seconds[self.fit_calls % self.fit_seconds.len()];
            clock.advance_secs(secs);
        }
        self.fit_calls += 1;
        tracing::info!(minimizer = %self.minimizer, "iterating");
        match self.behavior() {
            Behavior::Panic => panic!("Singular matrix encountered"),
            Behavior::Fail => anyhow::bail!("solver diverged"),
            _ => {}
        }
        budget.check()?;
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        if let Behavior::Converge(params, status) = self.behavior() {
            self.params = Some(vec![params; self.datasets]);
            self.status = status;
        }
        Ok(())
    }

    fn final_params(&self) -> Option<&[Vec<f64>]> {
        self.params.as_deref()
    }

    fn status(&self) -> FitStatus {
        self.status
    }
}

/// Chi-squared of the straight line `p0 + p1 * x`.
pub struct LinearNlls;

impl CostFunction for LinearNlls {
    fn name(&self) -> &str {
        "nlls"
    }

    fn evaluate(&self, problem: &FittingProblem, dataset: usize, params: &[f64]) -> f64 {
        let data = &problem.datasets[dataset];
        data.x
            .iter()
            .zip(&data.y)
            .zip(&data.e)
            .map(|((x, y), e)| {
                let r = (y - (params[0] + params[1] * x)) / e;
                r * r
            })
            .sum()
    }
}

/// Cost function that refuses bounded problems.
pub struct UnboundedOnly;

impl CostFunction for UnboundedOnly {
    fn name(&self) -> &str {
        "unbounded_only"
    }

    fn validate_problem(&self, problem: &FittingProblem) -> anyhow::Result<()> {
        if problem.has_bounds() {
            return Err(trueno_fit::controller::IncompatibleCostFunction {
                cost_function: self.name().to_string(),
                problem: problem.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn evaluate(&self, problem: &FittingProblem, dataset: usize, params: &[f64]) -> f64 {
        LinearNlls.evaluate(problem, dataset, params)
    }
}

/// Straight-line problem `y = 1 + 2x` with `starts` start points.
pub fn line_problem(name: &str, starts: usize) -> FittingProblem {
    let x = vec![0.0, 1.0, 2.0, 3.0];
    let y = x.iter().map(|x| 1.0 + 2.0 * x).collect();
    FittingProblem::new(
        name,
        vec!["a".to_string(), "b".to_string()],
        vec![vec![0.5, 0.5]; starts],
        Dataset::new(x, y, None).expect("valid dataset"),
    )
}
