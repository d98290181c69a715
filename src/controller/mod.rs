//! Adapter contract for fitting back ends
//!
//! A [`Controller`] wraps one software package. The engine drives it through
//! a fixed lifecycle:
//!
//! ```text
//! configure → validate → (prepare → fit) × num_runs → cleanup → check_attributes
//! ```
//!
//! and reads back per-dataset parameters and a status. Accuracy is never
//! the adapter's business: the [`CostFunction`] evaluates the returned
//! parameters.
//!
//! Adapters signal well-known conditions by returning one of the types in
//! [`errors`] (wrapped in `anyhow::Error`, possibly with added context).

pub mod errors;

use std::collections::BTreeMap;

use crate::engine::RuntimeBudget;
use crate::problem::FittingProblem;
use crate::record::ErrorCode;
use crate::{Error, Result};

pub use errors::{
    BoundsUnsupported, DerivativeKind, IncompatibleCostFunction, IncompatibleMinimizer,
    MaxRuntimeExceeded, NoDerivative, UnknownMinimizer, ValidationFailed,
};

/// Algorithm category every minimizer implicitly belongs to.
pub const ALL_CATEGORY: &str = "all";

/// Self-reported outcome of a completed fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitStatus {
    /// Converged to a solution.
    Converged,
    /// Stopped at the iteration limit.
    MaxIterations,
    /// Stopped without converging for another reason.
    #[default]
    NotConverged,
}

impl From<FitStatus> for ErrorCode {
    fn from(status: FitStatus) -> Self {
        match status {
            FitStatus::Converged => Self::Converged,
            FitStatus::MaxIterations => Self::MaxIterations,
            FitStatus::NotConverged => Self::NotConverged,
        }
    }
}

/// One derivative choice: a method and an optional numerical variant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Derivative {
    method: String,
    variant: String,
}

impl Derivative {
    /// Derivative built with `method`, using `variant` (may be empty).
    #[must_use]
    pub fn new(method: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            variant: variant.into(),
        }
    }

    /// No derivative information (minimizer does not use it).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Get the method name (empty for [`Derivative::none`]).
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get the numerical variant (may be empty).
    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Whether this is the "no derivative" choice.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.method.is_empty()
    }

    /// Record tag: `"<method> <variant>"`, `"<method>"`, or `""`.
    #[must_use]
    pub fn tag(&self) -> String {
        if self.variant.is_empty() {
            self.method.clone()
        } else {
            format!("{} {}", self.method, self.variant)
        }
    }
}

/// Everything an adapter needs to know for one configuration.
pub struct FitSetup<'a> {
    /// Problem being fitted.
    pub problem: &'a FittingProblem,
    /// Cost function the fit minimizes.
    pub cost_function: &'a dyn CostFunction,
    /// Index into `problem.starting_values`.
    pub start_index: usize,
    /// Minimizer name.
    pub minimizer: &'a str,
    /// Requested algorithm categories.
    pub algorithm_type: &'a [String],
    /// Jacobian choice.
    pub jacobian: &'a Derivative,
    /// Hessian choice.
    pub hessian: &'a Derivative,
}

impl FitSetup<'_> {
    /// Initial parameters for this start point.
    #[must_use]
    pub fn initial_params(&self) -> &[f64] {
        self.problem
            .starting_values
            .get(self.start_index)
            .map_or(&[], Vec::as_slice)
    }
}

/// A fitting back end.
///
/// Lifecycle methods return `anyhow::Result` so adapters can attach context
/// freely; the engine classifies errors by the typed causes in [`errors`].
pub trait Controller {
    /// Software package name used in result tags.
    fn software(&self) -> &str;

    /// Algorithm category → minimizers. The [`ALL_CATEGORY`] entry lists
    /// every minimizer the package offers.
    fn algorithm_compatibility(&self) -> &BTreeMap<String, Vec<String>>;

    /// Minimizers that cannot handle parameter bounds.
    fn no_bounds_minimizers(&self) -> &[String] {
        &[]
    }

    /// Whether `minimizer` consumes first-derivative information.
    fn jacobian_enabled(&self, minimizer: &str) -> bool;

    /// Whether `minimizer` consumes second-derivative information.
    fn hessian_enabled(&self, _minimizer: &str) -> bool {
        false
    }

    /// Whether `minimizer` accepts sparse Jacobians.
    fn sparsity_enabled(&self, _minimizer: &str) -> bool {
        false
    }

    /// Check that a derivative method can be built for `problem`.
    ///
    /// # Errors
    ///
    /// Returns [`NoDerivative`] when the method is unavailable.
    fn supports_derivative(
        &self,
        _kind: DerivativeKind,
        _method: &str,
        _problem: &FittingProblem,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Take the configuration for the next fit.
    ///
    /// # Errors
    ///
    /// Any error marks the configuration as failed.
    fn configure(&mut self, setup: &FitSetup<'_>) -> anyhow::Result<()>;

    /// Check inputs before running.
    ///
    /// # Errors
    ///
    /// [`ValidationFailed`] gives code 7; anything else code 3.
    fn validate(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Untimed setup before each timed fit.
    ///
    /// # Errors
    ///
    /// Any error marks the configuration as failed.
    fn prepare(&mut self) -> anyhow::Result<()>;

    /// Run the fit. Long-running adapters should call
    /// [`RuntimeBudget::check`] between iterations.
    ///
    /// # Errors
    ///
    /// [`MaxRuntimeExceeded`] gives code 6; anything else code 3.
    fn fit(&mut self, budget: &RuntimeBudget) -> anyhow::Result<()>;

    /// Convert the raw fit output into parameters and a status.
    ///
    /// # Errors
    ///
    /// Any error marks the configuration as failed.
    fn cleanup(&mut self) -> anyhow::Result<()>;

    /// Confirm cleanup populated everything the engine reads back.
    ///
    /// # Errors
    ///
    /// Returns an error naming the missing attribute.
    fn check_attributes(&self) -> anyhow::Result<()> {
        if self.final_params().is_none() {
            anyhow::bail!("{} did not set final parameters", self.software());
        }
        Ok(())
    }

    /// Fitted parameters, one vector per dataset.
    fn final_params(&self) -> Option<&[Vec<f64>]>;

    /// Self-reported outcome of the last fit.
    fn status(&self) -> FitStatus;
}

/// Scalar objective used to judge a fit.
pub trait CostFunction {
    /// Cost function name used in result tags.
    fn name(&self) -> &str;

    /// Check the cost function can be applied to `problem`.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleCostFunction`] to skip the problem for this cost
    /// function.
    fn validate_problem(&self, _problem: &FittingProblem) -> anyhow::Result<()> {
        Ok(())
    }

    /// Check a minimizer suits this cost function.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleMinimizer`] to deselect the minimizer.
    fn validate_algorithm_type(
        &self,
        _compatibility: &BTreeMap<String, Vec<String>>,
        _minimizer: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Accuracy of `params` against dataset `dataset` of `problem`.
    fn evaluate(&self, problem: &FittingProblem, dataset: usize, params: &[f64]) -> f64;
}

/// Check a minimizer is offered by the controller and belongs to one of the
/// requested algorithm categories. An empty category list restricts nothing.
///
/// # Errors
///
/// Returns [`UnknownMinimizer`] or [`IncompatibleMinimizer`].
pub fn check_minimizer(
    controller: &dyn Controller,
    minimizer: &str,
    algorithm_type: &[String],
) -> anyhow::Result<()> {
    let compatibility = controller.algorithm_compatibility();
    let known = compatibility
        .values()
        .any(|minimizers| minimizers.iter().any(|m| m == minimizer));
    if !known {
        return Err(UnknownMinimizer {
            software: controller.software().to_string(),
            minimizer: minimizer.to_string(),
        }
        .into());
    }

    let categories = minimizer_categories(controller, minimizer);
    let selected = algorithm_type.is_empty()
        || algorithm_type
            .iter()
            .any(|t| t == ALL_CATEGORY || categories.contains(t));
    if !selected {
        return Err(IncompatibleMinimizer {
            minimizer: minimizer.to_string(),
            reason: format!("not in algorithm type {}", algorithm_type.join(", ")),
        }
        .into());
    }
    Ok(())
}

/// Check a minimizer can handle parameter bounds.
///
/// # Errors
///
/// Returns [`BoundsUnsupported`].
pub fn check_bounds_support(controller: &dyn Controller, minimizer: &str) -> anyhow::Result<()> {
    if controller.no_bounds_minimizers().iter().any(|m| m == minimizer) {
        return Err(BoundsUnsupported {
            software: controller.software().to_string(),
            minimizer: minimizer.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Categories (other than [`ALL_CATEGORY`]) listing `minimizer`.
#[must_use]
pub fn minimizer_categories(controller: &dyn Controller, minimizer: &str) -> Vec<String> {
    controller
        .algorithm_compatibility()
        .iter()
        .filter(|(category, minimizers)| {
            category.as_str() != ALL_CATEGORY && minimizers.iter().any(|m| m == minimizer)
        })
        .map(|(category, _)| category.clone())
        .collect()
}

type ControllerFactory = Box<dyn Fn() -> Box<dyn Controller>>;
type CostFunctionFactory = Box<dyn Fn() -> Box<dyn CostFunction>>;

/// Named factories for controllers and cost functions.
///
/// # Examples
///
/// ```rust,ignore
/// let mut registry = AdapterRegistry::new();
/// registry.register_controller("scipy", || Box::new(ScipyController::default()));
/// registry.register_cost_function("nlls", || Box::new(Nlls));
/// let controller = registry.controller("scipy")?;
/// ```
#[derive(Default)]
pub struct AdapterRegistry {
    controllers: BTreeMap<String, ControllerFactory>,
    cost_functions: BTreeMap<String, CostFunctionFactory>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller factory under a software name.
    pub fn register_controller<F>(&mut self, software: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Controller> + 'static,
    {
        self.controllers.insert(software.into(), Box::new(factory));
    }

    /// Register a cost function factory under a name.
    pub fn register_cost_function<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn CostFunction> + 'static,
    {
        self.cost_functions.insert(name.into(), Box::new(factory));
    }

    /// Build a fresh controller.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSoftware` if nothing is registered for it
    pub fn controller(&self, software: &str) -> Result<Box<dyn Controller>> {
        self.controllers
            .get(software)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownSoftware(software.to_string()))
    }

    /// Build a fresh cost function.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if nothing is registered for it
    pub fn cost_function(&self, name: &str) -> Result<Box<dyn CostFunction>> {
        self.cost_functions
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::InvalidInput(format!("unknown cost function: {name}")))
    }

    /// Registered software names.
    pub fn software(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        compatibility: BTreeMap<String, Vec<String>>,
        no_bounds: Vec<String>,
    }

    impl Stub {
        fn new() -> Self {
            Self {
                compatibility: BTreeMap::from([
                    ("all".to_string(), vec!["lm".to_string(), "nm".to_string()]),
                    ("ls".to_string(), vec!["lm".to_string()]),
                    ("simplex".to_string(), vec!["nm".to_string()]),
                ]),
                no_bounds: vec!["nm".to_string()],
            }
        }
    }

    impl Controller for Stub {
        fn software(&self) -> &str {
            "stub"
        }
        fn algorithm_compatibility(&self) -> &BTreeMap<String, Vec<String>> {
            &self.compatibility
        }
        fn no_bounds_minimizers(&self) -> &[String] {
            &self.no_bounds
        }
        fn jacobian_enabled(&self, minimizer: &str) -> bool {
            minimizer == "lm"
        }
        fn configure(&mut self, _setup: &FitSetup<'_>) -> anyhow::Result<()> {
            Ok(())
        }
        fn prepare(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
        fn fit(&mut self, _budget: &RuntimeBudget) -> anyhow::Result<()> {
            Ok(())
        }
        fn cleanup(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
        fn final_params(&self) -> Option<&[Vec<f64>]> {
            None
        }
        fn status(&self) -> FitStatus {
            FitStatus::Converged
        }
    }

    #[test]
    fn test_derivative_tags() {
        assert_eq!(Derivative::new("scipy", "2-point").tag(), "scipy 2-point");
        assert_eq!(Derivative::new("analytic", "").tag(), "analytic");
        assert_eq!(Derivative::none().tag(), "");
        assert!(Derivative::none().is_none());
    }

    #[test]
    fn test_check_minimizer() {
        let stub = Stub::new();
        let all = vec!["all".to_string()];
        let ls = vec!["ls".to_string()];
        assert!(check_minimizer(&stub, "lm", &all).is_ok());
        assert!(check_minimizer(&stub, "lm", &ls).is_ok());

        let err = check_minimizer(&stub, "nm", &ls).unwrap_err();
        assert!(err.downcast_ref::<IncompatibleMinimizer>().is_some());

        let err = check_minimizer(&stub, "dogleg", &all).unwrap_err();
        assert!(err.downcast_ref::<UnknownMinimizer>().is_some());

        assert!(check_minimizer(&stub, "nm", &[]).is_ok());
        assert!(check_minimizer(&stub, "dogleg", &[]).is_err());
    }

    #[test]
    fn test_bounds_support() {
        let stub = Stub::new();
        assert!(check_bounds_support(&stub, "lm").is_ok());
        let err = check_bounds_support(&stub, "nm").unwrap_err();
        assert!(err.downcast_ref::<BoundsUnsupported>().is_some());
    }

    #[test]
    fn test_minimizer_categories_skip_all() {
        let stub = Stub::new();
        assert_eq!(minimizer_categories(&stub, "nm"), vec!["simplex".to_string()]);
    }

    #[test]
    fn test_default_check_attributes() {
        let stub = Stub::new();
        assert!(stub.check_attributes().is_err());
    }

    #[test]
    fn test_fit_status_codes() {
        assert_eq!(ErrorCode::from(FitStatus::Converged).code(), 0);
        assert_eq!(ErrorCode::from(FitStatus::MaxIterations).code(), 1);
        assert_eq!(ErrorCode::from(FitStatus::NotConverged).code(), 2);
    }

    #[test]
    fn test_registry() {
        let mut registry = AdapterRegistry::new();
        registry.register_controller("stub", || Box::new(Stub::new()));
        assert_eq!(registry.controller("stub").unwrap().software(), "stub");
        assert!(matches!(
            registry.controller("other"),
            Err(Error::UnknownSoftware(_))
        ));
        assert!(registry.cost_function("nlls").is_err());
        assert_eq!(registry.software().collect::<Vec<_>>(), vec!["stub"]);
    }
}
