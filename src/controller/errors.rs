//! Typed adapter errors
//!
//! Adapters return `anyhow::Result`; the engine recognises these types
//! anywhere in an error chain and maps them onto error codes.

use thiserror::Error;

/// Which derivative a method was requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivativeKind {
    /// First derivative (Jacobian).
    Jacobian,
    /// Second derivative (Hessian).
    Hessian,
}

impl std::fmt::Display for DerivativeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jacobian => f.write_str("Jacobian"),
            Self::Hessian => f.write_str("Hessian"),
        }
    }
}

/// Cumulative fit time passed the configured ceiling (code 6).
#[derive(Debug, Clone, Error, PartialEq)]
#[error("The maximum runtime of {limit_secs:.3}s was exceeded ({elapsed_secs:.3}s elapsed)")]
pub struct MaxRuntimeExceeded {
    /// Configured ceiling in seconds.
    pub limit_secs: f64,
    /// Elapsed fit time in seconds.
    pub elapsed_secs: f64,
}

/// Adapter rejected its inputs before running (code 7).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Validation failed: {0}")]
pub struct ValidationFailed(pub String);

/// Minimizer is not offered by the software package.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Minimizer {minimizer} is not known to software {software}")]
pub struct UnknownMinimizer {
    /// Software package.
    pub software: String,
    /// Requested minimizer.
    pub minimizer: String,
}

/// Minimizer is not usable with the selected algorithm category or cost
/// function.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Minimizer {minimizer} is incompatible: {reason}")]
pub struct IncompatibleMinimizer {
    /// Requested minimizer.
    pub minimizer: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Minimizer cannot handle parameter bounds (code 4).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Minimizer {minimizer} of software {software} does not support bounded problems")]
pub struct BoundsUnsupported {
    /// Software package.
    pub software: String,
    /// Requested minimizer.
    pub minimizer: String,
}

/// Cost function cannot be applied to the problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Problem {problem} is not compatible with cost function {cost_function}")]
pub struct IncompatibleCostFunction {
    /// Cost function name.
    pub cost_function: String,
    /// Problem name.
    pub problem: String,
}

/// A derivative method could not be constructed for the problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} method {method} is not available for this problem")]
pub struct NoDerivative {
    /// First or second derivative.
    pub kind: DerivativeKind,
    /// Requested method.
    pub method: String,
}
