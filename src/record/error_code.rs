//! Error Code - closed outcome taxonomy attached to every result

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Outcome of one fit configuration.
///
/// Serialized as its integer code so checkpoint files stay compatible with
/// renderers that key on the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ErrorCode {
    /// 0: Successfully converged.
    Converged,
    /// 1: Software reported maximum number of iterations exceeded.
    MaxIterations,
    /// 2: Software ran but did not converge.
    NotConverged,
    /// 3: Software raised an exception.
    SoftwareException,
    /// 4: Minimizer does not support bounded problems; no attempt made.
    BoundsUnsupported,
    /// 5: Returned parameters violate the declared bounds.
    BoundsViolated,
    /// 6: Maximum allowed runtime exceeded.
    MaxRuntimeExceeded,
    /// 7: Input validation failed before any adapter call.
    ValidationFailed,
}

impl ErrorCode {
    /// All codes, in numeric order.
    pub const ALL: [Self; 8] = [
        Self::Converged,
        Self::MaxIterations,
        Self::NotConverged,
        Self::SoftwareException,
        Self::BoundsUnsupported,
        Self::BoundsViolated,
        Self::MaxRuntimeExceeded,
        Self::ValidationFailed,
    ];

    /// Integer form of the code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Human-readable description for reports.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Converged => "Successfully converged",
            Self::MaxIterations => "Software reported maximum number of iterations exceeded",
            Self::NotConverged => "Software run but didn't converge to solution",
            Self::SoftwareException => "Software raised an exception",
            Self::BoundsUnsupported => "Solver doesn't support bounded problems",
            Self::BoundsViolated => "Solution doesn't respect parameter bounds",
            Self::MaxRuntimeExceeded => "Solver has exceeded maximum allowed runtime",
            Self::ValidationFailed => "Validation of the provided options failed",
        }
    }

    /// Whether the adapter actually ran to completion (codes 0-2).
    #[must_use]
    pub const fn ran(self) -> bool {
        matches!(self, Self::Converged | Self::MaxIterations | Self::NotConverged)
    }

    /// Whether the record is a failure whose accuracy and runtime are forced
    /// to infinity (codes 3, 6, 7).
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::SoftwareException | Self::MaxRuntimeExceeded | Self::ValidationFailed
        )
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| Error::InvalidInput(format!("unknown error code {value}")))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
