//! Benchmark engine
//!
//! - [`ConfigurationEnumerator`] walks problems, start points, cost
//!   functions, software, minimizers and derivative choices.
//! - [`FitExecutor`] runs one configuration through the adapter lifecycle
//!   with timing, a runtime ceiling, output capture and optional energy
//!   measurement.
//!
//! Execution is strictly sequential: timing samples must not contend with
//! other fits.

mod budget;
mod capture;
mod clock;
mod energy;
mod enumerator;
mod executor;

pub use budget::RuntimeBudget;
pub use capture::{CapturedOutput, OutputCapture};
pub use clock::{Clock, ManualClock, SystemClock};
pub use energy::{EnergyMeter, EnergyScope, FixedEnergyMeter};
pub use enumerator::{
    BenchmarkOutcome, ConfigurationEnumerator, ANALYTIC, DEFAULT_HESSIAN, SPARSE_SUFFIX,
};
pub use executor::{classify, timing_outlier, FitExecutor, FitOutcome, FitWarning, Stage, OUTLIER_RATIO};
