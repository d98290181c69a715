//! # Trueno-Fit: Benchmark Orchestration for Curve-Fitting Back Ends
//!
//! **Version**: 0.1.0
//!
//! Trueno-Fit runs every combination of problem, start point, cost function,
//! software package, minimizer and derivative method through a uniform
//! adapter lifecycle, records each outcome in an append-only ledger, and
//! reconciles the results into a ranked grid for reporting.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: a failing configuration stops itself with an error code;
//!   the run carries on
//! - **Poka-Yoke**: typed adapter errors and a closed error-code taxonomy
//! - **Genchi Genbutsu**: every timed run is recorded, outliers are flagged
//! - **Muda elimination**: problem payloads are written once per ledger group
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use trueno_fit::config::BenchmarkOptions;
//! use trueno_fit::controller::AdapterRegistry;
//! use trueno_fit::engine::ConfigurationEnumerator;
//! use trueno_fit::ledger::LedgerWriter;
//! use trueno_fit::aggregate::Report;
//!
//! let options = BenchmarkOptions::from_json_file("options.json")?;
//! let mut registry = AdapterRegistry::new();
//! registry.register_controller("scipy", || Box::new(ScipyController::default()));
//! registry.register_cost_function("weighted_nlls", || Box::new(WeightedNlls));
//!
//! let mut ledger = LedgerWriter::from_options(&options)?;
//! let outcome = ConfigurationEnumerator::new(&options, &registry)
//!     .with_ledger(&mut ledger)
//!     .run(problems)?;
//! ledger.finalize()?;
//!
//! let report = Report::from_outcome(&options.label, outcome);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod aggregate;
pub mod codec;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod problem;
pub mod record;

pub use error::{Error, Result};
