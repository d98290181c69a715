//! Result schema for benchmark runs
//!
//! ```text
//! ProblemPayload (1) ──< ResultRecord (N)   [joined by problem name]
//!                            │
//!                            └── ErrorCode (closed taxonomy 0-7)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use trueno_fit::config::RuntimeMetric;
//! use trueno_fit::record::{ErrorCode, ResultRecord};
//!
//! let record = ResultRecord::builder("cubic", "nlls", "scipy", "lm")
//!     .jacobian("scipy 2-point")
//!     .accuracy(0.25)
//!     .runtimes(vec![0.01, 0.02, 0.03], RuntimeMetric::Median)
//!     .error_code(ErrorCode::Converged)
//!     .build();
//!
//! assert!((record.runtime() - 0.02).abs() < 1e-12);
//! ```

mod error_code;
mod problem_payload;
mod result_record;

pub use error_code::ErrorCode;
pub use problem_payload::ProblemPayload;
pub use result_record::{ResultRecord, ResultRecordBuilder, MIN_ACCURACY_FLOOR};
