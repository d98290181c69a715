//! Result ledger
//!
//! Persisted form of one or more benchmark runs:
//!
//! ```text
//! {
//!   "<label>": {
//!     "label": ..., "created_at": ...,
//!     "problems": { "<row name>": ProblemPayload },
//!     "results": [ ResultRecord ],
//!     "failed_problems": [ ... ],
//!     "unselected_minimizers": { "<software>": [ ... ] }
//!   }
//! }
//! ```
//!
//! Numeric arrays are stored as Ascii85 text of their little-endian bytes,
//! so a reload reproduces every value bit for bit, non-finite ones included.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trueno_fit::ledger::{self, LedgerDocument, MergeStrategy};
//!
//! let first = LedgerDocument::from_path("run_a/checkpoint.json")?;
//! let second = LedgerDocument::from_path("run_b/checkpoint.json")?;
//! let merged = ledger::merge(first, second, MergeStrategy::Accuracy);
//! merged.write_to("merged.json")?;
//! # Ok::<(), trueno_fit::Error>(())
//! ```

mod document;
mod merge;
mod reader;
mod writer;

pub use document::{LedgerDocument, LedgerGroup};
pub use merge::{merge, MergeStrategy};
pub use reader::{load, locate};
pub use writer::{recover, LedgerWriter, INCOMPLETE_GROUP};
