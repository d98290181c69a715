//! Row, column and category tags
//!
//! Column tags are structured rather than pattern strings: a segment is a
//! literal derivative name, a wildcard (bounds placeholder, matches any
//! literal), or the merged best-available marker.

use std::fmt;

use crate::controller::DerivativeKind;
use crate::record::{ErrorCode, ResultRecord};

/// Display name of a merged derivative segment.
pub const BEST_AVAILABLE: &str = "best_available";

/// One derivative segment of a column tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A concrete method tag (may be empty: no derivative).
    Literal(String),
    /// Matches any literal; only bounds placeholders carry it.
    Wildcard,
    /// Several non-overlapping literals merged into one column.
    BestAvailable,
}

impl Segment {
    /// Text shown in headers.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Wildcard => "*",
            Self::BestAvailable => BEST_AVAILABLE,
        }
    }

    /// Whether this segment accepts `other`.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        matches!(self, Self::Wildcard) || self == other
    }

    /// Whether this is a literal segment.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    fn sort_key(&self) -> (u8, String) {
        match self {
            Self::Literal(s) => (0, s.to_lowercase()),
            Self::Wildcard => (1, String::new()),
            Self::BestAvailable => (2, String::new()),
        }
    }
}

/// Column: `software:minimizer:jacobian:hessian`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnTag {
    software: String,
    minimizer: String,
    jacobian: Segment,
    hessian: Segment,
}

impl ColumnTag {
    /// Create a column tag.
    #[must_use]
    pub fn new(
        software: impl Into<String>,
        minimizer: impl Into<String>,
        jacobian: Segment,
        hessian: Segment,
    ) -> Self {
        Self {
            software: software.into(),
            minimizer: minimizer.into(),
            jacobian,
            hessian,
        }
    }

    /// Column a record belongs to before reconciliation. Bounds
    /// placeholders get wildcard derivative segments.
    #[must_use]
    pub fn of(record: &ResultRecord) -> Self {
        let (jacobian, hessian) = if record.error_code() == ErrorCode::BoundsUnsupported {
            (Segment::Wildcard, Segment::Wildcard)
        } else {
            (
                Segment::Literal(record.jacobian().to_string()),
                Segment::Literal(record.hessian().to_string()),
            )
        };
        Self::new(record.software(), record.minimizer(), jacobian, hessian)
    }

    /// Get the software.
    #[must_use]
    pub fn software(&self) -> &str {
        &self.software
    }

    /// Get the minimizer.
    #[must_use]
    pub fn minimizer(&self) -> &str {
        &self.minimizer
    }

    /// Get the Jacobian segment.
    #[must_use]
    pub const fn jacobian(&self) -> &Segment {
        &self.jacobian
    }

    /// Get the Hessian segment.
    #[must_use]
    pub const fn hessian(&self) -> &Segment {
        &self.hessian
    }

    /// Get one derivative segment.
    #[must_use]
    pub const fn segment(&self, kind: DerivativeKind) -> &Segment {
        match kind {
            DerivativeKind::Jacobian => &self.jacobian,
            DerivativeKind::Hessian => &self.hessian,
        }
    }

    /// Whether both tags name the same software and minimizer.
    #[must_use]
    pub fn same_family(&self, other: &Self) -> bool {
        self.software == other.software && self.minimizer == other.minimizer
    }

    /// Whether either segment is a wildcard.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.jacobian == Segment::Wildcard || self.hessian == Segment::Wildcard
    }

    /// Whether this (possibly wildcard) tag accepts `other`.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.same_family(other)
            && self.jacobian.matches(&other.jacobian)
            && self.hessian.matches(&other.hessian)
    }

    /// Copy with one segment replaced.
    #[must_use]
    pub fn with_segment(&self, kind: DerivativeKind, segment: Segment) -> Self {
        let mut tag = self.clone();
        match kind {
            DerivativeKind::Jacobian => tag.jacobian = segment,
            DerivativeKind::Hessian => tag.hessian = segment,
        }
        tag
    }

    /// Copy with both segments merged.
    #[must_use]
    pub fn best_available(&self) -> Self {
        Self::new(
            self.software.as_str(),
            self.minimizer.as_str(),
            Segment::BestAvailable,
            Segment::BestAvailable,
        )
    }

    pub(crate) fn sort_key(&self) -> (String, String, (u8, String), (u8, String)) {
        (
            self.software.to_lowercase(),
            self.minimizer.to_lowercase(),
            self.jacobian.sort_key(),
            self.hessian.sort_key(),
        )
    }
}

impl fmt::Display for ColumnTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.software,
            self.minimizer,
            self.jacobian.label(),
            self.hessian.label()
        )
    }
}

/// Row: problem (start-qualified) and, for multi-dataset problems, the
/// dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowTag {
    label: String,
    start_index: usize,
    dataset: Option<usize>,
}

impl RowTag {
    /// Row a record belongs to.
    #[must_use]
    pub fn of(record: &ResultRecord) -> Self {
        let label = match record.dataset() {
            Some(dataset) => format!("{}, Dataset {}", record.problem(), dataset + 1),
            None => record.problem().to_string(),
        };
        Self {
            label,
            start_index: record.start_index(),
            dataset: record.dataset(),
        }
    }

    /// Get the display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get the start-point index.
    #[must_use]
    pub const fn start_index(&self) -> usize {
        self.start_index
    }

    /// Get the dataset index.
    #[must_use]
    pub const fn dataset(&self) -> Option<usize> {
        self.dataset
    }

    pub(crate) fn sort_key(&self) -> (String, usize, Option<usize>) {
        let base = self.label.split(", Start ").next().unwrap_or(&self.label);
        let base = base.split(", Dataset ").next().unwrap_or(base);
        (base.to_lowercase(), self.start_index, self.dataset)
    }
}

impl fmt::Display for RowTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
