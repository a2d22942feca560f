//! Error types for fraction generation and alias analysis.
//!
//! Two families are kept apart: validation failures (the input is
//! malformed) and numerical failures (the input is well-formed but the
//! fraction cannot be analysed).

use thiserror::Error;

/// The main error type for the crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DesignError {
    // ============ Validation Errors ============
    /// A generic bad argument, e.g. an empty level vector.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The level vector cannot be used to generate fractions.
    #[error("design {levels:?} is not valid: {reason}")]
    InvalidDesign {
        /// The offending level counts.
        levels: Vec<usize>,
        /// Why the design was rejected.
        reason: String,
    },

    /// Fraction size outside `[sf_min, tr)`.
    #[error("fraction size {size} out of range (valid range: {min}..{max})")]
    FractionSizeOutOfRange {
        /// Requested fraction size.
        size: usize,
        /// Minimum feasible size (inclusive).
        min: usize,
        /// Total run count (exclusive).
        max: usize,
    },

    /// Number of random fractions outside `[1, tr]`.
    #[error("number of fractions {count} out of range (valid range: 1..={max})")]
    FractionCountOutOfRange {
        /// Requested count.
        count: usize,
        /// Total run count.
        max: usize,
    },

    /// A custom start offset outside `[1, tr]`.
    #[error("fraction start {start} out of range (valid range: 1..={max})")]
    StartOutOfRange {
        /// The offending start offset.
        start: usize,
        /// Total run count.
        max: usize,
    },

    /// Alias analysis needs between 2 and 9 factors.
    #[error("alias analysis supports 2..=9 factors, got {0}")]
    UnsupportedFactorCount(usize),

    /// Matrix text could not be parsed.
    #[error("malformed matrix text at line {line}: {message}")]
    MalformedMatrix {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    // ============ Numerical Errors ============
    /// The fraction's correlation matrix could not be inverted.
    #[error("correlation matrix of the fraction is singular; VIFs are undefined")]
    SingularCorrelation,

    /// Main effects are too entangled for the alias structure to be resolved.
    #[error("main effects {first} and {second} are strongly correlated (|r| = {value:.4})")]
    StrongMainEffectCorrelation {
        /// Label of the first main effect.
        first: String,
        /// Label of the second main effect.
        second: String,
        /// Absolute correlation that tripped the guard.
        value: f64,
    },
}

/// Result type alias using [`DesignError`].
pub type Result<T> = std::result::Result<T, DesignError>;

impl DesignError {
    /// Create a new `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a new `InvalidDesign` error.
    #[must_use]
    pub fn invalid_design(levels: &[usize], reason: impl Into<String>) -> Self {
        Self::InvalidDesign {
            levels: levels.to_vec(),
            reason: reason.into(),
        }
    }

    /// True when the caller supplied malformed input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        !self.is_numerical()
    }

    /// True when the input was well-formed but could not be analysed.
    #[must_use]
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            Self::SingularCorrelation | Self::StrongMainEffectCorrelation { .. }
        )
    }
}

impl From<derive_builder::UninitializedFieldError> for DesignError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        Self::InvalidArgument(format!("missing field `{}`", e.field_name()))
    }
}
