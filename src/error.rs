//! Compile-time error implementation.

use thiserror::Error;

/// Errors the rule compiler can raise. Run-time "no more results" is not an
/// error — see [`crate::vm::RuleIter`] — this type is only ever produced by
/// [`crate::rule::Rule::compile`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The rule declares more subject variables than [`crate::limits::Limits::max_subject_variables`]
    /// allows.
    #[error("rule has too many subject variables (max {max}): {expr}")]
    TooManyVariables {
        /// The configured limit that was exceeded.
        max: usize,
        /// The rule's terms, rendered for diagnostics.
        expr: String,
    },
    /// A subject variable's dependency depth never resolved during
    /// analysis — it is unreachable from the elected root.
    #[error("unconstrained variable `{name}` in rule: {expr}")]
    UnconstrainedVariable {
        /// The unreachable variable's name.
        name: String,
        /// The rule's terms, rendered for diagnostics.
        expr: String,
    },
    /// An internal invariant was violated. Indicates a bug in the compiler,
    /// never a user-recoverable condition.
    #[error("internal rule-compiler error: {0}")]
    Internal(String),
}

impl RuleError {
    /// Build an internal-error variant with a formatted message. Kept as a
    /// free function so call sites read the same as `assert!`/`debug_assert!`
    /// without hard-panicking where a caller-facing result is warranted
    /// instead.
    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
