//! Compile-time configuration for the rule compiler.

/// Compile-time limits, threaded through [`crate::rule::Rule::compile`].
///
/// Mirrors the constants spec.md fixes (256 subject variables, 16 inline
/// DFS frames) but keeps them as configuration rather than magic numbers so
/// a caller embedding the solver in a larger world can tune them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Maximum number of distinct subject variables a rule may declare.
    pub max_subject_variables: usize,
    /// Number of DFS frames kept inline before the transitive-closure stack
    /// spills to the heap.
    pub inline_dfs_frames: usize,
}

/// Maximum number of subject variables a rule may declare (spec.md §4.2).
pub const MAX_SUBJECT_VARIABLES: usize = 256;

/// Inline DFS stack depth before spilling to the heap (spec.md §4.4, §9).
pub const INLINE_DFS_FRAMES: usize = 16;

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_subject_variables: MAX_SUBJECT_VARIABLES,
            inline_dfs_frames: INLINE_DFS_FRAMES,
        }
    }
}
