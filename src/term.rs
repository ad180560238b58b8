//! Input terms: the compiled form's source material.
//!
//! A [`Signature`] is produced by the (external) textual rule parser and is
//! this crate's entry point — see spec.md §1 for why parsing itself is out
//! of scope here.

use std::fmt;

use crate::types::EntityId;

/// One slot of a [`Term`]: a concrete entity, the `This` placeholder, or a
/// named variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// A concrete, already-resolved entity id.
    Entity(EntityId),
    /// The distinguished root placeholder `.`.
    This,
    /// A named variable, to be discovered by [`crate::variable`].
    Var(String),
}

impl Slot {
    /// Shorthand for a named variable slot.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// `true` if this slot names a variable (bound or not).
    pub const fn is_var(&self) -> bool {
        matches!(self, Self::Var(_))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(e) => write!(f, "{e}"),
            Self::This => write!(f, "."),
            Self::Var(name) => write!(f, "{name}"),
        }
    }
}

/// A single conjunct of a rule expression: `Predicate(Subject)` or
/// `Predicate(Subject, Object)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    /// Predicate slot.
    pub predicate: Slot,
    /// Subject slot — the term's table-kind anchor.
    pub subject: Slot,
    /// Object slot, absent for a unary term.
    pub object: Option<Slot>,
}

impl Term {
    /// Build a unary term `predicate(subject)`.
    pub fn unary(predicate: Slot, subject: Slot) -> Self {
        Self {
            predicate,
            subject,
            object: None,
        }
    }

    /// Build a binary term `predicate(subject, object)`.
    pub fn binary(predicate: Slot, subject: Slot, object: Slot) -> Self {
        Self {
            predicate,
            subject,
            object: Some(object),
        }
    }
}

/// The variable name a slot refers to, if any (`.` for `This`, `None` for a
/// concrete entity).
pub fn slot_name(slot: &Slot) -> Option<&str> {
    match slot {
        Slot::Entity(_) => None,
        Slot::This => Some("."),
        Slot::Var(name) => Some(name.as_str()),
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.object {
            Some(obj) => write!(f, "{}({}, {})", self.predicate, self.subject, obj),
            None => write!(f, "{}({})", self.predicate, self.subject),
        }
    }
}

/// The parsed term list a [`crate::rule::Rule`] compiles from: a conjunction
/// of [`Term`]s.
pub type Signature = Vec<Term>;

/// Render a signature the way [`crate::error::RuleError`] embeds it in
/// diagnostics.
pub fn render_signature(signature: &[Term]) -> String {
    signature
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
