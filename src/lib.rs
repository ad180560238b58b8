#![allow(clippy::wrong_self_convention)]

pub mod emit;
pub mod error;
pub mod limits;
pub mod op;
pub mod pair;
pub mod rule;
pub mod term;
pub mod types;
pub mod variable;
pub mod vm;
pub mod world;

pub mod prelude {
    pub use crate::error::RuleError;
    pub use crate::limits::Limits;
    pub use crate::rule::{Rule, RuleIter, RuleMatch};
    pub use crate::term::{Signature, Slot, Term};
    pub use crate::types::EntityId;
    pub use crate::world::{Table, World};
}
