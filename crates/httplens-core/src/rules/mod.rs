//! Tagging and scoring rules.
//!
//! Rules are declarative descriptors -- one [`Signal`] matcher plus a
//! severity weight -- evaluated by a single generic matcher. Every rule is
//! independent and commutative: evaluation order never affects the resulting
//! tag set or score.

mod catalog;
mod engine;
mod types;

pub use catalog::default_rules;
pub use engine::{classify, RequestView};
pub use types::{HeaderSide, Rule, Signal};
