//! implore-select - Hierarchical selection evaluation
//!
//! Decides, for every element of a three-level hierarchy (group → item →
//! leaf), whether it satisfies a compiled boolean predicate program.
//!
//! # Model
//!
//! - **Compiled programs**: atomic predicates plus one postfix program per level
//! - **Tri-state logic**: `True`, `False`, `Unknown` with Kleene AND/OR/NOT
//! - **Top-down pruning**: a definite `False` at group level skips its items and leaves
//! - **Bracketed references**: proximity predicates may target another selection,
//!   materialized once per evaluator
//! - **Named attributes**: open-ended per-element values, with optional defaults
//!
//! # Examples
//!
//! ```ignore
//! use implore_select::*;
//!
//! let expr = PredicateExpr::and(
//!     PredicateExpr::name_is(Level::Group, "A"),
//!     PredicateExpr::within_selection(3.0, PredicateExpr::name_is(Level::Item, "HEM")),
//! );
//! let program = compile(&expr);
//! let mut evaluator = Evaluator::for_structure(&program, &structure)?;
//! let selection = evaluator.select()?;
//! ```

pub mod compile;
pub mod config;
pub mod error;
pub mod eval;
pub mod hierarchy;
pub mod program;
pub mod selection;
pub mod structure;
pub mod tristate;

pub use compile::*;
pub use config::*;
pub use error::*;
pub use eval::*;
pub use hierarchy::*;
pub use program::*;
pub use selection::*;
pub use structure::*;
pub use tristate::*;
