//! # Expansion
//!
//! This module turns trees that *reference* other trees into plain trees.
//!
//! ## Core Principles
//!
//! - **Syntactic only**: expansion reads constants and member chains to find referenced
//!   trees, and otherwise never evaluates anything.
//! - **Pure transformation**: the input tree is never modified. Unchanged sub-trees of the
//!   result are the input's own nodes.
//! - **Complete**: the result contains no reference calls and no calls to registered
//!   substitutes, so expanding it again returns it unchanged.
//! - **Inspectable**: every inlining is recorded in the [`Expander`]'s trace.
//!
//! Two kinds of call are expanded:
//!
//! - **Reference calls** ([`Expr::invoke`](crate::ast::Expr::invoke)): the first argument
//!   holds a lambda tree, resolved with [`dig_out_constant`]; the remaining arguments are
//!   substituted for its parameters.
//! - **Substitute calls**: calls to functions registered in a [`SubstituteRegistry`], whose
//!   lambda is captured from the function's body with [`capture`].

pub mod capture;
pub mod constant;
pub mod expander;
pub mod registry;
pub mod substitute;
pub mod traversal;
pub mod types;

pub use capture::{capture, Quoter};
pub use constant::dig_out_constant;
pub use expander::{expand, expand_lambda, Expander};
pub use registry::SubstituteRegistry;
pub use substitute::{replace_parameter, substitute, substitute_with_guard, Substitution};
pub use traversal::{children, drive, DepthGuard, TreeRewriter, Visit};
pub use types::{ExpansionKind, ExpansionStep, SubstituteBody};
