//!
//! Shared types of the expansion layer. No dependencies on other macro modules beyond the
//! `Quoter` a substitute body writes to.
//!
//! ## Ownership and Borrowing
//!
//! - `SubstituteBody` is an `Arc`'d closure, cheaply cloned into registries
//! - `ExpansionStep` holds shared handles to the nodes it records, never copies

use crate::ast::{InvokeShape, Node};
use crate::macros::capture::Quoter;
use crate::ExprError;
use std::fmt;
use std::sync::Arc;

/// The body of a substitute function.
///
/// Run once, at first expansion of a call to the function, with a fresh [`Quoter`]; it
/// must quote exactly one lambda with the function's signature.
pub type SubstituteBody =
    Arc<dyn Fn(&mut Quoter<'_>) -> Result<(), ExprError> + Send + Sync + 'static>;

/// What an expansion step inlined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionKind {
    /// A reference call of the given shape
    Reference(InvokeShape),
    /// A call to the named substitute function
    Substitute(String),
}

impl fmt::Display for ExpansionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpansionKind::Reference(shape) => write!(f, "invoke/{}", shape.arity()),
            ExpansionKind::Substitute(name) => write!(f, "{}", name),
        }
    }
}

/// A single expansion step, for traceability.
///
/// Each expansion step records:
/// - What was inlined
/// - The call node before expansion
/// - The fully expanded replacement spliced in for it
#[derive(Debug, Clone)]
pub struct ExpansionStep {
    pub kind: ExpansionKind,
    pub input: Node,
    pub output: Node,
}
