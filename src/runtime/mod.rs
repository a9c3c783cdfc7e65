//! Runtime for expanded trees.
//!
//! This module executes trees after expansion: the evaluator, the cached member readers it
//! shares with constant resolution, and the builtin members and functions trees can call.

pub mod accessor;
pub mod builtins;
pub mod eval;

pub use accessor::{accessor_for, Accessor};
pub use eval::{call, evaluate, Evaluator};
