//!
//! ****************************************************************************************
//! ** ERROR RULES FOR exprnest (`expr_err!`)                                             **
//! ****************************************************************************************
//!
//! # Overview
//!
//! This module defines the unified, `miette`-based error type for the whole crate. Every
//! failure raised while building, substituting, expanding or evaluating a tree is an
//! [`ExprError`]. All of them are synchronous construction-time failures: nothing here is
//! transient, and none is ever retried or downgraded. A tree that fails to expand has to be
//! fixed (or its substitute function fixed) and expanded again from scratch.
//!
//! # Error Construction
//!
//! - **Use `expr_err!` for message-only errors.**
//!   - `expr_err!(InvalidArgument, "fold requires at least one tree")`
//!   - `expr_err!(Eval, "Parameter '{}' is not bound", name)`
//!   - `expr_err!(MalformedSubstitute, function.name(), "cannot have 'out' parameters")`
//!
//! - **Build structured variants directly** (`ArityMismatch`, `TypeMismatch`, ...). Always
//!   embed the textual form of the offending node so the error can be diagnosed without a
//!   debugger.
//!
//! ****************************************************************************************

use miette::Diagnostic;
use thiserror::Error;

/// Type-safe error classification that corresponds to [`ExprError`] variants.
/// Tests match on this instead of parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// A traversal nested deeper than the configured maximum
    RecursionLimit,
    /// A reference call whose tree holder is not a constant tree
    UnresolvableReference,
    /// Parameter count of a referenced tree differs from the supplied arguments
    ArityMismatch,
    /// A substitute function that does not quote exactly once, or has unsupported parameters
    MalformedSubstitute,
    /// Declared and actual types disagree
    TypeMismatch,
    /// A combinator or constructor received unusable input
    InvalidArgument,
    /// A substitute body failed while being captured
    SubstituteFailed,
    /// A reference call or substitute function was executed without expansion
    DirectInvocation,
    /// Ordinary evaluation failure
    Eval,
}

impl ErrorType {
    /// Returns the stable name of this error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::RecursionLimit => "RecursionLimitExceeded",
            ErrorType::UnresolvableReference => "UnresolvableReference",
            ErrorType::ArityMismatch => "ArityMismatch",
            ErrorType::MalformedSubstitute => "MalformedSubstitute",
            ErrorType::TypeMismatch => "TypeMismatch",
            ErrorType::InvalidArgument => "InvalidArgument",
            ErrorType::SubstituteFailed => "SubstituteFailed",
            ErrorType::DirectInvocation => "DirectInvocation",
            ErrorType::Eval => "Eval",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for every failure mode of the crate.
#[derive(Debug, Clone, Error)]
pub enum ExprError {
    #[error("Maximum recursion depth ({limit}) exceeded. This happens when an expression tree has too many nested nodes.")]
    RecursionLimitExceeded { limit: usize },

    #[error("Cannot expand expression '{call}'. The first (tree holder) argument must be a constant lambda tree, or a chain of member reads off a constant, and not null.")]
    UnresolvableReference { call: String },

    #[error("Malformed expression tree: sub-expression has {expected} parameters, but {actual} are supplied. The sub-expression is: {expression}")]
    ArityMismatch {
        expected: usize,
        actual: usize,
        expression: String,
    },

    #[error("Substitute function '{function}' is malformed: {message}")]
    MalformedSubstitute { function: String, message: String },

    #[error("Type mismatch in {context}: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: String,
        actual: String,
        context: String,
    },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("There was an error while trying to substitute function '{function}'")]
    SubstituteFailed {
        function: String,
        #[source]
        source: Box<ExprError>,
    },

    #[error("'{call}' is not meant to be executed directly. It only has meaning inside a tree that is expanded before execution.")]
    DirectInvocation { call: String },

    #[error("Evaluation error: {message}")]
    Eval { message: String },
}

impl ExprError {
    /// Returns the type-safe classification of this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            ExprError::RecursionLimitExceeded { .. } => ErrorType::RecursionLimit,
            ExprError::UnresolvableReference { .. } => ErrorType::UnresolvableReference,
            ExprError::ArityMismatch { .. } => ErrorType::ArityMismatch,
            ExprError::MalformedSubstitute { .. } => ErrorType::MalformedSubstitute,
            ExprError::TypeMismatch { .. } => ErrorType::TypeMismatch,
            ExprError::InvalidArgument { .. } => ErrorType::InvalidArgument,
            ExprError::SubstituteFailed { .. } => ErrorType::SubstituteFailed,
            ExprError::DirectInvocation { .. } => ErrorType::DirectInvocation,
            ExprError::Eval { .. } => ErrorType::Eval,
        }
    }

    /// Builds a `TypeMismatch` from anything displayable.
    pub fn type_mismatch(
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
        context: impl std::fmt::Display,
    ) -> Self {
        ExprError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
            context: context.to_string(),
        }
    }

    fn help_text(&self) -> Option<&'static str> {
        match self {
            ExprError::RecursionLimitExceeded { .. } => Some(
                "Reduce the nesting of the tree, or raise the limit with config::set_max_recursion_depth.",
            ),
            ExprError::UnresolvableReference { .. } => Some(
                "Store the referenced tree in a constant, a record field of a constant, or a static member before building the call.",
            ),
            ExprError::MalformedSubstitute { .. } => Some(
                "A substitute body must call Quoter::quote exactly once with a lambda matching the function's signature.",
            ),
            ExprError::DirectInvocation { .. } => Some(
                "Run macros::expand on the tree before executing it.",
            ),
            _ => None,
        }
    }
}

impl Diagnostic for ExprError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!("exprnest::{}", self.error_type())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.help_text()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }
}

/// Constructs a message-only `ExprError` variant.
///
/// Supports `InvalidArgument` and `Eval` with a format string, and `MalformedSubstitute`
/// with the function name followed by a format string.
#[macro_export]
macro_rules! expr_err {
    (MalformedSubstitute, $function:expr, $($arg:tt)+) => {
        $crate::ExprError::MalformedSubstitute {
            function: $function.to_string(),
            message: format!($($arg)+),
        }
    };
    (InvalidArgument, $($arg:tt)+) => {
        $crate::ExprError::InvalidArgument {
            message: format!($($arg)+),
        }
    };
    (Eval, $($arg:tt)+) => {
        $crate::ExprError::Eval {
            message: format!($($arg)+),
        }
    };
}
