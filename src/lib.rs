//! exprnest: typed expression trees that can reference other trees, and the expansion pass
//! that inlines those references so the result can be executed or translated.
//!
//! A tree refers to another tree in two ways. A *reference call* ([`Expr::invoke`]) invokes
//! a lambda tree held in a constant (or in a member chain off one). A *substitute call*
//! calls a function registered in a [`SubstituteRegistry`], whose body quotes the lambda
//! that stands in for it. [`expand`] replaces both by the referenced lambda's body with the
//! call's arguments substituted for its parameters, recursively, until neither is left.
//!
//! ```rust
//! use exprnest::ast::{Expr, Lambda, Parameter, Type, Value};
//! let x = Parameter::new("x", Type::Int);
//! let is_small = Lambda::new(
//!     vec![x.clone()],
//!     Expr::binary(exprnest::ast::BinaryOp::LessThan, Expr::parameter(&x), Expr::constant(10)),
//! );
//! let n = Parameter::new("n", Type::Int);
//! let call = Expr::invoke(Expr::tree(is_small), vec![Expr::parameter(&n)]).unwrap();
//! let outer = Lambda::new(vec![n], call);
//!
//! assert!(outer.invoke(&[Value::Int(3)]).is_err());
//! let expanded = outer.expand().unwrap();
//! assert_eq!(expanded.to_string(), "n => (n < 10)");
//! assert_eq!(expanded.invoke(&[Value::Int(3)]).unwrap(), Value::Bool(true));
//! ```

pub use crate::diagnostics::{ErrorType, ExprError};

pub mod ast;
pub mod combinators;
pub mod config;
pub mod diagnostics;
pub mod macros;
pub mod runtime;

pub use crate::ast::{Expr, Function, Lambda, Member, Node, Parameter, Type, Value};
pub use crate::macros::{expand, expand_lambda, Expander, Quoter, SubstituteRegistry};
