//! Static types carried by tree nodes.
//!
//! Types exist to validate construction: a call is checked against its callee's signature,
//! a quoted lambda against the function it stands in for. `Type::Any` is a wildcard that
//! accepts and is accepted by everything, for holders whose shape is not known up front.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The static type of a node or value.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::Type;
/// let pred = Type::function([Type::Int], Type::Bool);
/// assert_eq!(pred.to_string(), "fn(int) -> bool");
/// assert!(Type::Any.accepts(&Type::Str));
/// assert!(!Type::Int.accepts(&Type::Str));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Any,
    Unit,
    Bool,
    Int,
    Float,
    Str,
    Seq(Box<Type>),
    /// A named record type such as `A` or `B`
    Object(Arc<str>),
    Function(Vec<Type>, Box<Type>),
    /// The type of a value that is itself a lambda tree
    Quoted(Box<Type>),
}

impl Type {
    pub fn object(name: &str) -> Type {
        Type::Object(Arc::from(name))
    }

    pub fn seq(element: Type) -> Type {
        Type::Seq(Box::new(element))
    }

    pub fn function(params: impl IntoIterator<Item = Type>, ret: Type) -> Type {
        Type::Function(params.into_iter().collect(), Box::new(ret))
    }

    /// The type of a tree holder for a lambda with the given signature.
    pub fn quoted(params: impl IntoIterator<Item = Type>, ret: Type) -> Type {
        Type::Quoted(Box::new(Type::function(params, ret)))
    }

    /// Whether a value of type `other` may be used where `self` is expected.
    pub fn accepts(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Any, _) | (_, Type::Any) => true,
            (Type::Seq(a), Type::Seq(b)) => a.accepts(b),
            (Type::Quoted(a), Type::Quoted(b)) => a.accepts(b),
            (Type::Function(pa, ra), Type::Function(pb, rb)) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(a, b)| a.accepts(b))
                    && ra.accepts(rb)
            }
            (a, b) => a == b,
        }
    }

    /// Parameter and return types of a function type, looking through `Quoted`.
    pub fn function_parts(&self) -> Option<(&[Type], &Type)> {
        match self {
            Type::Function(params, ret) => Some((params, ret)),
            Type::Quoted(inner) => inner.function_parts(),
            _ => None,
        }
    }

    pub fn is_quoted(&self) -> bool {
        matches!(self, Type::Quoted(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Unit => write!(f, "()"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Str => write!(f, "str"),
            Type::Seq(element) => write!(f, "[{}]", element),
            Type::Object(name) => write!(f, "{}", name),
            Type::Function(params, ret) => {
                write!(f, "fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::Quoted(inner) => write!(f, "quote<{}>", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_types_compare_structurally() {
        let a = Type::function([Type::object("A")], Type::object("B"));
        let b = Type::function([Type::Any], Type::object("B"));
        assert!(a.accepts(&b));
        assert!(!a.accepts(&Type::function([Type::Int], Type::object("B"))));
        assert!(!a.accepts(&Type::function([], Type::object("B"))));
    }

    #[test]
    fn quoted_exposes_function_parts() {
        let holder = Type::quoted([Type::Str, Type::Int], Type::Bool);
        let (params, ret) = holder.function_parts().unwrap();
        assert_eq!(params, &[Type::Str, Type::Int]);
        assert_eq!(ret, &Type::Bool);
        assert_eq!(holder.to_string(), "quote<fn(str, int) -> bool>");
    }
}
