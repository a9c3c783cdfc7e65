//! Parameter substitution.
//!
//! Replaces parameters by identity with replacement trees, everywhere in a tree, including
//! inside nested lambda bodies. Parameters are matched by identity, never by name, so a
//! substituted argument can never capture or be captured by an unrelated parameter that
//! happens to share its name.

use crate::ast::{Expr, Node, Parameter};
use crate::macros::traversal::{DepthGuard, TreeRewriter, Visit};
use crate::ExprError;
use std::sync::Arc;

/// Identity-keyed mapping from parameters to replacement trees.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::{Expr, Parameter, Type};
/// use exprnest::macros::{substitute, Substitution};
/// let x = Parameter::new("x", Type::Int);
/// let tree = Expr::add(Expr::parameter(&x), Expr::constant(1));
/// let subst = Substitution::new().bind(&x, Expr::constant(41));
/// assert_eq!(substitute(&tree, &subst).unwrap().to_string(), "(41 + 1)");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    map: im::HashMap<Parameter, Node>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a substitution extended with `param ↦ replacement`.
    pub fn bind(&self, param: &Parameter, replacement: Node) -> Self {
        Substitution {
            map: self.map.update(param.clone(), replacement),
        }
    }

    pub fn insert(&mut self, param: &Parameter, replacement: Node) {
        self.map.insert(param.clone(), replacement);
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Parameter, Node)>) -> Self {
        Substitution {
            map: pairs.into_iter().collect(),
        }
    }

    /// Pairs parameters with arguments positionally. Extra items on either side are ignored;
    /// callers check arity first.
    pub fn zip(params: &[Parameter], args: &[Node]) -> Self {
        Self::from_pairs(params.iter().cloned().zip(args.iter().cloned()))
    }

    pub fn get(&self, param: &Parameter) -> Option<&Node> {
        self.map.get(param)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

struct ParameterReplacer<'s> {
    substitution: &'s Substitution,
    guard: DepthGuard,
}

impl TreeRewriter for ParameterReplacer<'_> {
    fn guard(&mut self) -> &mut DepthGuard {
        &mut self.guard
    }

    fn visit(&mut self, node: &Node) -> Result<Visit, ExprError> {
        Ok(match node.as_ref() {
            Expr::Parameter(param) => Visit::Done(
                self.substitution
                    .get(param)
                    .map_or_else(|| Arc::clone(node), Arc::clone),
            ),
            _ => Visit::Descend,
        })
    }
}

/// Replaces every mapped parameter in `node`. Unmapped sub-trees are shared, not copied.
pub fn substitute(node: &Node, substitution: &Substitution) -> Result<Node, ExprError> {
    substitute_with_guard(node, substitution, DepthGuard::new())
}

/// Like [`substitute`], continuing from `guard`'s depth and bounded by its limit.
pub fn substitute_with_guard(
    node: &Node,
    substitution: &Substitution,
    guard: DepthGuard,
) -> Result<Node, ExprError> {
    if substitution.is_empty() {
        return Ok(Arc::clone(node));
    }
    ParameterReplacer {
        substitution,
        guard,
    }
    .rewrite(node)
}

/// Replaces a single parameter.
pub fn replace_parameter(
    node: &Node,
    param: &Parameter,
    replacement: &Node,
) -> Result<Node, ExprError> {
    substitute(node, &Substitution::new().bind(param, Arc::clone(replacement)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Lambda, Type};
    use crate::ErrorType;

    #[test]
    fn replaces_inside_nested_lambdas() {
        let x = Parameter::new("x", Type::Int);
        let y = Parameter::new("y", Type::Int);
        let inner = Lambda::new(
            vec![y.clone()],
            Expr::add(Expr::parameter(&x), Expr::parameter(&y)),
        );
        let tree = Expr::lambda(inner);
        let out = replace_parameter(&tree, &x, &Expr::constant(5)).unwrap();
        assert_eq!(out.to_string(), "y => (5 + y)");
    }

    #[test]
    fn same_name_different_parameter_is_untouched() {
        let outer = Parameter::new("x", Type::Int);
        let other = Parameter::new("x", Type::Int);
        let tree = Expr::add(Expr::parameter(&outer), Expr::parameter(&other));
        let out = replace_parameter(&tree, &outer, &Expr::constant(1)).unwrap();
        match out.as_ref() {
            Expr::Binary { left, right, .. } => {
                assert_eq!(left.to_string(), "1");
                assert!(matches!(right.as_ref(), Expr::Parameter(p) if *p == other));
            }
            node => panic!("unexpected node {}", node),
        }
    }

    #[test]
    fn unmapped_tree_is_shared() {
        let x = Parameter::new("x", Type::Int);
        let z = Parameter::new("z", Type::Int);
        let tree = Expr::add(Expr::parameter(&x), Expr::constant(1));
        let out = replace_parameter(&tree, &z, &Expr::constant(0)).unwrap();
        assert!(Arc::ptr_eq(&out, &tree));
    }

    #[test]
    fn guard_depth_carries_over() {
        let x = Parameter::new("x", Type::Int);
        // two levels: the binary, then its leaves
        let tree = Expr::add(Expr::parameter(&x), Expr::constant(1));
        let subst = Substitution::new().bind(&x, Expr::constant(2));

        let mut fresh = DepthGuard::with_limit(4);
        assert!(substitute_with_guard(&tree, &subst, fresh.clone()).is_ok());

        fresh.enter().unwrap();
        fresh.enter().unwrap();
        fresh.enter().unwrap();
        let err = substitute_with_guard(&tree, &subst, fresh).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::RecursionLimit);
    }
}
