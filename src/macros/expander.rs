//!
//! The expansion engine: finds reference calls and substitute calls in a tree and inlines
//! them, until none are left.
//!
//! ## Error Handling
//!
//! All expansion errors (unresolvable holders, arity, malformed substitutes, recursion
//! depth) are reported via the unified `ExprError` type. Expansion stops at the first error;
//! nothing partial is returned.
//!
//! ## Recursion and Expansion
//!
//! An inlined body is itself expanded by the same expander before it is spliced in, under
//! the same depth guard, so references that expand to further references are resolved, and
//! a tree that ends up referencing itself fails with `RecursionLimitExceeded`. Substituting
//! the arguments into a body continues from the depth of the call being inlined.

use crate::ast::{Callee, Expr, Lambda, Node, Value};
use crate::macros::constant::dig_out_constant;
use crate::macros::registry::SubstituteRegistry;
use crate::macros::substitute::{substitute_with_guard, Substitution};
use crate::macros::traversal::{DepthGuard, TreeRewriter, Visit};
use crate::macros::types::{ExpansionKind, ExpansionStep};
use crate::{expr_err, ExprError};
use std::sync::Arc;
use tracing::debug;

// =============================
// Public API for expansion
// =============================

/// Expands every reference call and substitute call in `node`, using the global registry.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::{Expr, Lambda, Parameter, Type};
/// use exprnest::macros::expand;
/// let x = Parameter::new("x", Type::Int);
/// let inc = Lambda::new(vec![x.clone()], Expr::add(Expr::parameter(&x), Expr::constant(1)));
/// let call = Expr::invoke(Expr::tree(inc), vec![Expr::constant(41)]).unwrap();
/// assert_eq!(expand(&call).unwrap().to_string(), "(41 + 1)");
/// ```
pub fn expand(node: &Node) -> Result<Node, ExprError> {
    Expander::new().expand(node)
}

/// Expands the body of `lambda`, keeping its parameters.
pub fn expand_lambda(lambda: &Lambda) -> Result<Lambda, ExprError> {
    Expander::new().expand_lambda(lambda)
}

/// Expansion context: the registry consulted for substitutes, the depth guard, the trace.
pub struct Expander<'r> {
    registry: &'r SubstituteRegistry,
    guard: DepthGuard,
    trace: Vec<ExpansionStep>,
}

impl Expander<'static> {
    pub fn new() -> Self {
        Expander::with_registry(SubstituteRegistry::global())
    }
}

impl Default for Expander<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Expander<'r> {
    pub fn with_registry(registry: &'r SubstituteRegistry) -> Self {
        Expander {
            registry,
            guard: DepthGuard::new(),
            trace: Vec::new(),
        }
    }

    /// Bounds this expander by its own depth limit instead of the process-wide one.
    pub fn with_max_depth(mut self, limit: usize) -> Self {
        self.guard = DepthGuard::with_limit(limit);
        self
    }

    pub fn expand(&mut self, node: &Node) -> Result<Node, ExprError> {
        self.rewrite(node)
    }

    pub fn expand_lambda(&mut self, lambda: &Lambda) -> Result<Lambda, ExprError> {
        let body = self.expand(&lambda.body)?;
        if Arc::ptr_eq(&body, &lambda.body) {
            return Ok(lambda.clone());
        }
        Ok(Lambda::with_return(
            lambda.params.clone(),
            body,
            lambda.ret.clone(),
        ))
    }

    /// Steps recorded so far, innermost first.
    pub fn trace(&self) -> &[ExpansionStep] {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Vec<ExpansionStep> {
        std::mem::take(&mut self.trace)
    }

    /// The body of `lambda` with `args` substituted, ready to be expanded in place of `call`.
    fn inline(&self, call: &Node, lambda: &Lambda, args: &[Node]) -> Result<Node, ExprError> {
        if lambda.params.len() != args.len() {
            return Err(ExprError::ArityMismatch {
                expected: lambda.params.len(),
                actual: args.len(),
                expression: format!("{} (called as {})", lambda, call),
            });
        }
        let substitution = Substitution::zip(&lambda.params, args);
        substitute_with_guard(&lambda.body, &substitution, self.guard.clone())
    }
}

fn expansion_kind(call: &Expr) -> Option<ExpansionKind> {
    match call {
        Expr::Call {
            callee: Callee::Invoke(shape),
            ..
        } => Some(ExpansionKind::Reference(*shape)),
        Expr::Call {
            callee: Callee::Function(function),
            ..
        } => Some(ExpansionKind::Substitute(function.name().to_string())),
        _ => None,
    }
}

impl TreeRewriter for Expander<'_> {
    fn guard(&mut self) -> &mut DepthGuard {
        &mut self.guard
    }

    fn visit(&mut self, node: &Node) -> Result<Visit, ExprError> {
        let Expr::Call { callee, args, .. } = node.as_ref() else {
            return Ok(Visit::Descend);
        };
        match callee {
            Callee::Invoke(_) => {
                let Some((holder, actual)) = args.split_first() else {
                    return Err(expr_err!(InvalidArgument, "reference call without a holder"));
                };
                let lambda = match dig_out_constant(holder) {
                    Some(Value::Tree(lambda)) => lambda,
                    _ => {
                        return Err(ExprError::UnresolvableReference {
                            call: node.to_string(),
                        })
                    }
                };
                self.inline(node, &lambda, actual).map(Visit::Replace)
            }
            Callee::Function(function) => match self.registry.quoted_body(function)? {
                Some(lambda) => self.inline(node, &lambda, args).map(Visit::Replace),
                None => Ok(Visit::Descend),
            },
        }
    }

    fn replaced(&mut self, original: &Node, output: &Node) {
        let Some(kind) = expansion_kind(original) else {
            return;
        };
        debug!(kind = %kind, call = %original, "inlined");
        self.trace.push(ExpansionStep {
            kind,
            input: Arc::clone(original),
            output: Arc::clone(output),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Function, Parameter, Type};
    use crate::ErrorType;

    #[test]
    fn unmarked_call_is_shared() {
        let f = Function::builder("f")
            .param("n", Type::Int)
            .returns(Type::Int)
            .build();
        let call = Expr::call(&f, vec![Expr::constant(1)]).unwrap();
        let registry = SubstituteRegistry::new();
        let out = Expander::with_registry(&registry).expand(&call).unwrap();
        assert!(Arc::ptr_eq(&out, &call));
    }

    #[test]
    fn self_reference_trips_the_guard() {
        let slot = crate::ast::Member::static_slot(
            "Trees",
            "loop",
            Type::Any,
            Value::Null,
        );
        let x = Parameter::new("x", Type::Int);
        let body = Expr::invoke(Expr::static_member(&slot), vec![Expr::parameter(&x)]).unwrap();
        slot.set_static(Value::from(Lambda::new(vec![x.clone()], body)))
            .unwrap();

        let call = Expr::invoke(Expr::static_member(&slot), vec![Expr::constant(1)]).unwrap();
        let err = Expander::new().with_max_depth(64).expand(&call).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::RecursionLimit);
    }

    #[test]
    fn trace_records_each_inlining() {
        let x = Parameter::new("x", Type::Int);
        let inc = Lambda::new(vec![x.clone()], Expr::add(Expr::parameter(&x), Expr::constant(1)));
        let holder = Expr::tree(inc);
        let inner = Expr::invoke(holder.clone(), vec![Expr::constant(1)]).unwrap();
        let outer = Expr::invoke(holder, vec![inner]).unwrap();

        let mut expander = Expander::new();
        let out = expander.expand(&outer).unwrap();
        assert_eq!(out.to_string(), "((1 + 1) + 1)");
        assert_eq!(expander.trace().len(), 2);
        assert_eq!(expander.trace()[0].output.to_string(), "(1 + 1)");
        assert_eq!(expander.trace()[1].output.to_string(), "((1 + 1) + 1)");
    }

    fn nested_negations(depth: usize, inner: Node) -> Node {
        (0..depth).fold(inner, |acc, _| Expr::not(acc))
    }

    #[test]
    fn inlined_body_counts_from_the_call_depth() {
        // a call nested 150 levels deep whose body is `depth` levels deep
        let at_depth = |body_depth: usize| {
            let x = Parameter::new("x", Type::Bool);
            let body = nested_negations(body_depth, Expr::parameter(&x));
            let holder = Expr::tree(Lambda::new(vec![x], body));
            let call = Expr::invoke(holder, vec![Expr::constant(true)]).unwrap();
            Expander::new().with_max_depth(300).expand(&nested_negations(150, call))
        };
        assert!(at_depth(100).is_ok());
        let err = at_depth(200).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::RecursionLimit);
    }

    #[test]
    fn arity_error_names_the_call_site() {
        let x = Parameter::new("x", Type::Int);
        let inc = Lambda::new(vec![x.clone()], Expr::add(Expr::parameter(&x), Expr::constant(1)));
        let holder = Expr::typed_constant(Value::from(inc), Type::Any);
        let call = Expr::invoke(holder, vec![Expr::constant(1), Expr::constant(2)]).unwrap();
        let err = Expander::new().expand(&call).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("has 1 parameters, but 2 are supplied"), "{}", message);
        assert!(message.contains("x => (x + 1) (called as "), "{}", message);
        assert!(message.contains(".invoke(1, 2)"), "{}", message);
    }
}
