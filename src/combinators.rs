//! Combinators over lambda trees.
//!
//! Every combinator builds a new tree out of existing ones by substitution, never by
//! reference: the result contains no reference calls of its own and needs no expansion
//! beyond what its inputs already needed.

use crate::ast::{Callee, Expr, Lambda, Node, Parameter, Type, UnaryOp, Value};
use crate::macros::{replace_parameter, substitute, Substitution};
use crate::runtime::eval;
use crate::{expr_err, ExprError};
use im::OrdMap;
use once_cell::sync::Lazy;

// ============================================================================
// COMPOSITION
// ============================================================================

/// `first: T → U` then `second: U → R`, as one tree `T → R`.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::{Expr, Lambda, Parameter, Type};
/// use exprnest::combinators::compose;
/// let s = Parameter::new("s", Type::Str);
/// let n = Parameter::new("n", Type::Int);
/// let len = Lambda::new(vec![s.clone()], Expr::member(Expr::parameter(&s), &exprnest::runtime::builtins::string_length()));
/// let double = Lambda::new(vec![n.clone()], Expr::add(Expr::parameter(&n), Expr::parameter(&n)));
/// let composed = compose(&len, &double).unwrap();
/// assert_eq!(composed.to_string(), "s => (s.len + s.len)");
/// ```
pub fn compose(first: &Lambda, second: &Lambda) -> Result<Lambda, ExprError> {
    single_param(first, "compose")?;
    let input = single_param(second, "compose")?;
    check_feeds(input.ty(), &first.ret, "compose")?;
    let body = replace_parameter(&second.body, input, &first.body)?;
    Ok(Lambda::with_return(
        first.params.clone(),
        body,
        second.ret.clone(),
    ))
}

/// `first: T → U` then `second: (T, U) → R`, where `second` also sees the original input.
pub fn compose_with_input(first: &Lambda, second: &Lambda) -> Result<Lambda, ExprError> {
    let input = single_param(first, "compose_with_input")?;
    let [original, intermediate] = second.params.as_slice() else {
        return Err(expr_err!(
            InvalidArgument,
            "compose_with_input needs a two-parameter second tree, got '{}'",
            second
        ));
    };
    check_feeds(original.ty(), input.ty(), "compose_with_input")?;
    check_feeds(intermediate.ty(), &first.ret, "compose_with_input")?;
    let substitution = Substitution::new()
        .bind(original, Expr::parameter(input))
        .bind(intermediate, first.body.clone());
    let body = substitute(&second.body, &substitution)?;
    Ok(Lambda::with_return(
        first.params.clone(),
        body,
        second.ret.clone(),
    ))
}

/// `first` followed by each step in order, each step seeing the original input and the
/// result so far.
pub fn compose_sequence(first: &Lambda, steps: &[Lambda]) -> Result<Lambda, ExprError> {
    steps
        .iter()
        .try_fold(first.clone(), |acc, step| compose_with_input(&acc, step))
}

// ============================================================================
// FOLDING
// ============================================================================

/// Combines single-input trees over one shared input, left to right with `op`.
///
/// Each tree's parameter is replaced by one fresh parameter, so
/// `fold([x => a(x), y => b(y), z => c(z)], op)` is `t => op(op(a(t), b(t)), c(t))`.
pub fn fold<'a, I, F>(trees: I, mut op: F) -> Result<Lambda, ExprError>
where
    I: IntoIterator<Item = &'a Lambda>,
    F: FnMut(Node, Node) -> Node,
{
    let mut trees = trees.into_iter();
    let Some(first) = trees.next() else {
        return Err(expr_err!(InvalidArgument, "fold needs at least one tree"));
    };
    let input_ty = single_param(first, "fold")?.ty().clone();
    let shared = Parameter::new("t", input_ty.clone());
    let shared_node = Expr::parameter(&shared);

    let mut acc = rebind(first, &shared_node)?;
    for tree in trees {
        let param = single_param(tree, "fold")?;
        if param.ty() != &input_ty {
            return Err(expr_err!(
                InvalidArgument,
                "fold needs trees over one input type; '{}' takes {} instead of {}",
                tree,
                param.ty(),
                input_ty
            ));
        }
        acc = op(acc, rebind(tree, &shared_node)?);
    }
    Ok(Lambda::new(vec![shared], acc))
}

fn rebind(tree: &Lambda, shared: &Node) -> Result<Node, ExprError> {
    replace_parameter(&tree.body, &tree.params[0], shared)
}

/// `t => a(t) && b(t)`
pub fn and(a: &Lambda, b: &Lambda) -> Result<Lambda, ExprError> {
    check_predicate(a, "and")?;
    check_predicate(b, "and")?;
    fold([a, b], Expr::and_also)
}

/// `t => a(t) || b(t)`
pub fn or(a: &Lambda, b: &Lambda) -> Result<Lambda, ExprError> {
    check_predicate(a, "or")?;
    check_predicate(b, "or")?;
    fold([a, b], Expr::or_else)
}

static NOT: Lazy<Lambda> = Lazy::new(|| {
    let x = Parameter::new("x", Type::Bool);
    Lambda::new(vec![x.clone()], Expr::not(Expr::parameter(&x)))
});

/// The tree `x => !x`.
pub fn not() -> Lambda {
    NOT.clone()
}

// ============================================================================
// UTILITIES
// ============================================================================

/// `tree` with its result converted to `ty`.
pub fn cast(tree: &Lambda, ty: Type) -> Lambda {
    Lambda::with_return(
        tree.params.clone(),
        Expr::convert(tree.body.clone(), ty.clone()),
        ty,
    )
}

/// Default granularity for [`equal_to_any`].
pub const DEFAULT_GRANULARITY: usize = 10;

/// `x => x == a | x == b | ...` over `items`.
///
/// The item list is padded to a multiple of `granularity` by repeating its last item, so
/// lists of similar length produce trees of identical shape. A granularity of 0 counts as 1.
/// No items gives `_ => false`.
pub fn equal_to_any(items: &[Value], ty: Type, granularity: usize) -> Lambda {
    let granularity = granularity.max(1);
    let x = Parameter::new("x", ty.clone());
    let Some(last) = items.last() else {
        return Lambda::new(vec![x], Expr::constant(false));
    };
    let padded = items.len().div_ceil(granularity) * granularity;
    let x_node = Expr::parameter(&x);
    let comparisons = items
        .iter()
        .chain(std::iter::repeat(last))
        .take(padded)
        .map(|item| Expr::equal(x_node.clone(), Expr::typed_constant(item.clone(), ty.clone())));
    let body = comparisons
        .reduce(Expr::or)
        .unwrap_or_else(|| Expr::constant(false));
    Lambda::new(vec![x], body)
}

/// Turns a field getter `t => t.F` into the setter `(t, v) => (t.F = v)`.
///
/// The getter's body must read a writable member straight off its only parameter; anything
/// else is an `InvalidArgument`.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::{Expr, Lambda, Member, Parameter, Record, Type, Value};
/// use exprnest::combinators::setter_from_getter;
/// let l = Member::field("B", "L", Type::Int);
/// let b = Parameter::new("b", Type::object("B"));
/// let getter = Lambda::new(vec![b.clone()], Expr::member(Expr::parameter(&b), &l));
/// let setter = setter_from_getter(&getter).unwrap();
/// assert_eq!(setter.to_string(), "(b, value) => (b.L = value)");
/// let updated = setter
///     .invoke(&[Record::new("B").with("L", 1).into(), Value::Int(2)])
///     .unwrap();
/// assert_eq!(updated.as_record().unwrap().get("L"), Some(&Value::Int(2)));
/// ```
pub fn setter_from_getter(getter: &Lambda) -> Result<Lambda, ExprError> {
    let not_writable = || {
        expr_err!(
            InvalidArgument,
            "'{}' is not a reference to a writable member of its parameter",
            getter
        )
    };
    let [target] = getter.params.as_slice() else {
        return Err(not_writable());
    };
    let Expr::Member {
        target: Some(read_from),
        member,
    } = getter.body.as_ref()
    else {
        return Err(not_writable());
    };
    let reads_parameter = matches!(read_from.as_ref(), Expr::Parameter(p) if p == target);
    if !reads_parameter || !member.is_writable() {
        return Err(not_writable());
    }
    let value = Parameter::new("value", member.ty().clone());
    let body = Expr::set_member(Expr::parameter(target), member, Expr::parameter(&value))?;
    Ok(Lambda::new(vec![target.clone(), value], body))
}

/// Name of the member or function a tree reads, looking through lambdas and conversions.
pub fn member_name(node: &Node) -> Option<String> {
    match node.as_ref() {
        Expr::Member { member, .. } => Some(member.name().to_string()),
        Expr::Call {
            callee: Callee::Function(function),
            ..
        } => Some(function.name().to_string()),
        Expr::Unary {
            op: UnaryOp::Convert(_),
            operand,
            ..
        } => member_name(operand),
        Expr::Lambda(lambda) => member_name(&lambda.body),
        _ => None,
    }
}

/// Evaluates the arguments of a function call into a parameter name → value map.
pub fn call_parameters(node: &Node) -> Result<OrdMap<String, Value>, ExprError> {
    match node.as_ref() {
        Expr::Lambda(lambda) => call_parameters(&lambda.body),
        Expr::Unary {
            op: UnaryOp::Convert(_),
            operand,
            ..
        } => call_parameters(operand),
        Expr::Call {
            callee: Callee::Function(function),
            args,
            ..
        } => function
            .params()
            .iter()
            .zip(args)
            .map(|(param, arg)| Ok((param.name.to_string(), eval::evaluate(arg)?)))
            .collect(),
        other => Err(expr_err!(
            InvalidArgument,
            "Unsupported expression type: '{}' is not a function call",
            other
        )),
    }
}

// ============================================================================
// CHECKS
// ============================================================================

fn single_param<'l>(tree: &'l Lambda, combinator: &str) -> Result<&'l Parameter, ExprError> {
    match tree.params.as_slice() {
        [param] => Ok(param),
        params => Err(expr_err!(
            InvalidArgument,
            "{} needs single-input trees, '{}' takes {}",
            combinator,
            tree,
            params.len()
        )),
    }
}

fn check_feeds(expected: &Type, actual: &Type, combinator: &str) -> Result<(), ExprError> {
    if expected.accepts(actual) {
        Ok(())
    } else {
        Err(ExprError::type_mismatch(expected, actual, combinator))
    }
}

fn check_predicate(tree: &Lambda, combinator: &str) -> Result<(), ExprError> {
    check_feeds(&Type::Bool, &tree.ret, combinator)
}
