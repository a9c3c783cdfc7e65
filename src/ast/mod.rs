//! Tree model for typed expression trees.
//!
//! Trees are immutable and shared: a [`Node`] is an `Arc<Expr>`, every rewrite builds new
//! nodes, and sub-trees a rewrite does not touch are reused as-is (`Arc::ptr_eq` holds for
//! them). Construction helpers validate what can be validated locally (call arity and
//! argument types) and embed the text of the offending node in their errors.

// ============================================================================
// IMPORTS
// ============================================================================

use crate::ExprError;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;

pub mod display;
pub mod symbols;
pub mod types;
pub mod value;

pub use symbols::{
    Function, FunctionBuilder, FunctionId, FunctionParam, Member, MemberId, MemberKind,
    NativeFn, ParamId, ParamMode, Parameter, PropertyFn, StaticSlot,
};
pub use types::Type;
pub use value::{Closure, Env, Record, Value};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Shared handle to an immutable tree node.
pub type Node = Arc<Expr>;

/// A node of an expression tree.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::{Expr, Lambda, Parameter, Type};
/// let x = Parameter::new("x", Type::Int);
/// let body = Expr::add(Expr::parameter(&x), Expr::constant(1));
/// let inc = Lambda::new(vec![x], body);
/// assert_eq!(inc.to_string(), "x => (x + 1)");
/// assert_eq!(inc.ret, Type::Int);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Expr {
    Parameter(Parameter),
    Constant {
        value: Value,
        ty: Type,
    },
    /// Member read. `target` is `None` for static members.
    Member {
        target: Option<Node>,
        member: Member,
    },
    Call {
        receiver: Option<Node>,
        callee: Callee,
        args: Vec<Node>,
        ty: Type,
    },
    Lambda(Lambda),
    Unary {
        op: UnaryOp,
        operand: Node,
        ty: Type,
    },
    Binary {
        op: BinaryOp,
        left: Node,
        right: Node,
        ty: Type,
    },
    Condition {
        test: Node,
        if_true: Node,
        if_false: Node,
        ty: Type,
    },
    /// Object construction, `new B { L = ... }`
    Record {
        type_name: Arc<str>,
        fields: Vec<(Arc<str>, Node)>,
    },
    /// Field write, `(t.L = v)`. Records are values, so the result is the updated record.
    SetMember {
        target: Node,
        member: Member,
        value: Node,
    },
}

/// What a call node calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Callee {
    Function(Function),
    /// A reference call: `args[0]` is the tree holder, the rest are its arguments
    Invoke(InvokeShape),
}

/// The three reference-call shapes, by number of arguments after the holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeShape {
    One,
    Two,
    Three,
}

impl InvokeShape {
    pub fn from_arity(arity: usize) -> Option<Self> {
        match arity {
            1 => Some(InvokeShape::One),
            2 => Some(InvokeShape::Two),
            3 => Some(InvokeShape::Three),
            _ => None,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            InvokeShape::One => 1,
            InvokeShape::Two => 2,
            InvokeShape::Three => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Negate,
    Convert(Type),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// Short-circuiting conjunction
    AndAlso,
    /// Short-circuiting disjunction
    OrElse,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
        }
    }

    /// Whether the operator always produces a boolean.
    pub fn is_predicate(self) -> bool {
        !matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide
        )
    }
}

/// A lambda: parameters, a body over them, and a result type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lambda {
    pub params: Vec<Parameter>,
    pub body: Node,
    pub ret: Type,
}

// ============================================================================
// LAMBDAS
// ============================================================================

impl Lambda {
    /// Builds a lambda whose result type is the body's type.
    pub fn new(params: Vec<Parameter>, body: Node) -> Self {
        let ret = body.ty();
        Lambda { params, body, ret }
    }

    pub fn with_return(params: Vec<Parameter>, body: Node, ret: Type) -> Self {
        Lambda { params, body, ret }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn fn_type(&self) -> Type {
        Type::function(self.params.iter().map(|p| p.ty().clone()), self.ret.clone())
    }

    /// Evaluates this (closed) lambda against the given arguments.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, ExprError> {
        crate::runtime::eval::call(self, args)
    }

    /// Expands every reference call and substitute call in the body.
    pub fn expand(&self) -> Result<Lambda, ExprError> {
        crate::macros::expand_lambda(self)
    }

    /// The body with the given parameters replaced.
    pub fn replace_parameters(
        &self,
        substitution: &crate::macros::Substitution,
    ) -> Result<Node, ExprError> {
        crate::macros::substitute(&self.body, substitution)
    }
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

impl Expr {
    /// The static type of this node.
    pub fn ty(&self) -> Type {
        match self {
            Expr::Parameter(p) => p.ty().clone(),
            Expr::Constant { ty, .. } => ty.clone(),
            Expr::Member { member, .. } => member.ty().clone(),
            Expr::Call { ty, .. } => ty.clone(),
            Expr::Lambda(lambda) => lambda.fn_type(),
            Expr::Unary { ty, .. } => ty.clone(),
            Expr::Binary { ty, .. } => ty.clone(),
            Expr::Condition { ty, .. } => ty.clone(),
            Expr::Record { type_name, .. } => Type::Object(Arc::clone(type_name)),
            Expr::SetMember { target, .. } => target.ty(),
        }
    }

    pub fn parameter(param: &Parameter) -> Node {
        Arc::new(Expr::Parameter(param.clone()))
    }

    /// A constant whose type is inferred from the value.
    pub fn constant(value: impl Into<Value>) -> Node {
        let value = value.into();
        let ty = value.ty();
        Arc::new(Expr::Constant { value, ty })
    }

    pub fn typed_constant(value: impl Into<Value>, ty: Type) -> Node {
        Arc::new(Expr::Constant {
            value: value.into(),
            ty,
        })
    }

    /// A constant holding a lambda tree, usable directly as a reference-call holder.
    pub fn tree(lambda: Lambda) -> Node {
        Expr::constant(lambda)
    }

    pub fn member(target: Node, member: &Member) -> Node {
        Arc::new(Expr::Member {
            target: Some(target),
            member: member.clone(),
        })
    }

    pub fn static_member(member: &Member) -> Node {
        Arc::new(Expr::Member {
            target: None,
            member: member.clone(),
        })
    }

    /// A call to a free function, checked against its signature.
    pub fn call(function: &Function, args: Vec<Node>) -> Result<Node, ExprError> {
        if function.is_method() {
            return Err(crate::expr_err!(
                InvalidArgument,
                "'{}' is an instance method and needs a receiver",
                function
            ));
        }
        check_call_args(function, &args)?;
        Ok(Arc::new(Expr::Call {
            receiver: None,
            callee: Callee::Function(function.clone()),
            args,
            ty: function.ret().clone(),
        }))
    }

    /// A call to an instance method on `receiver`.
    pub fn method_call(
        receiver: Node,
        function: &Function,
        args: Vec<Node>,
    ) -> Result<Node, ExprError> {
        let Some(expected) = function.receiver() else {
            return Err(crate::expr_err!(
                InvalidArgument,
                "'{}' is not an instance method",
                function
            ));
        };
        let actual = receiver.ty();
        if !expected.accepts(&actual) {
            return Err(ExprError::type_mismatch(
                expected,
                actual,
                format_args!("receiver of '{}'", function.name()),
            ));
        }
        check_call_args(function, &args)?;
        Ok(Arc::new(Expr::Call {
            receiver: Some(receiver),
            callee: Callee::Function(function.clone()),
            args,
            ty: function.ret().clone(),
        }))
    }

    /// A reference call: invoke the tree held by `holder` on `args`.
    ///
    /// `holder` must be typed as a tree (`Type::Quoted`) or `Type::Any`. When its signature
    /// is known the arguments are checked against it; otherwise the check is left to
    /// expansion.
    pub fn invoke(holder: Node, args: Vec<Node>) -> Result<Node, ExprError> {
        let Some(shape) = InvokeShape::from_arity(args.len()) else {
            return Err(crate::expr_err!(
                InvalidArgument,
                "reference calls take 1 to 3 arguments, got {} for '{}'",
                args.len(),
                holder
            ));
        };
        let holder_ty = holder.ty();
        let ty = match &holder_ty {
            Type::Any => Type::Any,
            Type::Quoted(_) => match holder_ty.function_parts() {
                Some((params, ret)) => {
                    if params.len() != args.len() {
                        return Err(ExprError::ArityMismatch {
                            expected: params.len(),
                            actual: args.len(),
                            expression: holder.to_string(),
                        });
                    }
                    for (i, (param, arg)) in params.iter().zip(&args).enumerate() {
                        let actual = arg.ty();
                        if !param.accepts(&actual) {
                            return Err(ExprError::type_mismatch(
                                param,
                                actual,
                                format_args!("argument {} of '{}.invoke'", i + 1, holder),
                            ));
                        }
                    }
                    ret.clone()
                }
                None => Type::Any,
            },
            other => {
                return Err(ExprError::type_mismatch(
                    "a tree holder",
                    other,
                    format_args!("reference call on '{}'", holder),
                ))
            }
        };
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(holder);
        all.extend(args);
        Ok(Arc::new(Expr::Call {
            receiver: None,
            callee: Callee::Invoke(shape),
            args: all,
            ty,
        }))
    }

    pub fn lambda(lambda: Lambda) -> Node {
        Arc::new(Expr::Lambda(lambda))
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Node {
        let ty = match &op {
            UnaryOp::Not => Type::Bool,
            UnaryOp::Negate => operand.ty(),
            UnaryOp::Convert(target) => target.clone(),
        };
        Arc::new(Expr::Unary { op, operand, ty })
    }

    pub fn not(operand: Node) -> Node {
        Expr::unary(UnaryOp::Not, operand)
    }

    pub fn convert(operand: Node, ty: Type) -> Node {
        Expr::unary(UnaryOp::Convert(ty), operand)
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        let ty = if op.is_predicate() {
            Type::Bool
        } else {
            match (left.ty(), right.ty()) {
                (Type::Str, _) | (_, Type::Str) if op == BinaryOp::Add => Type::Str,
                (Type::Float, _) | (_, Type::Float) => Type::Float,
                (l, _) => l,
            }
        };
        Arc::new(Expr::Binary {
            op,
            left,
            right,
            ty,
        })
    }

    pub fn add(left: Node, right: Node) -> Node {
        Expr::binary(BinaryOp::Add, left, right)
    }

    pub fn equal(left: Node, right: Node) -> Node {
        Expr::binary(BinaryOp::Equal, left, right)
    }

    pub fn and_also(left: Node, right: Node) -> Node {
        Expr::binary(BinaryOp::AndAlso, left, right)
    }

    pub fn or_else(left: Node, right: Node) -> Node {
        Expr::binary(BinaryOp::OrElse, left, right)
    }

    pub fn or(left: Node, right: Node) -> Node {
        Expr::binary(BinaryOp::Or, left, right)
    }

    pub fn condition(test: Node, if_true: Node, if_false: Node) -> Node {
        let ty = if_true.ty();
        Arc::new(Expr::Condition {
            test,
            if_true,
            if_false,
            ty,
        })
    }

    pub fn record(type_name: &str, fields: Vec<(&str, Node)>) -> Node {
        Arc::new(Expr::Record {
            type_name: Arc::from(type_name),
            fields: fields
                .into_iter()
                .map(|(name, node)| (Arc::from(name), node))
                .collect(),
        })
    }

    /// Writes `value` into the field `member` of `target`.
    pub fn set_member(target: Node, member: &Member, value: Node) -> Result<Node, ExprError> {
        if !member.is_writable() {
            return Err(crate::expr_err!(
                InvalidArgument,
                "'{}.{}' is not a writable member",
                member.declaring(),
                member.name()
            ));
        }
        let actual = value.ty();
        if !member.ty().accepts(&actual) {
            return Err(ExprError::type_mismatch(
                member.ty(),
                actual,
                format_args!("value written to '{}'", member.name()),
            ));
        }
        Ok(Arc::new(Expr::SetMember {
            target,
            member: member.clone(),
            value,
        }))
    }

    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self {
            Expr::Lambda(lambda) => Some(lambda),
            _ => None,
        }
    }

    /// Whether this node is a reference call.
    pub fn is_invoke(&self) -> bool {
        matches!(
            self,
            Expr::Call {
                callee: Callee::Invoke(_),
                ..
            }
        )
    }
}

// ============================================================================
// TEARDOWN
// ============================================================================

/// Stand-in left behind in a node whose children were moved out while dropping it.
static DETACHED: Lazy<Node> = Lazy::new(|| {
    Arc::new(Expr::Constant {
        value: Value::Null,
        ty: Type::Any,
    })
});

/// Drops sub-trees from a work-list, so tearing down a tree takes no more stack for a deep
/// tree than for a shallow one.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_children(self, &mut pending);
        while let Some(node) = pending.pop() {
            if let Ok(mut expr) = Arc::try_unwrap(node) {
                detach_children(&mut expr, &mut pending);
            }
        }
    }
}

fn detach_children(expr: &mut Expr, out: &mut Vec<Node>) {
    let mut detach = |slot: &mut Node| {
        let child = std::mem::replace(slot, Arc::clone(&*DETACHED));
        if !Arc::ptr_eq(&child, &*DETACHED) {
            out.push(child);
        }
    };
    match expr {
        Expr::Parameter(_) | Expr::Constant { .. } | Expr::Member { target: None, .. } => {}
        Expr::Member {
            target: Some(target),
            ..
        } => detach(target),
        Expr::Call { receiver, args, .. } => {
            if let Some(receiver) = receiver.as_mut() {
                detach(receiver);
            }
            args.iter_mut().for_each(detach);
        }
        Expr::Lambda(lambda) => detach(&mut lambda.body),
        Expr::Unary { operand, .. } => detach(operand),
        Expr::Binary { left, right, .. } => {
            detach(left);
            detach(right);
        }
        Expr::Condition {
            test,
            if_true,
            if_false,
            ..
        } => {
            detach(test);
            detach(if_true);
            detach(if_false);
        }
        Expr::Record { fields, .. } => fields.iter_mut().for_each(|(_, value)| detach(value)),
        Expr::SetMember { target, value, .. } => {
            detach(target);
            detach(value);
        }
    }
}

fn check_call_args(function: &Function, args: &[Node]) -> Result<(), ExprError> {
    if function.params().len() != args.len() {
        return Err(ExprError::ArityMismatch {
            expected: function.params().len(),
            actual: args.len(),
            expression: function.to_string(),
        });
    }
    for (param, arg) in function.params().iter().zip(args) {
        let actual = arg.ty();
        if !param.ty.accepts(&actual) {
            return Err(ExprError::type_mismatch(
                &param.ty,
                actual,
                format_args!("argument '{}' of '{}'", param.name, function.name()),
            ));
        }
    }
    Ok(())
}

/// Serializes a tree to JSON for external translators.
pub fn to_json(node: &Node) -> Result<serde_json::Value, ExprError> {
    serde_json::to_value(node)
        .map_err(|e| crate::expr_err!(InvalidArgument, "tree '{}' cannot be serialized: {}", node, e))
}
