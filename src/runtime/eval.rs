//! Evaluation of fully expanded trees.
//!
//! ## Core Responsibility: Tree → Value
//!
//! The evaluator executes a tree under an environment binding parameters (by identity) to
//! values. It is the consumer expansion prepares trees for: reference calls and substitute
//! calls have no meaning at run time, and evaluating one fails with `DirectInvocation`.
//! That failure is how an unexpanded tree is told apart from an expanded one.
//!
//! ## Error Handling
//!
//! All errors in this module are reported via the unified `ExprError` type, usually the
//! `Eval` variant built with `expr_err!`. Nesting is bounded by the same depth guard the
//! rewriters use.
//!
//! ## Evaluation Order
//!
//! Operands are evaluated left to right from an explicit task stack, with intermediate
//! values on a value stack. `&&`, `||` and conditionals only schedule the operand they
//! need. A native function may call back into the evaluator through [`Evaluator::apply`];
//! the callback shares the caller's guard.

use crate::ast::{
    BinaryOp, Callee, Closure, Env, Expr, Lambda, Member, NativeFn, Node, Record, Type, UnaryOp,
    Value,
};
use crate::macros::traversal::DepthGuard;
use crate::runtime::accessor::accessor_for;
use crate::{expr_err, ExprError};
use std::sync::Arc;

// ===================================================================================================
// PUBLIC API
// ===================================================================================================

/// Evaluates `lambda` on `args` in an empty environment.
pub fn call(lambda: &Lambda, args: &[Value]) -> Result<Value, ExprError> {
    Evaluator::new().apply_lambda(lambda, &Env::new(), args)
}

/// Evaluates a closed tree.
pub fn evaluate(node: &Node) -> Result<Value, ExprError> {
    Evaluator::new().evaluate(node, &Env::new())
}

/// Tree evaluator with its own depth guard.
#[derive(Debug, Default)]
pub struct Evaluator {
    guard: DepthGuard,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(limit: usize) -> Self {
        Evaluator {
            guard: DepthGuard::with_limit(limit),
        }
    }

    pub fn evaluate(&mut self, node: &Node, env: &Env) -> Result<Value, ExprError> {
        let base = self.guard.current();
        let result = self.run(node, env);
        if result.is_err() {
            self.guard.unwind_to(base);
        }
        result
    }

    /// Applies a callable value (a closure or a quoted tree) to arguments.
    pub fn apply(&mut self, callee: &Value, args: &[Value]) -> Result<Value, ExprError> {
        match callee {
            Value::Closure(closure) => self.apply_lambda(&closure.lambda, &closure.env, args),
            Value::Tree(lambda) => self.apply_lambda(lambda, &Env::new(), args),
            other => Err(expr_err!(Eval, "Cannot call a value of type {}", other.type_name())),
        }
    }

    pub fn apply_lambda(
        &mut self,
        lambda: &Lambda,
        env: &Env,
        args: &[Value],
    ) -> Result<Value, ExprError> {
        if lambda.params.len() != args.len() {
            return Err(ExprError::ArityMismatch {
                expected: lambda.params.len(),
                actual: args.len(),
                expression: lambda.to_string(),
            });
        }
        let mut scope = env.clone();
        for (param, arg) in lambda.params.iter().zip(args) {
            scope.insert(param.id(), arg.clone());
        }
        self.evaluate(&lambda.body, &scope)
    }

    // ===================================================================================================
    // NODE DISPATCH
    // ===================================================================================================

    fn run(&mut self, root: &Node, env: &Env) -> Result<Value, ExprError> {
        let mut tasks = vec![Task::Eval(root)];
        let mut values: Vec<Value> = Vec::new();
        while let Some(task) = tasks.pop() {
            match task {
                Task::Eval(node) => {
                    self.guard.enter()?;
                    if let Some(value) = self.schedule(node, env, &mut tasks)? {
                        self.guard.leave();
                        values.push(value);
                    }
                }
                Task::Finish(node) => {
                    let value = self.finish(node, &mut values)?;
                    self.guard.leave();
                    values.push(value);
                }
                Task::Decide { op, left, right } => {
                    let first = pop_bool(&mut values, left)?;
                    // `false && _` and `true || _` are settled by the left operand
                    if first == (op == BinaryOp::OrElse) {
                        self.guard.leave();
                        values.push(Value::Bool(first));
                    } else {
                        tasks.push(Task::ExpectBool(right));
                        tasks.push(Task::Eval(right));
                    }
                }
                Task::ExpectBool(node) => {
                    let value = pop_bool(&mut values, node)?;
                    self.guard.leave();
                    values.push(Value::Bool(value));
                }
                Task::Branch {
                    test,
                    if_true,
                    if_false,
                } => {
                    let chosen = if pop_bool(&mut values, test)? {
                        if_true
                    } else {
                        if_false
                    };
                    tasks.push(Task::Leave);
                    tasks.push(Task::Eval(chosen));
                }
                Task::Leave => self.guard.leave(),
            }
        }
        values
            .pop()
            .ok_or_else(|| expr_err!(Eval, "'{}' produced no value", root))
    }

    /// Returns the value of a leaf directly; otherwise schedules the node's operands.
    fn schedule<'t>(
        &mut self,
        node: &'t Node,
        env: &Env,
        tasks: &mut Vec<Task<'t>>,
    ) -> Result<Option<Value>, ExprError> {
        match node.as_ref() {
            Expr::Parameter(p) => env
                .get(&p.id())
                .cloned()
                .map(Some)
                .ok_or_else(|| expr_err!(Eval, "Parameter '{}' is not bound", p.name())),
            Expr::Constant { value, .. } => Ok(Some(value.clone())),
            Expr::Lambda(lambda) => Ok(Some(Value::Closure(Closure {
                lambda: Arc::new(lambda.clone()),
                env: env.clone(),
            }))),
            Expr::Member { target, .. } => {
                tasks.push(Task::Finish(node));
                tasks.extend(target.iter().map(Task::Eval));
                Ok(None)
            }
            Expr::Call { receiver, args, .. } => {
                native_of(node)?;
                tasks.push(Task::Finish(node));
                tasks.extend(args.iter().rev().map(Task::Eval));
                tasks.extend(receiver.iter().map(Task::Eval));
                Ok(None)
            }
            Expr::Unary { operand, .. } => {
                tasks.push(Task::Finish(node));
                tasks.push(Task::Eval(operand));
                Ok(None)
            }
            Expr::Binary {
                op: op @ (BinaryOp::AndAlso | BinaryOp::OrElse),
                left,
                right,
                ..
            } => {
                tasks.push(Task::Decide {
                    op: *op,
                    left,
                    right,
                });
                tasks.push(Task::Eval(left));
                Ok(None)
            }
            Expr::Binary { left, right, .. } => {
                tasks.push(Task::Finish(node));
                tasks.push(Task::Eval(right));
                tasks.push(Task::Eval(left));
                Ok(None)
            }
            Expr::Condition {
                test,
                if_true,
                if_false,
                ..
            } => {
                tasks.push(Task::Branch {
                    test,
                    if_true,
                    if_false,
                });
                tasks.push(Task::Eval(test));
                Ok(None)
            }
            Expr::Record { fields, .. } => {
                tasks.push(Task::Finish(node));
                tasks.extend(fields.iter().rev().map(|(_, value)| Task::Eval(value)));
                Ok(None)
            }
            Expr::SetMember { target, value, .. } => {
                tasks.push(Task::Finish(node));
                tasks.push(Task::Eval(value));
                tasks.push(Task::Eval(target));
                Ok(None)
            }
        }
    }

    /// Combines the operand values `node` scheduled, which are on top of `values`.
    fn finish(&mut self, node: &Node, values: &mut Vec<Value>) -> Result<Value, ExprError> {
        match node.as_ref() {
            Expr::Member { target, member } => {
                let target = target.as_ref().map(|_| pop(values));
                read_member(member, target)
            }
            Expr::Call { receiver, args, .. } => {
                let native = native_of(node)?;
                let count = args.len() + usize::from(receiver.is_some());
                let operands = values.split_off(values.len().saturating_sub(count));
                native(self, &operands)
            }
            Expr::Unary { op, .. } => unary(op, pop(values)),
            Expr::Binary { op, .. } => {
                let r = pop(values);
                let l = pop(values);
                binary(*op, &l, &r)
            }
            Expr::Record { type_name, fields } => {
                let operands = values.split_off(values.len().saturating_sub(fields.len()));
                let mut record = Record::new(type_name);
                for ((name, _), value) in fields.iter().zip(operands) {
                    record.fields.insert(Arc::clone(name), value);
                }
                Ok(Value::Record(record))
            }
            Expr::SetMember { member, .. } => {
                let value = pop(values);
                let target = pop(values);
                write_member(member, target, value)
            }
            other => Err(expr_err!(Eval, "Nothing to combine for '{}'", other)),
        }
    }
}

/// Pending work of [`Evaluator::run`].
enum Task<'t> {
    Eval(&'t Node),
    /// Combine the operands `Eval` scheduled for this node.
    Finish(&'t Node),
    /// The left operand of `&&` or `||` is on the value stack.
    Decide {
        op: BinaryOp,
        left: &'t Node,
        right: &'t Node,
    },
    /// The right operand of `&&` or `||` is on the value stack and must be a bool.
    ExpectBool(&'t Node),
    /// The test of a conditional is on the value stack.
    Branch {
        test: &'t Node,
        if_true: &'t Node,
        if_false: &'t Node,
    },
    /// Leave the level a conditional entered, once its branch is done.
    Leave,
}

fn native_of(node: &Node) -> Result<NativeFn, ExprError> {
    let native = match node.as_ref() {
        Expr::Call {
            callee: Callee::Function(function),
            ..
        } => function.native(),
        _ => None,
    };
    native.ok_or_else(|| ExprError::DirectInvocation {
        call: node.to_string(),
    })
}

/// Values are pushed by each scheduled operand before the task that pops them runs.
fn pop(values: &mut Vec<Value>) -> Value {
    values.pop().unwrap_or_default()
}

fn pop_bool(values: &mut Vec<Value>, node: &Node) -> Result<bool, ExprError> {
    let value = pop(values);
    value
        .as_bool()
        .ok_or_else(|| expr_err!(Eval, "Expected bool from '{}', got {}", node, value))
}

fn read_member(member: &Member, target: Option<Value>) -> Result<Value, ExprError> {
    if let Some(Value::Null) = target {
        return Err(expr_err!(
            Eval,
            "Null reference while reading '{}'",
            member.name()
        ));
    }
    accessor_for(member).read(target.as_ref()).ok_or_else(|| {
        expr_err!(
            Eval,
            "Member '{}.{}' is not available on {}",
            member.declaring(),
            member.name(),
            target.as_ref().map_or("nothing", Value::type_name)
        )
    })
}

fn write_member(member: &Member, target: Value, value: Value) -> Result<Value, ExprError> {
    match target {
        Value::Record(mut record) => {
            record.fields.insert(Arc::from(member.name()), value);
            Ok(Value::Record(record))
        }
        Value::Null => Err(expr_err!(
            Eval,
            "Null reference while writing '{}'",
            member.name()
        )),
        other => Err(expr_err!(
            Eval,
            "Member '{}.{}' cannot be written on {}",
            member.declaring(),
            member.name(),
            other.type_name()
        )),
    }
}

// ===================================================================================================
// OPERATORS
// ===================================================================================================

fn unary(op: &UnaryOp, value: Value) -> Result<Value, ExprError> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| expr_err!(Eval, "Integer overflow negating {}", n)),
        (UnaryOp::Negate, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Convert(ty), value) => convert(ty, value),
        (op, value) => Err(expr_err!(
            Eval,
            "Operator {:?} does not apply to {}",
            op,
            value.type_name()
        )),
    }
}

fn convert(ty: &Type, value: Value) -> Result<Value, ExprError> {
    match (ty, value) {
        (Type::Float, Value::Int(n)) => Ok(Value::Float(n as f64)),
        (Type::Int, Value::Float(x)) if x.is_finite() => Ok(Value::Int(x.trunc() as i64)),
        (Type::Str, Value::Int(n)) => Ok(Value::from(n.to_string())),
        (Type::Str, Value::Float(x)) => Ok(Value::from(x.to_string())),
        (Type::Str, Value::Bool(b)) => Ok(Value::from(b.to_string())),
        (ty, value) if ty.accepts(&value.ty()) || value.is_null() => Ok(value),
        (ty, value) => Err(expr_err!(
            Eval,
            "Cannot convert {} to {}",
            value.type_name(),
            ty
        )),
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Equal => Ok(Value::Bool(values_equal(l, r))),
        BinaryOp::NotEqual => Ok(Value::Bool(!values_equal(l, r))),
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => compare(op, l, r),
        BinaryOp::And | BinaryOp::Or | BinaryOp::AndAlso | BinaryOp::OrElse => {
            match (l, r) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
                    BinaryOp::And | BinaryOp::AndAlso => *a && *b,
                    _ => *a || *b,
                })),
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
                    BinaryOp::And | BinaryOp::AndAlso => a & b,
                    _ => a | b,
                })),
                _ => Err(type_error(op, l, r)),
            }
        }
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
            arithmetic(op, l, r)
        }
    }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, ExprError> {
    match (l, r) {
        (Value::Str(a), b) if op == BinaryOp::Add => Ok(Value::from(format!("{}{}", a, plain(b)))),
        (a, Value::Str(b)) if op == BinaryOp::Add => Ok(Value::from(format!("{}{}", plain(a), b))),
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Subtract => a.checked_sub(*b),
                BinaryOp::Multiply => a.checked_mul(*b),
                _ if *b == 0 => return Err(expr_err!(Eval, "Division by zero")),
                _ => a.checked_div(*b),
            };
            result
                .map(Value::Int)
                .ok_or_else(|| expr_err!(Eval, "Integer overflow in {} {} {}", a, op.symbol(), b))
        }
        (a, b) => match (as_float(a), as_float(b)) {
            (Some(a), Some(b)) => Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                _ => a / b,
            })),
            _ => Err(type_error(op, l, r)),
        },
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, ExprError> {
    let ordering = match (l, r) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (a, b) => match (as_float(a), as_float(b)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(type_error(op, l, r)),
        },
    };
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(match op {
        BinaryOp::LessThan => ordering.is_lt(),
        BinaryOp::LessThanOrEqual => ordering.is_le(),
        BinaryOp::GreaterThan => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

/// Equality with ints and floats compared numerically.
pub fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        _ => l == r,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

/// Display without quotes, for string concatenation.
fn plain(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn type_error(op: BinaryOp, l: &Value, r: &Value) -> ExprError {
    expr_err!(
        Eval,
        "Operator '{}' does not apply to {} and {}",
        op.symbol(),
        l.type_name(),
        r.type_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Parameter;
    use crate::ErrorType;

    #[test]
    fn and_also_short_circuits() {
        // the right side would fail: 1 / 0
        let x = Parameter::new("x", Type::Int);
        let body = Expr::and_also(
            Expr::equal(Expr::parameter(&x), Expr::constant(0)),
            Expr::equal(
                Expr::binary(BinaryOp::Divide, Expr::constant(1), Expr::parameter(&x)),
                Expr::constant(1),
            ),
        );
        let lambda = Lambda::new(vec![x], body);
        assert_eq!(lambda.invoke(&[Value::Int(1)]).unwrap(), Value::Bool(false));
        let err = lambda.invoke(&[Value::Int(0)]).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Eval);
    }

    #[test]
    fn closures_capture_their_environment() {
        let x = Parameter::new("x", Type::Int);
        let y = Parameter::new("y", Type::Int);
        let adder = Lambda::new(
            vec![y.clone()],
            Expr::add(Expr::parameter(&x), Expr::parameter(&y)),
        );
        let make_adder = Lambda::new(vec![x], Expr::lambda(adder));
        let add_two = make_adder.invoke(&[Value::Int(2)]).unwrap();
        let mut evaluator = Evaluator::new();
        assert_eq!(evaluator.apply(&add_two, &[Value::Int(5)]).unwrap(), Value::Int(7));
    }

    #[test]
    fn string_concatenation_and_conversion() {
        let node = Expr::add(
            Expr::constant("n = "),
            Expr::convert(Expr::constant(3), Type::Float),
        );
        assert_eq!(evaluate(&node).unwrap(), Value::from("n = 3.0"));
        assert!(values_equal(&Value::Int(3), &Value::Float(3.0)));
    }

    #[test]
    fn conditional_runs_only_the_chosen_branch() {
        let x = Parameter::new("x", Type::Int);
        let body = Expr::condition(
            Expr::equal(Expr::parameter(&x), Expr::constant(0)),
            Expr::constant(-1),
            Expr::binary(BinaryOp::Divide, Expr::constant(10), Expr::parameter(&x)),
        );
        let lambda = Lambda::new(vec![x], body);
        assert_eq!(lambda.invoke(&[Value::Int(0)]).unwrap(), Value::Int(-1));
        assert_eq!(lambda.invoke(&[Value::Int(5)]).unwrap(), Value::Int(2));
    }

    #[test]
    fn field_write_returns_an_updated_record() {
        let l = Member::field("B", "L", Type::Int);
        let b = Parameter::new("b", Type::object("B"));
        let body = Expr::set_member(Expr::parameter(&b), &l, Expr::constant(9)).unwrap();
        let original = Value::from(Record::new("B").with("L", 1).with("M", 2));
        let updated = Lambda::new(vec![b], body).invoke(&[original.clone()]).unwrap();
        let record = updated.as_record().unwrap();
        assert_eq!(record.get("L"), Some(&Value::Int(9)));
        assert_eq!(record.get("M"), Some(&Value::Int(2)));
        assert_eq!(original.as_record().unwrap().get("L"), Some(&Value::Int(1)));

        let on_null = Expr::set_member(
            Expr::typed_constant(Value::Null, Type::object("B")),
            &l,
            Expr::constant(9),
        )
        .unwrap();
        assert_eq!(evaluate(&on_null).unwrap_err().error_type(), ErrorType::Eval);
    }

    #[test]
    fn guard_is_unwound_after_a_failure() {
        let failing = Expr::add(
            Expr::add(Expr::constant(1), Expr::constant("x")),
            Expr::binary(BinaryOp::Divide, Expr::constant(1), Expr::constant(0)),
        );
        let mut evaluator = Evaluator::with_max_depth(10);
        assert!(evaluator.evaluate(&failing, &Env::new()).is_err());
        assert_eq!(evaluator.guard.current(), 0);

        let deep = (0..9).fold(Expr::constant(true), |acc, _| Expr::not(acc));
        assert_eq!(evaluator.evaluate(&deep, &Env::new()).unwrap(), Value::Bool(false));
    }
}
