//! Native members and functions usable in trees.
//!
//! Each builtin is created once and handed out by clone, so every tree built in a process
//! refers to the same identity for, say, `contains`.

use crate::ast::{Function, Member, Type, Value};
use crate::runtime::eval::{values_equal, Evaluator};
use crate::{expr_err, ExprError};
use once_cell::sync::Lazy;

static STRING_LENGTH: Lazy<Member> =
    Lazy::new(|| Member::property("str", "len", Type::Int, string_length_of));

static CONCAT: Lazy<Function> = Lazy::new(|| {
    Function::builder("concat")
        .param("left", Type::Str)
        .param("right", Type::Str)
        .returns(Type::Str)
        .native(concat_native)
        .build()
});

static SEQ_CONTAINS: Lazy<Function> = Lazy::new(|| {
    Function::builder("contains")
        .param("items", Type::seq(Type::Any))
        .param("item", Type::Any)
        .returns(Type::Bool)
        .native(contains_native)
        .build()
});

static SEQ_ANY: Lazy<Function> = Lazy::new(|| {
    Function::builder("any")
        .param("items", Type::seq(Type::Any))
        .param("predicate", Type::function([Type::Any], Type::Bool))
        .returns(Type::Bool)
        .native(any_native)
        .build()
});

static SEQ_COUNT: Lazy<Function> = Lazy::new(|| {
    Function::builder("count")
        .param("items", Type::seq(Type::Any))
        .returns(Type::Int)
        .native(count_native)
        .build()
});

/// `s.len`: number of characters of a string.
pub fn string_length() -> Member {
    STRING_LENGTH.clone()
}

/// `concat(left, right)`
pub fn concat() -> Function {
    CONCAT.clone()
}

/// `contains(items, item)`
pub fn seq_contains() -> Function {
    SEQ_CONTAINS.clone()
}

/// `any(items, predicate)`, the predicate being a lambda.
pub fn seq_any() -> Function {
    SEQ_ANY.clone()
}

/// `count(items)`
pub fn seq_count() -> Function {
    SEQ_COUNT.clone()
}

fn string_length_of(target: &Value) -> Option<Value> {
    target
        .as_str()
        .map(|s| Value::Int(s.chars().count() as i64))
}

fn concat_native(_: &mut Evaluator, args: &[Value]) -> Result<Value, ExprError> {
    match args {
        [Value::Str(l), Value::Str(r)] => Ok(Value::from(format!("{}{}", l, r))),
        _ => Err(expr_err!(Eval, "concat expects two strings")),
    }
}

fn contains_native(_: &mut Evaluator, args: &[Value]) -> Result<Value, ExprError> {
    match args {
        [Value::Seq(items), item] => Ok(Value::Bool(
            items.iter().any(|candidate| values_equal(candidate, item)),
        )),
        _ => Err(expr_err!(Eval, "contains expects a sequence and an item")),
    }
}

fn any_native(evaluator: &mut Evaluator, args: &[Value]) -> Result<Value, ExprError> {
    let [Value::Seq(items), predicate] = args else {
        return Err(expr_err!(Eval, "any expects a sequence and a predicate"));
    };
    for item in items.iter() {
        let verdict = evaluator.apply(predicate, std::slice::from_ref(item))?;
        match verdict {
            Value::Bool(true) => return Ok(Value::Bool(true)),
            Value::Bool(false) => {}
            other => {
                return Err(expr_err!(
                    Eval,
                    "any predicate returned {} instead of bool",
                    other.type_name()
                ))
            }
        }
    }
    Ok(Value::Bool(false))
}

fn count_native(_: &mut Evaluator, args: &[Value]) -> Result<Value, ExprError> {
    match args {
        [Value::Seq(items)] => Ok(Value::Int(items.len() as i64)),
        _ => Err(expr_err!(Eval, "count expects a sequence")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Lambda, Parameter};
    use crate::runtime::eval::evaluate;

    #[test]
    fn any_applies_the_predicate() {
        let n = Parameter::new("n", Type::Int);
        let is_two = Lambda::new(
            vec![n.clone()],
            Expr::equal(Expr::parameter(&n), Expr::constant(2)),
        );
        let items = Expr::constant(Value::seq([Value::Int(1), Value::Int(2)]));
        let call = Expr::call(&seq_any(), vec![items, Expr::lambda(is_two)]).unwrap();
        assert_eq!(evaluate(&call).unwrap(), Value::Bool(true));
    }

    #[test]
    fn builtins_keep_their_identity() {
        assert_eq!(seq_contains(), seq_contains());
        assert_eq!(string_length(), string_length());
        let len = Expr::member(Expr::constant("héllo"), &string_length());
        assert_eq!(evaluate(&len).unwrap(), Value::Int(5));
    }
}
