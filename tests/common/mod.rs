//! # Shared fixtures
//!
//! Record types `A { S: str }` and `B { L: int }`, the `to_b` family of substitute
//! functions (well-formed and malformed), and small tree-building helpers.
#![allow(dead_code)]

use exprnest::ast::{Expr, Function, Lambda, Member, Node, Parameter, Record, Type, Value};
use exprnest::runtime::builtins::string_length;
use exprnest::runtime::Evaluator;
use exprnest::{ExprError, SubstituteRegistry};
use once_cell::sync::Lazy;

pub fn a_type() -> Type {
    Type::object("A")
}

pub fn b_type() -> Type {
    Type::object("B")
}

pub static A_S: Lazy<Member> = Lazy::new(|| Member::field("A", "S", Type::Str));
pub static B_L: Lazy<Member> = Lazy::new(|| Member::field("B", "L", Type::Int));

/// An `A` value.
pub fn a(s: &str) -> Value {
    Value::from(Record::new("A").with("S", s))
}

/// A `B` value.
pub fn b(l: i64) -> Value {
    Value::from(Record::new("B").with("L", l))
}

/// `target.S.len`
pub fn s_len(target: Node) -> Node {
    Expr::member(Expr::member(target, &A_S), &string_length())
}

/// `new B { L = l }`
pub fn new_b(l: Node) -> Node {
    Expr::record("B", vec![("L", l)])
}

/// `x => body(x)` over a fresh parameter.
pub fn lambda1(name: &str, ty: Type, body: impl FnOnce(Node) -> Node) -> Lambda {
    let p = Parameter::new(name, ty);
    let node = body(Expr::parameter(&p));
    Lambda::new(vec![p], node)
}

// ============================================================================
// SUBSTITUTE FUNCTIONS
// ============================================================================

fn to_b_signature(name: &str) -> exprnest::ast::FunctionBuilder {
    Function::builder(name).param("a", a_type()).returns(b_type())
}

/// `to_b(a)` ↦ `a => new B { L = a.S.len }`
pub static TO_B_1: Lazy<Function> = Lazy::new(|| to_b_signature("to_b").build());

/// `to_b(a, n)` ↦ `(a, n) => new B { L = a.S.len + n }`
pub static TO_B_2: Lazy<Function> =
    Lazy::new(|| to_b_signature("to_b").param("n", Type::Int).build());

/// `to_b(a, n, s)` ↦ `(a, n, s) => new B { L = (a.S + s).len + n }`
pub static TO_B_3: Lazy<Function> = Lazy::new(|| {
    to_b_signature("to_b")
        .param("n", Type::Int)
        .param("s", Type::Str)
        .build()
});

/// Same shape as `to_b(a)`, never registered, natively implemented.
pub static TO_B_NO_ATTRIBUTE: Lazy<Function> =
    Lazy::new(|| to_b_signature("to_b_no_attribute").native(to_b_native).build());

pub static TO_B_NO_SINK: Lazy<Function> = Lazy::new(|| to_b_signature("to_b_no_sink").build());
pub static TO_B_MORE_ARGS: Lazy<Function> =
    Lazy::new(|| to_b_signature("to_b_more_args").build());
pub static TO_B_FEWER_ARGS: Lazy<Function> =
    Lazy::new(|| to_b_signature("to_b_fewer_args").build());
pub static TO_B_WRONG_TYPE_OF_ARGS: Lazy<Function> =
    Lazy::new(|| to_b_signature("to_b_wrong_type_of_args").build());
pub static TO_B_WRONG_RETURN_TYPE: Lazy<Function> =
    Lazy::new(|| to_b_signature("to_b_wrong_return_type").build());
pub static TO_B_OUT_PARAM: Lazy<Function> = Lazy::new(|| {
    to_b_signature("to_b_out_param")
        .out_param("n", Type::Int)
        .build()
});
pub static TO_B_FAILING: Lazy<Function> = Lazy::new(|| to_b_signature("to_b_failing").build());

fn to_b_native(_: &mut Evaluator, args: &[Value]) -> Result<Value, ExprError> {
    let len = args
        .first()
        .and_then(Value::as_record)
        .and_then(|r| r.get("S"))
        .and_then(Value::as_str)
        .map(|s| s.chars().count() as i64)
        .ok_or_else(|| exprnest::expr_err!(Eval, "to_b_no_attribute expects an A"))?;
    Ok(b(len))
}

/// A fresh registry holding every `to_b` substitute.
pub fn registry() -> SubstituteRegistry {
    let registry = SubstituteRegistry::new();

    registry.register(&TO_B_1, |q| {
        q.quote(lambda1("a", a_type(), |a| new_b(s_len(a))))
    });
    registry.register(&TO_B_2, |q| {
        let a = Parameter::new("a", a_type());
        let n = Parameter::new("n", Type::Int);
        let body = new_b(Expr::add(s_len(Expr::parameter(&a)), Expr::parameter(&n)));
        q.quote(Lambda::new(vec![a, n], body))
    });
    registry.register(&TO_B_3, |q| {
        let a = Parameter::new("a", a_type());
        let n = Parameter::new("n", Type::Int);
        let s = Parameter::new("s", Type::Str);
        let concat = Expr::add(
            Expr::member(Expr::parameter(&a), &A_S),
            Expr::parameter(&s),
        );
        let body = new_b(Expr::add(
            Expr::member(concat, &string_length()),
            Expr::parameter(&n),
        ));
        q.quote(Lambda::new(vec![a, n, s], body))
    });

    registry.register(&TO_B_NO_SINK, |_| Ok(()));
    registry.register(&TO_B_MORE_ARGS, |q| {
        let a = Parameter::new("aa", a_type());
        let n = Parameter::new("n", Type::Int);
        q.quote(Lambda::new(vec![a, n], Expr::record("B", vec![])))
    });
    registry.register(&TO_B_FEWER_ARGS, |q| {
        q.quote(Lambda::new(vec![], Expr::record("B", vec![])))
    });
    registry.register(&TO_B_WRONG_TYPE_OF_ARGS, |q| {
        q.quote(lambda1("b", b_type(), |_| Expr::record("B", vec![])))
    });
    registry.register(&TO_B_WRONG_RETURN_TYPE, |q| {
        q.quote(lambda1("b", a_type(), |_| Expr::record("A", vec![])))
    });
    registry.register(&TO_B_OUT_PARAM, |q| {
        let a = Parameter::new("a", a_type());
        let n = Parameter::new("n", Type::Int);
        q.quote(Lambda::new(vec![a, n], Expr::record("B", vec![])))
    });
    registry.register(&TO_B_FAILING, |_| {
        Err(exprnest::expr_err!(Eval, "substitute body exploded"))
    });

    registry
}
