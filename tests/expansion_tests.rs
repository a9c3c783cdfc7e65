//! Expansion of substitute calls: the `to_b` family.

mod common;

use common::*;
use exprnest::ast::{Expr, Lambda, Parameter, Type, Value};
use exprnest::macros::ExpansionKind;
use exprnest::runtime::builtins::string_length;
use exprnest::{ErrorType, Expander, ExprError, Function};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// `a => f(a)`
fn call_with_a(function: &Function) -> Lambda {
    lambda1("a", a_type(), |a| Expr::call(function, vec![a]).unwrap())
}

fn expand_with(registry: &exprnest::SubstituteRegistry, lambda: &Lambda) -> Result<Lambda, ExprError> {
    Expander::with_registry(registry).expand_lambda(lambda)
}

#[test]
fn expands_call_with_one_argument() {
    let registry = registry();
    let e1 = call_with_a(&TO_B_1);
    let e2 = lambda1("a", a_type(), |a| new_b(s_len(a)));

    let expanded = expand_with(&registry, &e1).unwrap();
    assert_eq!(expanded.to_string(), e2.to_string());
    assert_eq!(expanded.to_string(), "a => new B { L = a.S.len }");
    assert_eq!(expanded.invoke(&[a("abc")]).unwrap(), b(3));
}

#[test]
fn expands_call_with_two_arguments() {
    let registry = registry();
    let e1 = lambda1("a", a_type(), |a| {
        Expr::call(&TO_B_2, vec![a, Expr::constant(1)]).unwrap()
    });
    let e2 = lambda1("a", a_type(), |a| new_b(Expr::add(s_len(a), Expr::constant(1))));

    let expanded = expand_with(&registry, &e1).unwrap();
    assert_eq!(expanded.to_string(), e2.to_string());
    assert_eq!(expanded.invoke(&[a("abc")]).unwrap(), b(4));
}

#[test]
fn expands_call_with_three_arguments() {
    let registry = registry();
    let e1 = lambda1("a", a_type(), |a| {
        Expr::call(&TO_B_3, vec![a, Expr::constant(1), Expr::constant("xy")]).unwrap()
    });
    let e2 = lambda1("a", a_type(), |a| {
        let concat = Expr::add(Expr::member(a, &A_S), Expr::constant("xy"));
        new_b(Expr::add(
            Expr::member(concat, &string_length()),
            Expr::constant(1),
        ))
    });

    let expanded = expand_with(&registry, &e1).unwrap();
    assert_eq!(expanded.to_string(), e2.to_string());
    assert_eq!(
        expanded.to_string(),
        "a => new B { L = ((a.S + \"xy\").len + 1) }"
    );
    assert_eq!(expanded.invoke(&[a("abc")]).unwrap(), b(6));
}

#[test]
fn fails_when_invoked_without_expansion() {
    let e1 = call_with_a(&TO_B_1);
    let err = e1.invoke(&[a("a")]).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::DirectInvocation);
}

#[test]
fn leaves_unmarked_functions_alone() {
    let registry = registry();
    let e1 = call_with_a(&TO_B_NO_ATTRIBUTE);
    let expanded = expand_with(&registry, &e1).unwrap();
    assert_eq!(expanded.to_string(), e1.to_string());
    assert!(Arc::ptr_eq(&expanded.body, &e1.body));
    assert_eq!(expanded.invoke(&[a("abcd")]).unwrap(), b(4));
}

#[test]
fn fails_when_substitute_never_quotes() {
    let registry = registry();
    let err = expand_with(&registry, &call_with_a(&TO_B_NO_SINK)).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::MalformedSubstitute);
    assert!(err.to_string().contains("to_b_no_sink"));
}

#[test]
fn fails_when_quote_has_fewer_parameters() {
    let registry = registry();
    let err = expand_with(&registry, &call_with_a(&TO_B_FEWER_ARGS)).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::ArityMismatch);
}

#[test]
fn fails_when_quote_has_more_parameters() {
    let registry = registry();
    let err = expand_with(&registry, &call_with_a(&TO_B_MORE_ARGS)).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::ArityMismatch);
}

#[test]
fn fails_when_quote_has_different_parameter_types() {
    let registry = registry();
    let err = expand_with(&registry, &call_with_a(&TO_B_WRONG_TYPE_OF_ARGS)).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::TypeMismatch);
}

#[test]
fn fails_when_quote_has_different_return_type() {
    let registry = registry();
    let err = expand_with(&registry, &call_with_a(&TO_B_WRONG_RETURN_TYPE)).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::TypeMismatch);
}

#[test]
fn fails_for_out_parameters() {
    let registry = registry();
    let e1 = lambda1("a", a_type(), |a| {
        Expr::call(&TO_B_OUT_PARAM, vec![a, Expr::constant(0)]).unwrap()
    });
    let err = expand_with(&registry, &e1).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::MalformedSubstitute);
}

#[test]
fn wraps_errors_raised_by_the_body() {
    let registry = registry();
    let err = expand_with(&registry, &call_with_a(&TO_B_FAILING)).unwrap_err();
    match err {
        ExprError::SubstituteFailed { function, source } => {
            assert_eq!(function, "to_b_failing");
            assert_eq!(source.error_type(), ErrorType::Eval);
        }
        other => panic!("expected SubstituteFailed, got {}", other),
    }
}

#[test]
fn malformed_substitute_fails_every_time() {
    let registry = registry();
    let e1 = call_with_a(&TO_B_NO_SINK);
    for _ in 0..3 {
        let err = expand_with(&registry, &e1).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MalformedSubstitute);
    }
}

#[test]
fn expansion_is_idempotent() {
    let registry = registry();
    let e1 = lambda1("a", a_type(), |a| {
        Expr::call(&TO_B_2, vec![a, Expr::constant(7)]).unwrap()
    });
    let once = expand_with(&registry, &e1).unwrap();
    let twice = expand_with(&registry, &once).unwrap();
    assert!(Arc::ptr_eq(&once.body, &twice.body));
    assert_eq!(once, twice);
}

#[test]
fn substitute_arguments_are_expanded_too() {
    let registry = registry();
    // to_b(a, to_b(a).L)
    let e1 = lambda1("a", a_type(), |a| {
        let inner = Expr::call(&TO_B_1, vec![a.clone()]).unwrap();
        Expr::call(&TO_B_2, vec![a, Expr::member(inner, &B_L)]).unwrap()
    });
    let mut expander = Expander::with_registry(&registry);
    let expanded = expander.expand_lambda(&e1).unwrap();
    assert_eq!(
        expanded.to_string(),
        "a => new B { L = (a.S.len + new B { L = a.S.len }.L) }"
    );
    assert_eq!(expanded.invoke(&[a("xyz")]).unwrap(), b(6));

    let kinds: Vec<_> = expander.trace().iter().map(|s| s.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            ExpansionKind::Substitute("to_b".to_string()),
            ExpansionKind::Substitute("to_b".to_string()),
        ]
    );
}

#[test]
fn overloads_with_the_same_name_stay_distinct() {
    let registry = registry();
    assert!(registry.contains(&TO_B_1));
    assert!(registry.contains(&TO_B_2));
    assert!(!registry.contains(&TO_B_NO_ATTRIBUTE));
    assert_ne!(*TO_B_1, *TO_B_2);
    let names = registry.names();
    assert_eq!(names.iter().filter(|n| n.as_str() == "to_b").count(), 3);
}

#[test]
fn global_registry_drives_free_expand() {
    let negate = Function::builder("negate")
        .param("b", Type::Bool)
        .returns(Type::Bool)
        .build();
    exprnest::SubstituteRegistry::global().register(&negate, |q| {
        q.quote(lambda1("b", Type::Bool, Expr::not))
    });

    let flag = Parameter::new("flag", Type::Bool);
    let call = Expr::call(&negate, vec![Expr::parameter(&flag)]).unwrap();
    let expanded = exprnest::expand(&call).unwrap();
    assert_eq!(expanded.to_string(), "!flag");

    let lambda = Lambda::new(vec![flag], call).expand().unwrap();
    assert_eq!(lambda.invoke(&[Value::Bool(true)]).unwrap(), Value::Bool(false));
    assert!(exprnest::SubstituteRegistry::global().unregister(&negate));
}
