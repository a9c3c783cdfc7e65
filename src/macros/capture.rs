//! Quasi-quotation capture.
//!
//! A substitute function is a [`Function`] whose call sites expansion replaces by a lambda
//! the function "quotes". The lambda is obtained by running the function's body once with a
//! [`Quoter`] and collecting what it quotes. Nothing else in the body is observable: the
//! quoter is the body's only output, and it cannot escape the capture that created it.
//!
//! The captured lambda is checked against the function's signature before it is returned.

use crate::ast::{Function, Lambda, ParamMode};
use crate::{expr_err, ExprError};
use tracing::trace;

/// The sink a substitute body quotes its lambda into.
pub struct Quoter<'f> {
    function: &'f Function,
    quoted: Option<Lambda>,
    overquoted: bool,
}

impl<'f> Quoter<'f> {
    /// The function being captured.
    pub fn function(&self) -> &Function {
        self.function
    }

    /// Records the body's lambda. May be called once per capture.
    pub fn quote(&mut self, lambda: Lambda) -> Result<(), ExprError> {
        if self.quoted.is_some() {
            self.overquoted = true;
            return Err(expr_err!(
                MalformedSubstitute,
                self.function.name(),
                "the body quotes more than once"
            ));
        }
        self.quoted = Some(lambda);
        Ok(())
    }
}

/// Runs `body` against a fresh quoter and returns the lambda it quoted.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::{Expr, Function, Lambda, Parameter, Type};
/// use exprnest::macros::capture;
/// let double = Function::builder("double")
///     .param("n", Type::Int)
///     .returns(Type::Int)
///     .build();
/// let lambda = capture(&double, |q| {
///     let n = Parameter::new("n", Type::Int);
///     q.quote(Lambda::new(vec![n.clone()], Expr::add(Expr::parameter(&n), Expr::parameter(&n))))
/// })
/// .unwrap();
/// assert_eq!(lambda.to_string(), "n => (n + n)");
/// ```
pub fn capture<F>(function: &Function, body: F) -> Result<Lambda, ExprError>
where
    F: FnOnce(&mut Quoter<'_>) -> Result<(), ExprError>,
{
    if function.is_method() {
        return Err(expr_err!(
            MalformedSubstitute,
            function.name(),
            "only free functions (without a receiver) can be substitutes"
        ));
    }
    if let Some(param) = function
        .params()
        .iter()
        .find(|p| p.mode != ParamMode::Value)
    {
        return Err(expr_err!(
            MalformedSubstitute,
            function.name(),
            "parameter '{}' is passed by reference; substitutes cannot have 'out' or 'ref' parameters",
            param.name
        ));
    }

    let mut quoter = Quoter {
        function,
        quoted: None,
        overquoted: false,
    };
    let outcome = body(&mut quoter);
    if quoter.overquoted {
        return Err(expr_err!(
            MalformedSubstitute,
            function.name(),
            "the body must quote exactly once, but quoted more than once"
        ));
    }
    if let Err(source) = outcome {
        return Err(ExprError::SubstituteFailed {
            function: function.name().to_string(),
            source: Box::new(source),
        });
    }
    let Some(lambda) = quoter.quoted else {
        return Err(expr_err!(
            MalformedSubstitute,
            function.name(),
            "the body must consist of a single quote, but nothing was quoted"
        ));
    };

    check_signature(function, &lambda)?;
    trace!(function = function.name(), lambda = %lambda, "captured substitute");
    Ok(lambda)
}

fn check_signature(function: &Function, lambda: &Lambda) -> Result<(), ExprError> {
    if function.params().len() != lambda.params.len() {
        return Err(ExprError::ArityMismatch {
            expected: function.params().len(),
            actual: lambda.params.len(),
            expression: lambda.to_string(),
        });
    }
    let context = format!("quoted body of '{}'", function.name());
    let params_match = function
        .param_types()
        .zip(&lambda.params)
        .all(|(declared, quoted)| declared == quoted.ty());
    if !params_match {
        return Err(ExprError::type_mismatch(
            function.signature(),
            lambda.fn_type(),
            context,
        ));
    }
    if function.ret() != &lambda.ret {
        return Err(ExprError::type_mismatch(function.ret(), &lambda.ret, context));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Parameter, Type};
    use crate::ErrorType;

    fn negate_fn() -> Function {
        Function::builder("negate")
            .param("b", Type::Bool)
            .returns(Type::Bool)
            .build()
    }

    fn negate_lambda() -> Lambda {
        let b = Parameter::new("b", Type::Bool);
        Lambda::new(vec![b.clone()], Expr::not(Expr::parameter(&b)))
    }

    #[test]
    fn quoting_twice_is_malformed() {
        let f = negate_fn();
        let err = capture(&f, |q| {
            q.quote(negate_lambda())?;
            q.quote(negate_lambda())
        })
        .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MalformedSubstitute);
    }

    #[test]
    fn ignoring_the_second_quote_error_is_still_malformed() {
        let f = negate_fn();
        let err = capture(&f, |q| {
            q.quote(negate_lambda())?;
            let _ = q.quote(negate_lambda());
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MalformedSubstitute);
    }

    #[test]
    fn nested_captures_do_not_interfere() {
        let outer = negate_fn();
        let inner = negate_fn();
        let lambda = capture(&outer, |q| {
            let inner_lambda = capture(&inner, |q2| q2.quote(negate_lambda()))?;
            q.quote(inner_lambda)
        })
        .unwrap();
        assert_eq!(lambda.to_string(), "b => !b");
    }

    #[test]
    fn methods_are_rejected() {
        let method = Function::builder("negate")
            .receiver(Type::object("A"))
            .param("b", Type::Bool)
            .returns(Type::Bool)
            .build();
        let err = capture(&method, |q| q.quote(negate_lambda())).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MalformedSubstitute);
    }
}
