//! Textual rendering of trees.
//!
//! The format reads like the lambda notation trees are usually written in
//! (`a => new B { L = a.S.len }`). It is what error messages embed, and what tests compare
//! against when checking the shape of an expansion.

use crate::ast::{Callee, Expr, Lambda, Node, UnaryOp};
use std::fmt;

fn write_list(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", node)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Parameter(p) => write!(f, "{}", p.name()),
            Expr::Constant { value, .. } => write!(f, "{}", value),
            Expr::Member {
                target: Some(target),
                member,
            } => write!(f, "{}.{}", target, member.name()),
            Expr::Member {
                target: None,
                member,
            } => write!(f, "{}.{}", member.declaring(), member.name()),
            Expr::Call {
                receiver,
                callee,
                args,
                ..
            } => match callee {
                Callee::Invoke(_) => match args.split_first() {
                    Some((holder, rest)) => {
                        write!(f, "{}.invoke(", holder)?;
                        write_list(f, rest)?;
                        write!(f, ")")
                    }
                    None => write!(f, "<missing holder>.invoke()"),
                },
                Callee::Function(function) => {
                    if let Some(receiver) = receiver {
                        write!(f, "{}.", receiver)?;
                    }
                    write!(f, "{}(", function.name())?;
                    write_list(f, args)?;
                    write!(f, ")")
                }
            },
            Expr::Lambda(lambda) => write!(f, "{}", lambda),
            Expr::Unary { op, operand, .. } => match op {
                UnaryOp::Not => write!(f, "!{}", operand),
                UnaryOp::Negate => write!(f, "-{}", operand),
                UnaryOp::Convert(ty) => write!(f, "convert({}, {})", operand, ty),
            },
            Expr::Binary {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Condition {
                test,
                if_true,
                if_false,
                ..
            } => write!(f, "if({}, {}, {})", test, if_true, if_false),
            Expr::Record { type_name, fields } => {
                write!(f, "new {} {{", type_name)?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    let sep = if i > 0 { "," } else { "" };
                    write!(f, "{} {} = {}", sep, name, value)?;
                }
                write!(f, " }}")
            }
            Expr::SetMember {
                target,
                member,
                value,
            } => write!(f, "({}.{} = {})", target, member.name(), value),
        }
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.params.as_slice() {
            [single] => write!(f, "{}", single.name())?,
            params => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.name())?;
                }
                write!(f, ")")?;
            }
        }
        write!(f, " => {}", self.body)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, Lambda, Member, Parameter, Type};

    #[test]
    fn renders_record_construction() {
        let a = Parameter::new("a", Type::object("A"));
        let s = Member::field("A", "S", Type::Str);
        let body = Expr::record("B", vec![("L", Expr::member(Expr::parameter(&a), &s))]);
        let lambda = Lambda::new(vec![a], body);
        assert_eq!(lambda.to_string(), "a => new B { L = a.S }");
    }

    #[test]
    fn renders_multi_parameter_lambdas() {
        let a = Parameter::new("a", Type::Int);
        let b = Parameter::new("b", Type::Int);
        let sum = Lambda::new(
            vec![a.clone(), b.clone()],
            Expr::add(Expr::parameter(&a), Expr::parameter(&b)),
        );
        assert_eq!(sum.to_string(), "(a, b) => (a + b)");
        let nothing = Lambda::new(vec![], Expr::constant(false));
        assert_eq!(nothing.to_string(), "() => false");
    }
}
