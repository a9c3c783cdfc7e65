//! Resolving a tree holder to its value at expansion time.

use crate::ast::{Expr, Node, Value};
use crate::runtime::accessor::accessor_for;

/// Reduces `node` to the value it denotes without evaluating anything but member reads.
///
/// Accepts a literal constant, or a chain of member reads rooted at a literal constant or
/// at a static member. Returns `None` for any other shape, and when a read in the chain
/// yields nothing or hits `Null`.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::{Expr, Member, Record, Type, Value};
/// use exprnest::macros::dig_out_constant;
/// let inner = Member::field("Holder", "tree", Type::Any);
/// let holder = Expr::constant(Record::new("Holder").with("tree", 5));
/// let node = Expr::member(holder, &inner);
/// assert_eq!(dig_out_constant(&node), Some(Value::Int(5)));
/// ```
pub fn dig_out_constant(node: &Node) -> Option<Value> {
    let mut chain = Vec::new();
    let mut current = node;
    let mut value = loop {
        match current.as_ref() {
            Expr::Constant { value, .. } => break value.clone(),
            Expr::Member { member, .. } if member.is_static() => {
                break accessor_for(member).read(None)?
            }
            Expr::Member {
                target: Some(target),
                member,
            } => {
                chain.push(member);
                current = target;
            }
            _ => return None,
        }
    };
    for member in chain.into_iter().rev() {
        if value.is_null() {
            return None;
        }
        value = accessor_for(member).read(Some(&value))?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Member, Parameter, Record, Type};

    #[test]
    fn static_root_is_read_without_target() {
        let slot = Member::static_slot("Trees", "current", Type::Int, Value::Int(3));
        assert_eq!(dig_out_constant(&Expr::static_member(&slot)), Some(Value::Int(3)));
        slot.set_static(Value::Int(4)).unwrap();
        assert_eq!(dig_out_constant(&Expr::static_member(&slot)), Some(Value::Int(4)));
    }

    #[test]
    fn null_in_chain_fails() {
        let outer = Member::field("Outer", "inner", Type::Any);
        let inner = Member::field("Inner", "tree", Type::Any);
        let root = Expr::constant(Record::new("Outer").with("inner", Value::Null));
        let node = Expr::member(Expr::member(root, &outer), &inner);
        assert_eq!(dig_out_constant(&node), None);
    }

    #[test]
    fn parameter_root_is_not_constant() {
        let p = Parameter::new("p", Type::object("Outer"));
        let field = Member::field("Outer", "inner", Type::Any);
        assert_eq!(dig_out_constant(&Expr::member(Expr::parameter(&p), &field)), None);
    }
}
