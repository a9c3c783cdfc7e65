//! Depth-guarded tree rewriting.
//!
//! Every pass over a tree in this crate goes through a [`DepthGuard`]: one level entered
//! per node visited, one left when the visit finishes, whatever its outcome. When the depth
//! passes the limit the pass fails with `RecursionLimitExceeded`.
//!
//! [`TreeRewriter`] is the shared visitor. Implementors provide the guard and decide, node
//! by node, whether to descend, to answer directly, or to replace the node with another
//! tree that is then rewritten in its place. The driver keeps its pending work and partial
//! results on the heap, so the depth a pass can reach is set by the guard alone and not by
//! the size of the calling thread's stack. A rebuilt node reuses the original `Arc` when
//! none of its children changed.

use crate::ast::{Expr, Lambda, Node};
use crate::config;
use crate::ExprError;
use std::sync::Arc;
use tracing::warn;

// =============================
// Depth guard
// =============================

/// Counts the nesting depth of a traversal.
///
/// # Examples
///
/// ```rust
/// use exprnest::macros::DepthGuard;
/// let mut guard = DepthGuard::with_limit(1);
/// assert!(guard.enter().is_ok());
/// assert!(guard.enter().is_err());
/// guard.leave();
/// assert_eq!(guard.current(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DepthGuard {
    current: usize,
    limit: Option<usize>,
}

impl DepthGuard {
    /// A guard bound by the process-wide limit, read at every step.
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard with its own limit.
    pub fn with_limit(limit: usize) -> Self {
        DepthGuard {
            current: 0,
            limit: Some(limit),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or_else(config::max_recursion_depth)
    }

    /// The per-guard override, if any.
    pub fn limit_override(&self) -> Option<usize> {
        self.limit
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Enters one level. Fails without changing the depth when the limit would be exceeded.
    pub fn enter(&mut self) -> Result<(), ExprError> {
        let limit = self.limit();
        if self.current >= limit {
            warn!(limit, "maximum recursion depth exceeded");
            return Err(ExprError::RecursionLimitExceeded { limit });
        }
        self.current += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    /// Drops back to `depth` after a pass that stopped part-way.
    pub(crate) fn unwind_to(&mut self, depth: usize) {
        self.current = self.current.min(depth);
    }
}

// =============================
// Rewriter
// =============================

/// What a [`TreeRewriter`] does with one node.
#[derive(Debug)]
pub enum Visit {
    /// Rewrite the children and rebuild the node if any of them changed.
    Descend,
    /// The node's final result. Its children are not visited.
    Done(Node),
    /// Rewrite this tree in place of the node, one level deeper.
    Replace(Node),
}

/// A guarded, rebuilding visitor over trees.
pub trait TreeRewriter {
    fn guard(&mut self) -> &mut DepthGuard;

    /// Decides what happens to `node`. The default descends everywhere.
    fn visit(&mut self, _node: &Node) -> Result<Visit, ExprError> {
        Ok(Visit::Descend)
    }

    /// Called once the tree a [`Visit::Replace`] produced has been fully rewritten.
    fn replaced(&mut self, _original: &Node, _output: &Node) {}

    /// Rewrites `node` one level deeper than the caller.
    fn rewrite(&mut self, node: &Node) -> Result<Node, ExprError> {
        drive(self, node)
    }
}

enum Task {
    Visit(Node),
    /// Pop this many rewritten children and rebuild the node from them.
    Rebuild(Node, usize),
    /// The replacement of this node is on top of the results.
    Replaced(Node),
}

/// Runs `rewriter` over `root`. On error the guard is back at the depth it started from.
pub fn drive<R: TreeRewriter + ?Sized>(rewriter: &mut R, root: &Node) -> Result<Node, ExprError> {
    let base = rewriter.guard().current();
    let result = run(rewriter, root);
    if result.is_err() {
        rewriter.guard().unwind_to(base);
    }
    result
}

fn run<R: TreeRewriter + ?Sized>(rewriter: &mut R, root: &Node) -> Result<Node, ExprError> {
    let mut tasks = vec![Task::Visit(Arc::clone(root))];
    let mut results: Vec<Node> = Vec::new();
    while let Some(task) = tasks.pop() {
        match task {
            Task::Visit(node) => {
                rewriter.guard().enter()?;
                match rewriter.visit(&node)? {
                    Visit::Done(out) => {
                        rewriter.guard().leave();
                        results.push(out);
                    }
                    Visit::Replace(next) => {
                        tasks.push(Task::Replaced(node));
                        tasks.push(Task::Visit(next));
                    }
                    Visit::Descend => {
                        let kids = children(&node);
                        if kids.is_empty() {
                            rewriter.guard().leave();
                            results.push(node);
                        } else {
                            tasks.push(Task::Rebuild(node, kids.len()));
                            tasks.extend(kids.into_iter().rev().map(Task::Visit));
                        }
                    }
                }
            }
            Task::Rebuild(node, count) => {
                let rewritten = results.split_off(results.len().saturating_sub(count));
                rewriter.guard().leave();
                results.push(rebuild(&node, rewritten));
            }
            Task::Replaced(original) => {
                rewriter.guard().leave();
                if let Some(output) = results.last() {
                    rewriter.replaced(&original, output);
                }
            }
        }
    }
    Ok(results.pop().unwrap_or_else(|| Arc::clone(root)))
}

/// The direct sub-trees of `node`, in evaluation order.
pub fn children(node: &Expr) -> Vec<Node> {
    match node {
        Expr::Parameter(_) | Expr::Constant { .. } => Vec::new(),
        Expr::Member { target, .. } => target.iter().cloned().collect(),
        Expr::Call { receiver, args, .. } => {
            receiver.iter().chain(args).cloned().collect()
        }
        Expr::Lambda(lambda) => vec![Arc::clone(&lambda.body)],
        Expr::Unary { operand, .. } => vec![Arc::clone(operand)],
        Expr::Binary { left, right, .. } => vec![Arc::clone(left), Arc::clone(right)],
        Expr::Condition {
            test,
            if_true,
            if_false,
            ..
        } => vec![Arc::clone(test), Arc::clone(if_true), Arc::clone(if_false)],
        Expr::Record { fields, .. } => fields.iter().map(|(_, v)| Arc::clone(v)).collect(),
        Expr::SetMember { target, value, .. } => vec![Arc::clone(target), Arc::clone(value)],
    }
}

/// `node` with its children replaced by `rewritten`, in the order [`children`] lists them.
/// Returns `node` itself when every child is unchanged.
fn rebuild(node: &Node, rewritten: Vec<Node>) -> Node {
    let original = children(node);
    let unchanged = original.len() == rewritten.len()
        && original.iter().zip(&rewritten).all(|(a, b)| Arc::ptr_eq(a, b));
    if unchanged {
        return Arc::clone(node);
    }
    let mut rewritten = rewritten.into_iter();
    let mut next = |old: &Node| rewritten.next().unwrap_or_else(|| Arc::clone(old));
    let rebuilt = match node.as_ref() {
        Expr::Parameter(_) | Expr::Constant { .. } => return Arc::clone(node),
        Expr::Member { target, member } => Expr::Member {
            target: target.as_ref().map(&mut next),
            member: member.clone(),
        },
        Expr::Call {
            receiver,
            callee,
            args,
            ty,
        } => {
            let receiver = receiver.as_ref().map(&mut next);
            Expr::Call {
                receiver,
                callee: callee.clone(),
                args: args.iter().map(&mut next).collect(),
                ty: ty.clone(),
            }
        }
        Expr::Lambda(lambda) => Expr::Lambda(Lambda::with_return(
            lambda.params.clone(),
            next(&lambda.body),
            lambda.ret.clone(),
        )),
        Expr::Unary { op, operand, ty } => Expr::Unary {
            op: op.clone(),
            operand: next(operand),
            ty: ty.clone(),
        },
        Expr::Binary {
            op,
            left,
            right,
            ty,
        } => {
            let left = next(left);
            Expr::Binary {
                op: *op,
                left,
                right: next(right),
                ty: ty.clone(),
            }
        }
        Expr::Condition {
            test,
            if_true,
            if_false,
            ty,
        } => {
            let test = next(test);
            let if_true = next(if_true);
            Expr::Condition {
                test,
                if_true,
                if_false: next(if_false),
                ty: ty.clone(),
            }
        }
        Expr::Record { type_name, fields } => Expr::Record {
            type_name: type_name.clone(),
            fields: fields
                .iter()
                .map(|(name, value)| (Arc::clone(name), next(value)))
                .collect(),
        },
        Expr::SetMember {
            target,
            member,
            value,
        } => {
            let target = next(target);
            Expr::SetMember {
                target,
                member: member.clone(),
                value: next(value),
            }
        }
    };
    Arc::new(rebuilt)
}
