//! Cached member readers.
//!
//! Reading a member off a value goes through an [`Accessor`] built once per member and kept
//! in a process-wide cache. Constant resolution during expansion and the evaluator share
//! the cache. Its presence never changes a result, only how often readers are rebuilt.

use crate::ast::{Member, MemberId, MemberKind, Value};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type ReadFn = dyn Fn(Option<&Value>) -> Option<Value> + Send + Sync;

/// Reads one member. The target is `None` for static members.
#[derive(Clone)]
pub struct Accessor(Arc<ReadFn>);

impl Accessor {
    pub fn read(&self, target: Option<&Value>) -> Option<Value> {
        (self.0)(target)
    }
}

static ACCESSORS: Lazy<RwLock<HashMap<MemberId, Accessor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The cached reader for `member`, building it on first use.
pub fn accessor_for(member: &Member) -> Accessor {
    if let Some(found) = ACCESSORS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&member.id())
    {
        return found.clone();
    }
    let built = build(member);
    ACCESSORS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(member.id())
        .or_insert(built)
        .clone()
}

/// Number of members with a cached reader.
pub fn cached_accessor_count() -> usize {
    ACCESSORS.read().unwrap_or_else(PoisonError::into_inner).len()
}

fn build(member: &Member) -> Accessor {
    match member.kind() {
        MemberKind::Field => {
            let name = member.name().to_string();
            Accessor(Arc::new(move |target| match target {
                Some(Value::Record(record)) => record.get(&name).cloned(),
                _ => None,
            }))
        }
        MemberKind::Property(getter) => {
            let getter = *getter;
            Accessor(Arc::new(move |target| target.and_then(getter)))
        }
        MemberKind::Static(slot) => {
            let slot = slot.clone();
            Accessor(Arc::new(move |_| Some(slot.get())))
        }
    }
}
