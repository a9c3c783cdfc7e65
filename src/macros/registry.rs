//! Registry of substitute functions.
//!
//! # Error Handling
//!
//! All errors in this module are reported via the unified `ExprError` type. Registration
//! itself never fails except through the `*_or_error` methods; capture failures surface on
//! first use, from [`SubstituteRegistry::quoted_body`].
//!
//! # Features
//! - Register, look up and remove substitutes by function identity (two functions with the
//!   same name are different entries).
//! - Overwriting an existing entry is silent unless using `*_or_error` methods.
//! - The quoted lambda of each entry is captured lazily, on first lookup, and cached for the
//!   life of the entry. A failed capture is not cached: the next lookup runs the body again
//!   and fails the same way.
//!
//! # Thread Safety
//! The registry is `Send + Sync`. Concurrent first lookups of one entry capture it once;
//! the others wait for that capture.
//!
//! # Summary Table
//! | Method            | Overwrites | Error on Duplicate |
//! |-------------------|------------|--------------------|
//! | register          | Yes        | No                 |
//! | register_or_error | No         | Yes                |
//! | unregister        | N/A        | N/A                |
//! | contains          | N/A        | N/A                |

use crate::ast::{Function, FunctionId, Lambda};
use crate::macros::capture::{capture, Quoter};
use crate::macros::types::SubstituteBody;
use crate::{expr_err, ExprError};
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

struct Binding {
    function: Function,
    body: SubstituteBody,
    quoted: OnceCell<Arc<Lambda>>,
}

/// Marked functions and their lazily captured lambdas.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::{Expr, Function, Lambda, Parameter, Type};
/// use exprnest::macros::SubstituteRegistry;
/// let registry = SubstituteRegistry::new();
/// let is_empty = Function::builder("is_empty")
///     .param("s", Type::Str)
///     .returns(Type::Bool)
///     .build();
/// registry.register(&is_empty, |q| {
///     let s = Parameter::new("s", Type::Str);
///     q.quote(Lambda::new(vec![s.clone()], Expr::equal(Expr::parameter(&s), Expr::constant(""))))
/// });
/// assert!(registry.contains(&is_empty));
/// assert_eq!(registry.quoted_body(&is_empty).unwrap().unwrap().to_string(), "s => (s == \"\")");
/// ```
#[derive(Default)]
pub struct SubstituteRegistry {
    bindings: RwLock<HashMap<FunctionId, Arc<Binding>>>,
}

static GLOBAL: Lazy<SubstituteRegistry> = Lazy::new(SubstituteRegistry::new);

impl SubstituteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry consulted by [`expand`](crate::macros::expand).
    pub fn global() -> &'static SubstituteRegistry {
        &GLOBAL
    }

    /// Marks `function` as a substitute with the given body.
    /// Returns `true` if an existing entry was replaced.
    pub fn register<F>(&self, function: &Function, body: F) -> bool
    where
        F: Fn(&mut Quoter<'_>) -> Result<(), ExprError> + Send + Sync + 'static,
    {
        let binding = Arc::new(Binding {
            function: function.clone(),
            body: Arc::new(body),
            quoted: OnceCell::new(),
        });
        self.write()
            .insert(function.id(), binding)
            .is_some()
    }

    /// Like [`register`](Self::register), but fails if the function is already registered.
    pub fn register_or_error<F>(&self, function: &Function, body: F) -> Result<(), ExprError>
    where
        F: Fn(&mut Quoter<'_>) -> Result<(), ExprError> + Send + Sync + 'static,
    {
        let mut bindings = self.write();
        if bindings.contains_key(&function.id()) {
            return Err(expr_err!(
                InvalidArgument,
                "'{}' is already registered as a substitute",
                function.name()
            ));
        }
        bindings.insert(
            function.id(),
            Arc::new(Binding {
                function: function.clone(),
                body: Arc::new(body),
                quoted: OnceCell::new(),
            }),
        );
        Ok(())
    }

    /// Removes a substitute. Returns `true` if it was registered.
    pub fn unregister(&self, function: &Function) -> bool {
        self.write().remove(&function.id()).is_some()
    }

    pub fn contains(&self, function: &Function) -> bool {
        self.read().contains_key(&function.id())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Names of all registered substitutes, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .values()
            .map(|b| b.function.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// The lambda `function` stands for, or `None` if it is not a substitute.
    ///
    /// Captured on first call and cached afterwards.
    pub fn quoted_body(&self, function: &Function) -> Result<Option<Arc<Lambda>>, ExprError> {
        let Some(binding) = self.read().get(&function.id()).cloned() else {
            return Ok(None);
        };
        let lambda = binding.quoted.get_or_try_init(|| {
            capture(&binding.function, |q| (binding.body)(q)).map(Arc::new)
        })?;
        Ok(Some(Arc::clone(lambda)))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<FunctionId, Arc<Binding>>> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<FunctionId, Arc<Binding>>> {
        self.bindings.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SubstituteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubstituteRegistry")
            .field("substitutes", &self.names())
            .finish()
    }
}
