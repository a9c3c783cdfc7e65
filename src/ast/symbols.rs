//! Identity-carrying symbols: parameters, members and functions.
//!
//! All three compare and hash by a process-unique id drawn from a shared atomic counter.
//! Two parameters named `x` of type `int` are different parameters; substitution and
//! constant resolution rely on this.

use crate::ast::types::Type;
use crate::ast::value::Value;
use crate::runtime::eval::Evaluator;
use crate::ExprError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

// ============================================================================
// IDENTITIES
// ============================================================================

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

macro_rules! symbol_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(u64);

        impl $name {
            fn fresh() -> Self {
                $name(next_id())
            }

            pub fn get(self) -> u64 {
                self.0
            }
        }
    };
}

symbol_id!(ParamId);
symbol_id!(MemberId);
symbol_id!(FunctionId);

// ============================================================================
// PARAMETERS
// ============================================================================

/// A lambda parameter. Equality is identity, never name.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::{Parameter, Type};
/// let a = Parameter::new("x", Type::Int);
/// let b = Parameter::new("x", Type::Int);
/// assert_ne!(a, b);
/// assert_eq!(a, a.clone());
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    id: ParamId,
    name: Arc<str>,
    ty: Type,
}

impl Parameter {
    pub fn new(name: &str, ty: Type) -> Self {
        Parameter {
            id: ParamId::fresh(),
            name: Arc::from(name),
            ty,
        }
    }

    /// A new parameter with the same name and type but its own identity.
    pub fn fresh(&self) -> Self {
        Parameter::new(&self.name, self.ty.clone())
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Parameter {}

impl Hash for Parameter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ============================================================================
// MEMBERS
// ============================================================================

/// Reads a computed property off a target value.
pub type PropertyFn = fn(&Value) -> Option<Value>;

/// A process-wide mutable storage cell, the target-less root of a member chain.
#[derive(Debug, Clone)]
pub struct StaticSlot(Arc<RwLock<Value>>);

impl StaticSlot {
    pub fn new(initial: Value) -> Self {
        StaticSlot(Arc::new(RwLock::new(initial)))
    }

    pub fn get(&self) -> Value {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

#[derive(Debug, Clone)]
pub enum MemberKind {
    /// A record field, read by name
    Field,
    Property(PropertyFn),
    Static(StaticSlot),
}

#[derive(Debug)]
struct MemberDef {
    id: MemberId,
    name: Arc<str>,
    declaring: Arc<str>,
    ty: Type,
    kind: MemberKind,
}

/// A readable member: a record field, a computed property or a static slot.
#[derive(Debug, Clone)]
pub struct Member(Arc<MemberDef>);

impl Member {
    fn with_kind(declaring: &str, name: &str, ty: Type, kind: MemberKind) -> Self {
        Member(Arc::new(MemberDef {
            id: MemberId::fresh(),
            name: Arc::from(name),
            declaring: Arc::from(declaring),
            ty,
            kind,
        }))
    }

    pub fn field(declaring: &str, name: &str, ty: Type) -> Self {
        Member::with_kind(declaring, name, ty, MemberKind::Field)
    }

    pub fn property(declaring: &str, name: &str, ty: Type, getter: PropertyFn) -> Self {
        Member::with_kind(declaring, name, ty, MemberKind::Property(getter))
    }

    /// A static member holding `initial` until replaced with [`Member::set_static`].
    pub fn static_slot(declaring: &str, name: &str, ty: Type, initial: Value) -> Self {
        Member::with_kind(declaring, name, ty, MemberKind::Static(StaticSlot::new(initial)))
    }

    pub fn id(&self) -> MemberId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn declaring(&self) -> &str {
        &self.0.declaring
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn kind(&self) -> &MemberKind {
        &self.0.kind
    }

    pub fn is_static(&self) -> bool {
        matches!(self.0.kind, MemberKind::Static(_))
    }

    /// Whether a tree can write this member. Only record fields are writable.
    pub fn is_writable(&self) -> bool {
        matches!(self.0.kind, MemberKind::Field)
    }

    pub fn set_static(&self, value: Value) -> Result<(), ExprError> {
        match &self.0.kind {
            MemberKind::Static(slot) => {
                slot.set(value);
                Ok(())
            }
            _ => Err(crate::expr_err!(
                InvalidArgument,
                "Member '{}.{}' is not static",
                self.declaring(),
                self.name()
            )),
        }
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Serialize for Member {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = match self.0.kind {
            MemberKind::Field => "field",
            MemberKind::Property(_) => "property",
            MemberKind::Static(_) => "static",
        };
        let mut state = serializer.serialize_struct("Member", 5)?;
        state.serialize_field("id", &self.0.id)?;
        state.serialize_field("name", &*self.0.name)?;
        state.serialize_field("declaring", &*self.0.declaring)?;
        state.serialize_field("ty", &self.0.ty)?;
        state.serialize_field("kind", kind)?;
        state.end()
    }
}

// ============================================================================
// FUNCTIONS
// ============================================================================

/// Native implementation of a function. Receives the receiver first for methods.
pub type NativeFn = fn(&mut Evaluator, &[Value]) -> Result<Value, ExprError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamMode {
    Value,
    Out,
    Ref,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionParam {
    pub name: Arc<str>,
    pub ty: Type,
    pub mode: ParamMode,
}

#[derive(Debug)]
struct FunctionDef {
    id: FunctionId,
    name: Arc<str>,
    receiver: Option<Type>,
    params: Vec<FunctionParam>,
    ret: Type,
    native: Option<NativeFn>,
}

/// A named callable signature, optionally backed by a native implementation.
///
/// A function without a native body is only meaningful as a substitute that expansion
/// replaces by its quoted lambda.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::{Function, Type};
/// let to_b = Function::builder("to_b")
///     .param("a", Type::object("A"))
///     .returns(Type::object("B"))
///     .build();
/// assert_eq!(to_b.to_string(), "to_b(a: A) -> B");
/// assert!(to_b.native().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Function(Arc<FunctionDef>);

impl Function {
    pub fn builder(name: &str) -> FunctionBuilder {
        FunctionBuilder {
            name: Arc::from(name),
            receiver: None,
            params: Vec::new(),
            ret: Type::Unit,
            native: None,
        }
    }

    pub fn id(&self) -> FunctionId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn receiver(&self) -> Option<&Type> {
        self.0.receiver.as_ref()
    }

    pub fn is_method(&self) -> bool {
        self.0.receiver.is_some()
    }

    pub fn params(&self) -> &[FunctionParam] {
        &self.0.params
    }

    pub fn param_types(&self) -> impl Iterator<Item = &Type> {
        self.0.params.iter().map(|p| &p.ty)
    }

    pub fn ret(&self) -> &Type {
        &self.0.ret
    }

    pub fn native(&self) -> Option<NativeFn> {
        self.0.native
    }

    /// The function's signature as a function type, receiver excluded.
    pub fn signature(&self) -> Type {
        Type::function(self.param_types().cloned(), self.0.ret.clone())
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Function {}

impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(receiver) = &self.0.receiver {
            write!(f, "{}::", receiver)?;
        }
        write!(f, "{}(", self.0.name)?;
        for (i, param) in self.0.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match param.mode {
                ParamMode::Value => {}
                ParamMode::Out => write!(f, "out ")?,
                ParamMode::Ref => write!(f, "ref ")?,
            }
            write!(f, "{}: {}", param.name, param.ty)?;
        }
        write!(f, ") -> {}", self.0.ret)
    }
}

impl Serialize for Function {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Function", 6)?;
        state.serialize_field("id", &self.0.id)?;
        state.serialize_field("name", &*self.0.name)?;
        state.serialize_field("receiver", &self.0.receiver)?;
        state.serialize_field("params", &self.0.params)?;
        state.serialize_field("ret", &self.0.ret)?;
        state.serialize_field("native", &self.0.native.is_some())?;
        state.end()
    }
}

/// Builder for [`Function`].
pub struct FunctionBuilder {
    name: Arc<str>,
    receiver: Option<Type>,
    params: Vec<FunctionParam>,
    ret: Type,
    native: Option<NativeFn>,
}

impl FunctionBuilder {
    /// Makes the function an instance method on `ty`.
    pub fn receiver(mut self, ty: Type) -> Self {
        self.receiver = Some(ty);
        self
    }

    pub fn param(self, name: &str, ty: Type) -> Self {
        self.param_with_mode(name, ty, ParamMode::Value)
    }

    pub fn out_param(self, name: &str, ty: Type) -> Self {
        self.param_with_mode(name, ty, ParamMode::Out)
    }

    pub fn ref_param(self, name: &str, ty: Type) -> Self {
        self.param_with_mode(name, ty, ParamMode::Ref)
    }

    fn param_with_mode(mut self, name: &str, ty: Type, mode: ParamMode) -> Self {
        self.params.push(FunctionParam {
            name: Arc::from(name),
            ty,
            mode,
        });
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.ret = ty;
        self
    }

    pub fn native(mut self, native: NativeFn) -> Self {
        self.native = Some(native);
        self
    }

    pub fn build(self) -> Function {
        Function(Arc::new(FunctionDef {
            id: FunctionId::fresh(),
            name: self.name,
            receiver: self.receiver,
            params: self.params,
            ret: self.ret,
            native: self.native,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_per_symbol() {
        let f = Function::builder("f").build();
        let g = Function::builder("f").build();
        assert_ne!(f, g);
        assert_ne!(f.id(), g.id());

        let m = Member::field("A", "S", Type::Str);
        assert_eq!(m, m.clone());
        assert_ne!(m, Member::field("A", "S", Type::Str));
    }

    #[test]
    fn static_slot_can_be_replaced() {
        let holder = Member::static_slot("Trees", "current", Type::Int, Value::Int(1));
        holder.set_static(Value::Int(2)).unwrap();
        match holder.kind() {
            MemberKind::Static(slot) => assert_eq!(slot.get(), Value::Int(2)),
            other => panic!("unexpected kind {:?}", other),
        }

        let field = Member::field("A", "S", Type::Str);
        assert!(field.set_static(Value::Null).is_err());
    }

    #[test]
    fn function_display_shows_modes() {
        let f = Function::builder("parse")
            .param("text", Type::Str)
            .out_param("result", Type::Int)
            .returns(Type::Bool)
            .build();
        assert_eq!(f.to_string(), "parse(text: str, out result: int) -> bool");
    }
}
