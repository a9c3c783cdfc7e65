use crate::ast::symbols::ParamId;
use crate::ast::types::Type;
use crate::ast::Lambda;
use im::{OrdMap, Vector};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Evaluation environment: parameter identity to bound value.
pub type Env = im::HashMap<ParamId, Value>;

/// A runtime value, and the payload of constant nodes.
///
/// A lambda tree stored as data is a [`Value::Tree`]: this is what a reference call's holder
/// has to resolve to before expansion can inline it.
///
/// # Examples
///
/// ```rust
/// use exprnest::ast::Value;
/// let n = Value::from(3);
/// assert_eq!(n.type_name(), "int");
/// assert_eq!(Value::from("hi").to_string(), "\"hi\"");
/// assert!(Value::default().is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum Value {
    #[default]
    Null,
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Seq(Vector<Value>),
    Record(Record),
    Tree(Arc<Lambda>),
    Closure(Closure),
}

/// An instance of a named record type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub type_name: Arc<str>,
    pub fields: OrdMap<Arc<str>, Value>,
}

impl Record {
    pub fn new(type_name: &str) -> Self {
        Record {
            type_name: Arc::from(type_name),
            fields: OrdMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(Arc::from(field), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// A lambda paired with the environment it was evaluated in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Closure {
    pub lambda: Arc<Lambda>,
    pub env: Env,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Seq(_) => "seq",
            Value::Record(_) => "record",
            Value::Tree(_) => "tree",
            Value::Closure(_) => "closure",
        }
    }

    /// The static type a constant holding this value gets.
    pub fn ty(&self) -> Type {
        match self {
            Value::Null => Type::Any,
            Value::Unit => Type::Unit,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Str(_) => Type::Str,
            Value::Seq(items) => Type::seq(items.front().map_or(Type::Any, Value::ty)),
            Value::Record(record) => Type::Object(Arc::clone(&record.type_name)),
            Value::Tree(lambda) => Type::Quoted(Box::new(lambda.fn_type())),
            Value::Closure(closure) => closure.lambda.fn_type(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Arc<Lambda>> {
        match self {
            Value::Tree(l) => Some(l),
            _ => None,
        }
    }

    pub fn seq(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Seq(items.into_iter().collect())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Lambda> for Value {
    fn from(l: Lambda) -> Self {
        Value::Tree(Arc::new(l))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "\"{}\"", s.escape_debug()),
            Value::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Record(record) => {
                write!(f, "{} {{", record.type_name)?;
                for (i, (name, value)) in record.fields.iter().enumerate() {
                    let sep = if i > 0 { "," } else { "" };
                    write!(f, "{} {} = {}", sep, name, value)?;
                }
                write!(f, " }}")
            }
            Value::Tree(lambda) => write!(f, "quote({})", lambda),
            Value::Closure(closure) => write!(f, "closure({})", closure.lambda),
        }
    }
}
