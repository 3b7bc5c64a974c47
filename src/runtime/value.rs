use crate::language::{ast::FunctionExpr, types::Type};
use crate::project::ModuleId;
use crate::runtime::environment::Frame;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum Value {
    Unit,
    Number(f64),
    Bool(bool),
    String(String),
    Array(Vec<Value>),
    Function(Rc<Closure>),
    /// Host function referenced by name.
    Host(String),
    /// Value produced and consumed only by host functions, e.g. a solid.
    Opaque(OpaqueValue),
}

/// A function literal together with the frame it was created in.
pub struct Closure {
    pub name: Option<String>,
    pub module: ModuleId,
    pub func: Rc<FunctionExpr>,
    pub env: Rc<Frame>,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("params", &self.func.params.len())
            .finish()
    }
}

#[derive(Clone)]
pub struct OpaqueValue {
    pub kind: String,
    pub data: Rc<dyn Any>,
}

impl OpaqueValue {
    pub fn new<T: Any>(kind: impl Into<String>, data: T) -> Self {
        Self {
            kind: kind.into(),
            data: Rc::new(data),
        }
    }

    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.kind)
    }
}

impl Value {
    pub fn type_name(&self) -> String {
        match self {
            Value::Unit => "()".to_string(),
            Value::Number(_) => "Number".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Function(_) | Value::Host(_) => "Fn".to_string(),
            Value::Opaque(opaque) => opaque.kind.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Runtime check of a value against a declared parameter type.
    pub fn conforms(&self, ty: &Type) -> bool {
        match (ty, self) {
            (Type::Any, _) => true,
            (Type::Number, Value::Number(_))
            | (Type::Bool, Value::Bool(_))
            | (Type::String, Value::String(_))
            | (Type::Unit, Value::Unit) => true,
            (Type::Array(inner), Value::Array(items)) => items.iter().all(|v| v.conforms(inner)),
            (Type::Function(_), Value::Function(_) | Value::Host(_)) => true,
            (Type::Named(name), Value::Opaque(opaque)) => opaque.kind == *name,
            _ => false,
        }
    }

    /// Structural equality; functions and opaque values compare by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(&a.data, &b.data),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            Value::Number(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (idx, value) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Value::Function(closure) => match &closure.name {
                Some(name) => write!(f, "<fn {name}>"),
                None => write!(f, "<fn>"),
            },
            Value::Host(name) => write!(f, "<host fn {name}>"),
            Value::Opaque(opaque) => write!(f, "<{}>", opaque.kind),
        }
    }
}
