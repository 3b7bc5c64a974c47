use crate::language::span::Span;
use std::fmt;

/// Static type of a KCL value.
///
/// `Any` is the answer whenever the binder cannot say more.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Number,
    Bool,
    String,
    Array(Box<Type>),
    Function(Box<Type>),
    Module,
    /// Host-provided value such as `Solid` or `Sketch`.
    Named(String),
    Unit,
    Any,
}

impl Type {
    pub fn array_of(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn function_returning(ret: Type) -> Type {
        Type::Function(Box::new(ret))
    }

    /// Parse a type name as written in an annotation.
    pub fn from_name(name: &str) -> Type {
        match name {
            "Number" | "number" => Type::Number,
            "Bool" | "bool" => Type::Bool,
            "String" | "string" => Type::String,
            "Fn" => Type::function_returning(Type::Any),
            "Module" => Type::Module,
            "Any" | "any" => Type::Any,
            other => Type::Named(other.to_string()),
        }
    }

    /// Element type when iterating a value of this type.
    pub fn element(&self) -> Type {
        match self {
            Type::Array(inner) => (**inner).clone(),
            _ => Type::Any,
        }
    }

    pub fn return_type(&self) -> Type {
        match self {
            Type::Function(ret) => (**ret).clone(),
            _ => Type::Any,
        }
    }

    /// Join of two branch types, falling back to `Any` when they disagree.
    pub fn join(&self, other: &Type) -> Type {
        if self == other {
            self.clone()
        } else if matches!(self, Type::Any) {
            other.clone()
        } else if matches!(other, Type::Any) {
            self.clone()
        } else {
            Type::Any
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Number => write!(f, "Number"),
            Type::Bool => write!(f, "Bool"),
            Type::String => write!(f, "String"),
            Type::Array(inner) => write!(f, "[{inner}]"),
            Type::Function(ret) => write!(f, "Fn -> {ret}"),
            Type::Module => write!(f, "Module"),
            Type::Named(name) => write!(f, "{name}"),
            Type::Unit => write!(f, "()"),
            Type::Any => write!(f, "Any"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAnnotation {
    pub ty: Type,
    pub span: Span,
}
