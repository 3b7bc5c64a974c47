//! Callables supplied by the embedding application.
//!
//! The registry doubles as the static signature table the resolver uses to
//! arity-check calls, so a host function is known before anything runs.

use crate::language::types::Type;
use crate::runtime::value::Value;
use indexmap::IndexMap;
use std::rc::Rc;

pub type HostFn = Rc<dyn Fn(&[Value]) -> Result<Value, String>>;

#[derive(Clone, Debug)]
pub struct HostParam {
    pub name: String,
    pub ty: Type,
    pub default: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct Signature {
    pub params: Vec<HostParam>,
    pub returns: Type,
}

impl Signature {
    pub fn returning(returns: Type) -> Self {
        Self {
            params: Vec::new(),
            returns,
        }
    }

    pub fn param(mut self, name: &str, ty: Type) -> Self {
        self.params.push(HostParam {
            name: name.to_string(),
            ty,
            default: None,
        });
        self
    }

    pub fn param_with_default(mut self, name: &str, ty: Type, default: Value) -> Self {
        self.params.push(HostParam {
            name: name.to_string(),
            ty,
            default: Some(default),
        });
        self
    }
}

#[derive(Clone)]
pub struct HostFunction {
    pub signature: Signature,
    func: HostFn,
}

impl HostFunction {
    /// Calls with one value per parameter, already bound and defaulted.
    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.func)(args)
    }
}

#[derive(Clone, Default)]
pub struct HostRegistry {
    functions: IndexMap<String, HostFunction>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the numeric and array helpers every program can use.
    pub fn with_prelude() -> Self {
        let mut registry = Self::new();
        let number = || Type::Number;
        let any_array = || Type::array_of(Type::Any);

        registry.register(
            "min",
            Signature::returning(number()).param("a", number()).param("b", number()),
            |args| numeric2(args, f64::min),
        );
        registry.register(
            "max",
            Signature::returning(number()).param("a", number()).param("b", number()),
            |args| numeric2(args, f64::max),
        );
        registry.register(
            "abs",
            Signature::returning(number()).param("x", number()),
            |args| numeric1(args, f64::abs),
        );
        registry.register(
            "sqrt",
            Signature::returning(number()).param("x", number()),
            |args| match args.first() {
                Some(Value::Number(x)) if *x < 0.0 => {
                    Err(format!("cannot take the square root of {x}"))
                }
                _ => numeric1(args, f64::sqrt),
            },
        );
        registry.register(
            "pow",
            Signature::returning(number())
                .param("base", number())
                .param_with_default("exponent", number(), Value::Number(2.0)),
            |args| numeric2(args, f64::powf),
        );
        registry.register(
            "len",
            Signature::returning(number()).param("items", any_array()),
            |args| match args.first() {
                Some(Value::Array(items)) => Ok(Value::Number(items.len() as f64)),
                _ => Err("expected an array".to_string()),
            },
        );
        registry.register(
            "push",
            Signature::returning(any_array())
                .param("items", any_array())
                .param("item", Type::Any),
            |args| match args {
                [Value::Array(items), item] => {
                    let mut items = items.clone();
                    items.push(item.clone());
                    Ok(Value::Array(items))
                }
                _ => Err("expected an array and an item".to_string()),
            },
        );
        registry
    }

    pub fn register(
        &mut self,
        name: &str,
        signature: Signature,
        func: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) {
        self.functions.insert(
            name.to_string(),
            HostFunction {
                signature,
                func: Rc::new(func),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&HostFunction> {
        self.functions.get(name)
    }

    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.functions.get(name).map(|function| &function.signature)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

fn numeric1(args: &[Value], op: fn(f64) -> f64) -> Result<Value, String> {
    match args {
        [Value::Number(x)] => Ok(Value::Number(op(*x))),
        _ => Err("expected one number".to_string()),
    }
}

fn numeric2(args: &[Value], op: fn(f64, f64) -> f64) -> Result<Value, String> {
    match args {
        [Value::Number(a), Value::Number(b)] => Ok(Value::Number(op(*a, *b))),
        _ => Err("expected two numbers".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_functions_compute() {
        let hosts = HostRegistry::with_prelude();
        let max = hosts.get("max").expect("max");
        let result = max.call(&[Value::Number(2.0), Value::Number(5.0)]).expect("call");
        assert!(result.equals(&Value::Number(5.0)));

        let sqrt = hosts.get("sqrt").expect("sqrt");
        assert!(sqrt.call(&[Value::Number(-1.0)]).is_err());
    }

    #[test]
    fn signatures_expose_defaults() {
        let hosts = HostRegistry::with_prelude();
        let pow = hosts.signature("pow").expect("pow");
        assert_eq!(pow.params.len(), 2);
        assert!(pow.params[1].default.is_some());
        assert_eq!(pow.returns, Type::Number);
    }
}
