use super::*;
use crate::language::ast::{Expr, Literal, UnaryOp};
use crate::language::parser::parse_expression_source;
use crate::project::{path::is_identifier, ModuleId};
use crate::runtime::interpreter::range_values;

/// Which top-level names `run` evaluates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    Main,
    Functions(Vec<String>),
}

/// A command-line argument, `VALUE` or `NAME=VALUE`, where the value is a
/// literal in source syntax.
#[derive(Clone, Debug)]
pub struct EntryArg {
    pub name: Option<String>,
    pub value: Value,
}

impl EntryArg {
    pub fn parse(text: &str) -> RuntimeResult<Self> {
        let (name, raw) = match text.split_once('=') {
            // `a=b` names a parameter, but `x == 1` and `"a=b"` do not.
            Some((name, raw)) if is_identifier(name.trim()) => (Some(name.trim().to_string()), raw),
            _ => (None, text),
        };
        let invalid = |message: String| RuntimeError::InvalidArgument {
            argument: text.to_string(),
            message,
        };
        let expr = parse_expression_source(raw).map_err(|errors| invalid(errors.first_message()))?;
        let value = literal_value(&expr)
            .ok_or_else(|| invalid("expected a number, string, boolean or array".to_string()))?;
        Ok(Self { name, value })
    }
}

/// Value of an expression built only from literals.
pub fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Literal(Literal::Number(n, _)) => Some(Value::Number(*n)),
        Expr::Literal(Literal::String(s, _)) => Some(Value::String(s.clone())),
        Expr::Literal(Literal::Bool(b, _)) => Some(Value::Bool(*b)),
        Expr::Unary {
            op: UnaryOp::Neg,
            expr,
            ..
        } => match literal_value(expr)? {
            Value::Number(n) => Some(Value::Number(-n)),
            _ => None,
        },
        Expr::Array(items, _) => items
            .iter()
            .map(literal_value)
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Expr::Range(range) => {
            let start = literal_value(&range.start)?.as_number()?;
            let end = literal_value(&range.end)?.as_number()?;
            if start.fract() != 0.0 || end.fract() != 0.0 {
                return None;
            }
            range_values(start as i64, end as i64, range.inclusive).ok()
        }
        _ => None,
    }
}

impl<'s> Interpreter<'s> {
    /// Evaluates the entry points of `module`, returning each name with its
    /// value in order.
    pub fn run(
        &mut self,
        module: ModuleId,
        entry: &Entry,
        args: &[EntryArg],
    ) -> RuntimeResult<Vec<(String, Value)>> {
        let names = match entry {
            Entry::Main => vec!["main".to_string()],
            Entry::Functions(names) => names.clone(),
        };
        debug!(module = %module, entries = names.len(), "running entry");
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let value = self.run_one(module, &name, args)?;
            results.push((name, value));
        }
        Ok(results)
    }

    fn run_one(&mut self, module: ModuleId, name: &str, args: &[EntryArg]) -> RuntimeResult<Value> {
        let value = self.value_of(module, name)?;
        match value {
            Value::Function(_) | Value::Host(_) => {
                let mut positional = Vec::new();
                let mut keyword = Vec::new();
                for arg in args {
                    match &arg.name {
                        Some(key) => keyword.push((key.clone(), arg.value.clone())),
                        None => positional.push(arg.value.clone()),
                    }
                }
                self.call_value(value, positional, keyword)
            }
            constant if args.is_empty() => Ok(constant),
            _ => Err(RuntimeError::NotCallable {
                found: format!("`{name}`"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positional_and_keyword_arguments() {
        let positional = EntryArg::parse("3").expect("positional");
        assert!(positional.name.is_none());
        assert!(positional.value.equals(&Value::Number(3.0)));

        let keyword = EntryArg::parse("teeth=-12").expect("keyword");
        assert_eq!(keyword.name.as_deref(), Some("teeth"));
        assert!(keyword.value.equals(&Value::Number(-12.0)));

        let array = EntryArg::parse("sizes=[1, 2, 3]").expect("array");
        assert!(array.value.equals(&Value::Array(vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Number(3.0),
        ])));
    }

    #[test]
    fn strings_with_equals_stay_positional() {
        let arg = EntryArg::parse("\"a=b\"").expect("string");
        assert!(arg.name.is_none());
        assert!(arg.value.equals(&Value::String("a=b".into())));
    }

    #[test]
    fn non_literal_arguments_are_rejected() {
        let err = EntryArg::parse("width=height").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidArgument { .. }));
    }

    #[test]
    fn literal_ranges_expand() {
        let arg = EntryArg::parse("[0..=3]").expect("range");
        let Value::Array(items) = arg.value else {
            panic!("expected an array");
        };
        assert_eq!(items.len(), 4);
    }
}
