use super::*;
use crate::language::ast::CallExpr;
use crate::runtime::value::Closure;

/// One declared parameter, as seen by argument binding.
pub struct ParamSpec<'a> {
    pub name: &'a str,
    pub ty: Option<&'a Type>,
    pub has_default: bool,
}

/// Matches positional arguments first, then keyword arguments, to parameter
/// slots. Slots left empty have a default the caller must supply.
pub fn bind_arguments(
    callee: &str,
    params: &[ParamSpec<'_>],
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
) -> RuntimeResult<Vec<Option<Value>>> {
    let received = positional.len() + keyword.len();
    if positional.len() > params.len() {
        return Err(RuntimeError::ArityMismatch {
            name: callee.to_string(),
            expected: params.len(),
            received,
        });
    }

    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (slot, value) in slots.iter_mut().zip(positional) {
        *slot = Some(value);
    }
    for (name, value) in keyword {
        let Some(index) = params.iter().position(|p| p.name == name) else {
            return Err(RuntimeError::UnknownParameter {
                name: callee.to_string(),
                parameter: name,
            });
        };
        if slots[index].is_some() {
            return Err(RuntimeError::DuplicateArgument {
                name: callee.to_string(),
                parameter: name,
            });
        }
        slots[index] = Some(value);
    }

    let missing = slots
        .iter()
        .zip(params)
        .any(|(slot, param)| slot.is_none() && !param.has_default);
    if missing {
        return Err(RuntimeError::ArityMismatch {
            name: callee.to_string(),
            expected: params.iter().filter(|p| !p.has_default).count(),
            received,
        });
    }
    Ok(slots)
}

pub fn check_argument(callee: &str, param: &ParamSpec<'_>, value: &Value) -> RuntimeResult<()> {
    match param.ty {
        Some(ty) if !value.conforms(ty) => Err(RuntimeError::TypeMismatch {
            message: format!(
                "argument `{}` of `{callee}` expects {ty}, found {}",
                param.name,
                value.type_name()
            ),
        }),
        _ => Ok(()),
    }
}

impl<'s> Interpreter<'s> {
    pub(crate) fn eval_call(
        &mut self,
        ctx: &Context,
        call: &CallExpr,
        receiver: Option<Value>,
    ) -> RuntimeResult<Value> {
        let callee = self.eval_expr(ctx, &call.callee)?;
        let mut positional: Vec<Value> = receiver.into_iter().collect();
        let mut keyword = Vec::new();
        for arg in &call.args {
            let value = self.eval_expr(ctx, &arg.value)?;
            match &arg.name {
                Some(name) => keyword.push((name.name.clone(), value)),
                None => positional.push(value),
            }
        }
        self.call_value(callee, positional, keyword)
    }

    pub fn call_value(
        &mut self,
        callee: Value,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> RuntimeResult<Value> {
        match callee {
            Value::Function(closure) => self.call_closure(&closure, positional, keyword),
            Value::Host(name) => self.call_host(&name, positional, keyword),
            other => Err(RuntimeError::NotCallable {
                found: other.type_name(),
            }),
        }
    }

    fn call_closure(
        &mut self,
        closure: &Closure,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> RuntimeResult<Value> {
        let name = closure.name.as_deref().unwrap_or("<anonymous>");
        let func = &closure.func;
        let specs: Vec<ParamSpec<'_>> = func
            .params
            .iter()
            .map(|param| ParamSpec {
                name: &param.name.name,
                ty: param.ty.as_ref().map(|annotation| &annotation.ty),
                has_default: param.default.is_some(),
            })
            .collect();
        let slots = bind_arguments(name, &specs, positional, keyword)?;

        let ctx = Context {
            module: closure.module,
            frame: Frame::child(&closure.env),
        };
        let resolved = self.resolved(closure.module)?;
        for ((param, spec), slot) in func.params.iter().zip(&specs).zip(slots) {
            let value = match (slot, &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval_expr(&ctx, default)?,
                (None, None) => {
                    return Err(RuntimeError::ArityMismatch {
                        name: name.to_string(),
                        expected: specs.len(),
                        received: 0,
                    })
                }
            };
            check_argument(name, spec, &value)?;
            if let Some(id) = resolved.declaration(param.name.span) {
                ctx.frame.define(id, value);
            }
        }

        trace!(function = name, "calling function");
        let result = self.eval_expr(&ctx, &func.body)?;
        if let Some(returns) = &func.returns {
            if !result.conforms(&returns.ty) {
                return Err(RuntimeError::TypeMismatch {
                    message: format!(
                        "`{name}` should return {}, found {}",
                        returns.ty,
                        result.type_name()
                    ),
                });
            }
        }
        Ok(result)
    }

    fn call_host(
        &mut self,
        name: &str,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> RuntimeResult<Value> {
        let session = self.session;
        let Some(function) = session.hosts().get(name) else {
            return Err(RuntimeError::UnknownHost {
                name: name.to_string(),
            });
        };
        let params = &function.signature.params;
        let specs: Vec<ParamSpec<'_>> = params
            .iter()
            .map(|param| ParamSpec {
                name: &param.name,
                ty: Some(&param.ty),
                has_default: param.default.is_some(),
            })
            .collect();
        let slots = bind_arguments(name, &specs, positional, keyword)?;

        let mut args = Vec::with_capacity(params.len());
        for ((param, spec), slot) in params.iter().zip(&specs).zip(slots) {
            let value = slot.or_else(|| param.default.clone()).unwrap_or(Value::Unit);
            check_argument(name, spec, &value)?;
            args.push(value);
        }
        trace!(host = name, "calling host function");
        function.call(&args).map_err(|message| RuntimeError::Host {
            name: name.to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec<'a>(name: &'a str, has_default: bool) -> ParamSpec<'a> {
        ParamSpec {
            name,
            ty: None,
            has_default,
        }
    }

    #[test]
    fn positional_then_keyword_then_defaults() {
        let params = [spec("a", false), spec("b", true), spec("c", false)];
        let slots = bind_arguments(
            "f",
            &params,
            vec![Value::Number(1.0)],
            vec![("c".to_string(), Value::Number(3.0))],
        )
        .expect("bind");
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());
        assert!(slots[2].is_some());
    }

    #[test]
    fn missing_required_argument() {
        let params = [spec("a", false), spec("b", false)];
        let err = bind_arguments("f", &params, vec![Value::Number(1.0)], Vec::new()).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::ArityMismatch {
                name: "f".into(),
                expected: 2,
                received: 1
            }
        );
    }

    #[test]
    fn unknown_and_duplicate_keywords() {
        let params = [spec("a", false)];
        let unknown = bind_arguments(
            "f",
            &params,
            Vec::new(),
            vec![("z".to_string(), Value::Unit)],
        )
        .unwrap_err();
        assert!(matches!(unknown, RuntimeError::UnknownParameter { .. }));

        let duplicate = bind_arguments(
            "f",
            &params,
            vec![Value::Unit],
            vec![("a".to_string(), Value::Unit)],
        )
        .unwrap_err();
        assert!(matches!(duplicate, RuntimeError::DuplicateArgument { .. }));
    }

    #[test]
    fn declared_types_are_enforced() {
        let ty = Type::Number;
        let param = ParamSpec {
            name: "x",
            ty: Some(&ty),
            has_default: false,
        };
        assert!(check_argument("f", &param, &Value::Number(1.0)).is_ok());
        assert!(matches!(
            check_argument("f", &param, &Value::String("no".into())),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }
}
