use crate::language::ast::{
    BinaryOp, Block, ElseBranch, Expr, FunctionExpr, IfExpr, Literal, RangeExpr, Statement,
    UnaryOp,
};
use crate::language::span::Span;
use crate::project::{ModuleId, Session};
use crate::resolve::{ResolvedModule, Target};
use crate::runtime::{
    environment::Frame,
    error::{RuntimeError, RuntimeResult},
    value::{Closure, Value},
};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

#[derive(Clone, Debug, PartialEq)]
enum EvalState {
    Running,
    Done,
    /// A top-level statement failed; later queries get the same error.
    Failed(RuntimeError),
}

/// Where an expression is evaluated: which module's bindings apply, and the
/// innermost frame.
#[derive(Clone)]
pub(crate) struct Context {
    pub module: ModuleId,
    pub frame: Rc<Frame>,
}

/// Tree-walking evaluator over a resolved session.
///
/// Modules run top to bottom on first use. An import statement runs the
/// imported module first unless that module is already running, which only
/// happens through an import cycle.
pub struct Interpreter<'s> {
    pub(crate) session: &'s Session,
    states: HashMap<ModuleId, EvalState>,
    items: HashMap<(ModuleId, String), Value>,
    assemblies: HashMap<ModuleId, Value>,
    frames: HashMap<ModuleId, Rc<Frame>>,
}

impl<'s> Interpreter<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            states: HashMap::new(),
            items: HashMap::new(),
            assemblies: HashMap::new(),
            frames: HashMap::new(),
        }
    }

    pub fn ensure_module(&mut self, id: ModuleId) -> RuntimeResult<()> {
        match self.states.get(&id) {
            Some(EvalState::Done) => return Ok(()),
            Some(EvalState::Running) => {
                trace!(module = %id, "module already running, cyclic import");
                return Ok(());
            }
            Some(EvalState::Failed(err)) => return Err(err.clone()),
            None => {}
        }

        let session = self.session;
        let record = session.module(id);
        let ast = match record.ast() {
            Some(ast) if record.is_usable() => ast,
            _ => {
                return Err(RuntimeError::ModuleHasErrors {
                    module: record.path().to_string(),
                })
            }
        };

        debug!(module = %record.path(), "evaluating module");
        self.states.insert(id, EvalState::Running);
        let frame = Frame::root();
        self.frames.insert(id, frame.clone());
        let ctx = Context { module: id, frame };

        let mut last = Value::Unit;
        for statement in &ast.statements {
            match self.exec_statement(&ctx, statement) {
                Ok(value) => last = value,
                Err(err) => {
                    debug!(module = %record.path(), error = %err, "module evaluation failed");
                    self.states.insert(id, EvalState::Failed(err.clone()));
                    return Err(err);
                }
            }
        }
        if record.is_assembly() {
            self.assemblies.insert(id, last);
        }
        self.states.insert(id, EvalState::Done);
        debug!(module = %record.path(), "module evaluated");
        Ok(())
    }

    /// Value of a top-level name after running its module.
    pub fn value_of(&mut self, module: ModuleId, name: &str) -> RuntimeResult<Value> {
        self.ensure_module(module)?;
        self.top_level_value(module, name)
            .ok_or_else(|| RuntimeError::MissingEntry {
                name: name.to_string(),
            })
    }

    /// The module's trailing top-level value.
    pub fn assembly(&mut self, module: ModuleId) -> RuntimeResult<Value> {
        let record = self.session.module(module);
        if !record.is_assembly() {
            return Err(RuntimeError::NotAnAssembly {
                module: record.path().to_string(),
            });
        }
        self.ensure_module(module)?;
        self.assemblies
            .get(&module)
            .cloned()
            .ok_or_else(|| RuntimeError::Uninitialized {
                name: record.path().to_string(),
            })
    }

    pub(crate) fn top_level_value(&self, module: ModuleId, name: &str) -> Option<Value> {
        let resolved = self.session.module(module).resolved()?;
        match &resolved.top_level(name)?.target {
            Target::Item { module, name } => self.items.get(&(*module, name.clone())).cloned(),
            Target::Local(id) => self.frames.get(&module)?.get(*id),
            Target::Host(name) => Some(Value::Host(name.clone())),
            Target::Module(_) | Target::Invalid => None,
        }
    }

    pub(crate) fn resolved(&self, module: ModuleId) -> RuntimeResult<&'s ResolvedModule> {
        let session = self.session;
        let record = session.module(module);
        record
            .resolved()
            .ok_or_else(|| RuntimeError::ModuleHasErrors {
                module: record.path().to_string(),
            })
    }

    pub(crate) fn exec_statement(
        &mut self,
        ctx: &Context,
        statement: &Statement,
    ) -> RuntimeResult<Value> {
        let resolved = self.resolved(ctx.module)?;
        match statement {
            Statement::Import(stmt) => {
                if let Some(target) = resolved.import_targets.get(&stmt.span) {
                    self.ensure_module(*target)?;
                }
                Ok(Value::Unit)
            }
            Statement::Let(stmt) => {
                let value = match &stmt.value {
                    Expr::Function(func) => self.make_closure(ctx, func, Some(&stmt.name.name)),
                    other => self.eval_expr(ctx, other)?,
                };
                let Some(id) = resolved.declaration(stmt.name.span) else {
                    return Err(RuntimeError::Unresolved {
                        name: stmt.name.name.clone(),
                    });
                };
                match &resolved.binding(id).target {
                    Target::Item { module, name } => {
                        self.items.insert((*module, name.clone()), value);
                    }
                    _ => ctx.frame.define(id, value),
                }
                Ok(Value::Unit)
            }
            Statement::Expr(stmt) => self.eval_expr(ctx, &stmt.expr),
        }
    }

    pub(crate) fn eval_expr(&mut self, ctx: &Context, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::Identifier(ident) => self.eval_reference(ctx, ident.span, &ident.name),
            Expr::Path(path) => {
                let name = path
                    .segments
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect::<Vec<_>>()
                    .join("::");
                self.eval_reference(ctx, path.span, &name)
            }
            Expr::Literal(Literal::Number(value, _)) => Ok(Value::Number(*value)),
            Expr::Literal(Literal::String(value, _)) => Ok(Value::String(value.clone())),
            Expr::Literal(Literal::Bool(value, _)) => Ok(Value::Bool(*value)),
            Expr::Array(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(ctx, item)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Range(range) => self.eval_range(ctx, range),
            Expr::Binary {
                op, left, right, ..
            } => {
                let left = self.eval_expr(ctx, left)?;
                match (op, &left) {
                    (BinaryOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
                    (BinaryOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let right = self.eval_expr(ctx, right)?;
                apply_binary(*op, left, right)
            }
            Expr::Unary { op, expr, .. } => {
                let value = self.eval_expr(ctx, expr)?;
                match (op, value) {
                    (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (op, other) => Err(RuntimeError::TypeMismatch {
                        message: format!(
                            "cannot apply `{}` to {}",
                            match op {
                                UnaryOp::Neg => "-",
                                UnaryOp::Not => "!",
                            },
                            other.type_name()
                        ),
                    }),
                }
            }
            Expr::Call(call) => self.eval_call(ctx, call, None),
            Expr::Index { base, index, .. } => {
                let base = self.eval_expr(ctx, base)?;
                let index = self.eval_expr(ctx, index)?;
                eval_index(base, index)
            }
            Expr::Function(func) => Ok(self.make_closure(ctx, func, None)),
            Expr::Block(block) => self.eval_block(ctx, block, None),
            Expr::If(expr) => self.eval_if(ctx, expr, None),
            Expr::Pipeline(pipeline) => self.eval_pipeline(ctx, pipeline, None),
            Expr::For(expr) => self.eval_for(ctx, expr, None),
        }
    }

    fn eval_reference(&mut self, ctx: &Context, span: Span, name: &str) -> RuntimeResult<Value> {
        let resolved = self.resolved(ctx.module)?;
        let Some(reference) = resolved.reference(span) else {
            return Err(RuntimeError::Unresolved {
                name: name.to_string(),
            });
        };
        match &reference.target {
            Target::Local(id) => ctx.frame.get(*id).ok_or_else(|| RuntimeError::Uninitialized {
                name: name.to_string(),
            }),
            Target::Item { module, name: item } => {
                if let Some(value) = self.items.get(&(*module, item.clone())) {
                    return Ok(value.clone());
                }
                self.ensure_module(*module)?;
                self.items
                    .get(&(*module, item.clone()))
                    .cloned()
                    .ok_or_else(|| RuntimeError::Uninitialized {
                        name: name.to_string(),
                    })
            }
            Target::Module(module) => self.assembly(*module),
            Target::Host(host) => Ok(Value::Host(host.clone())),
            Target::Invalid => Err(RuntimeError::Unresolved {
                name: name.to_string(),
            }),
        }
    }

    fn make_closure(&self, ctx: &Context, func: &Rc<FunctionExpr>, name: Option<&str>) -> Value {
        Value::Function(Rc::new(Closure {
            name: name.map(str::to_string),
            module: ctx.module,
            func: func.clone(),
            env: ctx.frame.clone(),
        }))
    }

    /// Evaluates a block in a fresh frame. A receiver is handed to the final
    /// expression only.
    pub(crate) fn eval_block(
        &mut self,
        ctx: &Context,
        block: &Block,
        receiver: Option<Value>,
    ) -> RuntimeResult<Value> {
        let inner = Context {
            module: ctx.module,
            frame: Frame::child(&ctx.frame),
        };
        let last_index = block.statements.len().saturating_sub(1);
        let mut receiver = receiver;
        let mut last = Value::Unit;
        for (index, statement) in block.statements.iter().enumerate() {
            last = match statement {
                Statement::Expr(stmt) if index == last_index => {
                    self.eval_with_receiver(&inner, &stmt.expr, receiver.take())?
                }
                other => {
                    self.exec_statement(&inner, other)?;
                    Value::Unit
                }
            };
        }
        if receiver.is_some() {
            return Err(RuntimeError::StageRejectsReceiver {
                stage: "block without a final expression".to_string(),
            });
        }
        Ok(last)
    }

    /// Without an else branch a false condition passes the receiver through.
    pub(crate) fn eval_if(
        &mut self,
        ctx: &Context,
        expr: &IfExpr,
        receiver: Option<Value>,
    ) -> RuntimeResult<Value> {
        let condition = match self.eval_expr(ctx, &expr.condition)? {
            Value::Bool(b) => b,
            other => {
                return Err(RuntimeError::TypeMismatch {
                    message: format!("`if` condition must be Bool, found {}", other.type_name()),
                })
            }
        };
        if condition {
            return self.eval_block(ctx, &expr.then_branch, receiver);
        }
        match &expr.else_branch {
            Some(ElseBranch::Block(block)) => self.eval_block(ctx, block, receiver),
            Some(ElseBranch::If(nested)) => self.eval_if(ctx, nested, receiver),
            None => Ok(receiver.unwrap_or(Value::Unit)),
        }
    }

    fn eval_range(&mut self, ctx: &Context, range: &RangeExpr) -> RuntimeResult<Value> {
        let start = expect_integer(self.eval_expr(ctx, &range.start)?, "range start")?;
        let end = expect_integer(self.eval_expr(ctx, &range.end)?, "range end")?;
        range_values(start, end, range.inclusive)
    }
}

/// Longest sequence a range expression may expand to.
pub(crate) const MAX_RANGE_LEN: usize = 1_000_000;

pub(crate) fn range_values(start: i64, end: i64, inclusive: bool) -> RuntimeResult<Value> {
    let len = (i128::from(end) - i128::from(start) + i128::from(inclusive)).max(0);
    if len > MAX_RANGE_LEN as i128 {
        return Err(RuntimeError::RangeTooLarge {
            start,
            end,
            limit: MAX_RANGE_LEN,
        });
    }
    let values = if inclusive {
        (start..=end).map(|i| Value::Number(i as f64)).collect()
    } else {
        (start..end).map(|i| Value::Number(i as f64)).collect()
    };
    Ok(Value::Array(values))
}

pub(crate) fn apply_binary(op: BinaryOp, left: Value, right: Value) -> RuntimeResult<Value> {
    use Value::{Bool, Number};
    let result = match (op, &left, &right) {
        (BinaryOp::Add, Number(a), Number(b)) => Number(a + b),
        (BinaryOp::Add, Value::String(a), Value::String(b)) => Value::String(format!("{a}{b}")),
        (BinaryOp::Sub, Number(a), Number(b)) => Number(a - b),
        (BinaryOp::Mul, Number(a), Number(b)) => Number(a * b),
        (BinaryOp::Div | BinaryOp::Rem, Number(_), Number(b)) if *b == 0.0 => {
            return Err(RuntimeError::DivisionByZero)
        }
        (BinaryOp::Div, Number(a), Number(b)) => Number(a / b),
        (BinaryOp::Rem, Number(a), Number(b)) => Number(a % b),
        (BinaryOp::Lt, Number(a), Number(b)) => Bool(a < b),
        (BinaryOp::LtEq, Number(a), Number(b)) => Bool(a <= b),
        (BinaryOp::Gt, Number(a), Number(b)) => Bool(a > b),
        (BinaryOp::GtEq, Number(a), Number(b)) => Bool(a >= b),
        (BinaryOp::And, Bool(a), Bool(b)) => Bool(*a && *b),
        (BinaryOp::Or, Bool(a), Bool(b)) => Bool(*a || *b),
        (BinaryOp::Eq, _, _) => Bool(left.equals(&right)),
        (BinaryOp::NotEq, _, _) => Bool(!left.equals(&right)),
        _ => {
            return Err(RuntimeError::TypeMismatch {
                message: format!(
                    "cannot apply `{}` to {} and {}",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ),
            })
        }
    };
    Ok(result)
}

fn eval_index(base: Value, index: Value) -> RuntimeResult<Value> {
    let items = match base {
        Value::Array(items) => items,
        other => {
            return Err(RuntimeError::TypeMismatch {
                message: format!("cannot index into {}", other.type_name()),
            })
        }
    };
    let index = expect_integer(index, "index")?;
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i).cloned())
        .ok_or(RuntimeError::IndexOutOfRange {
            index,
            len: items.len(),
        })
}

fn expect_integer(value: Value, what: &str) -> RuntimeResult<i64> {
    match value {
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(n as i64),
        other => Err(RuntimeError::TypeMismatch {
            message: format!("{what} must be a whole number, found {other}"),
        }),
    }
}
