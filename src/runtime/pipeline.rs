use super::*;
use crate::language::ast::{Expr, ForExpr, Identifier, Pipeline, Stage, StageKind};
use crate::runtime::interpreter::apply_binary;

impl<'s> Interpreter<'s> {
    /// Threads the receiver through `pipeline`, binding tags as stages finish.
    pub(crate) fn eval_pipeline(
        &mut self,
        ctx: &Context,
        pipeline: &Pipeline,
        receiver: Option<Value>,
    ) -> RuntimeResult<Value> {
        let mut current = receiver;
        for stage in &pipeline.stages {
            let value = self.eval_stage(ctx, stage, current.take())?;
            if let Some(tag) = &stage.tag {
                self.define_tag(ctx, tag, &value)?;
            }
            current = Some(value);
        }
        Ok(current.unwrap_or(Value::Unit))
    }

    fn eval_stage(
        &mut self,
        ctx: &Context,
        stage: &Stage,
        receiver: Option<Value>,
    ) -> RuntimeResult<Value> {
        match &stage.kind {
            StageKind::Operator { op, operand } => {
                let Some(left) = receiver else {
                    return Err(RuntimeError::TypeMismatch {
                        message: format!("`{}` stage has no left operand", op.symbol()),
                    });
                };
                let right = self.eval_expr(ctx, operand)?;
                apply_binary(*op, left, right)
            }
            StageKind::Expr(expr) => self.eval_with_receiver(ctx, expr, receiver),
        }
    }

    /// Evaluates `expr` as a pipeline stage: a call takes the receiver as its
    /// first argument, a bare name is called with it alone, and compound
    /// stages pass it on to where their value is produced.
    pub(crate) fn eval_with_receiver(
        &mut self,
        ctx: &Context,
        expr: &Expr,
        receiver: Option<Value>,
    ) -> RuntimeResult<Value> {
        let Some(receiver) = receiver else {
            return self.eval_expr(ctx, expr);
        };
        match expr {
            Expr::Call(call) => self.eval_call(ctx, call, Some(receiver)),
            Expr::Identifier(_) | Expr::Path(_) => {
                let callee = self.eval_expr(ctx, expr)?;
                self.call_value(callee, vec![receiver], Vec::new())
            }
            Expr::Block(block) => self.eval_block(ctx, block, Some(receiver)),
            Expr::If(expr) => self.eval_if(ctx, expr, Some(receiver)),
            Expr::Pipeline(pipeline) => self.eval_pipeline(ctx, pipeline, Some(receiver)),
            Expr::For(expr) => self.eval_for(ctx, expr, Some(receiver)),
            other => Err(RuntimeError::StageRejectsReceiver {
                stage: other
                    .receiver_rejection()
                    .unwrap_or("this expression")
                    .to_string(),
            }),
        }
    }

    /// Map mode collects one result per element; fold mode threads the
    /// receiver through the iterations. Each iteration gets its own frame, and
    /// tags declared in the body are gathered into sequences afterwards.
    pub(crate) fn eval_for(
        &mut self,
        ctx: &Context,
        expr: &ForExpr,
        receiver: Option<Value>,
    ) -> RuntimeResult<Value> {
        let elements = match self.eval_expr(ctx, &expr.sequence)? {
            Value::Array(items) => items,
            other => {
                return Err(RuntimeError::TypeMismatch {
                    message: format!("`for` expects a sequence, found {}", other.type_name()),
                })
            }
        };
        let resolved = self.resolved(ctx.module)?;
        let variable = resolved.declaration(expr.binding.span);
        let fold = receiver.is_some();
        debug!(elements = elements.len(), fold, "evaluating for expression");

        let mut accumulator = receiver;
        let mut results = Vec::with_capacity(if fold { 0 } else { elements.len() });
        let mut iterations = Vec::with_capacity(elements.len());
        for element in elements {
            let iteration = Context {
                module: ctx.module,
                frame: Frame::child(&ctx.frame),
            };
            if let Some(id) = variable {
                iteration.frame.define(id, element);
            }
            let input = if fold { accumulator.take() } else { None };
            let value = self.eval_pipeline(&iteration, &expr.body, input)?;
            if fold {
                accumulator = Some(value);
            } else {
                results.push(value);
            }
            iterations.push(iteration.frame);
        }

        if let Some(tags) = resolved.loop_tags.get(&expr.span) {
            for tag in tags {
                let values: Vec<Value> = iterations
                    .iter()
                    .filter_map(|frame| frame.get_local(*tag))
                    .collect();
                let name = &resolved.binding(*tag).name;
                trace!(tag = %name, count = values.len(), "aggregating loop tag");
                ctx.frame.define(*tag, Value::Array(values));
            }
        }

        Ok(if fold {
            accumulator.unwrap_or(Value::Unit)
        } else {
            Value::Array(results)
        })
    }

    fn define_tag(&mut self, ctx: &Context, tag: &Identifier, value: &Value) -> RuntimeResult<()> {
        let resolved = self.resolved(ctx.module)?;
        match resolved.declaration(tag.span) {
            Some(id) => {
                ctx.frame.define(id, value.clone());
                Ok(())
            }
            None => Err(RuntimeError::Unresolved {
                name: tag.name.clone(),
            }),
        }
    }
}
