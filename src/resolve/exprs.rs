use super::*;
use crate::language::ast::{
    BinaryOp, Block, CallExpr, ElseBranch, Expr, ForExpr, FunctionExpr, IfExpr, LetStmt,
    Literal, PathExpr, Pipeline, StageKind, Statement, UnaryOp,
};

impl<'s> Resolver<'s> {
    pub(super) fn resolve_statement(&mut self, statement: &Statement, top_level: bool) -> Type {
        match statement {
            Statement::Import(stmt) => {
                self.resolve_import(stmt, top_level);
                Type::Unit
            }
            Statement::Let(stmt) => {
                self.resolve_let(stmt, top_level);
                Type::Unit
            }
            Statement::Expr(stmt) => self.resolve_expr(&stmt.expr, None),
        }
    }

    fn resolve_let(&mut self, stmt: &LetStmt, top_level: bool) {
        if stmt.exported && !top_level {
            self.errors
                .push(ResolveError::NestedExport { span: stmt.span });
        }
        let ty = self.resolve_expr(&stmt.value, None);
        if !(stmt.exported && top_level) {
            self.declare_local(&stmt.name, stmt.span.end, ty, BindingOrigin::Declaration);
            return;
        }

        let target = Target::Item {
            module: self.module,
            name: stmt.name.name.clone(),
        };
        let binding = Binding {
            name: stmt.name.name.clone(),
            source_name: stmt.name.name.clone(),
            target: target.clone(),
            scope: self.current,
            declared_at: stmt.span.end,
            site: stmt.name.span,
            ty: ty.clone(),
            origin: BindingOrigin::Declaration,
            loops: Vec::new(),
        };
        let Some(id) = self.install(binding) else {
            return;
        };
        self.decls.insert(stmt.name.span, id);
        let kind = match stmt.value {
            Expr::Function(_) => ExportKind::Function,
            _ => ExportKind::Constant,
        };
        let entry = ExportEntry {
            name: stmt.name.name.clone(),
            target,
            kind,
            span: stmt.name.span,
            ty,
            reexport: false,
        };
        if let Err(err) = self.session.exports_mut(self.module).insert(entry) {
            self.errors.push(err);
        }
    }

    /// Binds every name in `expr` and returns its static type. `receiver` is
    /// the type flowing in from a previous pipeline stage.
    pub(super) fn resolve_expr(&mut self, expr: &Expr, receiver: Option<&Type>) -> Type {
        if let (Some(_), Some(stage)) = (receiver, expr.receiver_rejection()) {
            self.errors.push(ResolveError::StageRejectsReceiver {
                stage: stage.to_string(),
                span: expr.span(),
            });
        }
        match expr {
            Expr::Identifier(ident) => match self.resolve_name(ident) {
                Some((target, ty)) if receiver.is_some() => {
                    self.check_host_call(&target, 1, &[], ident.span);
                    ty.return_type()
                }
                Some((_, ty)) => ty,
                None => Type::Any,
            },
            Expr::Path(path) => match self.resolve_path(path) {
                Some((target, ty)) if receiver.is_some() => {
                    self.check_host_call(&target, 1, &[], path.span);
                    ty.return_type()
                }
                Some((_, ty)) => ty,
                None => Type::Any,
            },
            Expr::Literal(Literal::Number(..)) => Type::Number,
            Expr::Literal(Literal::String(..)) => Type::String,
            Expr::Literal(Literal::Bool(..)) => Type::Bool,
            Expr::Array(items, _) => {
                let element = items
                    .iter()
                    .map(|item| self.resolve_expr(item, None))
                    .reduce(|a, b| a.join(&b))
                    .unwrap_or(Type::Any);
                Type::array_of(element)
            }
            Expr::Range(range) => {
                self.resolve_expr(&range.start, None);
                self.resolve_expr(&range.end, None);
                Type::array_of(Type::Number)
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let left = self.resolve_expr(left, None);
                let right = self.resolve_expr(right, None);
                binary_type(*op, &left, &right)
            }
            Expr::Unary { op, expr, .. } => {
                self.resolve_expr(expr, None);
                match op {
                    UnaryOp::Neg => Type::Number,
                    UnaryOp::Not => Type::Bool,
                }
            }
            Expr::Call(call) => self.resolve_call(call, receiver.is_some()),
            Expr::Index { base, index, .. } => {
                let base = self.resolve_expr(base, None);
                self.resolve_expr(index, None);
                base.element()
            }
            Expr::Function(func) => self.resolve_function(func),
            Expr::Block(block) => self.resolve_block(block, receiver),
            Expr::If(expr) => self.resolve_if(expr, receiver),
            Expr::Pipeline(pipeline) => self.resolve_pipeline(pipeline, receiver),
            Expr::For(expr) => self.resolve_for(expr, receiver),
        }
    }

    /// Resolves `a::b::c`: the head is a scoped name, every further segment
    /// is looked up in the export table of the module before it.
    fn resolve_path(&mut self, path: &PathExpr) -> Option<(Target, Type)> {
        let head = &path.segments[0];
        let (mut target, mut ty) = match self
            .scopes
            .lookup(self.current, &head.name, head.span.start)
        {
            Lookup::NotFound => {
                let joined = path
                    .segments
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect::<Vec<_>>()
                    .join("::");
                if let Some(found) = self.resolve_host(&joined, path.span) {
                    return Some(found);
                }
                self.unresolved
                    .push((head.name.clone(), head.span, self.current));
                return None;
            }
            _ => self.resolve_name(head)?,
        };

        let mut previous = head;
        for segment in &path.segments[1..] {
            let Target::Module(module) = target else {
                self.errors.push(ResolveError::NotAModule {
                    name: previous.name.clone(),
                    span: previous.span,
                });
                return None;
            };
            let record = self.session.module(module);
            match record.exports().get(&segment.name) {
                Some(entry) => {
                    target = entry.target.clone();
                    ty = entry.ty.clone();
                }
                None => {
                    let err = ResolveError::UnknownExport {
                        name: segment.name.clone(),
                        module: record.path().to_string(),
                        span: segment.span,
                        partial: record.status() == crate::project::LoadStatus::Loading,
                    };
                    self.errors.push(err);
                    return None;
                }
            }
            previous = segment;
        }
        self.record(path.span, target.clone(), ty.clone());
        Some((target, ty))
    }

    fn resolve_call(&mut self, call: &CallExpr, has_receiver: bool) -> Type {
        let callee = match call.callee.as_ref() {
            Expr::Identifier(ident) => self.resolve_name(ident),
            Expr::Path(path) => self.resolve_path(path),
            other => {
                let ty = self.resolve_expr(other, None);
                Some((Target::Invalid, ty))
            }
        };
        for arg in &call.args {
            self.resolve_expr(&arg.value, None);
        }
        let Some((target, ty)) = callee else {
            return Type::Any;
        };
        let keywords: Vec<&Identifier> =
            call.args.iter().filter_map(|a| a.name.as_ref()).collect();
        let positional = call.positional_count() + usize::from(has_receiver);
        self.check_host_call(&target, positional, &keywords, call.span);
        ty.return_type()
    }

    /// Checks a call of a host function against its registered signature.
    fn check_host_call(
        &mut self,
        target: &Target,
        positional: usize,
        keywords: &[&Identifier],
        span: Span,
    ) {
        let Target::Host(name) = target else {
            return;
        };
        let Some(signature) = self.session.hosts().signature(name) else {
            return;
        };
        let params = &signature.params;
        if positional > params.len() {
            self.errors.push(ResolveError::ArityMismatch {
                callee: name.clone(),
                expected: params.len(),
                found: positional,
                span,
            });
            return;
        }
        let mut errors = Vec::new();
        for (index, keyword) in keywords.iter().enumerate() {
            let Some(slot) = params.iter().position(|p| p.name == keyword.name) else {
                errors.push(ResolveError::UnknownParameter {
                    callee: name.clone(),
                    name: keyword.name.clone(),
                    span: keyword.span,
                });
                continue;
            };
            let repeated = keywords[..index].iter().any(|k| k.name == keyword.name);
            if slot < positional || repeated {
                errors.push(ResolveError::DuplicateArgument {
                    callee: name.clone(),
                    name: keyword.name.clone(),
                    span: keyword.span,
                });
            }
        }
        let missing = params.iter().enumerate().any(|(index, param)| {
            index >= positional
                && param.default.is_none()
                && !keywords.iter().any(|k| k.name == param.name)
        });
        if missing && errors.is_empty() {
            errors.push(ResolveError::ArityMismatch {
                callee: name.clone(),
                expected: params.iter().filter(|p| p.default.is_none()).count(),
                found: positional + keywords.len(),
                span,
            });
        }
        self.errors.extend(errors);
    }

    fn resolve_function(&mut self, func: &FunctionExpr) -> Type {
        let body = self.in_scope(ScopeKind::Function, func.span, |this, _| {
            for param in &func.params {
                if let Some(default) = &param.default {
                    this.resolve_expr(default, None);
                }
                let ty = param
                    .ty
                    .as_ref()
                    .map(|annotation| annotation.ty.clone())
                    .unwrap_or(Type::Any);
                this.declare_local(&param.name, param.span.end, ty, BindingOrigin::Parameter);
            }
            this.resolve_expr(&func.body, None)
        });
        let returns = func
            .returns
            .as_ref()
            .map(|annotation| annotation.ty.clone())
            .unwrap_or(body);
        Type::function_returning(returns)
    }

    /// The receiver, if any, only reaches the block's final expression.
    fn resolve_block(&mut self, block: &Block, receiver: Option<&Type>) -> Type {
        let has_tail = matches!(block.statements.last(), Some(Statement::Expr(_)));
        if receiver.is_some() && !has_tail {
            self.errors.push(ResolveError::StageRejectsReceiver {
                stage: "block without a final expression".to_string(),
                span: block.span,
            });
        }
        self.in_scope(ScopeKind::Block, block.span, |this, _| {
            let last = block.statements.len().saturating_sub(1);
            let mut ty = Type::Unit;
            for (index, statement) in block.statements.iter().enumerate() {
                ty = match statement {
                    Statement::Expr(stmt) if index == last => {
                        this.resolve_expr(&stmt.expr, receiver)
                    }
                    other => {
                        this.resolve_statement(other, false);
                        Type::Unit
                    }
                };
            }
            ty
        })
    }

    fn resolve_if(&mut self, expr: &IfExpr, receiver: Option<&Type>) -> Type {
        self.resolve_expr(&expr.condition, None);
        let then_ty = self.resolve_block(&expr.then_branch, receiver);
        let else_ty = match &expr.else_branch {
            Some(ElseBranch::Block(block)) => self.resolve_block(block, receiver),
            Some(ElseBranch::If(nested)) => self.resolve_if(nested, receiver),
            None => receiver.cloned().unwrap_or(Type::Unit),
        };
        then_ty.join(&else_ty)
    }

    pub(super) fn resolve_pipeline(
        &mut self,
        pipeline: &Pipeline,
        receiver: Option<&Type>,
    ) -> Type {
        let mut incoming = receiver.cloned();
        for stage in &pipeline.stages {
            let ty = match &stage.kind {
                StageKind::Operator { op, operand } => {
                    let right = self.resolve_expr(operand, None);
                    let left = incoming.clone().unwrap_or(Type::Any);
                    binary_type(*op, &left, &right)
                }
                StageKind::Expr(expr) => self.resolve_expr(expr, incoming.as_ref()),
            };
            if let Some(tag) = &stage.tag {
                self.declare_tag(tag, stage.span.end, ty.clone());
            }
            incoming = Some(ty);
        }
        incoming.unwrap_or(Type::Unit)
    }

    /// Map mode without a receiver, fold mode with one.
    fn resolve_for(&mut self, expr: &ForExpr, receiver: Option<&Type>) -> Type {
        let sequence = self.resolve_expr(&expr.sequence, None);
        let range = Span::new(expr.binding.span.start, expr.span.end);
        let body = self.in_scope(ScopeKind::LoopBody, range, |this, scope| {
            this.loop_spans.insert(scope, expr.span);
            this.declare_local(
                &expr.binding,
                expr.binding.span.end,
                sequence.element(),
                BindingOrigin::LoopVariable,
            );
            this.resolve_pipeline(&expr.body, receiver)
        });
        match receiver {
            Some(seed) => body.join(seed),
            None => Type::array_of(body),
        }
    }
}

fn binary_type(op: BinaryOp, left: &Type, right: &Type) -> Type {
    match op {
        BinaryOp::Add if *left == Type::String && *right == Type::String => Type::String,
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            Type::Number
        }
        _ => Type::Bool,
    }
}

#[cfg(test)]
mod tests {
    use crate::language::types::Type;
    use crate::project::{MemorySources, Session};
    use crate::resolve::{Lookup, ResolveError, ScopeErrorKind, Target};

    fn resolve(source: &str) -> Session {
        let sources = MemorySources::new().with("main.kcl", source);
        let mut session = Session::in_memory(sources);
        session.load("main.kcl").expect("load");
        session
    }

    fn errors(session: &Session) -> Vec<ResolveError> {
        let id = session.lookup("main.kcl").expect("module");
        session.module(id).errors().to_vec()
    }

    #[test]
    fn constants_are_visible_after_declaration() {
        let session = resolve("a = 1\nb = a + 1\n");
        assert!(errors(&session).is_empty());
    }

    #[test]
    fn use_before_declaration_is_a_scope_error() {
        let session = resolve("b = a + 1\na = 1\n");
        let errs = errors(&session);
        assert!(matches!(
            &errs[..],
            [ResolveError::Scope {
                kind: ScopeErrorKind::NotYetDeclared { .. },
                ..
            }]
        ));
    }

    #[test]
    fn block_bindings_do_not_leak() {
        let session = resolve("x = {\n  inner = 2\n  inner\n}\ny = inner\n");
        let errs = errors(&session);
        assert!(matches!(
            &errs[..],
            [ResolveError::Scope {
                kind: ScopeErrorKind::NotInScope,
                ..
            }]
        ));
    }

    #[test]
    fn nested_export_is_rejected() {
        let session = resolve("x = {\n  export y = 1\n  y\n}\n");
        assert!(matches!(&errors(&session)[..], [ResolveError::NestedExport { .. }]));
    }

    #[test]
    fn redeclaration_in_one_scope_collides() {
        let session = resolve("a = 1\na = 2\n");
        assert!(matches!(&errors(&session)[..], [ResolveError::NameCollision { .. }]));
    }

    #[test]
    fn host_calls_are_arity_checked_with_receiver() {
        let ok = resolve("x = 4 |> sqrt()\n");
        assert!(errors(&ok).is_empty());

        let too_many = resolve("x = 4 |> sqrt(2)\n");
        assert!(matches!(
            &errors(&too_many)[..],
            [ResolveError::ArityMismatch {
                expected: 1,
                found: 2,
                ..
            }]
        ));

        let keyword = resolve("x = max(1, c = 2)\n");
        assert!(errors(&keyword)
            .iter()
            .any(|e| matches!(e, ResolveError::UnknownParameter { name, .. } if name == "c")));
    }

    #[test]
    fn host_keyword_cannot_refill_a_positional_slot() {
        let session = resolve("x = max(1, 2, a = 3)\n");
        assert!(matches!(
            &errors(&session)[..],
            [ResolveError::DuplicateArgument { name, .. }] if name == "a"
        ));

        let piped = resolve("x = 1 |> max(a = 3, b = 2)\n");
        assert!(matches!(
            &errors(&piped)[..],
            [ResolveError::DuplicateArgument { name, .. }] if name == "a"
        ));
    }

    #[test]
    fn lookup_at_answers_after_resolution() {
        let source = "a = 1\nf = (a) => a * 2\n";
        let session = resolve(source);
        let id = session.lookup("main.kcl").expect("module");
        let resolved = session.module(id).resolved().expect("resolved");

        let inside = source.find("a * 2").expect("offset");
        let Lookup::Found(param) = resolved.lookup_at("a", inside) else {
            panic!("parameter not found");
        };
        let Lookup::Found(outer) = resolved.lookup_at("a", source.len()) else {
            panic!("constant not found");
        };
        assert_ne!(param, outer);
        assert!(matches!(resolved.binding(param).target, Target::Local(_)));
    }

    #[test]
    fn function_types_flow_to_calls() {
        let source = "double = (x: Number) -> Number => x * 2\ny = double(2)\nz = y\n";
        let session = resolve(source);
        let id = session.lookup("main.kcl").expect("module");
        let resolved = session.module(id).resolved().expect("resolved");
        let z = resolved.top_level("z").expect("z");
        assert_eq!(z.ty, Type::Number);
    }
}
