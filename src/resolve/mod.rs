//! Name binding for one module.
//!
//! Resolution runs while the module is `Loading`: import statements pull
//! their targets through the session (recursively resolving them), and every
//! `export` is published to the session as soon as it is declared, which is
//! what a cyclic importer observes.

mod error;
mod exports;
mod exprs;
mod imports;
mod scope;

pub use error::{ResolveError, ScopeErrorKind};
pub use exports::{ExportEntry, ExportKind, ExportTable};
pub use scope::{
    Binding, BindingId, BindingOrigin, Lookup, Scope, ScopeId, ScopeKind, ScopeTable,
};

use crate::language::{
    ast::{self, Identifier},
    span::Span,
    types::Type,
};
use crate::project::{GlobCollisions, ModuleId, Session};
use std::collections::HashMap;
use tracing::{debug, trace};

/// What a name resolves to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// A module, usable with `::` or as an assembly value.
    Module(ModuleId),
    /// A top-level exported constant or function.
    Item { module: ModuleId, name: String },
    /// A binding private to one module: non-exported constants, parameters,
    /// loop variables and tags.
    Local(BindingId),
    Host(String),
    /// Placeholder for a name whose import failed. Never evaluated.
    Invalid,
}

impl Target {
    /// Two targets denote the same item. `Invalid` agrees with everything so a
    /// failed import does not cascade into collisions.
    pub fn same_item(&self, other: &Target) -> bool {
        matches!(self, Target::Invalid) || matches!(other, Target::Invalid) || self == other
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub target: Target,
    /// Type at the use site; loop tags referenced after their loop are sequences.
    pub ty: Type,
}

/// Resolution results for one module.
#[derive(Clone, Debug, Default)]
pub struct ResolvedModule {
    pub scopes: ScopeTable,
    /// Identifier or path use site to what it denotes.
    pub references: HashMap<Span, Reference>,
    /// Declaring identifier (constant, parameter, loop variable, tag) to binding.
    pub decls: HashMap<Span, BindingId>,
    /// Import statement to the module it loaded.
    pub import_targets: HashMap<Span, ModuleId>,
    /// `for` expression to the tags aggregated when it finishes.
    pub loop_tags: HashMap<Span, Vec<BindingId>>,
}

impl ResolvedModule {
    pub fn reference(&self, span: Span) -> Option<&Reference> {
        self.references.get(&span)
    }

    pub fn declaration(&self, span: Span) -> Option<BindingId> {
        self.decls.get(&span).copied()
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        self.scopes.binding(id)
    }

    /// What `name` means at `offset`.
    pub fn lookup_at(&self, name: &str, offset: usize) -> Lookup {
        self.scopes.lookup(self.scopes.scope_at(offset), name, offset)
    }

    /// Top-level binding of `name` after the whole file.
    pub fn top_level(&self, name: &str) -> Option<&Binding> {
        match self.scopes.lookup(self.scopes.root(), name, usize::MAX) {
            Lookup::Found(id) => Some(self.scopes.binding(id)),
            _ => None,
        }
    }
}

pub(crate) fn resolve_module(
    session: &mut Session,
    module: ModuleId,
    ast: &ast::Module,
) -> (ResolvedModule, Vec<ResolveError>) {
    let policy = session.config().glob_collisions;
    let scopes = ScopeTable::new(ast.span);
    let current = scopes.root();
    let resolver = Resolver {
        session,
        module,
        scopes,
        current,
        references: HashMap::new(),
        decls: HashMap::new(),
        import_targets: HashMap::new(),
        loop_tags: HashMap::new(),
        loop_spans: HashMap::new(),
        unresolved: Vec::new(),
        errors: Vec::new(),
        policy,
    };
    resolver.resolve(ast)
}

struct Resolver<'s> {
    session: &'s mut Session,
    module: ModuleId,
    scopes: ScopeTable,
    current: ScopeId,
    references: HashMap<Span, Reference>,
    decls: HashMap<Span, BindingId>,
    import_targets: HashMap<Span, ModuleId>,
    loop_tags: HashMap<Span, Vec<BindingId>>,
    loop_spans: HashMap<ScopeId, Span>,
    /// Names not found at their use site, with the scope they were used in.
    unresolved: Vec<(String, Span, ScopeId)>,
    errors: Vec<ResolveError>,
    policy: GlobCollisions,
}

impl<'s> Resolver<'s> {
    fn resolve(mut self, ast: &ast::Module) -> (ResolvedModule, Vec<ResolveError>) {
        debug!(module = %ast.path, statements = ast.statements.len(), "resolving module");
        for statement in &ast.statements {
            self.resolve_statement(statement, true);
        }
        if let Some(expr) = ast.assembly_expr() {
            self.session.exports_mut(self.module).set_assembly(expr.span());
        }
        self.report_unresolved();
        debug!(
            module = %ast.path,
            bindings = self.scopes.bindings().count(),
            errors = self.errors.len(),
            "resolved module"
        );
        let resolved = ResolvedModule {
            scopes: self.scopes,
            references: self.references,
            decls: self.decls,
            import_targets: self.import_targets,
            loop_tags: self.loop_tags,
        };
        (resolved, self.errors)
    }

    fn in_scope<T>(
        &mut self,
        kind: ScopeKind,
        range: Span,
        f: impl FnOnce(&mut Self, ScopeId) -> T,
    ) -> T {
        let previous = self.current;
        let scope = self.scopes.push_scope(Some(previous), kind, range);
        self.current = scope;
        let result = f(self, scope);
        self.current = previous;
        result
    }

    /// Adds `binding` to its scope unless it collides with a binding for a
    /// different item there.
    fn install(&mut self, binding: Binding) -> Option<BindingId> {
        for existing in self.scopes.bindings_named(binding.scope, &binding.name) {
            let other = self.scopes.binding(*existing);
            if other.target.same_item(&binding.target) {
                continue;
            }
            let involves_glob = other.origin == BindingOrigin::GlobImport
                || binding.origin == BindingOrigin::GlobImport;
            if involves_glob && self.policy == GlobCollisions::OnUse {
                trace!(name = %binding.name, "deferring glob collision to first use");
                continue;
            }
            self.errors.push(ResolveError::NameCollision {
                name: binding.name.clone(),
                span: binding.site,
                first: other.site,
            });
            return None;
        }
        Some(self.scopes.insert(binding))
    }

    /// Declares a module-private binding in the current scope.
    fn declare_local(
        &mut self,
        ident: &Identifier,
        declared_at: usize,
        ty: Type,
        origin: BindingOrigin,
    ) -> Option<BindingId> {
        let binding = Binding {
            name: ident.name.clone(),
            source_name: ident.name.clone(),
            target: Target::Local(self.scopes.next_id()),
            scope: self.current,
            declared_at,
            site: ident.span,
            ty,
            origin,
            loops: Vec::new(),
        };
        let id = self.install(binding)?;
        self.decls.insert(ident.span, id);
        Some(id)
    }

    /// Binds a pipeline tag into the nearest enclosing block, remembering the
    /// loops it crosses.
    fn declare_tag(&mut self, tag: &Identifier, declared_at: usize, ty: Type) {
        let (home, loops) = self.scopes.tag_home(self.current);
        let binding = Binding {
            name: tag.name.clone(),
            source_name: tag.name.clone(),
            target: Target::Local(self.scopes.next_id()),
            scope: home,
            declared_at,
            site: tag.span,
            ty,
            origin: BindingOrigin::Tag,
            loops: loops.clone(),
        };
        let Some(id) = self.install(binding) else {
            return;
        };
        self.decls.insert(tag.span, id);
        for loop_scope in loops {
            if let Some(for_span) = self.loop_spans.get(&loop_scope) {
                self.loop_tags.entry(*for_span).or_default().push(id);
            }
        }
    }

    fn record(&mut self, span: Span, target: Target, ty: Type) {
        self.references.insert(span, Reference { target, ty });
    }

    /// Resolves a single-segment name at its use site.
    fn resolve_name(&mut self, ident: &Identifier) -> Option<(Target, Type)> {
        match self
            .scopes
            .lookup(self.current, &ident.name, ident.span.start)
        {
            Lookup::Found(id) => {
                let target = self.scopes.binding(id).target.clone();
                if target == Target::Invalid {
                    return None;
                }
                let ty = self.scopes.type_at(id, self.current);
                self.record(ident.span, target.clone(), ty.clone());
                Some((target, ty))
            }
            Lookup::Ambiguous(ids) => {
                let first = self.scopes.binding(ids[0]).site;
                self.errors.push(ResolveError::NameCollision {
                    name: ident.name.clone(),
                    span: ident.span,
                    first,
                });
                None
            }
            Lookup::NotYetDeclared(id) => {
                let declared = self.scopes.binding(id).site;
                self.errors.push(ResolveError::Scope {
                    name: ident.name.clone(),
                    kind: ScopeErrorKind::NotYetDeclared { declared },
                    span: ident.span,
                });
                None
            }
            Lookup::NotFound => self.resolve_host(&ident.name, ident.span).or_else(|| {
                self.unresolved
                    .push((ident.name.clone(), ident.span, self.current));
                None
            }),
        }
    }

    /// A name missing at its use site may still be declared later in an
    /// enclosing scope. Only once every scope is complete can the two cases
    /// be told apart.
    fn report_unresolved(&mut self) {
        for (name, span, scope) in std::mem::take(&mut self.unresolved) {
            let kind = match self.scopes.lookup(scope, &name, usize::MAX) {
                Lookup::Found(id) => ScopeErrorKind::NotYetDeclared {
                    declared: self.scopes.binding(id).site,
                },
                Lookup::Ambiguous(ids) => ScopeErrorKind::NotYetDeclared {
                    declared: self.scopes.binding(ids[0]).site,
                },
                Lookup::NotYetDeclared(_) | Lookup::NotFound => ScopeErrorKind::NotInScope,
            };
            self.errors.push(ResolveError::Scope { name, kind, span });
        }
    }

    fn resolve_host(&mut self, name: &str, span: Span) -> Option<(Target, Type)> {
        let returns = self.session.hosts().signature(name)?.returns.clone();
        let target = Target::Host(name.to_string());
        let ty = Type::function_returning(returns);
        self.record(span, target.clone(), ty.clone());
        Some((target, ty))
    }
}
