use super::*;
use crate::language::ast::{ImportItem, ImportItems, ImportStmt};
use crate::project::{LoadStatus, ModulePath};
use std::collections::HashSet;

/// A binding produced by one import item, before installation.
struct Imported {
    name: String,
    source_name: String,
    target: Target,
    kind: ExportKind,
    ty: Type,
    site: Span,
    origin: BindingOrigin,
}

impl<'s> Resolver<'s> {
    pub(super) fn resolve_import(&mut self, stmt: &ImportStmt, top_level: bool) {
        if stmt.exported && !top_level {
            self.errors
                .push(ResolveError::NestedExport { span: stmt.span });
        }

        let target = match self.session.load(&stmt.path) {
            Ok(id) => id,
            Err(err) => {
                self.errors
                    .push(ResolveError::from_load(err, stmt.path_span));
                self.poison(stmt);
                return;
            }
        };
        self.import_targets.insert(stmt.span, target);

        let record = self.session.module(target);
        let path = record.path().clone();
        let partial = record.status() == LoadStatus::Loading;
        if !partial && !record.errors().is_empty() {
            self.errors.push(ResolveError::DependencyFailed {
                path: path.to_string(),
                span: stmt.path_span,
            });
            self.poison(stmt);
            return;
        }
        self.session
            .record_import(self.module, target, stmt.path_span);
        trace!(
            importer = ?self.module,
            module = %path,
            partial,
            "installing import"
        );

        let mut imported = Vec::new();
        match &stmt.items {
            ImportItems::Module { alias } => {
                let site = stmt.path_span;
                if let Some(item) = self.module_item(target, &path, alias.as_ref(), site) {
                    imported.push(item);
                }
            }
            ImportItems::List(items) => {
                let claimed: HashSet<&str> = items
                    .iter()
                    .filter_map(|item| match item {
                        ImportItem::Name { name, .. } => Some(name.name.as_str()),
                        _ => None,
                    })
                    .collect();
                for item in items {
                    match item {
                        ImportItem::Name { name, alias } => {
                            let local = alias.as_ref().unwrap_or(name);
                            match self.session.module(target).exports().get(&name.name) {
                                Some(entry) => imported.push(Imported {
                                    name: local.name.clone(),
                                    source_name: name.name.clone(),
                                    target: entry.target.clone(),
                                    kind: entry.kind,
                                    ty: entry.ty.clone(),
                                    site: local.span,
                                    origin: BindingOrigin::Import,
                                }),
                                None => {
                                    self.errors.push(ResolveError::UnknownExport {
                                        name: name.name.clone(),
                                        module: path.to_string(),
                                        span: name.span,
                                        partial,
                                    });
                                    self.install_invalid(local, stmt.span.end);
                                }
                            }
                        }
                        ImportItem::SelfModule { span, alias } => {
                            let item = self.module_item(target, &path, alias.as_ref(), *span);
                            imported.extend(item);
                        }
                        ImportItem::Glob(span) => {
                            // Whatever the target has exported so far; a module
                            // still loading does not grow this list later.
                            let entries: Vec<ExportEntry> = self
                                .session
                                .module(target)
                                .exports()
                                .iter()
                                .filter(|entry| !claimed.contains(entry.name.as_str()))
                                .cloned()
                                .collect();
                            imported.extend(entries.into_iter().map(|entry| Imported {
                                name: entry.name.clone(),
                                source_name: entry.name,
                                target: entry.target,
                                kind: entry.kind,
                                ty: entry.ty,
                                site: *span,
                                origin: BindingOrigin::GlobImport,
                            }));
                        }
                    }
                }
            }
        }

        for item in imported {
            self.install_import(item, stmt, top_level);
        }
    }

    fn module_item(
        &mut self,
        target: ModuleId,
        path: &ModulePath,
        alias: Option<&Identifier>,
        site: Span,
    ) -> Option<Imported> {
        let (name, site) = match alias {
            Some(alias) => (alias.name.clone(), alias.span),
            None => match path.binding_name() {
                Some(name) => (name.to_string(), site),
                None => {
                    self.errors.push(ResolveError::AliasRequired {
                        path: path.to_string(),
                        stem: path.stem().to_string(),
                        span: site,
                    });
                    return None;
                }
            },
        };
        Some(Imported {
            name,
            source_name: path.stem().to_string(),
            target: Target::Module(target),
            kind: ExportKind::Module,
            ty: Type::Module,
            site,
            origin: BindingOrigin::Import,
        })
    }

    fn install_import(&mut self, item: Imported, stmt: &ImportStmt, top_level: bool) {
        let binding = Binding {
            name: item.name.clone(),
            source_name: item.source_name,
            target: item.target.clone(),
            scope: self.current,
            declared_at: stmt.span.end,
            site: item.site,
            ty: item.ty.clone(),
            origin: item.origin,
            loops: Vec::new(),
        };
        if self.install(binding).is_none() {
            return;
        }
        if stmt.exported && top_level {
            let entry = ExportEntry {
                name: item.name,
                target: item.target,
                kind: item.kind,
                span: item.site,
                ty: item.ty,
                reexport: true,
            };
            if let Err(err) = self.session.exports_mut(self.module).insert(entry) {
                self.errors.push(err);
            }
        }
    }

    /// Keeps the names a failed import would have bound, so their uses do
    /// not report a second error.
    fn poison(&mut self, stmt: &ImportStmt) {
        match &stmt.items {
            ImportItems::Module { alias } => {
                self.poison_module(stmt, alias.as_ref(), stmt.path_span)
            }
            ImportItems::List(items) => {
                for item in items {
                    match item {
                        ImportItem::Name { name, alias } => {
                            self.install_invalid(alias.as_ref().unwrap_or(name), stmt.span.end)
                        }
                        ImportItem::SelfModule { span, alias } => {
                            self.poison_module(stmt, alias.as_ref(), *span)
                        }
                        ImportItem::Glob(_) => {}
                    }
                }
            }
        }
    }

    /// The module name itself: the alias, or the path's stem when it is an
    /// identifier.
    fn poison_module(&mut self, stmt: &ImportStmt, alias: Option<&Identifier>, site: Span) {
        if let Some(alias) = alias {
            self.install_invalid(alias, stmt.span.end);
        } else if let Ok(path) = ModulePath::parse(&stmt.path) {
            if let Some(name) = path.binding_name() {
                let ident = Identifier {
                    name: name.to_string(),
                    span: site,
                };
                self.install_invalid(&ident, stmt.span.end);
            }
        }
    }

    fn install_invalid(&mut self, ident: &Identifier, declared_at: usize) {
        self.scopes.insert(Binding {
            name: ident.name.clone(),
            source_name: ident.name.clone(),
            target: Target::Invalid,
            scope: self.current,
            declared_at,
            site: ident.span,
            ty: Type::Any,
            origin: BindingOrigin::Import,
            loops: Vec::new(),
        });
    }
}
