use crate::language::{span::Span, types::Type};
use crate::resolve::{ResolveError, Target};
use indexmap::IndexMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Function,
    Constant,
    Module,
}

#[derive(Clone, Debug)]
pub struct ExportEntry {
    pub name: String,
    pub target: Target,
    pub kind: ExportKind,
    /// Declaration or `export import` site in the exporting module.
    pub span: Span,
    pub ty: Type,
    pub reexport: bool,
}

/// Externally visible names of one module, in declaration order.
///
/// Filled while the module is being resolved, so a module that is re-entered
/// through an import cycle exposes only what it had exported so far.
#[derive(Clone, Debug, Default)]
pub struct ExportTable {
    entries: IndexMap<String, ExportEntry>,
    assembly: Option<Span>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ExportEntry) -> Result<(), ResolveError> {
        if let Some(existing) = self.entries.get(&entry.name) {
            return Err(ResolveError::DuplicateExport {
                name: entry.name,
                span: entry.span,
                first: existing.span,
            });
        }
        self.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ExportEntry> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExportEntry> {
        self.entries.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn assembly(&self) -> Option<Span> {
        self.assembly
    }

    pub(crate) fn set_assembly(&mut self, span: Span) {
        self.assembly = Some(span);
    }
}
