//! Arena of lexical scopes.
//!
//! Scopes form a tree through index-based parent links. Every binding records
//! the offset from which it is visible, so a single table answers lookups for
//! any position in the file after resolution has finished.

use crate::language::{span::Span, types::Type};
use crate::resolve::Target;
use indexmap::IndexMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Block,
    /// One iteration of a `for` body; holds the loop variable.
    LoopBody,
}

#[derive(Clone, Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    pub range: Span,
    names: IndexMap<String, Vec<BindingId>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingOrigin {
    Declaration,
    Parameter,
    LoopVariable,
    Tag,
    Import,
    GlobImport,
}

#[derive(Clone, Debug)]
pub struct Binding {
    /// Local, possibly renamed, name.
    pub name: String,
    /// Name at the target; differs from `name` for `import a as x`.
    pub source_name: String,
    pub target: Target,
    pub scope: ScopeId,
    /// Offset from which the binding is visible.
    pub declared_at: usize,
    pub site: Span,
    pub ty: Type,
    pub origin: BindingOrigin,
    /// Loop bodies between the declaring stage and `scope`, innermost first.
    /// Outside each of them the binding is seen as a sequence.
    pub loops: Vec<ScopeId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    Found(BindingId),
    /// Several visible bindings with different targets.
    Ambiguous(Vec<BindingId>),
    /// Only declared after the queried position.
    NotYetDeclared(BindingId),
    NotFound,
}

#[derive(Clone, Debug, Default)]
pub struct ScopeTable {
    scopes: Vec<Scope>,
    bindings: Vec<Binding>,
}

impl ScopeTable {
    pub fn new(range: Span) -> Self {
        let mut table = Self::default();
        table.push_scope(None, ScopeKind::Module, range);
        table
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn push_scope(&mut self, parent: Option<ScopeId>, kind: ScopeKind, range: Span) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            kind,
            range,
            names: IndexMap::new(),
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0]
    }

    pub fn bindings(&self) -> impl Iterator<Item = (BindingId, &Binding)> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(index, binding)| (BindingId(index), binding))
    }

    /// Bindings for `name` declared directly in `scope`.
    pub fn bindings_named(&self, scope: ScopeId, name: &str) -> &[BindingId] {
        self.scopes[scope.0]
            .names
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Id the next inserted binding will receive.
    pub fn next_id(&self) -> BindingId {
        BindingId(self.bindings.len())
    }

    pub fn insert(&mut self, binding: Binding) -> BindingId {
        let id = BindingId(self.bindings.len());
        self.scopes[binding.scope.0]
            .names
            .entry(binding.name.clone())
            .or_default()
            .push(id);
        self.bindings.push(binding);
        id
    }

    /// Walks from `scope` outward; the first scope with a binding of `name`
    /// visible at `at` decides the answer.
    pub fn lookup(&self, scope: ScopeId, name: &str, at: usize) -> Lookup {
        let mut current = Some(scope);
        let mut later = None;
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(ids) = scope.names.get(name) {
                let visible: Vec<BindingId> = ids
                    .iter()
                    .copied()
                    .filter(|b| self.bindings[b.0].declared_at <= at)
                    .collect();
                if let Some(&first) = visible.first() {
                    let target = &self.bindings[first.0].target;
                    if visible
                        .iter()
                        .all(|b| self.bindings[b.0].target.same_item(target))
                    {
                        return Lookup::Found(first);
                    }
                    return Lookup::Ambiguous(visible);
                }
                if later.is_none() {
                    later = ids.first().copied();
                }
            }
            current = scope.parent;
        }
        match later {
            Some(binding) => Lookup::NotYetDeclared(binding),
            None => Lookup::NotFound,
        }
    }

    /// Whether `scope` is `ancestor` or nested inside it.
    pub fn is_within(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.scopes[id.0].parent;
        }
        false
    }

    /// Nearest scope that is not a loop body, plus the loop bodies crossed on
    /// the way there.
    pub fn tag_home(&self, scope: ScopeId) -> (ScopeId, Vec<ScopeId>) {
        let mut loops = Vec::new();
        let mut current = scope;
        while self.scopes[current.0].kind == ScopeKind::LoopBody {
            loops.push(current);
            match self.scopes[current.0].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        (current, loops)
    }

    /// Type of `binding` as seen from `scope`: one sequence layer for every
    /// loop body the use site is outside of.
    pub fn type_at(&self, binding: BindingId, scope: ScopeId) -> Type {
        let binding = &self.bindings[binding.0];
        binding
            .loops
            .iter()
            .filter(|loop_scope| !self.is_within(scope, **loop_scope))
            .fold(binding.ty.clone(), |ty, _| Type::array_of(ty))
    }

    /// Innermost scope whose range contains `offset`.
    pub fn scope_at(&self, offset: usize) -> ScopeId {
        self.scopes
            .iter()
            .enumerate()
            .filter(|(_, scope)| scope.range.contains(offset))
            .max_by_key(|(index, _)| self.depth(ScopeId(*index)))
            .map(|(index, _)| ScopeId(index))
            .unwrap_or(ScopeId(0))
    }

    fn depth(&self, scope: ScopeId) -> usize {
        let mut depth = 0;
        let mut current = self.scopes[scope.0].parent;
        while let Some(id) = current {
            depth += 1;
            current = self.scopes[id.0].parent;
        }
        depth
    }
}
