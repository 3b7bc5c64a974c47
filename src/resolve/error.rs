use crate::language::{errors::SyntaxError, span::Span};
use crate::project::LoadError;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeErrorKind {
    /// Declared later in the same or an enclosing scope.
    NotYetDeclared { declared: Span },
    NotInScope,
}

/// Static error found while loading or binding one module.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{message}")]
    Parse {
        message: String,
        span: Span,
        help: Option<String>,
    },
    #[error("module `{path}` not found")]
    ModuleNotFound { path: String, span: Span },
    #[error("invalid import path `{path}`: {reason}")]
    InvalidPath {
        path: String,
        reason: String,
        span: Span,
    },
    #[error("no project resolver for `{project}`")]
    ExternalProject {
        path: String,
        project: String,
        span: Span,
    },
    #[error("failed to read `{path}`: {message}")]
    Unreadable {
        path: String,
        message: String,
        span: Span,
    },
    #[error("module `{path}` has errors")]
    DependencyFailed { path: String, span: Span },
    #[error("`{name}` is not exported by `{module}`")]
    UnknownExport {
        name: String,
        module: String,
        span: Span,
        /// The module was still loading, i.e. reached through an import cycle.
        partial: bool,
    },
    #[error("`{name}` is already bound to something else in this scope")]
    NameCollision { name: String, span: Span, first: Span },
    #[error("`{name}` is exported more than once")]
    DuplicateExport { name: String, span: Span, first: Span },
    #[error("{}", scope_message(.name, .kind))]
    Scope {
        name: String,
        kind: ScopeErrorKind,
        span: Span,
    },
    #[error("`{path}` needs an alias because `{stem}` is not an identifier")]
    AliasRequired {
        path: String,
        stem: String,
        span: Span,
    },
    #[error("`export` is only allowed at the top level of a file")]
    NestedExport { span: Span },
    #[error("`{name}` is not a module")]
    NotAModule { name: String, span: Span },
    #[error("`{callee}` expects {expected} argument(s) but receives {found}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("`{callee}` has no parameter named `{name}`")]
    UnknownParameter {
        callee: String,
        name: String,
        span: Span,
    },
    #[error("argument `{name}` of `{callee}` is supplied more than once")]
    DuplicateArgument {
        callee: String,
        name: String,
        span: Span,
    },
    #[error("pipeline stage ({stage}) cannot take a receiver")]
    StageRejectsReceiver { stage: String, span: Span },
}

fn scope_message(name: &str, kind: &ScopeErrorKind) -> String {
    match kind {
        ScopeErrorKind::NotYetDeclared { .. } => format!("`{name}` is used before it is declared"),
        ScopeErrorKind::NotInScope => format!("`{name}` is not in scope"),
    }
}

impl ResolveError {
    pub fn from_syntax(err: SyntaxError) -> Self {
        ResolveError::Parse {
            message: err.message,
            span: err.span,
            help: err.help,
        }
    }

    /// Attach a failed load to the import statement that requested it.
    pub fn from_load(err: LoadError, span: Span) -> Self {
        match err {
            LoadError::InvalidPath { path, source } => ResolveError::InvalidPath {
                path,
                reason: source.reason,
                span,
            },
            LoadError::ModuleNotFound { path } => ResolveError::ModuleNotFound { path, span },
            LoadError::ExternalProject { path, project } => {
                ResolveError::ExternalProject { path, project, span }
            }
            LoadError::Io { path, source } => ResolveError::Unreadable {
                path,
                message: source.to_string(),
                span,
            },
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ResolveError::Parse { span, .. }
            | ResolveError::ModuleNotFound { span, .. }
            | ResolveError::InvalidPath { span, .. }
            | ResolveError::ExternalProject { span, .. }
            | ResolveError::Unreadable { span, .. }
            | ResolveError::DependencyFailed { span, .. }
            | ResolveError::UnknownExport { span, .. }
            | ResolveError::NameCollision { span, .. }
            | ResolveError::DuplicateExport { span, .. }
            | ResolveError::Scope { span, .. }
            | ResolveError::AliasRequired { span, .. }
            | ResolveError::NestedExport { span }
            | ResolveError::NotAModule { span, .. }
            | ResolveError::ArityMismatch { span, .. }
            | ResolveError::UnknownParameter { span, .. }
            | ResolveError::DuplicateArgument { span, .. }
            | ResolveError::StageRejectsReceiver { span, .. } => *span,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolveError::Parse { .. } => "here",
            ResolveError::ModuleNotFound { .. }
            | ResolveError::InvalidPath { .. }
            | ResolveError::ExternalProject { .. }
            | ResolveError::Unreadable { .. }
            | ResolveError::DependencyFailed { .. } => "imported here",
            ResolveError::UnknownExport { .. } => "requested here",
            ResolveError::NameCollision { .. } => "second binding",
            ResolveError::DuplicateExport { .. } => "exported again here",
            ResolveError::Scope { .. } => "used here",
            ResolveError::AliasRequired { .. } => "add `as <name>`",
            ResolveError::NestedExport { .. } => "inside a block",
            ResolveError::NotAModule { .. } => "expected a module",
            ResolveError::ArityMismatch { .. }
            | ResolveError::UnknownParameter { .. }
            | ResolveError::DuplicateArgument { .. } => "in this call",
            ResolveError::StageRejectsReceiver { .. } => "receives the previous stage",
        }
    }

    /// Related site shown next to the primary label.
    pub fn secondary(&self) -> Option<(Span, &'static str)> {
        match self {
            ResolveError::NameCollision { first, .. } => Some((*first, "first bound here")),
            ResolveError::DuplicateExport { first, .. } => Some((*first, "first exported here")),
            ResolveError::Scope {
                kind: ScopeErrorKind::NotYetDeclared { declared },
                ..
            } => Some((*declared, "declared here")),
            _ => None,
        }
    }

    pub fn help(&self) -> Option<String> {
        match self {
            ResolveError::Parse { help, .. } => help.clone(),
            ResolveError::UnknownExport {
                partial: true,
                module,
                ..
            } => Some(format!(
                "`{module}` is part of an import cycle; \
                 only names it exports before the cyclic import are visible"
            )),
            ResolveError::UnknownExport { .. } => {
                Some("mark the declaration with `export`".to_string())
            }
            ResolveError::NameCollision { .. } => {
                Some("rename one of the bindings with `as`".to_string())
            }
            ResolveError::Scope {
                kind: ScopeErrorKind::NotYetDeclared { .. },
                ..
            } => Some("names are only visible after their declaration".to_string()),
            ResolveError::InvalidPath { .. } => {
                Some("import paths are relative to the project root".to_string())
            }
            ResolveError::ExternalProject { .. } => {
                Some("map the project in the `[external]` table of kcl.toml".to_string())
            }
            ResolveError::AliasRequired { .. } => {
                Some("write `import \"...\" as name`".to_string())
            }
            ResolveError::StageRejectsReceiver { .. } => {
                Some("only calls, function names and blocks take a receiver".to_string())
            }
            _ => None,
        }
    }
}
