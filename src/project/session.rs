use crate::language::{ast, parser::parse_module, span::Span};
use crate::project::{
    manifest::ProjectConfig,
    path::{ModulePath, PathError},
    sources::{
        DirectoryProjects, FsSources, LayeredSources, MemorySources, ProjectResolver,
        SourceProvider,
    },
};
use crate::resolve::{self, ExportTable, ResolveError, ResolvedModule};
use crate::runtime::host::HostRegistry;
use std::{collections::HashMap, fmt, io, rc::Rc};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    Unloaded,
    /// Imports are being resolved; re-entry means an import cycle.
    Loading,
    Loaded,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid module path `{path}`: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: PathError,
    },
    #[error("module `{path}` not found")]
    ModuleNotFound { path: String },
    #[error("no project resolver for `{project}` (needed by `{path}`)")]
    ExternalProject { path: String, project: String },
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub struct ModuleRecord {
    id: ModuleId,
    path: ModulePath,
    status: LoadStatus,
    source: Rc<str>,
    ast: Option<Rc<ast::Module>>,
    exports: ExportTable,
    resolved: Option<ResolvedModule>,
    errors: Vec<ResolveError>,
}

impl ModuleRecord {
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> Option<&Rc<ast::Module>> {
        self.ast.as_ref()
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    pub fn resolved(&self) -> Option<&ResolvedModule> {
        self.resolved.as_ref()
    }

    pub fn errors(&self) -> &[ResolveError] {
        &self.errors
    }

    /// Whether the module ends in a top-level value and can be used as one.
    pub fn is_assembly(&self) -> bool {
        self.exports.assembly().is_some()
    }

    /// Fully loaded without errors; only such modules have a usable export table.
    pub fn is_usable(&self) -> bool {
        self.status == LoadStatus::Loaded && self.errors.is_empty()
    }
}

/// An import that passed its dependency check, kept so that a target which
/// fails later (through a cycle) can still fail its importers.
struct ImportEdge {
    importer: ModuleId,
    target: ModuleId,
    span: Span,
}

/// One compilation: every module is read, parsed and resolved at most once.
///
/// Records are never removed, so a `ModuleId` stays valid for the session's
/// lifetime.
pub struct Session {
    config: ProjectConfig,
    sources: Box<dyn SourceProvider>,
    projects: Option<Box<dyn ProjectResolver>>,
    hosts: HostRegistry,
    modules: Vec<ModuleRecord>,
    by_path: HashMap<ModulePath, ModuleId>,
    edges: Vec<ImportEdge>,
    parse_count: usize,
}

impl Session {
    /// Session reading from the configured project root.
    pub fn new(config: ProjectConfig) -> Self {
        let sources = FsSources::new(config.root.clone());
        let projects = external_projects(&config);
        let mut session = Self::with_sources(config, sources);
        session.projects = projects;
        session
    }

    /// Like [`Session::new`], with the modules in `overlay` shadowing files
    /// under the project root.
    pub fn with_overlay(config: ProjectConfig, overlay: MemorySources) -> Self {
        let sources = LayeredSources::new(overlay, FsSources::new(config.root.clone()));
        let projects = external_projects(&config);
        let mut session = Self::with_sources(config, sources);
        session.projects = projects;
        session
    }

    pub fn with_sources(config: ProjectConfig, sources: impl SourceProvider + 'static) -> Self {
        Self {
            config,
            sources: Box::new(sources),
            projects: None,
            hosts: HostRegistry::with_prelude(),
            modules: Vec::new(),
            by_path: HashMap::new(),
            edges: Vec::new(),
            parse_count: 0,
        }
    }

    pub fn in_memory(sources: MemorySources) -> Self {
        Self::with_sources(ProjectConfig::for_root("."), sources)
    }

    pub fn with_hosts(mut self, hosts: HostRegistry) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_projects(mut self, projects: impl ProjectResolver + 'static) -> Self {
        self.projects = Some(Box::new(projects));
        self
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn hosts(&self) -> &HostRegistry {
        &self.hosts
    }

    pub fn module(&self, id: ModuleId) -> &ModuleRecord {
        &self.modules[id.0]
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.iter()
    }

    pub fn lookup(&self, path: &str) -> Option<ModuleId> {
        let path = ModulePath::parse(path).ok()?;
        self.by_path.get(&path).copied()
    }

    /// Number of source files parsed so far.
    pub fn parse_count(&self) -> usize {
        self.parse_count
    }

    pub(crate) fn record_import(&mut self, importer: ModuleId, target: ModuleId, span: Span) {
        self.edges.push(ImportEdge {
            importer,
            target,
            span,
        });
    }

    /// Fails every clean module that imported `failed`, directly or through
    /// other modules that fail as a result.
    fn propagate_failure(&mut self, failed: ModuleId) {
        let mut pending = vec![failed];
        while let Some(target) = pending.pop() {
            let path = self.modules[target.0].path.to_string();
            let (hits, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.edges)
                .into_iter()
                .partition(|edge| edge.target == target);
            self.edges = rest;
            for edge in hits {
                let importer = &mut self.modules[edge.importer.0];
                if !importer.errors.is_empty() {
                    continue;
                }
                debug!(
                    module = %importer.path,
                    dependency = %path,
                    "dependency failed after a cyclic import"
                );
                importer.errors.push(ResolveError::DependencyFailed {
                    path: path.clone(),
                    span: edge.span,
                });
                pending.push(edge.importer);
            }
        }
    }

    pub(crate) fn exports_mut(&mut self, id: ModuleId) -> &mut ExportTable {
        &mut self.modules[id.0].exports
    }

    pub fn load(&mut self, path: &str) -> Result<ModuleId, LoadError> {
        let path = ModulePath::parse(path).map_err(|source| LoadError::InvalidPath {
            path: path.to_string(),
            source,
        })?;
        self.load_path(&path)
    }

    /// Returns the cached module for `path`, or reads, parses and resolves it.
    ///
    /// A module requested while it is still `Loading` is returned as is; the
    /// caller sees only the exports declared before the cyclic import.
    pub fn load_path(&mut self, path: &ModulePath) -> Result<ModuleId, LoadError> {
        if let Some(&id) = self.by_path.get(path) {
            trace!(module = %path, status = ?self.modules[id.0].status, "module cache hit");
            return Ok(id);
        }

        let source: Rc<str> = self.read_source(path)?.into();
        let id = ModuleId(self.modules.len());
        self.modules.push(ModuleRecord {
            id,
            path: path.clone(),
            status: LoadStatus::Unloaded,
            source: source.clone(),
            ast: None,
            exports: ExportTable::new(),
            resolved: None,
            errors: Vec::new(),
        });
        self.by_path.insert(path.clone(), id);

        self.modules[id.0].status = LoadStatus::Loading;
        debug!(module = %path, id = id.0, "loading module");

        self.parse_count += 1;
        match parse_module(&path.to_string(), &source) {
            Ok(ast) => {
                let ast = Rc::new(ast);
                self.modules[id.0].ast = Some(ast.clone());
                let (resolved, errors) = resolve::resolve_module(self, id, &ast);
                let record = &mut self.modules[id.0];
                record.resolved = Some(resolved);
                record.errors.extend(errors);
            }
            Err(errors) => {
                self.modules[id.0]
                    .errors
                    .extend(errors.errors.into_iter().map(ResolveError::from_syntax));
            }
        }

        let record = &mut self.modules[id.0];
        record.status = LoadStatus::Loaded;
        debug!(
            module = %path,
            exports = record.exports.len(),
            errors = record.errors.len(),
            "module loaded"
        );
        if !record.errors.is_empty() {
            self.propagate_failure(id);
        }
        Ok(id)
    }

    fn read_source(&self, path: &ModulePath) -> Result<String, LoadError> {
        let result = match path.external() {
            Some(prefix) => match self.projects.as_ref().and_then(|p| p.read(path)) {
                Some(result) => result,
                None => {
                    return Err(LoadError::ExternalProject {
                        path: path.to_string(),
                        project: prefix.to_string(),
                    })
                }
            },
            None => self.sources.read(path),
        };
        result.map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::ModuleNotFound {
                path: path.to_string(),
            },
            _ => LoadError::Io {
                path: path.to_string(),
                source,
            },
        })
    }
}

fn external_projects(config: &ProjectConfig) -> Option<Box<dyn ProjectResolver>> {
    (!config.external.is_empty()).then(|| {
        Box::new(DirectoryProjects::new(config.external.clone())) as Box<dyn ProjectResolver>
    })
}
