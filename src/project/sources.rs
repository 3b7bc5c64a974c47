use crate::project::path::ModulePath;
use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::PathBuf,
};

/// Where module text comes from.
pub trait SourceProvider {
    fn read(&self, path: &ModulePath) -> io::Result<String>;
}

/// Reads modules relative to a project root directory.
pub struct FsSources {
    root: PathBuf,
}

impl FsSources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceProvider for FsSources {
    fn read(&self, path: &ModulePath) -> io::Result<String> {
        fs::read_to_string(self.root.join(path.file()))
    }
}

#[derive(Default, Clone)]
pub struct MemorySources {
    files: HashMap<String, String>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, source: &str) -> Self {
        self.insert(path, source);
        self
    }

    /// Stores `source` under the canonical form of `path`, so `gear` and
    /// `gear.kcl` name the same file.
    pub fn insert(&mut self, path: &str, source: &str) {
        let key = ModulePath::parse(path)
            .map(|p| p.to_string())
            .unwrap_or_else(|_| path.to_string());
        self.files.insert(key, source.to_string());
    }
}

impl SourceProvider for MemorySources {
    fn read(&self, path: &ModulePath) -> io::Result<String> {
        self.files.get(&path.to_string()).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no source for {path}"))
        })
    }
}

/// In-memory modules shadowing another provider, such as source piped in
/// on stdin next to the files of its project.
pub struct LayeredSources<B> {
    top: MemorySources,
    base: B,
}

impl<B: SourceProvider> LayeredSources<B> {
    pub fn new(top: MemorySources, base: B) -> Self {
        Self { top, base }
    }
}

impl<B: SourceProvider> SourceProvider for LayeredSources<B> {
    fn read(&self, path: &ModulePath) -> io::Result<String> {
        match self.top.read(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => self.base.read(path),
            result => result,
        }
    }
}

/// Resolves `scheme://project/file` paths.
///
/// Returns `None` when the project is unknown to this resolver.
pub trait ProjectResolver {
    fn read(&self, path: &ModulePath) -> Option<io::Result<String>>;
}

/// Maps `scheme://project` prefixes to directories, as configured in the
/// manifest's `[external]` table.
pub struct DirectoryProjects {
    projects: BTreeMap<String, PathBuf>,
}

impl DirectoryProjects {
    pub fn new(projects: BTreeMap<String, PathBuf>) -> Self {
        Self { projects }
    }
}

impl ProjectResolver for DirectoryProjects {
    fn read(&self, path: &ModulePath) -> Option<io::Result<String>> {
        let prefix = path.external()?;
        let dir = self.projects.get(&prefix.to_string())?;
        Some(fs::read_to_string(dir.join(path.file())))
    }
}
