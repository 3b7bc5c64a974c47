pub mod manifest;
pub mod path;
pub mod session;
pub mod sources;

pub use manifest::{find_manifest, GlobCollisions, ManifestError, ProjectConfig};
pub use path::{ModulePath, PathError};
pub use session::{LoadError, LoadStatus, ModuleId, ModuleRecord, Session};
pub use sources::{
    DirectoryProjects, FsSources, LayeredSources, MemorySources, ProjectResolver, SourceProvider,
};
