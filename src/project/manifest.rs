use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "kcl.toml";

/// How a glob-imported name that collides with another binding is reported.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GlobCollisions {
    /// At the import statement that introduces the second binding.
    #[default]
    Eager,
    /// At the first reference to the ambiguous name; unused collisions are ignored.
    OnUse,
}

#[derive(Clone, Debug)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub name: Option<String>,
    pub main: Option<String>,
    pub glob_collisions: GlobCollisions,
    /// `scheme://project` prefix mapped to a directory.
    pub external: BTreeMap<String, PathBuf>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid manifest {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawManifest {
    project: RawProject,
    resolve: RawResolve,
    external: BTreeMap<String, String>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawProject {
    name: Option<String>,
    main: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawResolve {
    glob_collisions: GlobCollisions,
}

impl ProjectConfig {
    /// Configuration for a project without a manifest.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            name: None,
            main: None,
            glob_collisions: GlobCollisions::default(),
            external: BTreeMap::new(),
            path: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let root = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_str(&content, path, &root)
    }

    fn from_str(content: &str, path: &Path, root: &Path) -> Result<Self, ManifestError> {
        let raw: RawManifest = toml::from_str(content).map_err(|error| ManifestError::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;

        let mut external = BTreeMap::new();
        for (prefix, dir) in raw.external {
            let Some((scheme, project)) = prefix.split_once("://") else {
                return Err(ManifestError::Invalid {
                    path: path.to_path_buf(),
                    message: format!("external key `{prefix}` must look like `scheme://project`"),
                });
            };
            if scheme.is_empty() || project.is_empty() || project.contains('/') {
                return Err(ManifestError::Invalid {
                    path: path.to_path_buf(),
                    message: format!("external key `{prefix}` must look like `scheme://project`"),
                });
            }
            external.insert(prefix, root.join(dir));
        }

        Ok(Self {
            root: root.to_path_buf(),
            name: raw.project.name,
            main: raw.project.main,
            glob_collisions: raw.resolve.glob_collisions,
            external,
            path: Some(path.to_path_buf()),
        })
    }

    /// Walks up from `start` looking for a manifest; falls back to defaults
    /// rooted at the starting directory.
    pub fn discover(start: &Path) -> Result<Self, ManifestError> {
        match find_manifest(start) {
            Some(path) => Self::load(&path),
            None => Ok(Self::for_root(start_dir(start))),
        }
    }
}

pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    let mut current = start_dir(start);
    loop {
        let candidate = current.join(MANIFEST_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        if !current.pop() {
            break;
        }
    }
    None
}

fn start_dir(start: &Path) -> PathBuf {
    if start.is_dir() {
        start.to_path_buf()
    } else {
        start
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ProjectConfig, ManifestError> {
        ProjectConfig::from_str(content, Path::new("/p/kcl.toml"), Path::new("/p"))
    }

    #[test]
    fn reads_all_sections() {
        let config = parse(
            r#"
[project]
name = "gearbox"
main = "main.kcl"

[resolve]
glob-collisions = "on-use"

[external]
"local://shared" = "../shared"
"#,
        )
        .expect("manifest");
        assert_eq!(config.name.as_deref(), Some("gearbox"));
        assert_eq!(config.main.as_deref(), Some("main.kcl"));
        assert_eq!(config.glob_collisions, GlobCollisions::OnUse);
        assert_eq!(
            config.external.get("local://shared"),
            Some(&PathBuf::from("/p/../shared"))
        );
    }

    #[test]
    fn empty_manifest_uses_defaults() {
        let config = parse("").expect("manifest");
        assert_eq!(config.glob_collisions, GlobCollisions::Eager);
        assert!(config.external.is_empty());
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = parse("[resolve]\nglob-collisions = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn rejects_malformed_external_key() {
        let err = parse("[external]\nshared = \"../shared\"").unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { .. }));
    }

    #[test]
    fn discovers_manifest_in_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(MANIFEST_FILE), "[project]\nname = \"up\"\n").expect("write");
        let nested = dir.path().join("parts");
        fs::create_dir_all(&nested).expect("mkdir");
        let config = ProjectConfig::discover(&nested.join("gear.kcl")).expect("discover");
        assert_eq!(config.name.as_deref(), Some("up"));
        assert_eq!(config.root, dir.path());
    }
}
