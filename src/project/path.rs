use std::fmt;
use thiserror::Error;

pub const SOURCE_EXTENSION: &str = "kcl";

/// Canonical, project-relative module path.
///
/// Paths use `/` separators and never contain `.` or `..` segments. A path
/// with a `scheme://project/` prefix names a file in an external project.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePath {
    external: Option<ExternalPrefix>,
    file: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalPrefix {
    pub scheme: String,
    pub project: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct PathError {
    pub reason: String,
}

impl PathError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ModulePath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if let Some((scheme, rest)) = raw.split_once("://") {
            if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(PathError::new(format!("`{scheme}` is not a valid scheme")));
            }
            let Some((project, file)) = rest.split_once('/') else {
                return Err(PathError::new(
                    "external paths look like `scheme://project/file`",
                ));
            };
            if project.is_empty() {
                return Err(PathError::new("external project name is empty"));
            }
            return Ok(Self {
                external: Some(ExternalPrefix {
                    scheme: scheme.to_string(),
                    project: project.to_string(),
                }),
                file: normalize_file(file)?,
            });
        }
        Ok(Self {
            external: None,
            file: normalize_file(raw)?,
        })
    }

    pub fn external(&self) -> Option<&ExternalPrefix> {
        self.external.as_ref()
    }

    /// The path inside its project, without any scheme prefix.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Final segment without its extension: `parts/gear.kcl` -> `gear`.
    pub fn stem(&self) -> &str {
        let base = self.file.rsplit('/').next().unwrap_or(&self.file);
        match base.rfind('.') {
            Some(dot) if dot > 0 => &base[..dot],
            _ => base,
        }
    }

    /// Name bound by `import "path"` when no alias is given, if the stem is a
    /// valid identifier.
    pub fn binding_name(&self) -> Option<&str> {
        let stem = self.stem();
        is_identifier(stem).then_some(stem)
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.external {
            Some(prefix) => write!(f, "{}://{}/{}", prefix.scheme, prefix.project, self.file),
            None => write!(f, "{}", self.file),
        }
    }
}

impl fmt::Display for ExternalPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.project)
    }
}

fn normalize_file(raw: &str) -> Result<String, PathError> {
    if raw.is_empty() {
        return Err(PathError::new("import path is empty"));
    }
    if raw.contains('\\') {
        return Err(PathError::new("use `/` as the path separator"));
    }
    if raw.starts_with('/') {
        return Err(PathError::new("paths are relative to the project root"));
    }
    let mut segments = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" => return Err(PathError::new("path contains an empty segment")),
            "." | ".." => {
                return Err(PathError::new("`.` and `..` segments are not allowed"));
            }
            other => segments.push(other),
        }
    }
    let mut file = segments.join("/");
    let has_extension = segments
        .last()
        .map(|last| last.rfind('.').map(|dot| dot > 0).unwrap_or(false))
        .unwrap_or(false);
    if !has_extension {
        file.push('.');
        file.push_str(SOURCE_EXTENSION);
    }
    Ok(file)
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_default_extension() {
        let path = ModulePath::parse("parts/gear").expect("path");
        assert_eq!(path.to_string(), "parts/gear.kcl");
        assert_eq!(path.binding_name(), Some("gear"));
    }

    #[test]
    fn rejects_relative_segments() {
        for raw in ["../x.kcl", "a/./b.kcl", "", "/abs.kcl", "a\\b.kcl", "a//b.kcl"] {
            assert!(ModulePath::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn non_identifier_stem_has_no_default_name() {
        let path = ModulePath::parse("gear-box.kcl").expect("path");
        assert_eq!(path.stem(), "gear-box");
        assert_eq!(path.binding_name(), None);
    }

    #[test]
    fn external_prefix_is_split() {
        let path = ModulePath::parse("local://shared/bolts.kcl").expect("path");
        let prefix = path.external().expect("external");
        assert_eq!(prefix.scheme, "local");
        assert_eq!(prefix.project, "shared");
        assert_eq!(path.file(), "bolts.kcl");
        assert_eq!(path.to_string(), "local://shared/bolts.kcl");
        assert!(ModulePath::parse("local://shared").is_err());
    }
}
