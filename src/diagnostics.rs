use crate::{
    project::{LoadError, ManifestError, Session},
    resolve::ResolveError,
    runtime::error::RuntimeError,
};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct ResolveDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[label("{secondary_label}")]
    secondary: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
    secondary_label: String,
}

impl ResolveDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &ResolveError) -> Self {
        let (secondary, secondary_label) = match err.secondary() {
            Some((span, label)) => (Some(span.into()), label.to_string()),
            None => (None, String::new()),
        };
        Self {
            src,
            span: err.span().into(),
            secondary,
            help: err.help(),
            message: err.to_string(),
            label: err.label().to_string(),
            secondary_label,
        }
    }
}

/// Renders every resolution error in the session. Returns how many were
/// reported.
pub fn emit_module_errors(session: &Session) -> usize {
    let mut count = 0;
    for record in session.modules() {
        if record.errors().is_empty() {
            continue;
        }
        let src = NamedSource::new(record.path().to_string(), record.source().to_string());
        for err in record.errors() {
            let diagnostic = ResolveDiagnostic::from_error(src.clone(), err);
            eprintln!("{:?}", Report::new(diagnostic));
            count += 1;
        }
    }
    count
}

pub fn report_runtime_error(error: &RuntimeError) {
    eprintln!("Runtime error: {}", error);
}

pub fn report_load_error(error: &LoadError) {
    eprintln!("Load error: {}", error);
}

pub fn report_manifest_error(error: &ManifestError) {
    eprintln!("Manifest error: {}", error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::MemorySources;

    #[test]
    fn collision_diagnostic_points_at_both_sites() {
        let sources = MemorySources::new()
            .with("main.kcl", "x = 1\nx = 2\n");
        let mut session = Session::in_memory(sources);
        let id = session.load("main.kcl").expect("load");
        let record = session.module(id);
        let err = record.errors().first().expect("collision");
        let src = NamedSource::new("main.kcl", record.source().to_string());
        let diagnostic = ResolveDiagnostic::from_error(src, err);
        assert!(diagnostic.secondary.is_some());
        assert_eq!(diagnostic.span, SourceSpan::from(err.span()));
    }
}
