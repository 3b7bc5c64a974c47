//! Cross-module scenarios driven through in-memory sources.

mod entry;
mod imports;
mod loader;
mod pipelines;

use crate::project::{GlobCollisions, MemorySources, ModuleId, ProjectConfig, Session};
use crate::resolve::{ResolveError, ResolvedModule};
use crate::runtime::{Interpreter, Value};

fn sources(files: &[(&str, &str)]) -> MemorySources {
    files
        .iter()
        .fold(MemorySources::new(), |sources, (path, text)| {
            sources.with(path, text)
        })
}

/// Loads `main.kcl` from `files`.
fn session(files: &[(&str, &str)]) -> (Session, ModuleId) {
    let mut session = Session::in_memory(sources(files));
    let id = session.load("main.kcl").expect("load main");
    (session, id)
}

fn session_with_policy(files: &[(&str, &str)], policy: GlobCollisions) -> (Session, ModuleId) {
    let mut config = ProjectConfig::for_root(".");
    config.glob_collisions = policy;
    let mut session = Session::with_sources(config, sources(files));
    let id = session.load("main.kcl").expect("load main");
    (session, id)
}

fn errors(session: &Session, id: ModuleId) -> Vec<ResolveError> {
    session.module(id).errors().to_vec()
}

fn assert_clean(session: &Session) {
    for record in session.modules() {
        assert!(
            record.errors().is_empty(),
            "{} has errors: {:?}",
            record.path(),
            record.errors()
        );
    }
}

fn resolved(session: &Session, id: ModuleId) -> &ResolvedModule {
    session.module(id).resolved().expect("resolved module")
}

/// Value of a top-level name in `main.kcl`.
fn eval(files: &[(&str, &str)], name: &str) -> Value {
    let (session, id) = session(files);
    assert_clean(&session);
    let mut interpreter = Interpreter::new(&session);
    interpreter.value_of(id, name).expect("evaluate")
}

fn numbers(values: &[f64]) -> Value {
    Value::Array(values.iter().copied().map(Value::Number).collect())
}
