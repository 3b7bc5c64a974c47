use super::*;
use crate::project::{LoadError, LoadStatus, ModulePath, ProjectResolver};
use std::fs;
use std::io;

const CYCLE_A: &str = "export first = 1\nimport \"b\"\nexport second = 2\n";
const CYCLE_B: &str = "import first from \"a\"\nexport value = first + 1\n";

#[test]
fn each_module_is_parsed_once() {
    let (mut session, id) = session(&[
        (
            "main.kcl",
            "import \"shared\"\nimport x from \"shared\"\nimport \"left\"\nimport \"right\"\n",
        ),
        ("shared.kcl", "export x = 1\n"),
        ("left.kcl", "import x from \"shared\"\n"),
        ("right.kcl", "import \"shared.kcl\" as s\n"),
    ]);
    assert_clean(&session);
    assert_eq!(session.parse_count(), 4);

    let shared = session.lookup("shared").expect("shared");
    assert_eq!(session.load("shared.kcl").expect("reload"), shared);
    assert_eq!(session.load("main").expect("reload"), id);
    assert_eq!(session.parse_count(), 4);
    assert!(session
        .modules()
        .all(|record| record.status() == LoadStatus::Loaded));
}

#[test]
fn cycles_terminate_in_either_order() {
    let files = [("a.kcl", CYCLE_A), ("b.kcl", CYCLE_B)];

    let mut forward = Session::in_memory(sources(&files));
    forward.load("a").expect("a");
    assert_clean(&forward);
    assert_eq!(forward.parse_count(), 2);

    let mut backward = Session::in_memory(sources(&files));
    backward.load("b").expect("b");
    assert_clean(&backward);
    assert_eq!(backward.parse_count(), 2);
    let a = backward.lookup("a").expect("a");
    let names: Vec<&str> = backward.module(a).exports().names().collect();
    assert_eq!(names, ["first", "second"]);
}

#[test]
fn cyclic_peer_only_sees_earlier_exports() {
    let mut session = Session::in_memory(sources(&[
        ("a.kcl", CYCLE_A),
        ("b.kcl", "import second from \"a\"\nexport value = second\n"),
    ]));
    let a = session.load("a").expect("a");
    let b = session.lookup("b").expect("b");

    let b_errors = errors(&session, b);
    assert!(matches!(
        &b_errors[..],
        [ResolveError::UnknownExport { partial: true, name, .. }] if name == "second"
    ));
    assert!(b_errors[0].help().is_some());
    assert!(matches!(
        &errors(&session, a)[..],
        [ResolveError::DependencyFailed { .. }]
    ));
}

#[test]
fn cyclic_peer_fails_when_its_importer_fails_later() {
    let (session, main) = session(&[
        ("main.kcl", "export x = 1\nimport y from \"b\"\nbad = nope\n"),
        ("b.kcl", "import x from \"main\"\nexport y = x + 1\n"),
    ]);
    let b = session.lookup("b").expect("b");
    assert!(!session.module(b).is_usable());
    assert!(matches!(
        &errors(&session, b)[..],
        [ResolveError::DependencyFailed { path, .. }] if path == "main.kcl"
    ));
    assert!(matches!(&errors(&session, main)[..], [ResolveError::Scope { .. }]));
}

#[test]
fn cycle_failures_reach_modules_that_imported_the_peer_cleanly() {
    let mut session = Session::in_memory(sources(&[
        ("a.kcl", "export x = 1\nimport \"b\"\nbad = nope\n"),
        ("b.kcl", "import \"c\"\nexport y = c::z\n"),
        ("c.kcl", "import x from \"a\"\nexport z = x\n"),
    ]));
    session.load("a").expect("a");
    for path in ["b", "c"] {
        let id = session.lookup(path).expect("loaded");
        assert!(
            matches!(&errors(&session, id)[..], [ResolveError::DependencyFailed { .. }]),
            "{path}: {:?}",
            errors(&session, id)
        );
    }
}

#[test]
fn glob_from_a_loading_module_is_a_snapshot() {
    let mut session = Session::in_memory(sources(&[
        ("a.kcl", "export early = 1\nimport \"b\"\nexport late = 2\n"),
        ("b.kcl", "import * from \"a\"\nx = early\n"),
    ]));
    session.load("a").expect("a");
    assert_clean(&session);
    let b = session.lookup("b").expect("b");
    let resolved = resolved(&session, b);
    assert!(resolved.top_level("early").is_some());
    assert!(resolved.top_level("late").is_none());
}

#[test]
fn missing_entry_module_is_a_load_error() {
    let mut session = Session::in_memory(MemorySources::new());
    assert!(matches!(
        session.load("nowhere"),
        Err(LoadError::ModuleNotFound { .. })
    ));
    assert!(matches!(
        session.load("a/../b"),
        Err(LoadError::InvalidPath { .. })
    ));
}

struct SharedProject;

impl ProjectResolver for SharedProject {
    fn read(&self, path: &ModulePath) -> Option<io::Result<String>> {
        let prefix = path.external()?;
        (prefix.to_string() == "local://shared" && path.file() == "bolts.kcl")
            .then(|| Ok("export size = 4\n".to_string()))
    }
}

#[test]
fn scheme_paths_go_through_the_project_resolver() {
    let files = [("main.kcl", "import size from \"local://shared/bolts\"\nx = size\n")];

    let (session, id) = session(&files);
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::ExternalProject { project, .. }] if project == "local://shared"
    ));

    let mut session = Session::in_memory(sources(&files)).with_projects(SharedProject);
    let id = session.load("main").expect("main");
    assert_clean(&session);
    let bolts = session.lookup("local://shared/bolts").expect("external module");
    assert_eq!(
        resolved(&session, id).top_level("size").expect("size").target,
        crate::resolve::Target::Item {
            module: bolts,
            name: "size".to_string()
        }
    );
}

#[test]
fn filesystem_projects_load_from_the_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("parts")).expect("mkdir");
    fs::write(
        dir.path().join("main.kcl"),
        "import teeth from \"parts/gear\"\nexport count = teeth * 2\n",
    )
    .expect("write main");
    fs::write(dir.path().join("parts/gear.kcl"), "export teeth = 12\n").expect("write gear");

    let mut session = Session::new(ProjectConfig::for_root(dir.path()));
    let id = session.load("main.kcl").expect("load");
    assert_clean(&session);
    let mut interpreter = Interpreter::new(&session);
    let count = interpreter.value_of(id, "count").expect("count");
    assert!(count.equals(&Value::Number(24.0)));
}

#[test]
fn external_projects_from_the_manifest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = dir.path().join("app");
    let shared = dir.path().join("shared");
    fs::create_dir_all(&app).expect("mkdir app");
    fs::create_dir_all(&shared).expect("mkdir shared");
    fs::write(
        app.join("kcl.toml"),
        "[project]\nname = \"app\"\n\n[external]\n\"local://shared\" = \"../shared\"\n",
    )
    .expect("write manifest");
    fs::write(app.join("main.kcl"), "import size from \"local://shared/bolts\"\n").expect("main");
    fs::write(shared.join("bolts.kcl"), "export size = 4\n").expect("bolts");

    let config = ProjectConfig::discover(&app.join("main.kcl")).expect("manifest");
    let mut session = Session::new(config);
    session.load("main.kcl").expect("load");
    assert_clean(&session);
}
