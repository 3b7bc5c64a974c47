use super::*;
use crate::resolve::{ExportKind, ScopeErrorKind, Target};

const FOO: &str = "export a = 1\nexport b = 2\nexport c = 3\nhidden = 4\n";

fn item(session: &Session, path: &str, name: &str) -> Target {
    Target::Item {
        module: session.lookup(path).expect("module loaded"),
        name: name.to_string(),
    }
}

#[test]
fn named_imports_bind_exported_items() {
    let (session, id) = session(&[
        ("main.kcl", "import a, c as z from \"foo\"\nsum = a + z\n"),
        ("foo.kcl", FOO),
    ]);
    assert_clean(&session);
    let resolved = resolved(&session, id);
    assert_eq!(resolved.top_level("a").expect("a").target, item(&session, "foo", "a"));
    assert_eq!(resolved.top_level("z").expect("z").target, item(&session, "foo", "c"));
    assert!(resolved.top_level("c").is_none());
}

#[test]
fn module_import_binds_the_stem() {
    let (session, id) = session(&[
        (
            "main.kcl",
            "import \"parts/foo\"\nimport \"parts/foo\" as other\nx = foo::a + other::b\n",
        ),
        ("parts/foo.kcl", FOO),
    ]);
    assert_clean(&session);
    let foo = session.lookup("parts/foo").expect("foo");
    let resolved = resolved(&session, id);
    assert_eq!(resolved.top_level("foo").expect("foo").target, Target::Module(foo));
    assert_eq!(resolved.top_level("other").expect("other").target, Target::Module(foo));
}

#[test]
fn glob_with_rename_skips_claimed_names() {
    let (session, id) = session(&[
        ("main.kcl", "import a as x, * from \"foo\"\n"),
        ("foo.kcl", FOO),
    ]);
    assert_clean(&session);
    let resolved = resolved(&session, id);
    assert_eq!(resolved.top_level("x").expect("x").target, item(&session, "foo", "a"));
    assert_eq!(resolved.top_level("b").expect("b").target, item(&session, "foo", "b"));
    assert_eq!(resolved.top_level("c").expect("c").target, item(&session, "foo", "c"));
    assert!(resolved.top_level("a").is_none());
    assert!(resolved.top_level("hidden").is_none());
}

#[test]
fn aliases_of_the_same_item_do_not_collide() {
    let (session, _) = session(&[
        (
            "main.kcl",
            "import a from \"foo\"\nimport a from \"foo\"\nimport \"foo\"\n\
             import self as foo from \"foo\"\nx = a\n",
        ),
        ("foo.kcl", FOO),
    ]);
    assert_clean(&session);
}

#[test]
fn different_items_under_one_name_collide() {
    let (session, id) = session(&[
        ("main.kcl", "import a from \"foo\"\nimport a from \"bar\"\n"),
        ("foo.kcl", FOO),
        ("bar.kcl", "export a = 10\n"),
    ]);
    let errs = errors(&session, id);
    assert!(matches!(&errs[..], [ResolveError::NameCollision { name, .. }] if name == "a"));
}

#[test]
fn explicit_import_collides_with_local_constant() {
    let (session, id) = session(&[
        ("main.kcl", "x = 1\nimport a as x from \"foo\"\n"),
        ("foo.kcl", FOO),
    ]);
    assert!(matches!(&errors(&session, id)[..], [ResolveError::NameCollision { .. }]));
}

#[test]
fn glob_collisions_are_eager_by_default() {
    let files = [
        ("main.kcl", "import * from \"foo\"\nimport * from \"bar\"\n"),
        ("foo.kcl", FOO),
        ("bar.kcl", "export a = 10\n"),
    ];
    let (session, id) = session(&files);
    assert!(matches!(&errors(&session, id)[..], [ResolveError::NameCollision { .. }]));
}

#[test]
fn on_use_policy_reports_only_referenced_glob_collisions() {
    let unused = [
        ("main.kcl", "import * from \"foo\"\nimport * from \"bar\"\ny = b\n"),
        ("foo.kcl", FOO),
        ("bar.kcl", "export a = 10\n"),
    ];
    let (session, _) = session_with_policy(&unused, GlobCollisions::OnUse);
    assert_clean(&session);

    let used = [
        ("main.kcl", "import * from \"foo\"\nimport * from \"bar\"\ny = a\n"),
        ("foo.kcl", FOO),
        ("bar.kcl", "export a = 10\n"),
    ];
    let (session, id) = session_with_policy(&used, GlobCollisions::OnUse);
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::NameCollision { name, .. }] if name == "a"
    ));
}

#[test]
fn import_is_invisible_before_its_statement() {
    let (session, id) = session(&[
        ("main.kcl", "y = a\nimport a from \"foo\"\n"),
        ("foo.kcl", FOO),
    ]);
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::Scope {
            kind: ScopeErrorKind::NotYetDeclared { .. },
            ..
        }]
    ));
}

#[test]
fn block_imports_stay_in_their_block() {
    let (session, id) = session(&[
        ("main.kcl", "x = {\n  import a from \"foo\"\n  inner = { a + 1 }\n  inner\n}\ny = a\n"),
        ("foo.kcl", FOO),
    ]);
    let errs = errors(&session, id);
    assert_eq!(errs.len(), 1, "{errs:?}");
    assert!(matches!(
        &errs[0],
        ResolveError::Scope {
            kind: ScopeErrorKind::NotInScope,
            name,
            ..
        } if name == "a"
    ));
}

#[test]
fn private_names_are_unknown_exports() {
    let (session, id) = session(&[
        ("main.kcl", "import hidden from \"foo\"\n"),
        ("foo.kcl", FOO),
    ]);
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::UnknownExport { partial: false, .. }]
    ));
}

#[test]
fn reexports_forward_the_original_item() {
    let (session, id) = session(&[
        (
            "main.kcl",
            "import renamed from \"mid\"\nimport a from \"foo\"\n\
             import renamed as a from \"mid\"\nx = renamed + a\n",
        ),
        ("mid.kcl", "export import a as renamed from \"foo\"\n"),
        ("foo.kcl", FOO),
    ]);
    assert_clean(&session);
    let mid = session.lookup("mid").expect("mid");
    let entry = session.module(mid).exports().get("renamed").expect("re-export");
    assert!(entry.reexport);
    assert_eq!(entry.kind, ExportKind::Constant);
    assert_eq!(entry.target, item(&session, "foo", "a"));
    assert_eq!(
        resolved(&session, id).top_level("renamed").expect("renamed").target,
        item(&session, "foo", "a")
    );
}

#[test]
fn exporting_a_name_twice_is_rejected() {
    let (session, id) = session(&[
        ("main.kcl", "export import a from \"foo\"\nexport import a from \"foo\"\n"),
        ("foo.kcl", FOO),
    ]);
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::DuplicateExport { name, .. }] if name == "a"
    ));
}

#[test]
fn bad_paths_fail_the_import_statement() {
    let (missing, id) = session(&[(
        "main.kcl",
        "import \"missing\"\nimport \"../escape\"\nimport \"my-part\"\n",
    )]);
    let errs = errors(&missing, id);
    assert!(matches!(&errs[0], ResolveError::ModuleNotFound { .. }));
    assert!(matches!(&errs[1], ResolveError::InvalidPath { .. }));

    let (session, id) = session(&[
        ("main.kcl", "import \"my-part\"\nimport \"my-part\" as part\n"),
        ("my-part.kcl", "export a = 1\n"),
    ]);
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::AliasRequired { stem, .. }] if stem == "my-part"
    ));
}

#[test]
fn importing_a_broken_module_is_a_dependency_failure() {
    let (session, id) = session(&[
        ("main.kcl", "import a from \"broken\"\nx = a\n"),
        ("broken.kcl", "export a = missing\n"),
    ]);
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::DependencyFailed { path, .. }] if path == "broken.kcl"
    ));
}

#[test]
fn sibling_modules_resolve_despite_a_broken_one() {
    let mut session = Session::in_memory(sources(&[
        ("good.kcl", "export a = 1\n"),
        ("broken.kcl", "export a = missing\n"),
    ]));
    let broken = session.load("broken").expect("broken");
    let good = session.load("good").expect("good");
    assert!(!session.module(broken).is_usable());
    assert!(session.module(good).is_usable());
    assert_eq!(session.module(good).exports().len(), 1);
}

#[test]
fn failed_self_import_still_binds_the_stem() {
    let (session, id) = session(&[("main.kcl", "import self from \"missing\"\nz = missing\n")]);
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::ModuleNotFound { .. }]
    ));
}
