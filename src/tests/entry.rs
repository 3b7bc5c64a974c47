use super::*;
use crate::language::types::Type;
use crate::runtime::value::OpaqueValue;
use crate::runtime::{Entry, EntryArg, HostRegistry, RuntimeError, Signature};

const GEAR: &str = "\
export gear = (teeth: Number, module: Number = 2) -> Number => teeth * module
export spacing = 5
main = (count: Number) => count |> gear(module = 3)
";

fn run(
    files: &[(&str, &str)],
    entry: Entry,
    args: &[&str],
) -> Result<Vec<(String, Value)>, RuntimeError> {
    let (session, id) = session(files);
    assert_clean(&session);
    let args: Vec<EntryArg> = args
        .iter()
        .map(|text| EntryArg::parse(text).expect("argument"))
        .collect();
    let mut interpreter = Interpreter::new(&session);
    interpreter.run(id, &entry, &args)
}

#[test]
fn main_function_receives_arguments() {
    let results = run(&[("main.kcl", GEAR)], Entry::Main, &["10"]).expect("run");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "main");
    assert!(results[0].1.equals(&Value::Number(30.0)));
}

#[test]
fn main_constant_needs_no_arguments() {
    let results = run(&[("main.kcl", "main = [1..3]\n")], Entry::Main, &[]).expect("run");
    assert!(results[0].1.equals(&numbers(&[1.0, 2.0])));
}

#[test]
fn named_functions_use_keyword_arguments_and_defaults() {
    let entry = Entry::Functions(vec!["gear".to_string()]);
    let results = run(&[("main.kcl", GEAR)], entry.clone(), &["teeth=12"]).expect("run");
    assert!(results[0].1.equals(&Value::Number(24.0)));

    let results = run(&[("main.kcl", GEAR)], entry, &["12", "module=4"]).expect("run");
    assert!(results[0].1.equals(&Value::Number(48.0)));
}

#[test]
fn argument_types_are_checked() {
    let err = run(&[("main.kcl", GEAR)], Entry::Main, &["\"ten\""]).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
}

#[test]
fn argument_count_and_names_are_checked() {
    let entry = Entry::Functions(vec!["gear".to_string()]);
    let missing = run(&[("main.kcl", GEAR)], entry.clone(), &[]).unwrap_err();
    assert!(matches!(missing, RuntimeError::ArityMismatch { expected: 1, .. }));

    let unknown = run(&[("main.kcl", GEAR)], entry, &["12", "pitch=1"]).unwrap_err();
    assert!(matches!(unknown, RuntimeError::UnknownParameter { .. }));
}

#[test]
fn missing_main_is_reported() {
    let err = run(&[("main.kcl", "x = 1\n")], Entry::Main, &[]).unwrap_err();
    assert!(matches!(err, RuntimeError::MissingEntry { name } if name == "main"));
}

#[test]
fn imported_functions_close_over_their_module() {
    let files = [
        ("main.kcl", "import gear from \"parts\"\nmain = () => gear(4)\n"),
        ("parts.kcl", "factor = 3\nexport gear = (teeth) => teeth * factor\n"),
    ];
    let results = run(&files, Entry::Main, &[]).expect("run");
    assert!(results[0].1.equals(&Value::Number(12.0)));
}

#[test]
fn modules_used_as_values_are_assemblies() {
    let files = [
        ("main.kcl", "import \"bracket\"\nimport \"parts\"\nmain = bracket\nbad = () => parts\n"),
        ("bracket.kcl", "width = 4\nwidth * 2\n"),
        ("parts.kcl", "export gear = 1\n"),
    ];
    let results = run(&files, Entry::Main, &[]).expect("run");
    assert!(results[0].1.equals(&Value::Number(8.0)));

    let err = run(&files, Entry::Functions(vec!["bad".to_string()]), &[]).unwrap_err();
    assert!(matches!(err, RuntimeError::NotAnAssembly { .. }));
}

#[test]
fn cyclic_modules_see_exports_declared_before_the_back_edge() {
    let files = [
        ("main.kcl", "export first = 1\nimport \"peer\"\nexport second = peer::value\n"),
        ("peer.kcl", "import \"main\"\nexport value = main::first + 1\n"),
    ];
    let results = run(
        &files,
        Entry::Functions(vec!["second".to_string()]),
        &[],
    )
    .expect("run");
    assert!(results[0].1.equals(&Value::Number(2.0)));

    let early = [
        ("main.kcl", "import \"peer\"\nexport first = 1\n"),
        ("peer.kcl", "import \"main\"\nget = () => main::first\nexport value = get()\n"),
    ];
    let (session, id) = session(&early);
    let peer = session.lookup("peer").expect("peer");
    assert!(matches!(
        &errors(&session, peer)[..],
        [ResolveError::UnknownExport { partial: true, .. }]
    ));
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::DependencyFailed { .. }]
    ));
}

#[test]
fn embedders_can_register_host_functions() {
    let mut hosts = HostRegistry::with_prelude();
    hosts.register(
        "plate",
        Signature::returning(Type::Named("Solid".into())).param("width", Type::Number),
        |args| match args {
            [Value::Number(width)] => Ok(Value::Opaque(OpaqueValue::new("Solid", *width))),
            _ => Err("expected a width".to_string()),
        },
    );
    let mut session =
        Session::in_memory(sources(&[("main.kcl", "main = 3 |> plate()\n")])).with_hosts(hosts);
    let id = session.load("main.kcl").expect("load");
    assert_clean(&session);

    let mut interpreter = Interpreter::new(&session);
    let results = interpreter.run(id, &Entry::Main, &[]).expect("run");
    let Value::Opaque(solid) = &results[0].1 else {
        panic!("expected a host value");
    };
    assert_eq!(solid.kind, "Solid");
    assert_eq!(solid.downcast::<f64>(), Some(&3.0));
}

#[test]
fn a_failed_module_keeps_reporting_its_error() {
    let (session, id) = session(&[("main.kcl", "boom = [1][5]\nlater = 2\n")]);
    assert_clean(&session);
    let mut interpreter = Interpreter::new(&session);
    for _ in 0..2 {
        assert!(matches!(
            interpreter.value_of(id, "later"),
            Err(RuntimeError::IndexOutOfRange { index: 5, len: 1 })
        ));
    }
}

#[test]
fn oversized_ranges_are_errors() {
    let (session, id) = session(&[("main.kcl", "huge = [0..1_000_000_000_000]\n")]);
    assert_clean(&session);
    let mut interpreter = Interpreter::new(&session);
    assert!(matches!(
        interpreter.value_of(id, "huge"),
        Err(RuntimeError::RangeTooLarge { .. })
    ));
    assert!(EntryArg::parse("[0..1_000_000_000_000]").is_err());
}
