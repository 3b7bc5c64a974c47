use super::*;
use crate::language::types::Type;
use crate::resolve::{Lookup, ScopeErrorKind};

const HELPERS: &str = "double = (x: Number) -> Number => x * 2\nadd = (a, b) => a + b\n";

fn main_with_helpers(body: &str) -> String {
    format!("{HELPERS}{body}")
}

#[test]
fn tags_are_visible_to_later_stages() {
    let source = main_with_helpers("r = 3 |> double() as t |> add(t)\n");
    let value = eval(&[("main.kcl", source.as_str())], "r");
    assert!(value.equals(&Value::Number(12.0)));
}

#[test]
fn tags_are_not_visible_to_earlier_stages() {
    let source = main_with_helpers("r = add(t, 1) |> double() as t\n");
    let (session, id) = session(&[("main.kcl", source.as_str())]);
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::Scope {
            kind: ScopeErrorKind::NotYetDeclared { .. },
            name,
            ..
        }] if name == "t"
    ));
}

#[test]
fn tags_outlive_the_pipeline_in_their_block() {
    let source = main_with_helpers("r = {\n  2 |> double() as four\n  four + 1\n}\n");
    let value = eval(&[("main.kcl", source.as_str())], "r");
    assert!(value.equals(&Value::Number(5.0)));
}

#[test]
fn operator_stages_use_the_receiver_as_left_operand() {
    let value = eval(&[("main.kcl", "r = 10 |> - 4 |> * 2\n")], "r");
    assert!(value.equals(&Value::Number(12.0)));
}

#[test]
fn block_receiver_reaches_only_the_final_expression() {
    let source = main_with_helpers("r = 5 |> {\n  k = 100\n  add(k)\n}\n");
    let value = eval(&[("main.kcl", source.as_str())], "r");
    assert!(value.equals(&Value::Number(105.0)));
}

#[test]
fn if_without_else_passes_the_receiver_through() {
    let source =
        main_with_helpers("r = 5 |> if false { double() }\ns = 5 |> if true { double() }\n");
    let files = [("main.kcl", source.as_str())];
    assert!(eval(&files, "r").equals(&Value::Number(5.0)));
    assert!(eval(&files, "s").equals(&Value::Number(10.0)));
}

#[test]
fn stages_that_cannot_take_a_receiver_are_rejected_statically() {
    let cases = [
        ("r = 1 |> 2\n", "a literal"),
        ("f = (a) => a + 1\nr = 3 |> f() + 1\n", "a binary expression"),
        ("r = 5 |> { k = 1 }\n", "block without a final expression"),
    ];
    for (source, expected) in cases {
        let (session, id) = session(&[("main.kcl", source)]);
        let errs = errors(&session, id);
        let rejected = matches!(
            &errs[..],
            [ResolveError::StageRejectsReceiver { stage, .. }] if stage == expected
        );
        assert!(rejected, "{source}: {errs:?}");
    }
}

#[test]
fn map_mode_preserves_order() {
    let value = eval(&[("main.kcl", "r = for [0, 1, 2, 3, 4] as i |> (i * 2)\n")], "r");
    assert!(value.equals(&numbers(&[0.0, 2.0, 4.0, 6.0, 8.0])));
}

#[test]
fn map_over_a_range() {
    let source = main_with_helpers("r = for [1..=3] as i |> double(i)\n");
    let value = eval(&[("main.kcl", source.as_str())], "r");
    assert!(value.equals(&numbers(&[2.0, 4.0, 6.0])));
}

#[test]
fn fold_mode_threads_the_receiver() {
    let source = main_with_helpers("r = 100 |> for [0..4] as i |> add(i)\n");
    let value = eval(&[("main.kcl", source.as_str())], "r");
    assert!(value.equals(&Value::Number(106.0)));

    let empty = main_with_helpers("r = 7 |> for [] as i |> add(i)\n");
    assert!(eval(&[("main.kcl", empty.as_str())], "r").equals(&Value::Number(7.0)));
}

#[test]
fn fold_body_continues_the_chain_with_the_accumulator() {
    let source = main_with_helpers("r = 1 |> for [1, 2, 3] as i |> add(i) |> double()\n");
    let value = eval(&[("main.kcl", source.as_str())], "r");
    assert!(value.equals(&Value::Number(30.0)));
}

#[test]
fn loop_tags_change_type_after_the_loop() {
    let source = main_with_helpers(
        "ys = for [1, 2, 3] as i |> double(i) as y |> max(y)\nafter = y\n",
    );
    let (session, id) = session(&[("main.kcl", source.as_str())]);
    assert_clean(&session);
    let resolved = resolved(&session, id);

    let inside = source.find("max(y)").expect("use") + 4;
    let Lookup::Found(tag) = resolved.lookup_at("y", inside) else {
        panic!("tag not visible in the body");
    };
    assert_eq!(resolved.binding(tag).ty, Type::Number);

    let body_use = resolved
        .references
        .iter()
        .find(|(span, _)| span.start == inside)
        .map(|(_, reference)| reference.ty.clone());
    assert_eq!(body_use, Some(Type::Number));
    assert_eq!(
        resolved.top_level("after").expect("after").ty,
        Type::array_of(Type::Number)
    );
}

#[test]
fn loop_tags_collect_per_iteration_values() {
    let source = main_with_helpers(
        "ys = for [1, 2, 3] as i |> double(i) as y |> max(y)\nafter = y\n",
    );
    let files = [("main.kcl", source.as_str())];
    assert!(eval(&files, "after").equals(&numbers(&[2.0, 4.0, 6.0])));
    assert!(eval(&files, "ys").equals(&numbers(&[2.0, 4.0, 6.0])));
}

#[test]
fn nested_loop_tags_nest_sequences() {
    let source = "grid = for [1, 2] as row |> for [10, 20] as col |> (row * col) as cell\n\
                  all = cell\n";
    let (session, id) = session(&[("main.kcl", source)]);
    assert_clean(&session);
    assert_eq!(
        resolved(&session, id).top_level("all").expect("all").ty,
        Type::array_of(Type::array_of(Type::Number))
    );

    let mut interpreter = Interpreter::new(&session);
    let all = interpreter.value_of(id, "all").expect("all");
    let expected = Value::Array(vec![numbers(&[10.0, 20.0]), numbers(&[20.0, 40.0])]);
    assert!(all.equals(&expected));
}

#[test]
fn loop_variables_do_not_escape() {
    let (session, id) = session(&[("main.kcl", "r = for [1] as i |> (i)\nj = i\n")]);
    assert!(matches!(
        &errors(&session, id)[..],
        [ResolveError::Scope {
            kind: ScopeErrorKind::NotInScope,
            ..
        }]
    ));
}
