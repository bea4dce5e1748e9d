//! Properties that hold for every rewrite, checked over generated blocks.

mod common;

use common::{body_of, rewrite, rewritten_body};
use mockshift::{
    ast::StmtKind,
    config::Config,
    engine::Engine,
    rewrite::matchers::is_target_matcher,
    syntax::parse_statements,
};
use proptest::prelude::*;

fn key_arg() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "anyString",
        "\"k\"",
        "key",
        "null",
        "withEqual(\"k\")",
        "withSubstring(\"k\")",
        "withNotNull()",
        "(String) any",
    ])
}

fn value_arg() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["anyInt", "3", "n", "withEqual(3)", "withAny(1)"])
}

#[derive(Debug, Clone)]
enum Item {
    Setup(usize),
    Record(&'static str),
    /// A record whose count follows a setup statement.
    Interleaved(usize, &'static str),
}

fn item() -> impl Strategy<Value = Item> {
    prop_oneof![
        (0usize..5).prop_map(Item::Setup),
        prop::sample::select(vec!["notify", "notifyAll", "hashCode"]).prop_map(Item::Record),
        (0usize..5, prop::sample::select(vec!["notify", "hashCode"]))
            .prop_map(|(i, method)| Item::Interleaved(i, method)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn arguments_are_all_matchers_or_none(key in key_arg(), value in value_arg()) {
        let body = format!(
            "String key = \"a\";\nint n = 1;\nnew Verifications() {{{{\n    service.store({key}, {value});\n}}}};"
        );
        let rewritten = rewritten_body(&body);
        let stmts = parse_statements(&rewritten, "rewritten").unwrap();
        let StmtKind::Expr(expr) = &stmts.last().unwrap().kind else {
            panic!("expected a verification, got:\n{rewritten}");
        };
        let call = expr.as_method_call().unwrap();
        prop_assert_eq!(&call.name, "store");
        let matchers = call.args.iter().filter(|a| is_target_matcher(a)).count();
        prop_assert!(matchers == 0 || matchers == call.args.len(), "{}", rewritten);
    }

    #[test]
    fn bounds_become_exactly_two_verifications(min in 0u32..5, extra in 0u32..4) {
        let max = min + extra;
        let rewritten = rewritten_body(&format!(
            "new Verifications() {{{{\n    target.hashCode(); minTimes = {min}; maxTimes = {max};\n}}}};"
        ));
        let lines: Vec<&str> = rewritten.lines().collect();
        prop_assert_eq!(lines.len(), 2);
        prop_assert_eq!(lines[0], format!("verify(target, atLeast({min})).hashCode();"));
        prop_assert_eq!(lines[1], format!("verify(target, atMost({max})).hashCode();"));
    }

    #[test]
    fn grouped_order_is_preserved(items in prop::collection::vec(item(), 1..8)) {
        let mut block = String::from("new Verifications() {{\n");
        let mut expected = Vec::new();
        for item in &items {
            match item {
                Item::Setup(i) => {
                    block.push_str(&format!("    Fixtures.step{i}();\n"));
                    expected.push(format!("Fixtures.step{i}();"));
                }
                Item::Record(method) => {
                    block.push_str(&format!("    a.{method}();\n"));
                    expected.push(format!("verify(a).{method}();"));
                }
                Item::Interleaved(i, method) => {
                    block.push_str(&format!("    a.{method}(); Fixtures.step{i}(); times = 1;\n"));
                    expected.push(format!("Fixtures.step{i}();"));
                    expected.push(format!("verify(a).{method}();"));
                }
            }
        }
        block.push_str("}};");
        prop_assert_eq!(rewritten_body(&block), expected.join("\n"));
    }

    #[test]
    fn rewriting_is_idempotent(values in prop::collection::vec(0u32..100, 1..4), times in prop::option::of(0u32..3)) {
        let results: String = values.iter().map(|v| format!(" result = \"{v}\";")).collect();
        let count = times.map(|t| format!(" times = {t};")).unwrap_or_default();
        let first = rewrite(&format!(
            "new Expectations() {{{{\n    service.find(anyInt);{results}{count}\n}}}};\nrun();"
        ));
        prop_assert!(first.changed());
        prop_assert!(!body_of(&first.rewritten).contains("Expectations"));

        let second = Engine::new(Config::default())
            .rewrite_source("SubjectTest.java", &first.rewritten)
            .unwrap();
        prop_assert!(!second.changed());
        prop_assert!(second.diagnostics.is_empty());
    }
}
