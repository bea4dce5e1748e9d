//! End-to-end rewrites of recording blocks inside a test class.

mod common;

use common::{body_of, rewrite, rewrite_with, rewritten_body, source_with};
use mockshift::{
    config::Config,
    diagnostics::{BlockState, DiagnosticKind, Severity},
    rewrite::types::BlockMode,
};

#[test]
fn single_result_becomes_then_return_without_verify() {
    let out = rewrite("new Expectations() {{\n    target.hashCode(); result = 10;\n}};");
    assert_eq!(body_of(&out.rewritten), "when(target.hashCode()).thenReturn(10);");
    assert!(out.diagnostics.is_empty());
}

#[test]
fn counted_void_call_is_stubbed_and_verified() {
    assert_eq!(
        rewritten_body("new Expectations() {{\n    target.wait(anyLong, anyInt); times = 2;\n}};"),
        "doNothing().when(target).wait(anyLong(), anyInt());\nverify(target, times(2)).wait(anyLong(), anyInt());"
    );
}

#[test]
fn full_verification_checks_each_call_then_no_more_interactions() {
    assert_eq!(
        rewritten_body("new FullVerifications() {{\n    a.wait(anyLong, anyInt); times = 2;\n    b.notify();\n}};"),
        "verify(a, times(2)).wait(anyLong(), anyInt());\nverify(b).notify();\nverifyNoMoreInteractions(a, b);"
    );
}

#[test]
fn sequenced_results_share_one_then_return() {
    assert_eq!(
        rewritten_body(
            "new Expectations() {{\n    target.toString(); result = \"x\"; result = \"y\"; result = \"z\";\n}};"
        ),
        "when(target.toString()).thenReturn(\"x\", \"y\", \"z\");"
    );
}

#[test]
fn control_flow_inside_a_block_leaves_it_untouched() {
    let body = "new Expectations() {{\n    if (flag) { target.hashCode(); }\n}};\nrun();";
    let out = rewrite(body);
    assert_eq!(out.rewritten, source_with(body));
    assert_eq!(out.diagnostics.len(), 1);
    let d = &out.diagnostics[0];
    assert_eq!(d.kind, DiagnosticKind::UnsupportedShape);
    assert_eq!(d.severity, Severity::Skip);
    assert!(matches!(out.index.methods[0].blocks[0].state, BlockState::Skipped(_)));
}

#[test]
fn already_migrated_code_is_left_alone() {
    let body = "when(target.hashCode()).thenReturn(10);\nrun();\nverify(target).hashCode();";
    let out = rewrite(body);
    assert!(!out.changed());
    assert!(out.diagnostics.is_empty());
    assert!(out.index.methods.is_empty());
}

#[test]
fn rewriting_twice_changes_nothing_the_second_time() {
    let first = rewrite("new Expectations() {{\n    target.hashCode(); result = 1; times = 1;\n}};\nrun();");
    let second = mockshift::engine::Engine::new(Config::default())
        .rewrite_source("SubjectTest.java", &first.rewritten)
        .unwrap();
    assert!(!second.changed());
    assert!(second.diagnostics.is_empty());
}

#[test]
fn setup_statements_keep_their_place() {
    assert_eq!(
        rewritten_body(
            "new Expectations() {{\n    Fixtures.prepare();\n    target.hashCode(); result = 1;\n    Fixtures.done();\n}};"
        ),
        "Fixtures.prepare();\nwhen(target.hashCode()).thenReturn(1);\nFixtures.done();"
    );
}

#[test]
fn locals_declared_before_a_result_stay_ahead_of_the_stub() {
    assert_eq!(
        rewritten_body("new Expectations() {{\n    target.toString(); String v = \"x\"; result = v;\n}};"),
        "String v = \"x\";\nwhen(target.toString()).thenReturn(v);"
    );
    let out = rewrite(
        "new Expectations() {{\n    service.find(1); RuntimeException boom = new RuntimeException(); result = boom;\n}};",
    );
    assert_eq!(
        body_of(&out.rewritten),
        "RuntimeException boom = new RuntimeException();\nwhen(service.find(1)).thenThrow(boom);"
    );
    assert!(out.diagnostics.is_empty());
}

#[test]
fn min_and_max_counts_become_two_verifications() {
    let body = rewritten_body("new Verifications() {{\n    target.hashCode(); minTimes = 1; maxTimes = 3;\n}};");
    assert_eq!(
        body,
        "verify(target, atLeast(1)).hashCode();\nverify(target, atMost(3)).hashCode();"
    );
    assert!(!body.contains("times("));
}

#[test]
fn exact_count_wins_over_bounds_with_a_warning() {
    let out = rewrite("new Verifications() {{\n    target.hashCode(); times = 2; minTimes = 1;\n}};");
    assert_eq!(body_of(&out.rewritten), "verify(target, times(2)).hashCode();");
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].kind, DiagnosticKind::RedundantConstraint);
    assert_eq!(out.diagnostics[0].severity, Severity::Warning);
}

#[test]
fn strict_counts_are_checked_after_the_exercised_code() {
    assert_eq!(
        rewritten_body("new Expectations() {{\n    service.store(\"k\", 1); times = 1;\n}};\nrun();\nassertTrue(done);"),
        "doNothing().when(service).store(\"k\", 1);\nrun();\nassertTrue(done);\nverify(service).store(\"k\", 1);"
    );
}

#[test]
fn earlier_verifications_do_not_replace_a_strict_count() {
    let out = rewrite(
        "new Verifications() {{ service.store(\"a\", 1); }};\nnew Expectations() {{ service.store(\"a\", 1); times = 1; }};\nrun();",
    );
    assert_eq!(
        body_of(&out.rewritten),
        "verify(service).store(\"a\", 1);\ndoNothing().when(service).store(\"a\", 1);\nrun();\nverify(service).store(\"a\", 1);"
    );
    assert!(out.diagnostics.iter().all(|d| d.kind != DiagnosticKind::DuplicateVerification));
}

#[test]
fn later_verifications_replace_a_strict_count() {
    let out = rewrite(
        "new Expectations() {{ service.store(\"a\", 1); times = 1; }};\nrun();\nnew Verifications() {{ service.store(\"a\", 1); }};",
    );
    assert_eq!(
        body_of(&out.rewritten),
        "doNothing().when(service).store(\"a\", 1);\nrun();\nverify(service).store(\"a\", 1);"
    );
    assert_eq!(out.diagnostics[0].kind, DiagnosticKind::DuplicateVerification);
}

#[test]
fn strict_counts_on_try_locals_close_the_try_body() {
    assert_eq!(
        rewritten_body(
            "try {\n    String k = \"a\";\n    new Expectations() {{ service.store(k, 1); times = 1; }};\n    run();\n} finally {\n    done();\n}"
        ),
        "try {\n    String k = \"a\";\n    doNothing().when(service).store(k, 1);\n    run();\n    verify(service).store(k, 1);\n} finally {\n    done();\n}"
    );
}

#[test]
fn strict_counts_on_lambda_locals_stay_inside_the_lambda() {
    assert_eq!(
        rewritten_body(
            "assertThrows(IllegalStateException.class, () -> {\n    String k = \"a\";\n    new Expectations() {{ service.store(k, 1); times = 1; result = new IllegalStateException(); }};\n    calculator.compute();\n});"
        ),
        "assertThrows(IllegalStateException.class, () -> {\n    String k = \"a\";\n    doThrow(new IllegalStateException()).when(service).store(k, 1);\n    calculator.compute();\n    verify(service).store(k, 1);\n});"
    );
}

#[test]
fn strict_counts_without_inner_locals_still_run_last() {
    assert_eq!(
        rewritten_body(
            "try {\n    new Expectations() {{ service.store(\"a\", 1); times = 1; }};\n    run();\n} finally {\n    done();\n}\ncheck();"
        ),
        "try {\n    doNothing().when(service).store(\"a\", 1);\n    run();\n} finally {\n    done();\n}\ncheck();\nverify(service).store(\"a\", 1);"
    );
}

#[test]
fn strict_counts_stay_inline_when_not_deferred() {
    let config = Config::from_yaml_str("policy:\n  defer_strict_verifications: false\n", "test").unwrap();
    let out = rewrite_with(config, "new Expectations() {{\n    service.store(\"k\", 1); times = 1;\n}};\nrun();");
    assert_eq!(
        body_of(&out.rewritten),
        "doNothing().when(service).store(\"k\", 1);\nverify(service).store(\"k\", 1);\nrun();"
    );
}

#[test]
fn ordered_verifications_use_one_in_order_context() {
    assert_eq!(
        rewritten_body("new VerificationsInOrder() {{\n    a.notify();\n    b.notify();\n    a.notifyAll();\n}};"),
        "InOrder inOrder = inOrder(a, b);\ninOrder.verify(a).notify();\ninOrder.verify(b).notify();\ninOrder.verify(a).notifyAll();"
    );
}

#[test]
fn constructor_arguments_make_partial_mocks() {
    let out = rewrite(
        "Calculator helper = new Calculator();\nnew Expectations(helper) {{\n    helper.compute(); result = 3;\n}};",
    );
    assert_eq!(
        body_of(&out.rewritten),
        "Calculator helper = new Calculator();\ndoReturn(3).when(helper).compute();"
    );
    let block = &out.index.methods[0].blocks[0];
    assert_eq!(block.mode, Some(BlockMode::StubStrict));
    assert_eq!(block.spied, vec!["helper".to_string()]);
}

#[test]
fn exhaustive_block_arguments_restrict_the_final_check() {
    assert_eq!(
        rewritten_body("new FullVerifications(a) {{\n    a.notify();\n    b.notify();\n}};"),
        "verify(a).notify();\nverify(b).notify();\nverifyNoMoreInteractions(a);"
    );
}

#[test]
fn thrown_results_on_value_methods() {
    assert_eq!(
        rewritten_body("new Expectations() {{\n    service.find(anyInt); result = new IllegalStateException(\"down\");\n}};"),
        "when(service.find(anyInt())).thenThrow(new IllegalStateException(\"down\"));"
    );
}

#[test]
fn concrete_values_next_to_matchers_are_wrapped() {
    assert_eq!(
        rewritten_body("new Verifications() {{\n    service.store(anyString, 4);\n}};"),
        "verify(service).store(anyString(), eq(4));"
    );
}

#[test]
fn blocks_inside_assert_throws_lambdas_are_rewritten() {
    let out = rewrite(
        "assertThrows(IllegalStateException.class, () -> {\n    new Expectations() {{\n        service.find(1); result = new IllegalStateException();\n    }};\n    calculator.compute();\n});",
    );
    assert_eq!(
        body_of(&out.rewritten),
        "assertThrows(IllegalStateException.class, () -> {\n    when(service.find(1)).thenThrow(new IllegalStateException());\n    calculator.compute();\n});"
    );
}

#[test]
fn qualified_style_prefixes_every_api_call() {
    let config = Config::from_yaml_str("style:\n  qualified: true\n", "test").unwrap();
    let out = rewrite_with(config, "new Verifications() {{\n    service.find(anyInt); times = 0;\n}};");
    assert_eq!(
        body_of(&out.rewritten),
        "Mockito.verify(service, Mockito.never()).find(ArgumentMatchers.anyInt());"
    );
}

#[test]
fn unknown_receivers_are_skipped_as_unresolved() {
    let out = rewrite("new Expectations() {{\n    stranger.call(); result = 1;\n}};");
    assert!(!out.changed());
    assert_eq!(out.diagnostics[0].kind, DiagnosticKind::UnresolvedType);
}

#[test]
fn mixed_ordered_and_exhaustive_blocks_are_unsupported() {
    let out = rewrite("new FullVerificationsInOrder() {{\n    a.notify();\n}};");
    assert!(!out.changed());
    assert_eq!(out.diagnostics[0].kind, DiagnosticKind::UnsupportedShape);
    assert_eq!(out.diagnostics[0].phase, "scanning");
}

#[test]
fn blocks_without_the_mocking_import_are_provisional() {
    let source = source_with("new Expectations() {{\n    target.hashCode(); result = 10;\n}};").replace("import mockit.*;\n", "");
    let out = mockshift::engine::Engine::new(Config::default())
        .rewrite_source("SubjectTest.java", &source)
        .unwrap();
    assert!(out.changed());
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].kind, DiagnosticKind::UnresolvedType);
    assert_eq!(out.diagnostics[0].severity, Severity::Note);
    assert!(out.index.methods[0].blocks[0].provisional);
}

#[test]
fn same_named_classes_from_other_packages_are_not_rewritten() {
    let source = source_with("new Expectations() {{\n    target.hashCode();\n}};")
        .replace("import mockit.*;", "import com.acme.testing.Expectations;");
    let out = mockshift::engine::Engine::new(Config::default())
        .rewrite_source("SubjectTest.java", &source)
        .unwrap();
    assert!(!out.changed());
    assert_eq!(out.diagnostics[0].kind, DiagnosticKind::UnresolvedType);
}
