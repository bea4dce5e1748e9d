// tests/parser_tests.rs

use mockshift::{
    ast::{ExprKind, Member, StmtKind, TypeKind},
    errors::ErrorType,
    syntax::{parse_compilation_unit, parse_statements, Printer},
};

fn roundtrip(src: &str) -> String {
    Printer::default().statements(&parse_statements(src, "t").unwrap(), "")
}

// ---
// Declarations
// ---

#[test]
fn test_class_with_annotated_members() {
    let unit = parse_compilation_unit(
        "package com.acme;\n\
         import mockit.*;\n\
         import static org.junit.Assert.*;\n\
         public class OrderTest {\n\
             @Mocked OrderRepository repository;\n\
             @Tested(fullyInitialized = true) OrderService service;\n\
             @Test public void places(@Injectable Clock clock) throws Exception { service.place(); }\n\
             static class Helper { }\n\
         }",
        "OrderTest.java",
    )
    .unwrap();

    assert_eq!(unit.package.as_deref(), Some("com.acme"));
    assert_eq!(unit.imports.len(), 2);
    assert!(unit.imports[0].wildcard);
    assert!(unit.imports[1].is_static);

    let class = &unit.types[0];
    assert_eq!(class.kind, TypeKind::Class);
    assert_eq!(class.fields().count(), 2);
    assert!(class.fields().next().unwrap().modifiers.has_annotation("Mocked"));

    let method = class.methods().next().unwrap();
    assert_eq!(method.name, "places");
    assert!(method.params[0].modifiers.has_annotation("Injectable"));
    assert_eq!(method.throws[0].simple_name(), "Exception");
    assert_eq!(class.nested_types().next().unwrap().name, "Helper");
}

#[test]
fn test_interface_with_generic_methods() {
    let unit = parse_compilation_unit(
        "interface Repo<T> { <R> List<R> map(Function<? super T, R> f); void save(T item, String... tags); }",
        "Repo.java",
    )
    .unwrap();
    let repo = &unit.types[0];
    assert_eq!(repo.kind, TypeKind::Interface);
    assert_eq!(repo.type_params[0].name, "T");
    let methods: Vec<_> = repo.methods().collect();
    assert_eq!(methods[0].type_params[0].name, "R");
    assert!(methods[1].params[1].varargs);
}

// ---
// Recording blocks
// ---

#[test]
fn test_recording_block_is_an_anonymous_class_with_initializer() {
    let stmts = parse_statements(
        "new Expectations(helper) {{ helper.compute(anyInt); result = 3; times = 1; }};",
        "t",
    )
    .unwrap();
    let StmtKind::Expr(expr) = &stmts[0].kind else {
        panic!("expected an expression statement");
    };
    let ExprKind::New(new) = &expr.kind else {
        panic!("expected object creation");
    };
    assert_eq!(new.ty.name, "Expectations");
    assert_eq!(new.args.len(), 1);
    let body = new.body.as_ref().unwrap();
    let Member::Initializer { is_static, body } = &body.members[0] else {
        panic!("expected an initializer");
    };
    assert!(!is_static);
    assert_eq!(body.stmts.len(), 3);
}

#[test]
fn test_delegate_result_parses_as_nested_anonymous_class() {
    let stmts = parse_statements(
        "new Expectations() {{ dep.find(anyString); result = new Delegate() { String find(String key) { return key.trim(); } }; }};",
        "t",
    )
    .unwrap();
    assert_eq!(stmts.len(), 1);
}

// ---
// Printing
// ---

#[test]
fn test_mockito_statements_print_back_unchanged() {
    for src in [
        "when(repo.find(anyInt())).thenReturn(\"a\", \"b\");",
        "doNothing().when(repo).save(any(Order.class));",
        "verify(repo, times(2)).save(eq(\"x\"));",
        "InOrder inOrder = inOrder(a, b);",
    ] {
        assert_eq!(roundtrip(src), src);
    }
}

#[test]
fn test_lambdas_print_with_indented_bodies() {
    assert_eq!(
        roundtrip("when(m.get(anyInt())).thenAnswer(invocation -> { return null; });"),
        "when(m.get(anyInt())).thenAnswer(invocation -> {\n    return null;\n});"
    );
}

// ---
// Errors
// ---

#[test]
fn test_parse_errors_carry_source_and_span() {
    let err = parse_compilation_unit("class Broken { void t() { int = ; } }", "Broken.java").unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Parse);
    assert!(err.span().is_some());
    let rendered = format!("{:?}", miette::Report::new(err));
    assert!(rendered.contains("mockshift::parse"), "{rendered}");
}
