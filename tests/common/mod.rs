//! Shared helpers for integration tests: a test class template with the usual
//! mocks, and accessors for the rewritten method body.

#![allow(dead_code)]

use mockshift::{config::Config, engine::Engine, engine::FileOutcome};

pub const TEMPLATE: &str = "import mockit.*;

class SubjectTest {
    @Mocked Object target;
    @Mocked Object a;
    @Mocked Object b;
    @Injectable Service service;
    @Tested Calculator calculator;

    void test() {
BODY
    }
}

interface Service {
    String find(int id);
    String find(String key);
    void store(String key, int value);
}

class Calculator {
    int compute() { return 1; }
}
";

/// Indents each line of `body` to method-body depth.
fn indented(body: &str) -> String {
    body.lines()
        .map(|l| if l.is_empty() { String::new() } else { format!("        {l}") })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn source_with(body: &str) -> String {
    TEMPLATE.replace("BODY", &indented(body))
}

pub fn rewrite_with(config: Config, body: &str) -> FileOutcome {
    Engine::new(config)
        .rewrite_source("SubjectTest.java", &source_with(body))
        .unwrap_or_else(|e| panic!("fixture does not parse: {e}"))
}

pub fn rewrite(body: &str) -> FileOutcome {
    rewrite_with(Config::default(), body)
}

/// The body of `test()` in `text`, dedented back to column zero.
pub fn body_of(text: &str) -> String {
    let start = text.find("void test() {\n").expect("test method") + "void test() {\n".len();
    let end = start + text[start..].find("\n    }\n}").expect("end of test method");
    text[start..end]
        .lines()
        .map(|l| l.strip_prefix("        ").unwrap_or(l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrites `body` and returns the new method body.
pub fn rewritten_body(body: &str) -> String {
    body_of(&rewrite(body).rewritten)
}
