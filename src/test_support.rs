//! Shared fixtures for unit tests.

use crate::{
    ast::{CompilationUnit, Expr, MethodDecl, Stmt, TypeDecl},
    bindings::{DslResolver, MethodScope, TypeIndex},
    rewrite::{scanner::scan, types::RecordingBlock},
    syntax::{parse_compilation_unit, parse_statements},
};

pub fn stmts(src: &str) -> Vec<Stmt> {
    parse_statements(src, "test.java").unwrap_or_else(|e| panic!("bad test statements {src:?}: {e:?}"))
}

pub fn expr(src: &str) -> Expr {
    stmts(&format!("{src};"))
        .remove(0)
        .as_expr()
        .cloned()
        .unwrap_or_else(|| panic!("not an expression statement: {src}"))
}

pub fn dsl_for(imports: &str) -> DslResolver {
    let unit = parse_compilation_unit(&format!("{imports}\nclass Fixture {{}}"), "Fixture.java")
        .unwrap_or_else(|e| panic!("bad imports {imports:?}: {e:?}"));
    DslResolver::for_unit(&unit)
}

/// A parsed file with its type index and recording-block resolver.
pub struct Fixture {
    pub unit: CompilationUnit,
    pub index: TypeIndex,
    pub dsl: DslResolver,
}

impl Fixture {
    pub fn new(src: &str) -> Self {
        let unit = parse_compilation_unit(src, "Fixture.java")
            .unwrap_or_else(|e| panic!("bad fixture: {e:?}\n{src}"));
        let mut index = TypeIndex::new();
        index.add_unit(&unit);
        let dsl = DslResolver::for_unit(&unit);
        Self { unit, index, dsl }
    }

    pub fn class(&self, name: &str) -> &TypeDecl {
        self.unit
            .types
            .iter()
            .find(|t| t.name == name)
            .unwrap_or_else(|| panic!("no class {name}"))
    }

    pub fn method(&self, class: &str, method: &str) -> &MethodDecl {
        self.class(class)
            .methods()
            .find(|m| m.name == method)
            .unwrap_or_else(|| panic!("no method {class}.{method}"))
    }

    pub fn scope(&self, class: &str, method: &str) -> MethodScope {
        MethodScope::new(self.class(class).fields(), self.method(class, method))
    }

    /// The first usable recording block of the method body.
    pub fn first_block(&self, class: &str, method: &str) -> RecordingBlock {
        let body = &self
            .method(class, method)
            .body
            .as_ref()
            .unwrap_or_else(|| panic!("{class}.{method} has no body"))
            .stmts;
        scan(body, &self.dsl)
            .into_iter()
            .find_map(|item| item.outcome.ok())
            .unwrap_or_else(|| panic!("no recording block in {class}.{method}"))
    }
}
