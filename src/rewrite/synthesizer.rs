//! Stub and verify synthesis for one expectation record.
//!
//! | mode        | result              | output                                         |
//! |-------------|---------------------|------------------------------------------------|
//! | stub        | none, void, counted | `doNothing().when(m).call(..)`                 |
//! | stub        | value(s)            | `when(m.call(..)).thenReturn(v1, ..)`          |
//! | stub        | thrown              | `when(..).thenThrow(e)` / `doThrow(e).when(m)` |
//! | stub        | delegate            | `when(..).thenAnswer(invocation -> { .. })`    |
//! | verify      | any                 | `verify(m, mode).call(..)`                     |
//!
//! Partial mocks take the `doReturn(..).when(m).call(..)` form so that the
//! real method is not run while stubbing. Lenient stubs are prefixed with
//! `lenient()` and never verified.

use std::collections::HashSet;

use crate::{
    ast::{
        builder::{api_call, call, call_on, cast, expr_stmt, int_literal, lambda_block, null_literal, paren, return_stmt},
        visit::{fresh_name, names_in, walk_expr_mut, walk_stmt_mut, VisitMut},
        Expr, ExprKind, MethodCall, Stmt, StmtKind, TypeRef,
    },
    diagnostics::{DiagnosticKind, SkipReason},
};

use super::{
    matchers::{looks_like_type_variable, lower_arguments, ApiStyle},
    types::{BlockMode, DelegateBody, ExpectationRecord, MultiplicityConstraint, ResultSpec, Synthesized, VerifySpec},
};

pub struct Synthesizer<'a> {
    pub style: ApiStyle,
    /// Preferred name of the answer lambda's parameter.
    pub answer_param: &'a str,
    /// Names already used in the method body.
    pub taken: &'a HashSet<String>,
}

impl Synthesizer<'_> {
    pub fn synthesize(&self, record: &ExpectationRecord, mode: BlockMode) -> Result<Synthesized, SkipReason> {
        let args = lower_arguments(&record.slots, record.signature.as_ref(), self.style);
        let call = MethodCall {
            receiver: None,
            type_args: record.call.type_args.clone(),
            name: record.call.name.clone(),
            args,
        };

        if mode.is_verify() {
            return Ok(Synthesized {
                stubs: Vec::new(),
                verifies: self.verifies(record, &call, true),
            });
        }

        let lenient = mode == BlockMode::StubLenient;
        let stub = self.stub(record, &call, lenient)?;
        let verifies = if mode == BlockMode::StubStrict {
            self.verifies(record, &call, false)
        } else {
            Vec::new()
        };
        Ok(Synthesized {
            stubs: stub.into_iter().map(expr_stmt).collect(),
            verifies,
        })
    }

    fn stub(&self, record: &ExpectationRecord, call: &MethodCall, lenient: bool) -> Result<Option<Expr>, SkipReason> {
        let known_non_void = record.returns_void() == Some(false);
        let when_form = !record.spy_style;
        let stubbed = || call_on(record.receiver.clone(), call, call.args.clone());

        let expr = match &record.result {
            ResultSpec::None => {
                if record.returns_void() == Some(true) && !record.multiplicity.is_unspecified() {
                    Some(self.do_form(record, call, lenient, "doNothing", Vec::new()))
                } else {
                    None
                }
            }
            ResultSpec::SingleValue(v) => Some(self.returning(record, call, lenient, vec![v.clone()])),
            ResultSpec::SequencedValues(vs) => Some(self.returning(record, call, lenient, vs.clone())),
            ResultSpec::Thrown(e) if known_non_void && when_form => {
                Some(self.then(lenient, stubbed(), "thenThrow", vec![e.clone()]))
            }
            ResultSpec::Thrown(e) => Some(self.do_form(record, call, lenient, "doThrow", vec![e.clone()])),
            ResultSpec::Delegate(body) => {
                let answer = self.answer(record, body)?;
                if known_non_void && when_form {
                    Some(self.then(lenient, stubbed(), "thenAnswer", vec![answer]))
                } else {
                    Some(self.do_form(record, call, lenient, "doAnswer", vec![answer]))
                }
            }
        };
        Ok(expr)
    }

    fn returning(&self, record: &ExpectationRecord, call: &MethodCall, lenient: bool, values: Vec<Expr>) -> Expr {
        if record.spy_style {
            self.do_form(record, call, lenient, "doReturn", values)
        } else {
            let stubbed = call_on(record.receiver.clone(), call, call.args.clone());
            self.then(lenient, stubbed, "thenReturn", values)
        }
    }

    /// `when(stubbed).method(args)`, optionally `lenient().when(..)`.
    fn then(&self, lenient: bool, stubbed: Expr, method: &str, args: Vec<Expr>) -> Expr {
        let when = self.entry(lenient, "when", vec![stubbed]);
        call(when, method, args)
    }

    /// `doX(args).when(receiver).call(..)`
    fn do_form(&self, record: &ExpectationRecord, call_: &MethodCall, lenient: bool, method: &str, args: Vec<Expr>) -> Expr {
        let head = self.entry(lenient, method, args);
        let when = call(head, "when", vec![record.receiver.clone()]);
        call_on(when, call_, call_.args.clone())
    }

    fn entry(&self, lenient: bool, method: &str, args: Vec<Expr>) -> Expr {
        let owner = self.style.mockito();
        if lenient {
            call(api_call(owner, "lenient", Vec::new()), method, args)
        } else {
            api_call(owner, method, args)
        }
    }

    fn verifies(&self, record: &ExpectationRecord, call: &MethodCall, verify_mode: bool) -> Vec<VerifySpec> {
        let modes = self.count_modes(&record.multiplicity, verify_mode);
        modes
            .into_iter()
            .map(|mode| VerifySpec {
                target: record.receiver.clone(),
                mode,
                call: call.clone(),
            })
            .collect()
    }

    /// Verification modes for a count constraint. An unspecified constraint
    /// means exactly once in verification blocks and nothing in stub blocks.
    fn count_modes(&self, m: &MultiplicityConstraint, verify_mode: bool) -> Vec<Option<Expr>> {
        let owner = self.style.mockito();
        let mode = |name: &str, n: u32| Some(api_call(owner, name, vec![int_literal(n)]));
        if let Some(exact) = m.exact {
            return vec![match exact {
                0 => Some(api_call(owner, "never", Vec::new())),
                1 => None,
                n => mode("times", n),
            }];
        }
        match (m.min, m.max) {
            (Some(min), Some(max)) => vec![mode("atLeast", min), mode("atMost", max)],
            (Some(min), None) => vec![mode("atLeast", min)],
            (None, Some(max)) => vec![mode("atMost", max)],
            (None, None) if verify_mode => vec![None],
            (None, None) => Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Delegates
    // ------------------------------------------------------------------------

    /// `invocation -> { body }` with the callback parameters replaced by
    /// positional argument accessors.
    fn answer(&self, record: &ExpectationRecord, body: &DelegateBody) -> Result<Expr, SkipReason> {
        let mut taken = self.taken.clone();
        taken.extend(names_in(&body.stmts));
        let param = fresh_name(self.answer_param, &taken);

        let mut stmts = body.stmts.clone();
        for (i, (name, declared)) in body.params.iter().enumerate() {
            let ty = record
                .signature
                .as_ref()
                .and_then(|s| s.param_type(i))
                .filter(|t| !looks_like_type_variable(t))
                .unwrap_or_else(|| declared.clone());
            let accessor = argument_accessor(&param, i, &ty);
            let mut subst = Substitute {
                name,
                replacement: &accessor,
            };
            stmts.iter_mut().for_each(|s| subst.visit_stmt_mut(s));
        }

        if body.returns_void {
            let mut fix = VoidReturns;
            stmts.iter_mut().for_each(|s| fix.visit_stmt_mut(s));
            let ends = stmts
                .last()
                .is_some_and(|s| matches!(s.kind, StmtKind::Return(_) | StmtKind::Throw(_)));
            if !ends {
                stmts.push(return_stmt(Some(null_literal())));
            }
        } else if stmts.is_empty() {
            return Err(SkipReason {
                kind: DiagnosticKind::UnsupportedShape,
                message: format!("delegate for {} has an empty body", record.call.name),
            });
        }
        Ok(lambda_block(&param, stmts))
    }
}

/// `((Type) invocation.getArgument(i))`
fn argument_accessor(param: &str, index: usize, ty: &TypeRef) -> Expr {
    let get = call(
        crate::ast::builder::name(param),
        "getArgument",
        vec![int_literal(index as u32)],
    );
    let target = if ty.is_primitive() {
        TypeRef::named(ty.boxed_name())
    } else {
        ty.clone()
    };
    paren(cast(target, get))
}

/// Replaces references to one delegate parameter, leaving lambdas and
/// anonymous classes that redeclare the name alone.
struct Substitute<'r> {
    name: &'r str,
    replacement: &'r Expr,
}

impl VisitMut for Substitute<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if matches!(&expr.kind, ExprKind::Name(n) if n == self.name) {
            *expr = self.replacement.clone();
            return;
        }
        if matches!(&expr.kind, ExprKind::Lambda(l) if l.params.iter().any(|p| p.name == self.name)) {
            return;
        }
        walk_expr_mut(self, expr);
    }

    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        if let StmtKind::LocalVar(decl) = &stmt.kind {
            if decl.declarators.iter().any(|d| d.name == self.name) {
                return;
            }
        }
        walk_stmt_mut(self, stmt);
    }
}

/// Turns `return;` into `return null;` outside nested lambdas and classes.
struct VoidReturns;

impl VisitMut for VoidReturns {
    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        if let StmtKind::Return(value) = &mut stmt.kind {
            value.get_or_insert_with(null_literal);
            return;
        }
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, _expr: &mut Expr) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rewrite::grouper::group, syntax::Printer, test_support::Fixture};

    const FIXTURE: &str = r#"
        import mockit.*;
        interface Service {
            int count(String key);
            void store(String key, int value);
            String name();
        }
        class ServiceTest {
            @Mocked Service service;
            void test() { BODY }
        }
    "#;

    fn synthesize(body: &str) -> Vec<(Vec<String>, Vec<String>)> {
        let fixture = Fixture::new(&FIXTURE.replace("BODY", body));
        let block = fixture.first_block("ServiceTest", "test");
        let scope = fixture.scope("ServiceTest", "test");
        let grouped = group(&block, &scope, &fixture.index, &fixture.dsl).unwrap();
        let taken = HashSet::new();
        let synth = Synthesizer {
            style: ApiStyle::default(),
            answer_param: "invocation",
            taken: &taken,
        };
        let printer = Printer::default();
        grouped
            .records()
            .map(|r| {
                let out = synth.synthesize(r, block.mode).unwrap();
                let stubs = out.stubs.iter().map(|s| printer.statement(s, "")).collect();
                let verifies = out
                    .verifies
                    .iter()
                    .map(|v| {
                        let mut args = vec![v.target.clone()];
                        args.extend(v.mode.clone());
                        let head = api_call(None, "verify", args);
                        printer.expr(&call_on(head, &v.call, v.call.args.clone()))
                    })
                    .collect();
                (stubs, verifies)
            })
            .collect()
    }

    #[test]
    fn values_become_then_return() {
        let out = synthesize("new Expectations() {{ service.count(\"a\"); result = 1; result = 2; }};");
        assert_eq!(out[0].0, vec!["when(service.count(\"a\")).thenReturn(1, 2);"]);
        assert!(out[0].1.is_empty());
    }

    #[test]
    fn counted_void_calls_get_do_nothing_and_verify() {
        let out = synthesize("new Expectations() {{ service.store(anyString, anyInt); times = 2; }};");
        assert_eq!(out[0].0, vec!["doNothing().when(service).store(anyString(), anyInt());"]);
        assert_eq!(out[0].1, vec!["verify(service, times(2)).store(anyString(), anyInt())"]);
    }

    #[test]
    fn void_methods_throw_through_do_throw() {
        let out = synthesize("new Expectations() {{ service.store(\"k\", 1); result = new IllegalStateException(); }};");
        assert_eq!(out[0].0, vec!["doThrow(new IllegalStateException()).when(service).store(\"k\", 1);"]);
        let out = synthesize("new Expectations() {{ service.name(); result = new IllegalStateException(); }};");
        assert_eq!(out[0].0, vec!["when(service.name()).thenThrow(new IllegalStateException());"]);
    }

    #[test]
    fn lenient_blocks_never_verify() {
        let out = synthesize("new NonStrictExpectations() {{ service.name(); result = \"n\"; minTimes = 1; }};");
        assert_eq!(out[0].0, vec!["lenient().when(service.name()).thenReturn(\"n\");"]);
        assert!(out[0].1.is_empty());
    }

    #[test]
    fn verification_counts() {
        let out = synthesize(
            "new Verifications() {{ service.name(); service.name(); times = 0; service.count(anyString); minTimes = 1; maxTimes = 3; }};",
        );
        assert_eq!(out[0].1, vec!["verify(service).name()"]);
        assert_eq!(out[1].1, vec!["verify(service, never()).name()"]);
        assert_eq!(
            out[2].1,
            vec![
                "verify(service, atLeast(1)).count(anyString())",
                "verify(service, atMost(3)).count(anyString())"
            ]
        );
    }

    #[test]
    fn delegates_read_positional_arguments() {
        let out = synthesize(
            "new Expectations() {{ service.count(anyString); result = new Delegate() { int len(String key) { return key.length(); } }; }};",
        );
        assert_eq!(
            out[0].0,
            vec!["when(service.count(anyString())).thenAnswer(invocation -> {\n    return ((String) invocation.getArgument(0)).length();\n});"]
        );
    }

    #[test]
    fn void_delegates_return_null() {
        let out = synthesize(
            "new Expectations() {{ service.store(anyString, anyInt); result = new Delegate() { void keep(String k, int v) { if (v < 0) return; log(k); } }; }};",
        );
        let stub = &out[0].0[0];
        assert!(stub.starts_with("doAnswer(invocation -> {"), "{stub}");
        assert!(stub.contains("if (((Integer) invocation.getArgument(1)) < 0)"), "{stub}");
        assert!(stub.contains("return null;\n    log(((String) invocation.getArgument(0)));\n    return null;"), "{stub}");
        assert!(stub.ends_with(".when(service).store(anyString(), anyInt());"), "{stub}");
    }
}
