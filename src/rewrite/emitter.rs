//! Block emitter
//!
//! Assembles the replacement for one recording block: setup statements in
//! place, each record's stubs and verifications where the record was, plus the
//! shared `InOrder` context of ordered blocks and the trailing
//! `verifyNoMoreInteractions(..)` of exhaustive ones.

use std::collections::HashSet;

use crate::ast::{
    builder::{api_call, call, call_on, expr_stmt, local_var, name},
    visit::fresh_name,
    Expr, Stmt, TypeRef,
};

use super::{
    matchers::ApiStyle,
    types::{BlockMode, Synthesized, VerifySpec},
};

/// One grouped item after synthesis.
#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    Setup(Stmt),
    Record(Synthesized),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Emission {
    /// Statements that replace the block instantiation.
    pub stmts: Vec<Stmt>,
    /// Count checks to run at the end of the method.
    pub deferred: Vec<Stmt>,
}

pub struct Emitter<'a> {
    pub style: ApiStyle,
    pub in_order_var: &'a str,
    pub taken: &'a HashSet<String>,
    pub defer_strict: bool,
}

impl Emitter<'_> {
    /// `mocks` is the mock set of the block: the `inOrder(..)` arguments of
    /// ordered blocks, the `verifyNoMoreInteractions(..)` arguments of
    /// exhaustive ones.
    pub fn emit(&self, mode: BlockMode, pieces: Vec<Piece>, mocks: &[Expr]) -> Emission {
        let mut out = Emission::default();
        let mut in_order: Option<String> = None;

        for piece in pieces {
            let synth = match piece {
                Piece::Setup(stmt) => {
                    out.stmts.push(stmt);
                    continue;
                }
                Piece::Record(synth) => synth,
            };
            out.stmts.extend(synth.stubs);
            match mode {
                BlockMode::StubStrict if self.defer_strict => {
                    out.deferred.extend(synth.verifies.iter().map(|v| self.verify(v, None)));
                }
                BlockMode::VerifyOrdered if !synth.verifies.is_empty() => {
                    let var = match &in_order {
                        Some(var) => var.clone(),
                        None => {
                            let var = fresh_name(self.in_order_var, self.taken);
                            let init = api_call(self.style.mockito(), "inOrder", mocks.to_vec());
                            out.stmts.push(local_var(TypeRef::named("InOrder"), &var, init));
                            in_order = Some(var.clone());
                            var
                        }
                    };
                    out.stmts.extend(synth.verifies.iter().map(|v| self.verify(v, Some(&var))));
                }
                _ => out.stmts.extend(synth.verifies.iter().map(|v| self.verify(v, None))),
            }
        }

        if mode == BlockMode::VerifyExhaustive && !mocks.is_empty() {
            let check = api_call(self.style.mockito(), "verifyNoMoreInteractions", mocks.to_vec());
            out.stmts.push(expr_stmt(check));
        }
        out
    }

    /// `verify(m[, mode]).call(..)`, through `via.verify(..)` when given.
    fn verify(&self, spec: &VerifySpec, via: Option<&str>) -> Stmt {
        let mut args = vec![spec.target.clone()];
        args.extend(spec.mode.clone());
        let head = match via {
            Some(var) => call(name(var), "verify", args),
            None => api_call(self.style.mockito(), "verify", args),
        };
        expr_stmt(call_on(head, &spec.call, spec.call.args.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{builder::bare_call, MethodCall},
        syntax::Printer,
    };

    fn spec(target: &str, method: &str) -> VerifySpec {
        VerifySpec {
            target: name(target),
            mode: None,
            call: MethodCall {
                receiver: None,
                type_args: Vec::new(),
                name: method.to_string(),
                args: Vec::new(),
            },
        }
    }

    fn record(stub: Option<&str>, verifies: Vec<VerifySpec>) -> Piece {
        Piece::Record(Synthesized {
            stubs: stub.map(|s| expr_stmt(bare_call(s, Vec::new()))).into_iter().collect(),
            verifies,
        })
    }

    fn render(stmts: &[Stmt]) -> String {
        Printer::default().statements(stmts, "")
    }

    fn emitter<'a>(taken: &'a HashSet<String>, defer: bool) -> Emitter<'a> {
        Emitter {
            style: ApiStyle::default(),
            in_order_var: "inOrder",
            taken,
            defer_strict: defer,
        }
    }

    #[test]
    fn ordered_blocks_share_one_context() {
        let taken: HashSet<String> = ["inOrder".to_string()].into();
        let pieces = vec![
            Piece::Setup(expr_stmt(bare_call("prepare", Vec::new()))),
            record(None, vec![spec("a", "open")]),
            record(None, vec![spec("b", "close")]),
        ];
        let out = emitter(&taken, true).emit(BlockMode::VerifyOrdered, pieces, &[name("a"), name("b")]);
        assert_eq!(
            render(&out.stmts),
            "prepare();\nInOrder inOrder1 = inOrder(a, b);\ninOrder1.verify(a).open();\ninOrder1.verify(b).close();"
        );
    }

    #[test]
    fn exhaustive_blocks_end_with_no_more_interactions() {
        let taken = HashSet::new();
        let pieces = vec![record(None, vec![spec("a", "run")])];
        let out = emitter(&taken, true).emit(BlockMode::VerifyExhaustive, pieces, &[name("a"), name("b")]);
        assert_eq!(render(&out.stmts), "verify(a).run();\nverifyNoMoreInteractions(a, b);");
    }

    #[test]
    fn strict_verifications_can_be_deferred_or_inline() {
        let taken = HashSet::new();
        let pieces = || vec![record(Some("stubA"), vec![spec("a", "run")])];
        let deferred = emitter(&taken, true).emit(BlockMode::StubStrict, pieces(), &[]);
        assert_eq!(render(&deferred.stmts), "stubA();");
        assert_eq!(render(&deferred.deferred), "verify(a).run();");

        let inline = emitter(&taken, false).emit(BlockMode::StubStrict, pieces(), &[]);
        assert_eq!(render(&inline.stmts), "stubA();\nverify(a).run();");
        assert!(inline.deferred.is_empty());
    }
}
