//! Recording-block scanner
//!
//! Finds the statements of a method body that instantiate a recording-block
//! class with an anonymous body. Accepted positions are the method's own
//! statement list and one level below it: the bodies of a `try` statement, and
//! block lambdas passed to a top-level call (`assertThrows(.., () -> { .. })`).
//! Instantiations anywhere else are reported as unsupported.
//!
//! The scanner never modifies the tree.

use std::collections::HashSet;

use crate::{
    ast::{
        visit::{self, Visit},
        Expr, ExprKind, LambdaBody, LocalVarDecl, Member, MethodCall, NewObject, Span, Stmt, StmtKind,
    },
    bindings::{DslKind, DslLookup, DslResolver},
    diagnostics::{DiagnosticKind, SkipReason},
};

use super::types::{BlockLocation, BlockMode, Container, RecordingBlock};

/// One recording-block instantiation, usable or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanItem {
    pub dsl: DslKind,
    pub span: Span,
    /// `None` for instantiations outside the accepted positions.
    pub location: Option<BlockLocation>,
    pub provisional: bool,
    pub outcome: Result<RecordingBlock, SkipReason>,
}

/// All recording-block instantiations in `body`, in source order.
pub fn scan(body: &[Stmt], dsl: &DslResolver) -> Vec<ScanItem> {
    let mut scanner = Scanner {
        dsl,
        items: Vec::new(),
    };
    for (i, stmt) in body.iter().enumerate() {
        scanner.top_level(i, stmt);
    }
    let mut items = scanner.items;
    items.sort_by_key(|item| item.span.start);
    items
}

struct Scanner<'d> {
    dsl: &'d DslResolver,
    items: Vec<ScanItem>,
}

impl Scanner<'_> {
    fn top_level(&mut self, i: usize, stmt: &Stmt) {
        if self.candidate(stmt, Container::Body, i) {
            return;
        }
        match &stmt.kind {
            StmtKind::Try {
                resources,
                body,
                catches,
                finally,
            } => {
                let mut finder = DslFinder::new(self.dsl);
                resources.iter().for_each(|r| finder.visit_local_var(r));
                self.unsupported(finder, "inside try-with-resources");
                self.one_level(&body.stmts, Container::TryBody { stmt: i });
                for (k, clause) in catches.iter().enumerate() {
                    self.one_level(&clause.body.stmts, Container::Catch { stmt: i, clause: k });
                }
                if let Some(f) = finally {
                    self.one_level(&f.stmts, Container::Finally { stmt: i });
                }
            }
            _ => match outer_call(stmt).filter(|c| has_block_lambda(c)) {
                Some(call) => {
                    let mut finder = DslFinder::new(self.dsl);
                    if let Some(r) = &call.receiver {
                        finder.visit_expr(r);
                    }
                    for (a, arg) in call.args.iter().enumerate() {
                        match block_lambda(arg) {
                            Some(stmts) => self.one_level(stmts, Container::Lambda { stmt: i, arg: a }),
                            None => finder.visit_expr(arg),
                        }
                    }
                    self.unsupported(finder, "nested inside an expression");
                }
                None => {
                    let mut finder = DslFinder::new(self.dsl);
                    finder.visit_stmt(stmt);
                    self.unsupported(finder, nesting_of(stmt));
                }
            },
        }
    }

    fn one_level(&mut self, stmts: &[Stmt], container: Container) {
        for (j, stmt) in stmts.iter().enumerate() {
            if !self.candidate(stmt, container, j) {
                let mut finder = DslFinder::new(self.dsl);
                finder.visit_stmt(stmt);
                self.unsupported(finder, "nested more than one level deep");
            }
        }
    }

    /// Records `stmt` if it is `new Dsl(..) {{ .. }};`. Returns whether it was.
    fn candidate(&mut self, stmt: &Stmt, container: Container, index: usize) -> bool {
        let Some(new) = stmt.as_expr().and_then(|e| as_new(e.unparenthesized())) else {
            return false;
        };
        if new.body.is_none() {
            return false;
        }
        let (kind, provisional, contradiction) = match self.dsl.resolve(&new.ty) {
            DslLookup::NotDsl => return false,
            DslLookup::Dsl { kind, provisional } => (kind, provisional, None),
            DslLookup::Contradicted { kind, reason } => (kind, false, Some(reason)),
        };
        let location = BlockLocation { container, index };
        let outcome = match contradiction {
            Some(reason) => Err(SkipReason {
                kind: DiagnosticKind::UnresolvedType,
                message: format!("{} cannot be bound to the mocking library: {}", kind.name(), reason),
            }),
            None => recording_block(kind, new, stmt, location, provisional),
        };
        self.items.push(ScanItem {
            dsl: kind,
            span: stmt.span,
            location: Some(location),
            provisional,
            outcome,
        });
        true
    }

    fn unsupported(&mut self, finder: DslFinder<'_>, position: &str) {
        for found in finder.found {
            let outcome = Err(match found.contradiction {
                Some(reason) => SkipReason {
                    kind: DiagnosticKind::UnresolvedType,
                    message: format!("{} cannot be bound to the mocking library: {}", found.kind.name(), reason),
                },
                None => SkipReason {
                    kind: DiagnosticKind::UnsupportedShape,
                    message: format!("{} block {}", found.kind.name(), position),
                },
            });
            self.items.push(ScanItem {
                dsl: found.kind,
                span: found.span,
                location: None,
                provisional: found.provisional,
                outcome,
            });
        }
    }
}

fn nesting_of(stmt: &Stmt) -> &'static str {
    match &stmt.kind {
        StmtKind::Expr(_) | StmtKind::LocalVar(_) => "used as a value",
        StmtKind::Block(_) => "inside a nested block",
        StmtKind::If { .. } | StmtKind::Switch { .. } => "inside a conditional",
        StmtKind::While { .. }
        | StmtKind::DoWhile { .. }
        | StmtKind::For { .. }
        | StmtKind::ForEach { .. } => "inside a loop",
        _ => "in an unsupported position",
    }
}

fn recording_block(
    kind: DslKind,
    new: &NewObject,
    stmt: &Stmt,
    location: BlockLocation,
    provisional: bool,
) -> Result<RecordingBlock, SkipReason> {
    let unsupported = |message: String| SkipReason {
        kind: DiagnosticKind::UnsupportedShape,
        message,
    };
    let mode = BlockMode::of(kind).ok_or_else(|| {
        unsupported(format!(
            "{} combines ordered and exhaustive verification",
            kind.name()
        ))
    })?;

    let ctor_args = if new.args.is_empty() {
        None
    } else {
        if !(mode.is_stub() || mode == BlockMode::VerifyExhaustive) {
            return Err(unsupported(format!(
                "{} does not take constructor arguments",
                kind.name()
            )));
        }
        if let Some(bad) = new.args.iter().find(|a| a.simple_reference().is_none()) {
            return Err(unsupported(format!(
                "constructor argument of {} is not a variable (at offset {})",
                kind.name(),
                bad.span.start
            )));
        }
        Some(new.args.clone())
    };

    let mut statements = Vec::new();
    for member in new.body.iter().flat_map(|b| &b.members) {
        match member {
            Member::Initializer {
                is_static: false,
                body,
            } => statements.extend(body.stmts.iter().cloned()),
            other => {
                return Err(unsupported(format!(
                    "{} body declares {}",
                    kind.name(),
                    member_kind(other)
                )))
            }
        }
    }

    Ok(RecordingBlock {
        dsl: kind,
        mode,
        ctor_args,
        statements,
        location,
        span: stmt.span,
        provisional,
    })
}

fn member_kind(member: &Member) -> &'static str {
    match member {
        Member::Field(_) => "a field",
        Member::Method(_) => "a method",
        Member::Constructor(_) => "a constructor",
        Member::Initializer { .. } => "a static initializer",
        Member::Type(_) => "a nested type",
    }
}

// ============================================================================
// DEEP SEARCH
// ============================================================================

/// A recording-block class instantiated somewhere inside a tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundDsl {
    pub kind: DslKind,
    pub span: Span,
    pub provisional: bool,
    pub contradiction: Option<String>,
}

/// Collects recording-block instantiations without descending into their bodies.
struct DslFinder<'d> {
    dsl: &'d DslResolver,
    found: Vec<FoundDsl>,
}

impl<'d> DslFinder<'d> {
    fn new(dsl: &'d DslResolver) -> Self {
        Self {
            dsl,
            found: Vec::new(),
        }
    }
}

impl Visit for DslFinder<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if let ExprKind::New(new) = &expr.kind {
            let hit = match self.dsl.resolve(&new.ty) {
                DslLookup::NotDsl => None,
                DslLookup::Dsl { kind, provisional } => Some((kind, provisional, None)),
                DslLookup::Contradicted { kind, reason } => Some((kind, false, Some(reason))),
            };
            if let Some((kind, provisional, contradiction)) = hit {
                self.found.push(FoundDsl {
                    kind,
                    span: expr.span,
                    provisional,
                    contradiction,
                });
                new.args.iter().for_each(|a| self.visit_expr(a));
                return;
            }
        }
        visit::walk_expr(self, expr);
    }
}

/// Recording-block instantiations anywhere inside `stmts`.
pub fn find_dsl(stmts: &[Stmt], dsl: &DslResolver) -> Vec<FoundDsl> {
    let mut finder = DslFinder::new(dsl);
    stmts.iter().for_each(|s| finder.visit_stmt(s));
    finder.found
}

// ============================================================================
// CONTAINER ACCESS
// ============================================================================

fn as_new(expr: &Expr) -> Option<&NewObject> {
    match &expr.kind {
        ExprKind::New(new) => Some(new),
        _ => None,
    }
}

/// The call made by an expression statement or the initializer of a
/// single-variable declaration.
fn outer_call(stmt: &Stmt) -> Option<&MethodCall> {
    match &stmt.kind {
        StmtKind::Expr(e) => e.unparenthesized().as_method_call(),
        StmtKind::LocalVar(decl) if decl.declarators.len() == 1 => decl.declarators[0]
            .init
            .as_ref()
            .and_then(|e| e.unparenthesized().as_method_call()),
        _ => None,
    }
}

fn outer_call_mut(stmt: &mut Stmt) -> Option<&mut MethodCall> {
    let expr = match &mut stmt.kind {
        StmtKind::Expr(e) => e,
        StmtKind::LocalVar(decl) if decl.declarators.len() == 1 => decl.declarators[0].init.as_mut()?,
        _ => return None,
    };
    call_of_mut(expr)
}

fn call_of_mut(expr: &mut Expr) -> Option<&mut MethodCall> {
    match &mut expr.kind {
        ExprKind::Paren(inner) => call_of_mut(inner),
        ExprKind::MethodCall(call) => Some(call),
        _ => None,
    }
}

fn has_block_lambda(call: &MethodCall) -> bool {
    call.args.iter().any(|a| block_lambda(a).is_some())
}

fn block_lambda(arg: &Expr) -> Option<&[Stmt]> {
    match &arg.unparenthesized().kind {
        ExprKind::Lambda(lambda) => match &lambda.body {
            LambdaBody::Block(b) => Some(&b.stmts),
            LambdaBody::Expr(_) => None,
        },
        _ => None,
    }
}

fn block_lambda_mut(arg: &mut Expr) -> Option<&mut Vec<Stmt>> {
    match &mut arg.kind {
        ExprKind::Paren(inner) => block_lambda_mut(inner),
        ExprKind::Lambda(lambda) => match &mut lambda.body {
            LambdaBody::Block(b) => Some(&mut b.stmts),
            LambdaBody::Expr(_) => None,
        },
        _ => None,
    }
}

/// Statement list a block location refers to.
pub fn container(body: &[Stmt], container: Container) -> Option<&[Stmt]> {
    match container {
        Container::Body => Some(body),
        Container::TryBody { stmt } => match &body.get(stmt)?.kind {
            StmtKind::Try { body, .. } => Some(&body.stmts),
            _ => None,
        },
        Container::Catch { stmt, clause } => match &body.get(stmt)?.kind {
            StmtKind::Try { catches, .. } => Some(&catches.get(clause)?.body.stmts),
            _ => None,
        },
        Container::Finally { stmt } => match &body.get(stmt)?.kind {
            StmtKind::Try { finally, .. } => Some(&finally.as_ref()?.stmts),
            _ => None,
        },
        Container::Lambda { stmt, arg } => block_lambda(outer_call(body.get(stmt)?)?.args.get(arg)?),
    }
}

/// Names that are in scope inside `container` but not after it: its own
/// locals, plus try resources, the catch parameter or the lambda parameters.
pub fn container_locals(body: &[Stmt], container: Container) -> HashSet<String> {
    let mut names = HashSet::new();
    if container == Container::Body {
        return names;
    }
    let declared = |decl: &LocalVarDecl| decl.declarators.iter().map(|d| d.name.clone()).collect::<Vec<_>>();
    if let Some(stmts) = self::container(body, container) {
        for stmt in stmts {
            if let StmtKind::LocalVar(decl) = &stmt.kind {
                names.extend(declared(decl));
            }
        }
    }
    let Some(holder) = container.stmt().and_then(|i| body.get(i)) else {
        return names;
    };
    match (&holder.kind, container) {
        (StmtKind::Try { resources, .. }, Container::TryBody { .. }) => {
            resources.iter().for_each(|r| names.extend(declared(r)));
        }
        (StmtKind::Try { catches, .. }, Container::Catch { clause, .. }) => {
            names.extend(catches.get(clause).map(|c| c.name.clone()));
        }
        (_, Container::Lambda { arg, .. }) => {
            let lambda = outer_call(holder).and_then(|c| c.args.get(arg)).map(|a| &a.unparenthesized().kind);
            if let Some(ExprKind::Lambda(lambda)) = lambda {
                names.extend(lambda.params.iter().map(|p| p.name.clone()));
            }
        }
        _ => {}
    }
    names
}

pub fn container_mut(body: &mut Vec<Stmt>, container: Container) -> Option<&mut Vec<Stmt>> {
    match container {
        Container::Body => Some(body),
        Container::TryBody { stmt } => match &mut body.get_mut(stmt)?.kind {
            StmtKind::Try { body, .. } => Some(&mut body.stmts),
            _ => None,
        },
        Container::Catch { stmt, clause } => match &mut body.get_mut(stmt)?.kind {
            StmtKind::Try { catches, .. } => Some(&mut catches.get_mut(clause)?.body.stmts),
            _ => None,
        },
        Container::Finally { stmt } => match &mut body.get_mut(stmt)?.kind {
            StmtKind::Try { finally, .. } => Some(&mut finally.as_mut()?.stmts),
            _ => None,
        },
        Container::Lambda { stmt, arg } => {
            let call = outer_call_mut(body.get_mut(stmt)?)?;
            block_lambda_mut(call.args.get_mut(arg)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dsl_for, stmts};

    fn scan_src(src: &str) -> Vec<ScanItem> {
        scan(&stmts(src), &dsl_for("import mockit.*;"))
    }

    #[test]
    fn concatenates_initializer_groups() {
        let items = scan_src("new Expectations() {{ a.run(); }{ b.run(); }};");
        assert_eq!(items.len(), 1);
        let block = items[0].outcome.as_ref().unwrap();
        assert_eq!(block.mode, BlockMode::StubStrict);
        assert_eq!(block.statements.len(), 2);
        assert_eq!(block.location, BlockLocation { container: Container::Body, index: 0 });
        assert!(!block.provisional);
    }

    #[test]
    fn finds_blocks_one_level_down() {
        let src = r#"
            try { new Verifications() {{ a.run(); }}; } finally { new Expectations() {{ b.run(); }}; }
            assertThrows(Boom.class, () -> { new NonStrictExpectations() {{ c.run(); }}; subject.go(); });
        "#;
        let items = scan_src(src);
        let locations: Vec<_> = items
            .iter()
            .map(|i| i.outcome.as_ref().unwrap().location.container)
            .collect();
        assert_eq!(
            locations,
            vec![
                Container::TryBody { stmt: 0 },
                Container::Finally { stmt: 0 },
                Container::Lambda { stmt: 1, arg: 1 },
            ]
        );
    }

    #[test]
    fn deeper_instantiations_are_unsupported() {
        let src = "if (flag) { new Expectations() {{ a.run(); }}; }\nObject e = new Verifications() {{ }};";
        let items = scan_src(src);
        assert_eq!(items.len(), 2);
        for item in &items {
            assert!(item.location.is_none());
            assert_eq!(item.outcome.as_ref().unwrap_err().kind, DiagnosticKind::UnsupportedShape);
        }
        assert!(items[0].outcome.as_ref().unwrap_err().message.contains("conditional"));
    }

    #[test]
    fn rejects_members_other_than_initializers() {
        let items = scan_src("new Expectations() { int x; { a.run(); } };");
        let reason = items[0].outcome.as_ref().unwrap_err();
        assert!(reason.message.contains("a field"), "{}", reason.message);
    }

    #[test]
    fn constructor_arguments_must_be_variables() {
        let ok = scan_src("new Expectations(subject) {{ subject.run(); }};");
        assert_eq!(ok[0].outcome.as_ref().unwrap().ctor_names(), vec!["subject"]);

        let bad = scan_src("new Expectations(make()) {{ }};");
        assert_eq!(bad[0].outcome.as_ref().unwrap_err().kind, DiagnosticKind::UnsupportedShape);

        let verify = scan_src("new Verifications(2) {{ }};");
        assert!(verify[0].outcome.is_err());
    }

    #[test]
    fn mixed_ordered_exhaustive_mode_is_unsupported() {
        let items = scan_src("new FullVerificationsInOrder() {{ a.run(); }};");
        assert!(items[0].outcome.as_ref().unwrap_err().message.contains("ordered and exhaustive"));
    }

    #[test]
    fn contradicted_names_are_unresolved() {
        let dsl = dsl_for("import com.acme.Expectations;");
        let items = scan(&stmts("new Expectations() {{ a.run(); }};"), &dsl);
        assert_eq!(items[0].outcome.as_ref().unwrap_err().kind, DiagnosticKind::UnresolvedType);
    }

    #[test]
    fn unrelated_anonymous_classes_are_ignored() {
        assert!(scan_src("new Runnable() { public void run() { } };").is_empty());
    }

    #[test]
    fn container_mut_reaches_lambda_bodies() {
        let mut body = stmts("assertThrows(Boom.class, () -> { a.run(); b.run(); });");
        let inner = container_mut(&mut body, Container::Lambda { stmt: 0, arg: 1 }).unwrap();
        assert_eq!(inner.len(), 2);
        inner.remove(0);
        let inner = container_mut(&mut body, Container::Lambda { stmt: 0, arg: 1 }).unwrap();
        assert_eq!(inner.len(), 1);
    }
}
