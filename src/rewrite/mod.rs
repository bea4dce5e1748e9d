//! # Rewrite Engine
//!
//! Turns recording blocks into stub and verify statements, one method body at
//! a time:
//!
//! ```text
//! scan ──> group ──> synthesize (per record) ──> emit ──> splice
//!   \         \              \
//!    +---------+--------------+──> Skipped(reason), block left as written
//! ```
//!
//! Blocks are processed in source order; after each splice the body is
//! scanned again, so every block sees the method as rewritten by the blocks
//! before it. Nothing here performs I/O: the file driver in
//! [`crate::engine`] owns reading, rendering and writing.

pub mod emitter;
pub mod grouper;
pub mod matchers;
pub mod scanner;
pub mod synthesizer;
pub mod types;

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    ast::{visit::names_in, Block, Expr, MethodDecl, Span, Stmt, StmtKind},
    bindings::{DslKind, DslResolver, MethodScope, TypeIndex},
    config::{Config, DuplicatePolicy},
    diagnostics::{BlockState, Diagnostic, DiagnosticKind, SkipReason},
    syntax::Printer,
};

use emitter::{Emission, Emitter, Piece};
use grouper::{group, Grouped};
use matchers::ApiStyle;
use scanner::{container, container_locals, container_mut, scan, ScanItem};
use synthesizer::Synthesizer;
use types::{BlockMode, Container, DistinctMockSet, GroupedItem, RecordingBlock, VerifySpec};

// ============================================================================
// OPTIONS AND RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOptions {
    pub style: ApiStyle,
    pub answer_param: String,
    pub in_order_var: String,
    pub duplicate_verification: DuplicatePolicy,
    pub defer_strict_verifications: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RewriteOptions {
    fn from(config: &Config) -> Self {
        Self {
            style: ApiStyle {
                qualified: config.style.qualified,
            },
            answer_param: config.style.answer_param.clone(),
            in_order_var: config.style.in_order_var.clone(),
            duplicate_verification: config.policy.duplicate_verification,
            defer_strict_verifications: config.policy.defer_strict_verifications,
        }
    }
}

/// What happened to one recording block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSummary {
    pub dsl: DslKind,
    pub mode: Option<BlockMode>,
    pub span: Span,
    pub state: BlockState,
    pub records: usize,
    /// Mocks touched by the block, in first-reference order.
    pub mocks: Vec<String>,
    /// Objects partially mocked through constructor arguments; their
    /// declarations need to become spies.
    pub spied: Vec<String>,
    pub provisional: bool,
}

/// Count checks that run after the exercised code. They are inserted after
/// `anchor`, an original statement of the method, or before it when
/// `before` is set (a trailing `return` or `throw`).
#[derive(Debug, Clone, PartialEq)]
pub struct Deferral {
    pub anchor: Span,
    pub before: bool,
    pub stmts: Vec<Stmt>,
}

/// Statements that replace one original statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodRewrite {
    /// The rewritten body; `None` for methods without one.
    pub body: Option<Block>,
    pub diagnostics: Vec<Diagnostic>,
    pub blocks: Vec<BlockSummary>,
    pub replacements: Vec<Replacement>,
    /// Count checks placed at the end of the body, or at the end of the
    /// enclosing `try` part or lambda when they name its locals.
    pub deferred: Vec<Deferral>,
}

impl MethodRewrite {
    pub fn changed(&self) -> bool {
        !self.replacements.is_empty()
    }
}

// ============================================================================
// REWRITER
// ============================================================================

pub struct Rewriter<'a> {
    index: &'a TypeIndex,
    dsl: &'a DslResolver,
    options: RewriteOptions,
}

/// A block turned into replacement statements.
struct Lowered {
    emission: Emission,
    summary: BlockSummary,
    notes: Vec<Diagnostic>,
}

impl<'a> Rewriter<'a> {
    pub fn new(index: &'a TypeIndex, dsl: &'a DslResolver, options: RewriteOptions) -> Self {
        Self {
            index,
            dsl,
            options,
        }
    }

    /// Recording blocks of `method` and what rewriting them would do.
    pub fn blocks_found_in(&self, method: &MethodDecl, scope: &MethodScope) -> Vec<BlockSummary> {
        self.rewrite_method(method, scope).blocks
    }

    /// Rewrites every supported recording block of `method`.
    pub fn rewrite_method(&self, method: &MethodDecl, scope: &MethodScope) -> MethodRewrite {
        let Some(original) = &method.body else {
            return MethodRewrite::default();
        };
        let mut body = original.stmts.clone();
        let mut out = MethodRewrite::default();
        let explicit = self.explicit_verifications(&body, scope);
        let mut at_end = Vec::new();

        let mut skipped = 0;
        loop {
            let Some(item) = scan(&body, self.dsl).into_iter().nth(skipped) else {
                break;
            };
            let span = item.span;
            match self.lower(item, &body, scope, &explicit) {
                Ok((block, lowered)) => {
                    debug!(
                        method = %method.name,
                        dsl = block.dsl.name(),
                        records = lowered.summary.records,
                        "rewrote recording block"
                    );
                    let location = block.location;
                    let Some(stmts) = container_mut(&mut body, location.container) else {
                        skipped += 1;
                        continue;
                    };
                    let Emission { stmts: replacement, deferred } = lowered.emission;
                    stmts.splice(location.index..=location.index, replacement.iter().cloned());
                    out.replacements.push(Replacement {
                        span,
                        stmts: replacement,
                    });
                    if !deferred.is_empty() {
                        let locals = container_locals(&body, location.container);
                        if names_in(&deferred).is_disjoint(&locals) {
                            at_end.extend(deferred);
                        } else {
                            let deferral = defer_within(&original.stmts, &mut body, location.container, span, deferred);
                            push_deferral(&mut out.deferred, deferral);
                        }
                    }
                    out.diagnostics.extend(lowered.notes);
                    out.blocks.push(lowered.summary);
                }
                Err((summary, diagnostic)) => {
                    warn!(
                        method = %method.name,
                        dsl = summary.dsl.name(),
                        reason = %diagnostic.message,
                        "left recording block unchanged"
                    );
                    skipped += 1;
                    out.diagnostics.push(diagnostic);
                    out.blocks.push(summary);
                }
            }
        }

        if let Some(last) = original.stmts.last().filter(|_| !at_end.is_empty()) {
            let at = exit_index(&body);
            body.splice(at..at, at_end.iter().cloned());
            let deferral = Deferral {
                anchor: last.span,
                before: is_exit(last),
                stmts: at_end,
            };
            push_deferral(&mut out.deferred, deferral);
        }
        out.blocks.sort_by_key(|b| b.span.start);
        out.body = Some(Block {
            stmts: body,
            span: original.span,
        });
        out
    }

    /// Runs one scan item through grouping, synthesis and emission.
    fn lower(
        &self,
        item: ScanItem,
        body: &[Stmt],
        scope: &MethodScope,
        explicit: &HashMap<String, usize>,
    ) -> Result<(RecordingBlock, Lowered), (BlockSummary, Diagnostic)> {
        let mut state = BlockState::Unattempted;
        state.advance();
        let mut summary = BlockSummary {
            dsl: item.dsl,
            mode: item.outcome.as_ref().ok().map(|b| b.mode),
            span: item.span,
            state: state.clone(),
            records: 0,
            mocks: Vec::new(),
            spied: Vec::new(),
            provisional: item.provisional,
        };
        let fail = |mut summary: BlockSummary, mut state: BlockState, reason: SkipReason| {
            let phase = state.name();
            state.skip(reason.kind, reason.message.clone());
            summary.state = state;
            let diagnostic = Diagnostic::skipped(reason.kind, phase, reason.message, summary.span);
            (summary, diagnostic)
        };

        let block = match item.outcome {
            Ok(block) => block,
            Err(reason) => return Err(fail(summary, state, reason)),
        };

        state.advance();
        let grouped = match group(&block, scope, self.index, self.dsl) {
            Ok(grouped) => grouped,
            Err(reason) => return Err(fail(summary, state, reason)),
        };

        state.advance();
        let taken = names_in(body);
        let synthesizer = Synthesizer {
            style: self.options.style,
            answer_param: &self.options.answer_param,
            taken: &taken,
        };
        let mut notes = grouped.warnings.clone();
        let mut pieces = Vec::with_capacity(grouped.items.len());
        for item in &grouped.items {
            match item {
                GroupedItem::Setup(stmt) => pieces.push(Piece::Setup(stmt.clone())),
                GroupedItem::Record(record) => {
                    let mut synth = match synthesizer.synthesize(record, block.mode) {
                        Ok(synth) => synth,
                        Err(reason) => return Err(fail(summary, state, reason)),
                    };
                    let duplicate = block.mode == BlockMode::StubStrict
                        && self.options.duplicate_verification == DuplicatePolicy::PreferExplicit
                        && !synth.verifies.is_empty()
                        && synth.verifies.iter().all(|v| {
                            explicit
                                .get(&verification_key(v))
                                .is_some_and(|&start| start > block.span.start)
                        });
                    if duplicate {
                        synth.verifies.clear();
                        notes.push(Diagnostic::note(
                            DiagnosticKind::DuplicateVerification,
                            format!(
                                "count check of {}.{} left to the explicit verification of the same call",
                                record.target.name, record.call.name
                            ),
                            record.span,
                        ));
                    }
                    pieces.push(Piece::Record(synth));
                }
            }
        }

        let mocks = self.mock_set(&block, &grouped, scope);
        let emitter = Emitter {
            style: self.options.style,
            in_order_var: &self.options.in_order_var,
            taken: &taken,
            defer_strict: self.options.defer_strict_verifications,
        };
        let emission = emitter.emit(block.mode, pieces, &mocks);

        state.advance();
        let distinct = DistinctMockSet::of(&grouped.items);
        summary.state = state;
        summary.records = grouped.records().count();
        summary.mocks = distinct.names();
        if block.mode.is_stub() {
            summary.spied = block.ctor_names().iter().map(|n| n.to_string()).collect();
        }
        if block.provisional {
            notes.push(Diagnostic::note(
                DiagnosticKind::UnresolvedType,
                format!(
                    "{} recognized by its simple name; no mockit import was found",
                    block.dsl.name()
                ),
                block.span,
            ));
        }
        Ok((
            block,
            Lowered {
                emission,
                summary,
                notes,
            },
        ))
    }

    /// Mocks an ordered or exhaustive block refers to.
    fn mock_set(&self, block: &RecordingBlock, grouped: &Grouped, scope: &MethodScope) -> Vec<Expr> {
        let distinct = DistinctMockSet::of(&grouped.items);
        match block.mode {
            BlockMode::VerifyOrdered => distinct.receivers(),
            BlockMode::VerifyExhaustive => match &block.ctor_args {
                Some(args) => args.clone(),
                None if !distinct.is_empty() => distinct.receivers(),
                None => scope
                    .mocks()
                    .iter()
                    .filter(|m| m.is_recordable())
                    .map(|m| crate::ast::builder::name(&m.name))
                    .collect(),
            },
            _ => Vec::new(),
        }
    }

    /// Keys of the calls checked by verification blocks of the method, each
    /// with the start of the last block that checks it.
    fn explicit_verifications(&self, body: &[Stmt], scope: &MethodScope) -> HashMap<String, usize> {
        let mut keys = HashMap::new();
        if self.options.duplicate_verification != DuplicatePolicy::PreferExplicit {
            return keys;
        }
        let taken = names_in(body);
        let synthesizer = Synthesizer {
            style: self.options.style,
            answer_param: &self.options.answer_param,
            taken: &taken,
        };
        for item in scan(body, self.dsl) {
            let Ok(block) = item.outcome else { continue };
            if !block.mode.is_verify() {
                continue;
            }
            let Ok(grouped) = group(&block, scope, self.index, self.dsl) else {
                continue;
            };
            for record in grouped.records() {
                if let Ok(synth) = synthesizer.synthesize(record, block.mode) {
                    for key in synth.verifies.iter().map(verification_key) {
                        let start = keys.entry(key).or_insert(block.span.start);
                        *start = (*start).max(block.span.start);
                    }
                }
            }
        }
        keys
    }
}

fn is_exit(stmt: &Stmt) -> bool {
    matches!(stmt.kind, StmtKind::Return(_) | StmtKind::Throw(_))
}

/// Where statements appended to `stmts` go: before a trailing exit.
fn exit_index(stmts: &[Stmt]) -> usize {
    match stmts.last() {
        Some(last) if is_exit(last) => stmts.len() - 1,
        _ => stmts.len(),
    }
}

/// Appends `deferred` to the end of `within` in `body` and anchors it on the
/// container's last original statement. Falls back to the block's own
/// replacement when the container cannot be matched to the original body.
fn defer_within(original: &[Stmt], body: &mut Vec<Stmt>, within: Container, block: Span, deferred: Vec<Stmt>) -> Deferral {
    if let Some(stmts) = container_mut(body, within) {
        let at = exit_index(stmts);
        stmts.splice(at..at, deferred.iter().cloned());
    }
    let holder = within.stmt().and_then(|i| body.get(i)).map(|s| s.span);
    let last = holder
        .and_then(|span| original.iter().position(|s| s.span == span))
        .and_then(|i| container(original, within.at(i)))
        .and_then(|stmts| stmts.last());
    match last {
        Some(last) => Deferral {
            anchor: last.span,
            before: is_exit(last),
            stmts: deferred,
        },
        None => Deferral {
            anchor: block,
            before: false,
            stmts: deferred,
        },
    }
}

/// Adds `deferral`, merging it into an earlier one with the same anchor.
fn push_deferral(deferrals: &mut Vec<Deferral>, deferral: Deferral) {
    match deferrals
        .iter_mut()
        .find(|d| d.anchor == deferral.anchor && d.before == deferral.before)
    {
        Some(existing) => existing.stmts.extend(deferral.stmts),
        None => deferrals.push(deferral),
    }
}

/// `target.method(args)` of a verification, ignoring its count mode.
fn verification_key(spec: &VerifySpec) -> String {
    let printer = Printer::default();
    let args: Vec<String> = spec.call.args.iter().map(|a| printer.expr(a)).collect();
    format!(
        "{}.{}({})",
        spec.target.simple_reference().unwrap_or_default(),
        spec.call.name,
        args.join(", ")
    )
}
