//! Rewrite diagnostics
//!
//! Every recording block moves through a small state machine:
//!
//! ```text
//! Unattempted -> Scanning -> Grouping -> Synthesizing -> Emitted
//!                    \           \            \
//!                     +-----------+------------+--> Skipped(reason)
//! ```
//!
//! A skipped block is left untouched in the output. Each skip, and each
//! non-fatal observation (a redundant count constraint, a suppressed
//! duplicate verification), is reported as a [`Diagnostic`] value returned to
//! the host next to the rewritten method. Diagnostics never abort processing
//! of sibling blocks, methods or files.

use std::fmt;

use serde::Serialize;

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// A referenced type or method could not be bound.
    UnresolvedType,
    /// Control flow, nesting or a mode combination the engine does not model.
    UnsupportedShape,
    /// Argument shapes fit more than one overload.
    AmbiguousOverload,
    /// A constraint that was overridden by another one (exact count wins).
    RedundantConstraint,
    /// Informational: an implicit verification was dropped in favour of an explicit one.
    DuplicateVerification,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvedType => "mockshift::unresolved-type",
            DiagnosticKind::UnsupportedShape => "mockshift::unsupported-shape",
            DiagnosticKind::AmbiguousOverload => "mockshift::ambiguous-overload",
            DiagnosticKind::RedundantConstraint => "mockshift::redundant-constraint",
            DiagnosticKind::DuplicateVerification => "mockshift::duplicate-verification",
        }
    }

    /// Kinds that make the block be skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::UnresolvedType
                | DiagnosticKind::UnsupportedShape
                | DiagnosticKind::AmbiguousOverload
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Warning,
    Skip,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Skip => "skipped",
        })
    }
}

/// Why a block was left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipReason {
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "kebab-case")]
pub enum BlockState {
    Unattempted,
    Scanning,
    Grouping,
    Synthesizing,
    Emitted,
    Skipped(SkipReason),
}

impl BlockState {
    /// Moves to the next phase. Terminal states stay where they are.
    pub fn advance(&mut self) {
        *self = match self {
            BlockState::Unattempted => BlockState::Scanning,
            BlockState::Scanning => BlockState::Grouping,
            BlockState::Grouping => BlockState::Synthesizing,
            BlockState::Synthesizing => BlockState::Emitted,
            BlockState::Emitted => BlockState::Emitted,
            BlockState::Skipped(reason) => BlockState::Skipped(reason.clone()),
        };
    }

    pub fn skip(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        *self = BlockState::Skipped(SkipReason {
            kind,
            message: message.into(),
        });
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BlockState::Emitted | BlockState::Skipped(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlockState::Unattempted => "unattempted",
            BlockState::Scanning => "scanning",
            BlockState::Grouping => "grouping",
            BlockState::Synthesizing => "synthesizing",
            BlockState::Emitted => "emitted",
            BlockState::Skipped(_) => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Phase the block had reached when the diagnostic was raised.
    pub phase: &'static str,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    /// A diagnostic that made its block be skipped.
    pub fn skipped(kind: DiagnosticKind, phase: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            severity: Severity::Skip,
            phase,
            message: message.into(),
            span,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            phase: "grouping",
            message: message.into(),
            span,
        }
    }

    pub fn note(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            severity: Severity::Note,
            phase: "emitted",
            message: message.into(),
            span,
        }
    }

    pub fn is_skip(&self) -> bool {
        self.severity == Severity::Skip
    }

    /// 1-based line and column of the span start within `source`.
    pub fn line_col(&self, source: &str) -> Option<(usize, usize)> {
        if self.span.is_synthetic() || self.span.start > source.len() {
            return None;
        }
        let before = source.get(..self.span.start)?;
        let line = before.matches('\n').count() + 1;
        let col = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
        Some((line, col))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.kind.code(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_runs_to_emitted() {
        let mut state = BlockState::Unattempted;
        for expected in ["scanning", "grouping", "synthesizing", "emitted", "emitted"] {
            state.advance();
            assert_eq!(state.name(), expected);
        }
    }

    #[test]
    fn skip_is_sticky_and_ignored_after_emission() {
        let mut state = BlockState::Grouping;
        state.skip(DiagnosticKind::UnsupportedShape, "loop in block");
        state.advance();
        assert!(matches!(&state, BlockState::Skipped(r) if r.message == "loop in block"));

        let mut done = BlockState::Emitted;
        done.skip(DiagnosticKind::UnresolvedType, "late");
        assert_eq!(done, BlockState::Emitted);
    }

    #[test]
    fn line_col_counts_from_one() {
        let d = Diagnostic::warning(DiagnosticKind::RedundantConstraint, "x", Span::new(6, 8));
        assert_eq!(d.line_col("ab\ncd\nef"), Some((3, 1)));
        assert_eq!(d.to_string(), "warning [mockshift::redundant-constraint]: x");
    }
}
