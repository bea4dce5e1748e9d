//! mockshift Error Handling
//!
//! Host-side failures (reading files, parsing sources, loading configuration)
//! are reported through [`MockshiftError`], a `miette` diagnostic that carries
//! the offending source and span. Rewrite-engine outcomes are not errors; they
//! are collected as [`crate::diagnostics::Diagnostic`] values instead.
//!
//! Construct errors with the `err_msg!` and `err_ctx!` macros:
//!
//! ```rust
//! use mockshift::{err_msg, MockshiftError};
//! let err = err_msg!(Config, "unknown policy '{}'", "sometimes");
//! assert!(matches!(err, MockshiftError::Config { .. }));
//! assert_eq!(err.to_string(), "Configuration error: unknown policy 'sometimes'");
//! ```

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::ast::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Converts a file name and its content into a shareable named source.
pub fn to_error_source(name: impl AsRef<str>, content: impl Into<String>) -> SourceArc {
    Arc::new(NamedSource::new(name.as_ref(), content.into()))
}

// ============================================================================
// ERROR CONTEXT
// ============================================================================

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    pub source: Option<SourceArc>,
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            help: None,
        }
    }
}

// ============================================================================
// ERROR TYPE
// ============================================================================

/// Type-safe error classification used by the CLI and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Parse,
    Config,
    Io,
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Parse => "parse",
            ErrorType::Config => "config",
            ErrorType::Io => "io",
            ErrorType::Internal => "internal",
        }
    }
}

/// An underlying error attached with [`MockshiftError::with_cause`].
#[derive(Debug)]
pub struct Cause(Box<dyn std::error::Error + Send + Sync + 'static>);

impl std::fmt::Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for Cause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

#[derive(Debug, Error)]
pub enum MockshiftError {
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        ctx: ErrorContext,
        #[source]
        cause: Option<Cause>,
    },
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        cause: Option<Cause>,
    },
    #[error("I/O error: {message}")]
    Io {
        message: String,
        ctx: ErrorContext,
        #[source]
        cause: Option<Cause>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        cause: Option<Cause>,
    },
}

impl MockshiftError {
    fn ctx(&self) -> &ErrorContext {
        match self {
            MockshiftError::Parse { ctx, .. }
            | MockshiftError::Config { ctx, .. }
            | MockshiftError::Io { ctx, .. }
            | MockshiftError::Internal { ctx, .. } => ctx,
        }
    }

    fn message(&self) -> &str {
        match self {
            MockshiftError::Parse { message, .. }
            | MockshiftError::Config { message, .. }
            | MockshiftError::Io { message, .. }
            | MockshiftError::Internal { message, .. } => message,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            MockshiftError::Parse { .. } => ErrorType::Parse,
            MockshiftError::Config { .. } => ErrorType::Config,
            MockshiftError::Io { .. } => ErrorType::Io,
            MockshiftError::Internal { .. } => ErrorType::Internal,
        }
    }

    /// Attaches an underlying cause, replacing any previous one.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        let slot = match &mut self {
            MockshiftError::Parse { cause, .. }
            | MockshiftError::Config { cause, .. }
            | MockshiftError::Io { cause, .. }
            | MockshiftError::Internal { cause, .. } => cause,
        };
        *slot = Some(Cause(Box::new(cause)));
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        let ctx = match &mut self {
            MockshiftError::Parse { ctx, .. }
            | MockshiftError::Config { ctx, .. }
            | MockshiftError::Io { ctx, .. }
            | MockshiftError::Internal { ctx, .. } => ctx,
        };
        ctx.help = Some(help.into());
        self
    }

    pub fn span(&self) -> Option<Span> {
        self.ctx().span
    }
}

impl Diagnostic for MockshiftError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!("mockshift::{}", self.error_type().as_str())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.ctx();
        let span = ctx.span?;
        ctx.source.as_ref()?;
        let len = if span.end > span.start {
            span.end - span.start
        } else {
            1
        };
        let label = LabeledSpan::new(Some(self.message().to_string()), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

// ============================================================================
// CONSTRUCTION MACROS
// ============================================================================

/// Constructs a `MockshiftError` variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($fmt:tt)+) => {
        $crate::MockshiftError::$variant {
            message: format!($($fmt)+),
            ctx: $crate::errors::ErrorContext::none(),
            cause: None,
        }
    };
}

/// Constructs a `MockshiftError` variant pointing at a span of a named source.
///
/// `err_ctx!(Parse, message, source, span)` or, with a help line,
/// `err_ctx!(Parse, message, source, span, help)`.
#[macro_export]
macro_rules! err_ctx {
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $help:expr) => {
        $crate::MockshiftError::$variant {
            message: $msg.to_string(),
            ctx: $crate::errors::ErrorContext {
                source: Some($crate::errors::SourceArc::clone($src)),
                span: Some($span),
                help: Some(format!("{}", $help)),
            },
            cause: None,
        }
    };
    ($variant:ident, $msg:expr, $src:expr, $span:expr) => {
        $crate::MockshiftError::$variant {
            message: $msg.to_string(),
            ctx: $crate::errors::ErrorContext::with_source_and_span(
                $crate::errors::SourceArc::clone($src),
                $span,
            ),
            cause: None,
        }
    };
}

impl From<std::io::Error> for MockshiftError {
    fn from(err: std::io::Error) -> Self {
        err_msg!(Io, "{}", err).with_cause(err)
    }
}

/// Prints an error with full miette diagnostics to stderr.
pub fn print_error(error: MockshiftError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Report;

    #[test]
    fn parse_error_renders_label_and_help() {
        let src = to_error_source("Sample.java", "class Sample { void t( }");
        let err = err_ctx!(
            Parse,
            "expected formal parameter",
            &src,
            Span::new(23, 24),
            "check the parameter list"
        );
        assert_eq!(err.error_type(), ErrorType::Parse);
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("expected formal parameter"));
        assert!(output.contains("check the parameter list"));
        assert!(output.contains("mockshift::parse"));
    }

    #[test]
    fn io_errors_keep_their_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.java");
        let err: MockshiftError = io.into();
        assert_eq!(err.error_type(), ErrorType::Io);
        let cause = std::error::Error::source(&err).expect("cause");
        assert_eq!(cause.to_string(), "missing.java");
    }

    #[test]
    fn with_cause_replaces_the_previous_cause() {
        let first = std::io::Error::new(std::io::ErrorKind::Other, "first");
        let second = std::io::Error::new(std::io::ErrorKind::Other, "second");
        let err = err_msg!(Config, "bad config").with_cause(first).with_cause(second);
        assert_eq!(err.to_string(), "Configuration error: bad config");
        assert_eq!(std::error::Error::source(&err).map(|c| c.to_string()), Some("second".to_string()));
    }
}
