//! User-facing output for the CLI: colored diffs, diagnostics, scan listings
//! and JSON reports. Every writer takes a `WriteColor` so tests can capture
//! plain text.

use std::{io, path::Path};

use difference::{Changeset, Difference};
use serde::Serialize;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::{
    diagnostics::{Diagnostic, Severity},
    engine::{FileIndex, FileOutcome},
    err_msg,
    rewrite::BlockSummary,
    MockshiftError,
};

/// Unchanged lines shown around each change.
const DIFF_CONTEXT_LINES: usize = 3;

// ============================================================================
// DIFFS
// ============================================================================

pub fn write_diff(w: &mut impl WriteColor, path: &Path, original: &str, rewritten: &str) -> io::Result<()> {
    w.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(w, "--- {}", path.display())?;
    writeln!(w, "+++ {}", path.display())?;
    w.reset()?;

    let changeset = Changeset::new(original, rewritten, "\n");
    let last = changeset.diffs.len().saturating_sub(1);
    for (i, diff) in changeset.diffs.iter().enumerate() {
        match diff {
            Difference::Same(text) => {
                let lines: Vec<&str> = text.split('\n').collect();
                write_context(w, &lines, i == 0, i == last)?;
            }
            Difference::Add(text) => write_lines(w, '+', text, Color::Green)?,
            Difference::Rem(text) => write_lines(w, '-', text, Color::Red)?,
        }
    }
    w.reset()
}

/// Unchanged text between changes, trimmed to the context window.
fn write_context(w: &mut impl WriteColor, lines: &[&str], first: bool, last: bool) -> io::Result<()> {
    let n = DIFF_CONTEXT_LINES;
    let head = if first { 0 } else { n.min(lines.len()) };
    let tail = if last { 0 } else { n.min(lines.len() - head) };
    if lines.len() <= head + tail + 1 {
        for line in lines {
            writeln!(w, " {line}")?;
        }
        return Ok(());
    }
    for line in &lines[..head] {
        writeln!(w, " {line}")?;
    }
    w.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
    writeln!(w, "@@ {} unchanged lines @@", lines.len() - head - tail)?;
    w.reset()?;
    for line in &lines[lines.len() - tail..] {
        writeln!(w, " {line}")?;
    }
    Ok(())
}

fn write_lines(w: &mut impl WriteColor, marker: char, text: &str, color: Color) -> io::Result<()> {
    w.set_color(ColorSpec::new().set_fg(Some(color)))?;
    for line in text.split('\n') {
        writeln!(w, "{marker}{line}")?;
    }
    w.reset()
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

pub fn write_diagnostics(
    w: &mut impl WriteColor,
    path: &Path,
    source: &str,
    diagnostics: &[Diagnostic],
) -> io::Result<()> {
    for d in diagnostics {
        let color = match d.severity {
            Severity::Skip => Color::Red,
            Severity::Warning => Color::Yellow,
            Severity::Note => Color::Blue,
        };
        w.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(w, "{}", d.severity)?;
        w.reset()?;
        match d.line_col(source) {
            Some((line, col)) => write!(w, " {}:{}:{}", path.display(), line, col)?,
            None => write!(w, " {}", path.display())?,
        }
        writeln!(w, " [{}] ({}): {}", d.kind.code(), d.phase, d.message)?;
    }
    Ok(())
}

// ============================================================================
// SCAN LISTING
// ============================================================================

pub fn write_index(w: &mut impl WriteColor, index: &FileIndex) -> io::Result<()> {
    if index.methods.is_empty() {
        return Ok(());
    }
    w.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(w, "{}", index.path.display())?;
    w.reset()?;
    for entry in &index.methods {
        writeln!(w, "  {}.{} (line {})", entry.class, entry.method, entry.line)?;
        for block in &entry.blocks {
            writeln!(w, "    {}", block_line(block))?;
        }
    }
    Ok(())
}

fn block_line(block: &BlockSummary) -> String {
    let mode = block.mode.map_or("unsupported".to_string(), |m| {
        serde_json::to_value(m)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    });
    let mut line = format!("{} [{}] {}", block.dsl.name(), mode, block.state.name());
    if block.records > 0 {
        line.push_str(&format!(", {} record(s) on {}", block.records, block.mocks.join(", ")));
    }
    if !block.spied.is_empty() {
        line.push_str(&format!(", spies: {}", block.spied.join(", ")));
    }
    if block.provisional {
        line.push_str(", provisional");
    }
    line
}

// ============================================================================
// JSON REPORTS
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RewriteReport<'a> {
    pub files: Vec<FileReport<'a>>,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Serialize)]
pub struct FileReport<'a> {
    pub path: &'a Path,
    pub changed: bool,
    pub written: bool,
    pub diagnostics: &'a [Diagnostic],
    pub index: &'a FileIndex,
}

impl<'a> FileReport<'a> {
    pub fn new(outcome: &'a FileOutcome, written: bool) -> Self {
        Self {
            path: &outcome.path,
            changed: outcome.changed(),
            written,
            diagnostics: &outcome.diagnostics,
            index: &outcome.index,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Failure {
    pub path: String,
    pub error: String,
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, MockshiftError> {
    serde_json::to_string_pretty(value).map_err(|e| err_msg!(Internal, "cannot serialize report: {}", e))
}
