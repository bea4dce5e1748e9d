//! # File Driver
//!
//! Runs the rewrite engine over whole source files:
//!
//! ```text
//! read ──> parse ──> pass 1: FileIndex ──> pass 2: rewrite_method per method ──> splice
//! ```
//!
//! The tree is only used to decide what changes. The output text is the
//! original text with each emitted block's statement span replaced by its
//! rendered replacement, so formatting and comments elsewhere in the file
//! survive byte for byte.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    ast::{CompilationUnit, FieldDecl, MethodDecl, Span, TypeDecl},
    bindings::{DslResolver, MethodScope, TypeIndex},
    config::Config,
    diagnostics::Diagnostic,
    err_msg,
    rewrite::{BlockSummary, Deferral, MethodRewrite, Replacement, RewriteOptions, Rewriter},
    syntax::{parse_compilation_unit, Printer},
    MockshiftError,
};

// ============================================================================
// TYPES
// ============================================================================

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub unit: CompilationUnit,
}

/// Pass-1 view of a file: which methods hold recording blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileIndex {
    pub path: PathBuf,
    pub methods: Vec<MethodEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodEntry {
    /// Position among the file's methods, in declaration order.
    #[serde(skip)]
    pub ordinal: usize,
    pub class: String,
    pub method: String,
    pub line: usize,
    pub blocks: Vec<BlockSummary>,
}

impl FileIndex {
    pub fn block_count(&self) -> usize {
        self.methods.iter().map(|m| m.blocks.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    #[serde(skip)]
    pub original: String,
    #[serde(skip)]
    pub rewritten: String,
    pub diagnostics: Vec<Diagnostic>,
    pub index: FileIndex,
}

impl FileOutcome {
    pub fn changed(&self) -> bool {
        self.original != self.rewritten
    }
}

/// A method with the fields visible to it, innermost class last.
struct MethodSite<'u> {
    class: &'u str,
    fields: Vec<&'u FieldDecl>,
    method: &'u MethodDecl,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct Engine {
    config: Config,
    options: RewriteOptions,
    printer: Printer,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            options: RewriteOptions::from(&config),
            printer: Printer::new(config.style.indent.clone()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn read(&self, path: &Path) -> Result<SourceFile, MockshiftError> {
        let text = fs::read_to_string(path)
            .map_err(|e| err_msg!(Io, "cannot read {}: {}", path.display(), e).with_cause(e))?;
        self.parse(path, text)
    }

    pub fn parse(&self, path: &Path, text: String) -> Result<SourceFile, MockshiftError> {
        let unit = parse_compilation_unit(&text, &path.display().to_string())?;
        Ok(SourceFile {
            path: path.to_path_buf(),
            text,
            unit,
        })
    }

    /// Type index over every parsed file plus the configured external types.
    pub fn type_index(&self, files: &[SourceFile]) -> Result<TypeIndex, MockshiftError> {
        let mut index = TypeIndex::new();
        for (name, signatures) in &self.config.types {
            index.add_external(name, signatures)?;
        }
        for file in files {
            index.add_unit(&file.unit);
        }
        Ok(index)
    }

    /// Pass 1: the recording blocks of every method, without changing anything.
    pub fn scan(&self, file: &SourceFile, index: &TypeIndex) -> FileIndex {
        let dsl = DslResolver::for_unit(&file.unit);
        let rewriter = Rewriter::new(index, &dsl, self.options.clone());
        let methods = methods_of(&file.unit)
            .into_iter()
            .enumerate()
            .filter_map(|(ordinal, site)| {
                let scope = MethodScope::new(site.fields.iter().copied(), site.method);
                let blocks = rewriter.blocks_found_in(site.method, &scope);
                (!blocks.is_empty()).then(|| MethodEntry {
                    ordinal,
                    class: site.class.to_string(),
                    method: site.method.name.clone(),
                    line: line_of(&file.text, site.method.span.start),
                    blocks,
                })
            })
            .collect();
        FileIndex {
            path: file.path.clone(),
            methods,
        }
    }

    /// Both passes, with the rewritten text spliced into the original.
    pub fn rewrite(&self, file: &SourceFile, index: &TypeIndex) -> FileOutcome {
        let file_index = self.scan(file, index);
        let dsl = DslResolver::for_unit(&file.unit);
        let rewriter = Rewriter::new(index, &dsl, self.options.clone());

        let sites = methods_of(&file.unit);
        let mut edits = Vec::new();
        let mut diagnostics = Vec::new();
        for entry in &file_index.methods {
            let Some(site) = sites.get(entry.ordinal) else {
                continue;
            };
            let scope = MethodScope::new(site.fields.iter().copied(), site.method);
            let mut result = rewriter.rewrite_method(site.method, &scope);
            debug!(
                class = %entry.class,
                method = %entry.method,
                replaced = result.replacements.len(),
                diagnostics = result.diagnostics.len(),
                "rewrote method"
            );
            diagnostics.append(&mut result.diagnostics);
            edits.extend(self.edits_for(&file.text, result));
        }

        let rewritten = apply_edits(&file.text, edits);
        info!(
            path = %file.path.display(),
            blocks = file_index.block_count(),
            changed = rewritten != file.text,
            "processed file"
        );
        FileOutcome {
            path: file.path.clone(),
            original: file.text.clone(),
            rewritten,
            diagnostics,
            index: file_index,
        }
    }

    /// Reads, parses and rewrites one file on its own.
    pub fn rewrite_path(&self, path: &Path) -> Result<FileOutcome, MockshiftError> {
        let file = self.read(path)?;
        let index = self.type_index(std::slice::from_ref(&file))?;
        Ok(self.rewrite(&file, &index))
    }

    /// Rewrites source text held in memory.
    pub fn rewrite_source(&self, name: &str, text: &str) -> Result<FileOutcome, MockshiftError> {
        let file = self.parse(Path::new(name), text.to_string())?;
        let index = self.type_index(std::slice::from_ref(&file))?;
        Ok(self.rewrite(&file, &index))
    }

    fn edits_for(&self, text: &str, result: MethodRewrite) -> Vec<Edit> {
        let MethodRewrite {
            mut replacements,
            deferred,
            ..
        } = result;
        let mut edits = Vec::new();

        for Deferral { anchor, before, stmts } in deferred {
            match replacements.iter_mut().find(|r| r.span == anchor) {
                Some(r) if !before => r.stmts.extend(stmts),
                _ => {
                    let indent = indent_of(text, anchor.start);
                    let rendered = self.printer.statements(&stmts, indent);
                    edits.push(if before {
                        Edit::insert(anchor.start, format!("{rendered}\n{indent}"))
                    } else {
                        Edit::insert(anchor.end, format!("\n{indent}{rendered}"))
                    });
                }
            }
        }

        for Replacement { span, stmts } in replacements {
            if span.is_synthetic() {
                continue;
            }
            if stmts.is_empty() {
                edits.push(removal(text, span));
            } else {
                let indent = indent_of(text, span.start);
                let rendered = self.printer.statements(&stmts, indent);
                edits.push(Edit {
                    start: span.start,
                    end: span.end,
                    text: rendered,
                });
            }
        }
        edits
    }
}

// ============================================================================
// TEXT SPLICING
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

impl Edit {
    fn insert(at: usize, text: String) -> Self {
        Self {
            start: at,
            end: at,
            text,
        }
    }
}

fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));
    let mut out = text.to_string();
    let mut floor = text.len();
    for edit in edits {
        // Overlapping edits would corrupt the text; keep the later one.
        if edit.end > floor || edit.start > edit.end || !out.is_char_boundary(edit.start) {
            continue;
        }
        out.replace_range(edit.start..edit.end, &edit.text);
        floor = edit.start;
    }
    out
}

/// Removes `span`, taking its whole line when nothing else is on it.
fn removal(text: &str, span: Span) -> Edit {
    let line_start = text[..span.start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[span.end..].find('\n').map_or(text.len(), |i| span.end + i + 1);
    let alone = text[line_start..span.start].trim().is_empty()
        && text[span.end..line_end].trim().is_empty();
    if alone {
        Edit {
            start: line_start,
            end: line_end,
            text: String::new(),
        }
    } else {
        Edit {
            start: span.start,
            end: span.end,
            text: String::new(),
        }
    }
}

/// Leading whitespace of the line holding `offset`.
fn indent_of(text: &str, offset: usize) -> &str {
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[line_start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

fn line_of(text: &str, offset: usize) -> usize {
    text.get(..offset).map_or(0, |t| t.matches('\n').count()) + 1
}

fn methods_of(unit: &CompilationUnit) -> Vec<MethodSite<'_>> {
    fn walk<'u>(decl: &'u TypeDecl, outer: &[&'u FieldDecl], out: &mut Vec<MethodSite<'u>>) {
        let mut fields = outer.to_vec();
        fields.extend(decl.fields());
        for method in decl.methods().filter(|m| m.body.is_some()) {
            out.push(MethodSite {
                class: &decl.name,
                fields: fields.clone(),
                method,
            });
        }
        for nested in decl.nested_types() {
            walk(nested, &fields, out);
        }
    }
    let mut out = Vec::new();
    for decl in &unit.types {
        walk(decl, &[], &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "import mockit.*;

class CartTest {
    @Mocked Cart cart;

    void total() {
        // arrange
        new Expectations() {{
            cart.total(); result = 10;
        }};
        assertEquals(10, cart.total());
    }

    void untouched() {
        cart.clear();
    }
}

interface Cart {
    int total();
    void clear();
}
";

    fn engine() -> Engine {
        Engine::new(Config::default())
    }

    #[test]
    fn replaces_blocks_and_keeps_the_rest() {
        let out = engine().rewrite_source("CartTest.java", SOURCE).unwrap();
        assert!(out.changed());
        assert!(out.rewritten.contains("        // arrange\n        when(cart.total()).thenReturn(10);\n        assertEquals"));
        assert!(out.rewritten.contains("    void untouched() {\n        cart.clear();\n    }"));
        assert!(!out.rewritten.contains("Expectations"));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn index_lists_methods_with_blocks() {
        let engine = engine();
        let file = engine.parse(Path::new("CartTest.java"), SOURCE.to_string()).unwrap();
        let index = engine.type_index(std::slice::from_ref(&file)).unwrap();
        let file_index = engine.scan(&file, &index);
        assert_eq!(file_index.methods.len(), 1);
        assert_eq!(file_index.methods[0].method, "total");
        assert_eq!(file_index.methods[0].line, 6);
        assert_eq!(file_index.block_count(), 1);
    }

    #[test]
    fn deferred_checks_go_before_a_trailing_return() {
        let src = "import mockit.*;
class T {
    @Mocked Cart cart;
    int run() {
        new Expectations() {{ cart.clear(); times = 1; }};
        cart.clear();
        return 1;
    }
}
interface Cart { void clear(); }
";
        let out = engine().rewrite_source("T.java", src).unwrap();
        assert!(
            out.rewritten.contains(
                "        doNothing().when(cart).clear();\n        cart.clear();\n        verify(cart).clear();\n        return 1;"
            ),
            "{}",
            out.rewritten
        );
    }

    #[test]
    fn removal_takes_lone_lines() {
        let text = "a();\n    x();\nb();\n";
        let edit = removal(text, Span::new(9, 13));
        assert_eq!(apply_edits(text, vec![edit]), "a();\nb();\n");
        let inline = removal("a(); x(); b();", Span::new(5, 9));
        assert_eq!(apply_edits("a(); x(); b();", vec![inline]), "a();  b();");
    }

    #[test]
    fn skipped_blocks_stay_byte_for_byte() {
        let src = "import mockit.*;
class T {
    @Mocked Cart cart;
    void run() {
        new Expectations() {{   if (flag) { cart.clear(); }   }};
    }
}
interface Cart { void clear(); }
";
        let out = engine().rewrite_source("T.java", src).unwrap();
        assert_eq!(out.rewritten, src);
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].is_skip());
    }
}
