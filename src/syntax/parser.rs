//! Java Parser
//!
//! Converts Java source text into the syntax tree in [`crate::ast`] with
//! source spans on every node. The parser is purely syntactic: names are not
//! resolved and types are not checked.

use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::{
    ast::{
        Annotation, AnnotationArg, Block, CatchClause, ClassBody, CompilationUnit, Expr, ExprKind,
        ForInit, Import, Lambda, LambdaBody, LambdaParam, Literal, LocalVarDecl, Member,
        MethodCall, MethodDecl, Modifiers, NewObject, Param, Span, Stmt, StmtKind, SwitchGroup,
        TypeArg, TypeDecl, TypeKind, TypeParam, TypeRef, VarDeclarator, WildcardBound,
    },
    err_ctx, err_msg,
    errors::{to_error_source, SourceArc},
    MockshiftError,
};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct JavaParser;

type ParseResult<T> = Result<T, MockshiftError>;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses a whole Java source file.
pub fn parse_compilation_unit(source_text: &str, name: &str) -> ParseResult<CompilationUnit> {
    let source = to_error_source(name, source_text);
    let root = parse_root(Rule::compilation_unit, source_text, &source)?;
    Builder { source: &source }.compilation_unit(root)
}

/// Parses a bare method signature such as `String find(int id, String name)`.
///
/// Used for externally declared types in the configuration file. The result
/// has no body.
pub fn parse_method_signature(text: &str) -> ParseResult<MethodDecl> {
    let source = to_error_source("<signature>", text);
    let root = parse_root(Rule::method_signature, text, &source)?;
    let builder = Builder { source: &source };
    let span = span_of(&root);
    let mut children = Children::of(root);
    let modifiers = builder.modifiers(builder.required(&mut children, "modifiers")?)?;
    let type_params = match children.next_if(Rule::type_params) {
        Some(p) => builder.type_params(p)?,
        None => Vec::new(),
    };
    let return_type = builder.result_type(builder.required(&mut children, "return type")?)?;
    let name = builder.required(&mut children, "method name")?.as_str().to_string();
    let params = builder.formal_params(builder.required(&mut children, "parameters")?)?;
    let throws = match children.next_if(Rule::throws_clause) {
        Some(p) => builder.type_list_of(p)?,
        None => Vec::new(),
    };
    Ok(MethodDecl {
        modifiers,
        type_params,
        return_type: Some(return_type),
        name,
        params,
        throws,
        body: None,
        span,
    })
}

/// Parses a sequence of statements, as found inside a method body.
pub fn parse_statements(source_text: &str, name: &str) -> ParseResult<Vec<Stmt>> {
    let source = to_error_source(name, source_text);
    let root = parse_root(Rule::statement_list, source_text, &source)?;
    let builder = Builder { source: &source };
    root.into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(|p| builder.statement(p))
        .collect()
}

fn parse_root<'i>(rule: Rule, text: &'i str, source: &SourceArc) -> ParseResult<Pair<'i, Rule>> {
    let mut pairs = JavaParser::parse(rule, text).map_err(|e| convert_parse_error(e, source))?;
    pairs
        .next()
        .ok_or_else(|| err_msg!(Internal, "parser produced no {:?} node", rule))
}

// ============================================================================
// PAIR CURSOR
// ============================================================================

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_assert
            | Rule::kw_break
            | Rule::kw_case
            | Rule::kw_catch
            | Rule::kw_class
            | Rule::kw_continue
            | Rule::kw_default
            | Rule::kw_do
            | Rule::kw_else
            | Rule::kw_enum
            | Rule::kw_extends
            | Rule::kw_finally
            | Rule::kw_for
            | Rule::kw_if
            | Rule::kw_implements
            | Rule::kw_import
            | Rule::kw_instanceof
            | Rule::kw_interface
            | Rule::kw_new
            | Rule::kw_package
            | Rule::kw_return
            | Rule::kw_static
            | Rule::kw_super
            | Rule::kw_switch
            | Rule::kw_synchronized
            | Rule::kw_this
            | Rule::kw_throw
            | Rule::kw_throws
            | Rule::kw_try
            | Rule::kw_void
            | Rule::kw_while
    )
}

/// Walks the children of a pair, stepping over keyword tokens.
struct Children<'i> {
    pairs: Vec<Pair<'i, Rule>>,
    pos: usize,
    span: Span,
}

impl<'i> Children<'i> {
    fn of(pair: Pair<'i, Rule>) -> Self {
        let span = span_of(&pair);
        Self {
            pairs: pair.into_inner().collect(),
            pos: 0,
            span,
        }
    }

    /// True if any child, keywords included, has the given rule.
    fn has(&self, rule: Rule) -> bool {
        self.pairs.iter().any(|p| p.as_rule() == rule)
    }

    fn skip_keywords(&mut self) {
        while self
            .pairs
            .get(self.pos)
            .is_some_and(|p| is_keyword(p.as_rule()))
        {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<Rule> {
        self.skip_keywords();
        self.pairs.get(self.pos).map(|p| p.as_rule())
    }

    fn next(&mut self) -> Option<Pair<'i, Rule>> {
        self.skip_keywords();
        let pair = self.pairs.get(self.pos).cloned();
        if pair.is_some() {
            self.pos += 1;
        }
        pair
    }

    fn next_if(&mut self, rule: Rule) -> Option<Pair<'i, Rule>> {
        if self.peek() == Some(rule) {
            self.next()
        } else {
            None
        }
    }

    fn next_while(&mut self, rule: Rule) -> Vec<Pair<'i, Rule>> {
        let mut taken = Vec::new();
        while let Some(p) = self.next_if(rule) {
            taken.push(p);
        }
        taken
    }

    fn remaining(&mut self) -> Vec<Pair<'i, Rule>> {
        let mut taken = Vec::new();
        while let Some(p) = self.next() {
            taken.push(p);
        }
        taken
    }
}

fn span_of(pair: &Pair<Rule>) -> Span {
    let s = pair.as_span();
    Span::new(s.start(), s.end())
}

// ============================================================================
// AST BUILDERS
// ============================================================================

struct Builder<'a> {
    source: &'a SourceArc,
}

impl Builder<'_> {
    fn malformed(&self, what: &str, span: Span) -> MockshiftError {
        err_ctx!(Parse, format!("malformed {what}"), self.source, span)
    }

    fn required<'i>(&self, children: &mut Children<'i>, what: &str) -> ParseResult<Pair<'i, Rule>> {
        let span = children.span;
        children.next().ok_or_else(|| self.malformed(what, span))
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn compilation_unit(&self, pair: Pair<Rule>) -> ParseResult<CompilationUnit> {
        let span = span_of(&pair);
        let mut unit = CompilationUnit {
            package: None,
            imports: Vec::new(),
            types: Vec::new(),
            span,
        };
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::package_decl => {
                    let name = child
                        .into_inner()
                        .find(|p| p.as_rule() == Rule::qualified_name)
                        .map(|p| p.as_str().to_string());
                    unit.package = name;
                }
                Rule::import_decl => unit.imports.push(self.import(child)?),
                Rule::type_decl => unit.types.push(self.type_decl(child)?),
                _ => {}
            }
        }
        Ok(unit)
    }

    fn import(&self, pair: Pair<Rule>) -> ParseResult<Import> {
        let span = span_of(&pair);
        let mut children = Children::of(pair);
        let is_static = children.has(Rule::kw_static);
        let wildcard = children.has(Rule::import_wildcard);
        let path = self.required(&mut children, "import")?.as_str().to_string();
        Ok(Import {
            path,
            is_static,
            wildcard,
            span,
        })
    }

    fn type_decl(&self, pair: Pair<Rule>) -> ParseResult<TypeDecl> {
        let span = span_of(&pair);
        let mut children = Children::of(pair);
        let modifiers = self.modifiers(self.required(&mut children, "type modifiers")?)?;
        let decl = self.required(&mut children, "type declaration")?;
        let kind = match decl.as_rule() {
            Rule::class_decl => TypeKind::Class,
            Rule::interface_decl => TypeKind::Interface,
            _ => TypeKind::Enum,
        };
        let mut parts = Children::of(decl);
        let name = self.required(&mut parts, "type name")?.as_str().to_string();
        let mut out = TypeDecl {
            kind,
            modifiers,
            name,
            type_params: Vec::new(),
            extends: Vec::new(),
            implements: Vec::new(),
            enum_constants: Vec::new(),
            members: Vec::new(),
            span,
        };
        for part in parts.remaining() {
            match part.as_rule() {
                Rule::type_params => out.type_params = self.type_params(part)?,
                Rule::extends_clause => out.extends = self.type_list_of(part)?,
                Rule::implements_clause => out.implements = self.type_list_of(part)?,
                Rule::class_body => out.members = self.class_body(part)?.members,
                Rule::enum_body => {
                    for item in part.into_inner() {
                        match item.as_rule() {
                            Rule::enum_constant => {
                                if let Some(id) = item.into_inner().find(|p| p.as_rule() == Rule::ident) {
                                    out.enum_constants.push(id.as_str().to_string());
                                }
                            }
                            _ => {
                                if let Some(member) = self.member(item)? {
                                    out.members.push(member);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }

    /// Type lists appear under `extends`, `implements` and `throws` clauses.
    fn type_list_of(&self, clause: Pair<Rule>) -> ParseResult<Vec<TypeRef>> {
        let mut children = Children::of(clause);
        let list = self.required(&mut children, "type list")?;
        list.into_inner().map(|p| self.type_ref(p)).collect()
    }

    fn class_body(&self, pair: Pair<Rule>) -> ParseResult<ClassBody> {
        let span = span_of(&pair);
        let mut members = Vec::new();
        for child in pair.into_inner() {
            if let Some(member) = self.member(child)? {
                members.push(member);
            }
        }
        Ok(ClassBody { members, span })
    }

    fn member(&self, pair: Pair<Rule>) -> ParseResult<Option<Member>> {
        let member = match pair.as_rule() {
            Rule::initializer => {
                let mut children = Children::of(pair);
                let is_static = children.has(Rule::kw_static);
                let body = self.block(self.required(&mut children, "initializer")?)?;
                Member::Initializer { is_static, body }
            }
            Rule::type_decl => Member::Type(self.type_decl(pair)?),
            Rule::method_decl => Member::Method(self.method_decl(pair)?),
            Rule::constructor_decl => Member::Constructor(self.method_decl(pair)?),
            Rule::field_decl => {
                let span = span_of(&pair);
                let mut children = Children::of(pair);
                let modifiers = self.modifiers(self.required(&mut children, "field")?)?;
                let ty = self.type_ref(self.required(&mut children, "field type")?)?;
                let declarators =
                    self.var_declarators(self.required(&mut children, "field declarators")?)?;
                Member::Field(crate::ast::FieldDecl {
                    modifiers,
                    ty,
                    declarators,
                    span,
                })
            }
            _ => return Ok(None),
        };
        Ok(Some(member))
    }

    /// Builds both methods and constructors; constructors have no result type.
    fn method_decl(&self, pair: Pair<Rule>) -> ParseResult<MethodDecl> {
        let span = span_of(&pair);
        let is_constructor = pair.as_rule() == Rule::constructor_decl;
        let mut children = Children::of(pair);
        let modifiers = self.modifiers(self.required(&mut children, "method modifiers")?)?;
        let type_params = match children.next_if(Rule::type_params) {
            Some(p) => self.type_params(p)?,
            None => Vec::new(),
        };
        let mut return_type = if is_constructor {
            None
        } else {
            Some(self.result_type(self.required(&mut children, "return type")?)?)
        };
        let name = self.required(&mut children, "method name")?.as_str().to_string();
        let params = self.formal_params(self.required(&mut children, "parameters")?)?;
        let mut throws = Vec::new();
        let mut body = None;
        for part in children.remaining() {
            match part.as_rule() {
                Rule::dims => {
                    if let Some(ty) = return_type.as_mut() {
                        ty.dims += count_dims(part);
                    }
                }
                Rule::throws_clause => throws = self.type_list_of(part)?,
                Rule::block => body = Some(self.block(part)?),
                _ => {}
            }
        }
        Ok(MethodDecl {
            modifiers,
            type_params,
            return_type,
            name,
            params,
            throws,
            body,
            span,
        })
    }

    fn result_type(&self, pair: Pair<Rule>) -> ParseResult<TypeRef> {
        let span = span_of(&pair);
        let mut children = Children::of(pair);
        if children.has(Rule::kw_void) {
            let mut ty = TypeRef::named("void");
            ty.span = span;
            return Ok(ty);
        }
        self.type_ref(self.required(&mut children, "result type")?)
    }

    fn formal_params(&self, pair: Pair<Rule>) -> ParseResult<Vec<Param>> {
        pair.into_inner()
            .map(|param| -> ParseResult<Param> {
                let span = span_of(&param);
                let mut children = Children::of(param);
                let modifiers = self.modifiers(self.required(&mut children, "parameter")?)?;
                let mut ty = self.type_ref(self.required(&mut children, "parameter type")?)?;
                let varargs = children.next_if(Rule::varargs).is_some();
                let name = self
                    .required(&mut children, "parameter name")?
                    .as_str()
                    .to_string();
                if let Some(dims) = children.next_if(Rule::dims) {
                    ty.dims += count_dims(dims);
                }
                Ok(Param {
                    modifiers,
                    ty,
                    varargs,
                    name,
                    span,
                })
            })
            .collect()
    }

    fn modifiers(&self, pair: Pair<Rule>) -> ParseResult<Modifiers> {
        let mut modifiers = Modifiers::default();
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::annotation => modifiers.annotations.push(self.annotation(child)?),
                _ => modifiers.keywords.push(child.as_str().to_string()),
            }
        }
        Ok(modifiers)
    }

    fn annotation(&self, pair: Pair<Rule>) -> ParseResult<Annotation> {
        let span = span_of(&pair);
        let mut children = Children::of(pair);
        let name = self
            .required(&mut children, "annotation name")?
            .as_str()
            .to_string();
        let mut args = Vec::new();
        if let Some(list) = children.next_if(Rule::annotation_args) {
            for item in list.into_inner() {
                if item.as_rule() == Rule::annotation_pair {
                    let mut kv = Children::of(item);
                    let key = self.required(&mut kv, "annotation key")?.as_str().to_string();
                    let value = self.element_value(self.required(&mut kv, "annotation value")?)?;
                    args.push(AnnotationArg {
                        key: Some(key),
                        value,
                    });
                } else {
                    args.push(AnnotationArg {
                        key: None,
                        value: self.element_value(item)?,
                    });
                }
            }
        }
        Ok(Annotation { name, args, span })
    }

    fn element_value(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        if pair.as_rule() == Rule::element_array {
            let span = span_of(&pair);
            let items = pair
                .into_inner()
                .map(|p| self.element_value(p))
                .collect::<ParseResult<Vec<_>>>()?;
            return Ok(Expr {
                kind: ExprKind::ArrayInit(items),
                span,
            });
        }
        self.expr_node(pair)
    }

    fn var_declarators(&self, pair: Pair<Rule>) -> ParseResult<Vec<VarDeclarator>> {
        pair.into_inner()
            .map(|decl| -> ParseResult<VarDeclarator> {
                let span = span_of(&decl);
                let mut children = Children::of(decl);
                let name = self
                    .required(&mut children, "variable name")?
                    .as_str()
                    .to_string();
                let dims = children.next_if(Rule::dims).map_or(0, count_dims);
                let init = match children.next() {
                    Some(p) => Some(self.var_init(p)?),
                    None => None,
                };
                Ok(VarDeclarator {
                    name,
                    dims,
                    init,
                    span,
                })
            })
            .collect()
    }

    fn var_init(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        if pair.as_rule() == Rule::array_init {
            let span = span_of(&pair);
            let items = pair
                .into_inner()
                .map(|p| self.var_init(p))
                .collect::<ParseResult<Vec<_>>>()?;
            return Ok(Expr {
                kind: ExprKind::ArrayInit(items),
                span,
            });
        }
        self.expr_node(pair)
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    fn type_ref(&self, pair: Pair<Rule>) -> ParseResult<TypeRef> {
        let span = span_of(&pair);
        let mut children = Children::of(pair);
        let head = self.required(&mut children, "type")?;
        let mut ty = match head.as_rule() {
            Rule::primitive_type => TypeRef::named(head.as_str()),
            _ => self.class_type(head)?,
        };
        if let Some(dims) = children.next_if(Rule::dims) {
            ty.dims += count_dims(dims);
        }
        ty.span = span;
        Ok(ty)
    }

    fn class_type(&self, pair: Pair<Rule>) -> ParseResult<TypeRef> {
        let span = span_of(&pair);
        let mut children = Children::of(pair);
        let name = self.required(&mut children, "type name")?.as_str().to_string();
        let (args, diamond) = match children.next_if(Rule::type_args) {
            Some(p) => {
                let args = self.type_args(p)?;
                let diamond = args.is_empty();
                (args, diamond)
            }
            None => (Vec::new(), false),
        };
        Ok(TypeRef {
            name,
            args,
            diamond,
            dims: 0,
            span,
        })
    }

    fn type_args(&self, pair: Pair<Rule>) -> ParseResult<Vec<TypeArg>> {
        pair.into_inner()
            .map(|arg| -> ParseResult<TypeArg> {
                let mut children = Children::of(arg);
                let inner = self.required(&mut children, "type argument")?;
                if inner.as_rule() != Rule::wildcard {
                    return Ok(TypeArg::Type(self.type_ref(inner)?));
                }
                let mut wild = Children::of(inner);
                let upper = wild.has(Rule::kw_extends);
                match wild.next() {
                    Some(bound) => Ok(TypeArg::Wildcard(Some(WildcardBound {
                        upper,
                        ty: self.type_ref(bound)?,
                    }))),
                    None => Ok(TypeArg::Wildcard(None)),
                }
            })
            .collect()
    }

    fn type_params(&self, pair: Pair<Rule>) -> ParseResult<Vec<TypeParam>> {
        pair.into_inner()
            .map(|param| -> ParseResult<TypeParam> {
                let mut children = Children::of(param);
                children.next_while(Rule::annotation);
                let name = self
                    .required(&mut children, "type parameter")?
                    .as_str()
                    .to_string();
                let bounds = children
                    .remaining()
                    .into_iter()
                    .map(|b| self.type_ref(b))
                    .collect::<ParseResult<Vec<_>>>()?;
                Ok(TypeParam { name, bounds })
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn block(&self, pair: Pair<Rule>) -> ParseResult<Block> {
        let span = span_of(&pair);
        let stmts = pair
            .into_inner()
            .map(|p| self.statement(p))
            .collect::<ParseResult<Vec<_>>>()?;
        Ok(Block { stmts, span })
    }

    fn local_var_decl(&self, pair: Pair<Rule>) -> ParseResult<LocalVarDecl> {
        let mut children = Children::of(pair);
        let modifiers = self.modifiers(self.required(&mut children, "local variable")?)?;
        let ty = self.type_ref(self.required(&mut children, "local variable type")?)?;
        let declarators = self.var_declarators(self.required(&mut children, "declarators")?)?;
        Ok(LocalVarDecl {
            modifiers,
            ty,
            declarators,
        })
    }

    fn boxed_statement(&self, pair: Pair<Rule>) -> ParseResult<Box<Stmt>> {
        Ok(Box::new(self.statement(pair)?))
    }

    fn statement(&self, pair: Pair<Rule>) -> ParseResult<Stmt> {
        let span = span_of(&pair);
        let rule = pair.as_rule();
        let mut c = Children::of(pair);
        let kind = match rule {
            Rule::local_var_stmt => {
                StmtKind::LocalVar(self.local_var_decl(self.required(&mut c, "declaration")?)?)
            }
            Rule::expr_stmt => StmtKind::Expr(self.expr_node(self.required(&mut c, "expression")?)?),
            Rule::block => {
                let stmts = c
                    .remaining()
                    .into_iter()
                    .map(|p| self.statement(p))
                    .collect::<ParseResult<Vec<_>>>()?;
                StmtKind::Block(Block { stmts, span })
            }
            Rule::if_stmt => {
                let cond = self.expr_node(self.required(&mut c, "if condition")?)?;
                let then = self.boxed_statement(self.required(&mut c, "if body")?)?;
                let otherwise = match c.next() {
                    Some(p) => Some(self.boxed_statement(p)?),
                    None => None,
                };
                StmtKind::If {
                    cond,
                    then,
                    otherwise,
                }
            }
            Rule::while_stmt => {
                let cond = self.expr_node(self.required(&mut c, "while condition")?)?;
                let body = self.boxed_statement(self.required(&mut c, "while body")?)?;
                StmtKind::While { cond, body }
            }
            Rule::do_stmt => {
                let body = self.boxed_statement(self.required(&mut c, "do body")?)?;
                let cond = self.expr_node(self.required(&mut c, "do condition")?)?;
                StmtKind::DoWhile { body, cond }
            }
            Rule::foreach_stmt => {
                let modifiers = self.modifiers(self.required(&mut c, "for variable")?)?;
                let ty = self.type_ref(self.required(&mut c, "for variable type")?)?;
                let name = self.required(&mut c, "for variable name")?.as_str().to_string();
                let iterable = self.expr_node(self.required(&mut c, "for iterable")?)?;
                let body = self.boxed_statement(self.required(&mut c, "for body")?)?;
                StmtKind::ForEach {
                    modifiers,
                    ty,
                    name,
                    iterable,
                    body,
                }
            }
            Rule::for_stmt => {
                let mut init = None;
                let mut cond = None;
                let mut update = Vec::new();
                let mut body = None;
                for part in c.remaining() {
                    match part.as_rule() {
                        Rule::for_init => {
                            let mut inner = Children::of(part);
                            let head = self.required(&mut inner, "for initializer")?;
                            init = Some(if head.as_rule() == Rule::local_var_decl {
                                ForInit::Decl(self.local_var_decl(head)?)
                            } else {
                                ForInit::Exprs(self.expr_list(head)?)
                            });
                        }
                        Rule::for_cond => {
                            let mut inner = Children::of(part);
                            cond = Some(self.expr_node(self.required(&mut inner, "for condition")?)?);
                        }
                        Rule::for_update => {
                            let mut inner = Children::of(part);
                            update = self.expr_list(self.required(&mut inner, "for update")?)?;
                        }
                        _ => body = Some(self.boxed_statement(part)?),
                    }
                }
                let body = body.ok_or_else(|| self.malformed("for statement", span))?;
                StmtKind::For {
                    init,
                    cond,
                    update,
                    body,
                }
            }
            Rule::try_stmt => {
                let mut resources = Vec::new();
                if let Some(list) = c.next_if(Rule::resources) {
                    for decl in list.into_inner() {
                        resources.push(self.local_var_decl(decl)?);
                    }
                }
                let body = self.block(self.required(&mut c, "try body")?)?;
                let mut catches = Vec::new();
                let mut finally = None;
                for part in c.remaining() {
                    match part.as_rule() {
                        Rule::catch_clause => catches.push(self.catch_clause(part)?),
                        _ => {
                            let mut inner = Children::of(part);
                            finally = Some(self.block(self.required(&mut inner, "finally")?)?);
                        }
                    }
                }
                StmtKind::Try {
                    resources,
                    body,
                    catches,
                    finally,
                }
            }
            Rule::switch_stmt => {
                let selector = self.expr_node(self.required(&mut c, "switch selector")?)?;
                let groups = c
                    .remaining()
                    .into_iter()
                    .map(|g| self.switch_group(g))
                    .collect::<ParseResult<Vec<_>>>()?;
                StmtKind::Switch { selector, groups }
            }
            Rule::synchronized_stmt => {
                let lock = self.expr_node(self.required(&mut c, "lock")?)?;
                let body = self.block(self.required(&mut c, "synchronized body")?)?;
                StmtKind::Synchronized { lock, body }
            }
            Rule::return_stmt => StmtKind::Return(match c.next() {
                Some(p) => Some(self.expr_node(p)?),
                None => None,
            }),
            Rule::throw_stmt => StmtKind::Throw(self.expr_node(self.required(&mut c, "throw")?)?),
            Rule::break_stmt => StmtKind::Break(c.next().map(|p| p.as_str().to_string())),
            Rule::continue_stmt => StmtKind::Continue(c.next().map(|p| p.as_str().to_string())),
            Rule::assert_stmt => {
                let cond = self.expr_node(self.required(&mut c, "assertion")?)?;
                let message = match c.next() {
                    Some(p) => Some(self.expr_node(p)?),
                    None => None,
                };
                StmtKind::Assert { cond, message }
            }
            Rule::empty_stmt => StmtKind::Empty,
            _ => return Err(self.malformed("statement", span)),
        };
        Ok(Stmt { kind, span })
    }

    fn catch_clause(&self, pair: Pair<Rule>) -> ParseResult<CatchClause> {
        let span = span_of(&pair);
        let mut children = Children::of(pair);
        let modifiers = self.modifiers(self.required(&mut children, "catch")?)?;
        let types = children
            .next_while(Rule::type_ref)
            .into_iter()
            .map(|t| self.type_ref(t))
            .collect::<ParseResult<Vec<_>>>()?;
        let name = self
            .required(&mut children, "catch variable")?
            .as_str()
            .to_string();
        let body = self.block(self.required(&mut children, "catch body")?)?;
        Ok(CatchClause {
            modifiers,
            types,
            name,
            body,
            span,
        })
    }

    fn switch_group(&self, pair: Pair<Rule>) -> ParseResult<SwitchGroup> {
        let mut labels = Vec::new();
        let mut stmts = Vec::new();
        for part in pair.into_inner() {
            if part.as_rule() == Rule::switch_label {
                let mut label = Children::of(part);
                if label.has(Rule::kw_default) {
                    labels.push(None);
                } else {
                    let list = self.required(&mut label, "case label")?;
                    labels.push(Some(self.expr_list(list)?));
                }
            } else {
                stmts.push(self.statement(part)?);
            }
        }
        Ok(SwitchGroup { labels, stmts })
    }

    fn expr_list(&self, pair: Pair<Rule>) -> ParseResult<Vec<Expr>> {
        pair.into_inner().map(|p| self.expr_node(p)).collect()
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expr_node(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        let span = span_of(&pair);
        match pair.as_rule() {
            Rule::expr => {
                let mut c = Children::of(pair);
                self.expr_node(self.required(&mut c, "expression")?)
            }
            Rule::lambda => self.lambda(pair),
            Rule::assignment => {
                let mut c = Children::of(pair);
                let target = self.expr_node(self.required(&mut c, "expression")?)?;
                let Some(op) = c.next() else {
                    return Ok(target);
                };
                let value = self.expr_node(self.required(&mut c, "assigned value")?)?;
                Ok(Expr {
                    kind: ExprKind::Assign {
                        target: Box::new(target),
                        op: op.as_str().to_string(),
                        value: Box::new(value),
                    },
                    span,
                })
            }
            Rule::conditional => {
                let mut c = Children::of(pair);
                let cond = self.expr_node(self.required(&mut c, "expression")?)?;
                let Some(then) = c.next() else {
                    return Ok(cond);
                };
                let then = self.expr_node(then)?;
                let otherwise = self.expr_node(self.required(&mut c, "conditional branch")?)?;
                Ok(Expr {
                    kind: ExprKind::Conditional {
                        cond: Box::new(cond),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    },
                    span,
                })
            }
            Rule::binary => self.binary(pair),
            Rule::unary => {
                let mut c = Children::of(pair);
                let head = self.required(&mut c, "expression")?;
                if head.as_rule() != Rule::prefix_op {
                    return self.expr_node(head);
                }
                let operand = self.expr_node(self.required(&mut c, "operand")?)?;
                Ok(Expr {
                    kind: ExprKind::Unary {
                        op: head.as_str().to_string(),
                        prefix: true,
                        operand: Box::new(operand),
                    },
                    span,
                })
            }
            Rule::cast => {
                let mut c = Children::of(pair);
                let head = self.required(&mut c, "cast type")?;
                let mut ty = match head.as_rule() {
                    Rule::primitive_type => {
                        let mut ty = TypeRef::named(head.as_str());
                        ty.span = span_of(&head);
                        ty
                    }
                    _ => self.type_ref(head)?,
                };
                if let Some(dims) = c.next_if(Rule::dims) {
                    ty.dims += count_dims(dims);
                }
                let expr = self.expr_node(self.required(&mut c, "cast operand")?)?;
                Ok(Expr {
                    kind: ExprKind::Cast {
                        ty,
                        expr: Box::new(expr),
                    },
                    span,
                })
            }
            Rule::postfix => self.postfix(pair),
            _ => self.primary(pair),
        }
    }

    fn lambda(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        let span = span_of(&pair);
        let mut c = Children::of(pair);
        let params_pair = self.required(&mut c, "lambda parameters")?;
        let parenthesized = params_pair.as_str().trim_start().starts_with('(');
        let mut params = Vec::new();
        for param in params_pair.into_inner() {
            if param.as_rule() == Rule::ident {
                params.push(LambdaParam {
                    ty: None,
                    name: param.as_str().to_string(),
                });
                continue;
            }
            let mut parts = Children::of(param);
            let first = self.required(&mut parts, "lambda parameter")?;
            if first.as_rule() == Rule::ident {
                params.push(LambdaParam {
                    ty: None,
                    name: first.as_str().to_string(),
                });
            } else {
                let ty = self.type_ref(self.required(&mut parts, "lambda parameter type")?)?;
                let name = self
                    .required(&mut parts, "lambda parameter name")?
                    .as_str()
                    .to_string();
                params.push(LambdaParam { ty: Some(ty), name });
            }
        }
        let body_pair = self.required(&mut c, "lambda body")?;
        let body = if body_pair.as_rule() == Rule::block {
            LambdaBody::Block(self.block(body_pair)?)
        } else {
            LambdaBody::Expr(Box::new(self.expr_node(body_pair)?))
        };
        Ok(Expr {
            kind: ExprKind::Lambda(Lambda {
                params,
                parenthesized,
                body,
            }),
            span,
        })
    }

    /// Operator chains stay flat; `instanceof` closes the chain built so far.
    fn binary(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        let span = span_of(&pair);
        let start = span.start;
        let mut c = Children::of(pair);
        let mut first = self.expr_node(self.required(&mut c, "operand")?)?;
        let mut rest: Vec<(String, Expr)> = Vec::new();
        while let Some(part) = c.next() {
            match part.as_rule() {
                Rule::instanceof_tail => {
                    let end = span_of(&part).end;
                    let mut tail = Children::of(part);
                    let ty = self.type_ref(self.required(&mut tail, "instanceof type")?)?;
                    let lhs = close_chain(first, std::mem::take(&mut rest), start);
                    first = Expr {
                        kind: ExprKind::InstanceOf {
                            expr: Box::new(lhs),
                            ty,
                        },
                        span: Span::new(start, end),
                    };
                }
                _ => {
                    let rhs = self.expr_node(self.required(&mut c, "right operand")?)?;
                    rest.push((part.as_str().to_string(), rhs));
                }
            }
        }
        let mut out = close_chain(first, rest, start);
        out.span = span;
        Ok(out)
    }

    fn postfix(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        let start = span_of(&pair).start;
        let mut c = Children::of(pair);
        let mut current = self.primary(self.required(&mut c, "primary expression")?)?;
        for sel in c.remaining() {
            let end = span_of(&sel).end;
            let rule = sel.as_rule();
            let kind = match rule {
                Rule::method_selector => {
                    let mut parts = Children::of(sel);
                    let type_args = match parts.next_if(Rule::type_args) {
                        Some(p) => self.plain_type_args(p)?,
                        None => Vec::new(),
                    };
                    let name = self.required(&mut parts, "method name")?.as_str().to_string();
                    let args = self.arguments(self.required(&mut parts, "arguments")?)?;
                    ExprKind::MethodCall(MethodCall {
                        receiver: Some(Box::new(current)),
                        type_args,
                        name,
                        args,
                    })
                }
                Rule::field_selector => {
                    let mut parts = Children::of(sel);
                    let name = if parts.has(Rule::kw_this) {
                        "this".to_string()
                    } else {
                        self.required(&mut parts, "field name")?.as_str().to_string()
                    };
                    ExprKind::FieldAccess {
                        target: Box::new(current),
                        name,
                    }
                }
                Rule::index_selector => {
                    let mut parts = Children::of(sel);
                    let index = self.expr_node(self.required(&mut parts, "index")?)?;
                    ExprKind::ArrayAccess {
                        array: Box::new(current),
                        index: Box::new(index),
                    }
                }
                Rule::method_ref_selector => {
                    let mut parts = Children::of(sel);
                    let name = if parts.has(Rule::kw_new) {
                        "new".to_string()
                    } else {
                        self.required(&mut parts, "method reference")?
                            .as_str()
                            .to_string()
                    };
                    ExprKind::MethodRef {
                        target: Box::new(current),
                        name,
                    }
                }
                _ => ExprKind::Unary {
                    op: sel.as_str().to_string(),
                    prefix: false,
                    operand: Box::new(current),
                },
            };
            current = Expr {
                kind,
                span: Span::new(start, end),
            };
        }
        Ok(current)
    }

    fn plain_type_args(&self, pair: Pair<Rule>) -> ParseResult<Vec<TypeRef>> {
        let span = span_of(&pair);
        self.type_args(pair)?
            .into_iter()
            .map(|arg| match arg {
                TypeArg::Type(ty) => Ok(ty),
                TypeArg::Wildcard(_) => Err(self.malformed("explicit type argument", span)),
            })
            .collect()
    }

    fn arguments(&self, pair: Pair<Rule>) -> ParseResult<Vec<Expr>> {
        pair.into_inner().map(|p| self.expr_node(p)).collect()
    }

    fn primary(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        let span = span_of(&pair);
        let rule = pair.as_rule();
        let text = pair.as_str();
        let kind = match rule {
            Rule::int_lit => {
                if text.ends_with(['L', 'l']) {
                    ExprKind::Literal(Literal::Long(text.to_string()))
                } else {
                    ExprKind::Literal(Literal::Int(text.to_string()))
                }
            }
            Rule::float_lit => {
                if text.ends_with(['f', 'F']) {
                    ExprKind::Literal(Literal::Float(text.to_string()))
                } else {
                    ExprKind::Literal(Literal::Double(text.to_string()))
                }
            }
            Rule::char_lit => ExprKind::Literal(Literal::Char(text.to_string())),
            Rule::string_lit | Rule::text_block => ExprKind::Literal(Literal::Str(text.to_string())),
            Rule::bool_lit => ExprKind::Literal(Literal::Bool(text == "true")),
            Rule::null_lit => ExprKind::Literal(Literal::Null),
            Rule::name_expr => ExprKind::Name(text.to_string()),
            Rule::paren_expr => {
                let mut c = Children::of(pair);
                ExprKind::Paren(Box::new(self.expr_node(self.required(&mut c, "expression")?)?))
            }
            Rule::class_literal => {
                let mut c = Children::of(pair);
                ExprKind::ClassLiteral(self.type_ref(self.required(&mut c, "class literal")?)?)
            }
            Rule::call_expr => {
                let mut c = Children::of(pair);
                let name = self.required(&mut c, "method name")?.as_str().to_string();
                let args = self.arguments(self.required(&mut c, "arguments")?)?;
                ExprKind::MethodCall(MethodCall {
                    receiver: None,
                    type_args: Vec::new(),
                    name,
                    args,
                })
            }
            Rule::this_expr | Rule::super_expr => {
                let keyword = if rule == Rule::this_expr { "this" } else { "super" };
                let mut c = Children::of(pair);
                match c.next() {
                    Some(args) => ExprKind::MethodCall(MethodCall {
                        receiver: None,
                        type_args: Vec::new(),
                        name: keyword.to_string(),
                        args: self.arguments(args)?,
                    }),
                    None if rule == Rule::this_expr => ExprKind::This,
                    None => ExprKind::Super,
                }
            }
            Rule::new_expr => {
                let mut c = Children::of(pair);
                let creator = self.required(&mut c, "creation expression")?;
                if creator.as_rule() == Rule::object_creator {
                    self.object_creator(creator)?
                } else {
                    self.array_creator(creator)?
                }
            }
            _ => return self.expr_node_fallback(pair),
        };
        Ok(Expr { kind, span })
    }

    fn expr_node_fallback(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        match pair.as_rule() {
            Rule::expr
            | Rule::lambda
            | Rule::assignment
            | Rule::conditional
            | Rule::binary
            | Rule::unary
            | Rule::cast
            | Rule::postfix => self.expr_node(pair),
            _ => Err(self.malformed("expression", span_of(&pair))),
        }
    }

    fn object_creator(&self, pair: Pair<Rule>) -> ParseResult<ExprKind> {
        let mut c = Children::of(pair);
        let ty = self.class_type(self.required(&mut c, "instantiated type")?)?;
        let args = self.arguments(self.required(&mut c, "constructor arguments")?)?;
        let body = match c.next() {
            Some(p) => Some(self.class_body(p)?),
            None => None,
        };
        Ok(ExprKind::New(NewObject { ty, args, body }))
    }

    fn array_creator(&self, pair: Pair<Rule>) -> ParseResult<ExprKind> {
        let mut c = Children::of(pair);
        let head = self.required(&mut c, "array element type")?;
        let element = match head.as_rule() {
            Rule::primitive_type => {
                let mut ty = TypeRef::named(head.as_str());
                ty.span = span_of(&head);
                ty
            }
            _ => self.class_type(head)?,
        };
        let mut dims = Vec::new();
        let mut extra_dims = 0;
        let mut init = None;
        for part in c.remaining() {
            match part.as_rule() {
                Rule::dim_expr => {
                    let mut inner = Children::of(part);
                    dims.push(self.expr_node(self.required(&mut inner, "array dimension")?)?);
                }
                Rule::dim => extra_dims += 1,
                Rule::dims => extra_dims += count_dims(part),
                _ => {
                    let items = part
                        .into_inner()
                        .map(|p| self.var_init(p))
                        .collect::<ParseResult<Vec<_>>>()?;
                    init = Some(items);
                }
            }
        }
        Ok(ExprKind::NewArray {
            element,
            dims,
            extra_dims,
            init,
        })
    }
}

fn count_dims(pair: Pair<Rule>) -> usize {
    pair.into_inner().count()
}

fn close_chain(first: Expr, rest: Vec<(String, Expr)>, start: usize) -> Expr {
    if rest.is_empty() {
        return first;
    }
    let end = rest.last().map_or(first.span.end, |(_, e)| e.span.end);
    Expr {
        kind: ExprKind::Binary {
            first: Box::new(first),
            rest,
        },
        span: Span::new(start, end),
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

fn convert_parse_error(error: Error<Rule>, source: &SourceArc) -> MockshiftError {
    let span = match error.location {
        pest::error::InputLocation::Pos(pos) => Span::new(pos, pos),
        pest::error::InputLocation::Span((start, end)) => Span::new(start, end),
    };
    let detail = error.variant.message().to_string();
    let message = if detail.contains("EOI") {
        "Unexpected trailing input"
    } else if detail.contains("block") || detail.contains("class_body") {
        "Missing closing brace"
    } else if detail.contains("arguments") || detail.contains("formal_params") {
        "Missing closing parenthesis"
    } else {
        "Syntax error"
    };
    err_ctx!(Parse, message, source, span, detail)
}
