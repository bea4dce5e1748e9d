//! AST module for the Java subset handled by mockshift
//!
//! This module provides the syntax tree the rewrite engine reads and produces:
//! declarations, statements and expressions, each carrying a source span.
//! Nodes created by the engine carry [`Span::synthetic`].

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// SPANS
// ============================================================================

/// Represents a byte range in the source text.
///
/// # Examples
///
/// ```rust
/// use mockshift::ast::Span;
/// let span = Span::new(4, 9);
/// assert_eq!(span.len(), 5);
/// assert!(!span.is_synthetic());
/// assert!(Span::synthetic().is_synthetic());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    const SYNTHETIC_MARK: usize = usize::MAX;

    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span for nodes that do not come from any source text.
    pub fn synthetic() -> Self {
        Self {
            start: Self::SYNTHETIC_MARK,
            end: Self::SYNTHETIC_MARK,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.start == Self::SYNTHETIC_MARK
    }

    pub fn len(&self) -> usize {
        if self.is_synthetic() {
            return 0;
        }
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source text covered by this span, if it is a real span inside `source`.
    pub fn slice<'s>(&self, source: &'s str) -> Option<&'s str> {
        if self.is_synthetic() {
            return None;
        }
        source.get(self.start..self.end)
    }
}

// ============================================================================
// TYPES
// ============================================================================

const PRIMITIVES: [&str; 8] = [
    "boolean", "byte", "char", "short", "int", "long", "float", "double",
];

/// A type as written in source: `int`, `String[]`, `java.util.Map<K, V>`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub name: String,
    pub args: Vec<TypeArg>,
    /// `<>` written with no arguments.
    pub diamond: bool,
    pub dims: usize,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeArg {
    Type(TypeRef),
    Wildcard(Option<WildcardBound>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WildcardBound {
    pub upper: bool,
    pub ty: TypeRef,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            diamond: false,
            dims: 0,
            span: Span::synthetic(),
        }
    }

    /// The last segment of the written name: `java.util.List` gives `List`.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn is_primitive(&self) -> bool {
        self.dims == 0 && PRIMITIVES.contains(&self.name.as_str())
    }

    pub fn is_void(&self) -> bool {
        self.dims == 0 && self.name == "void"
    }

    pub fn is_array(&self) -> bool {
        self.dims > 0
    }

    /// The type without type arguments, keeping array dimensions.
    pub fn erasure(&self) -> TypeRef {
        TypeRef {
            name: self.name.clone(),
            args: Vec::new(),
            diamond: false,
            dims: self.dims,
            span: self.span,
        }
    }

    /// Wrapper class name for a primitive, the simple name otherwise.
    pub fn boxed_name(&self) -> &str {
        if !self.is_primitive() {
            return self.simple_name();
        }
        match self.name.as_str() {
            "boolean" => "Boolean",
            "byte" => "Byte",
            "char" => "Character",
            "short" => "Short",
            "int" => "Integer",
            "long" => "Long",
            "float" => "Float",
            _ => "Double",
        }
    }

    /// Compares two types by simple name, arguments ignored.
    pub fn same_erasure(&self, other: &TypeRef) -> bool {
        self.dims == other.dims && self.simple_name() == other.simple_name()
    }
}

// ============================================================================
// DECLARATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnit {
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub types: Vec<TypeDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub path: String,
    pub is_static: bool,
    pub wildcard: bool,
    pub span: Span,
}

impl Import {
    /// Last path segment, or `None` for wildcard imports.
    pub fn simple_name(&self) -> Option<&str> {
        if self.wildcard {
            return None;
        }
        self.path.rsplit('.').next()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<AnnotationArg>,
    pub span: Span,
}

impl Annotation {
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationArg {
    pub key: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Modifiers {
    pub annotations: Vec<Annotation>,
    pub keywords: Vec<String>,
}

impl Modifiers {
    pub fn has_annotation(&self, simple_name: &str) -> bool {
        self.annotations
            .iter()
            .any(|a| a.simple_name() == simple_name)
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty() && self.keywords.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub extends: Vec<TypeRef>,
    pub implements: Vec<TypeRef>,
    pub enum_constants: Vec<String>,
    pub members: Vec<Member>,
    pub span: Span,
}

impl TypeDecl {
    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(method) => Some(method),
            _ => None,
        })
    }

    pub fn nested_types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Type(t) => Some(t),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<TypeRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(MethodDecl),
    Initializer { is_static: bool, body: Block },
    Type(TypeDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub declarators: Vec<VarDeclarator>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub name: String,
    pub dims: usize,
    pub init: Option<Expr>,
    pub span: Span,
}

/// A method or constructor. Constructors have no `return_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParam>,
    pub return_type: Option<TypeRef>,
    pub name: String,
    pub params: Vec<Param>,
    pub throws: Vec<TypeRef>,
    pub body: Option<Block>,
    pub span: Span,
}

impl MethodDecl {
    pub fn is_void(&self) -> bool {
        self.return_type.as_ref().map_or(true, TypeRef::is_void)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub varargs: bool,
    pub name: String,
    pub span: Span,
}

/// Anonymous class body of an object creation expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassBody {
    pub members: Vec<Member>,
    pub span: Span,
}

// ============================================================================
// STATEMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self {
            stmts,
            span: Span::synthetic(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    LocalVar(LocalVarDecl),
    Expr(Expr),
    Block(Block),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<ForInit>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
    },
    ForEach {
        modifiers: Modifiers,
        ty: TypeRef,
        name: String,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Try {
        resources: Vec<LocalVarDecl>,
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
    },
    Switch {
        selector: Expr,
        groups: Vec<SwitchGroup>,
    },
    Synchronized {
        lock: Expr,
        body: Block,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Break(Option<String>),
    Continue(Option<String>),
    Assert {
        cond: Expr,
        message: Option<Expr>,
    },
    Empty,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            span: Span::synthetic(),
        }
    }

    /// True for statements that branch, loop, or introduce a nested scope.
    pub fn is_control_flow(&self) -> bool {
        !matches!(
            self.kind,
            StmtKind::LocalVar(_) | StmtKind::Expr(_) | StmtKind::Empty
        )
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match &self.kind {
            StmtKind::Expr(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVarDecl {
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub declarators: Vec<VarDeclarator>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Decl(LocalVarDecl),
    Exprs(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub modifiers: Modifiers,
    pub types: Vec<TypeRef>,
    pub name: String,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchGroup {
    /// `None` stands for `default`.
    pub labels: Vec<Option<Vec<Expr>>>,
    pub stmts: Vec<Stmt>,
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Name(String),
    This,
    Super,
    FieldAccess {
        target: Box<Expr>,
        name: String,
    },
    MethodCall(MethodCall),
    New(NewObject),
    NewArray {
        element: TypeRef,
        dims: Vec<Expr>,
        extra_dims: usize,
        init: Option<Vec<Expr>>,
    },
    ArrayInit(Vec<Expr>),
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Cast {
        ty: TypeRef,
        expr: Box<Expr>,
    },
    Lambda(Lambda),
    MethodRef {
        target: Box<Expr>,
        name: String,
    },
    Unary {
        op: String,
        prefix: bool,
        operand: Box<Expr>,
    },
    /// Flat operator chain `a op b op c`, kept in source order.
    Binary {
        first: Box<Expr>,
        rest: Vec<(String, Expr)>,
    },
    InstanceOf {
        expr: Box<Expr>,
        ty: TypeRef,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        op: String,
        value: Box<Expr>,
    },
    ClassLiteral(TypeRef),
    Paren(Box<Expr>),
}

/// Literal tokens keep their source spelling, quotes and suffixes included.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(String),
    Long(String),
    Float(String),
    Double(String),
    Char(String),
    Str(String),
    Bool(bool),
    Null,
}

impl Literal {
    /// The Java type of the literal, `None` for `null`.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            Literal::Int(_) => Some("int"),
            Literal::Long(_) => Some("long"),
            Literal::Float(_) => Some("float"),
            Literal::Double(_) => Some("double"),
            Literal::Char(_) => Some("char"),
            Literal::Str(_) => Some("String"),
            Literal::Bool(_) => Some("boolean"),
            Literal::Null => None,
        }
    }

    /// Value of a non-negative decimal, hex, or binary int literal.
    pub fn as_u32(&self) -> Option<u32> {
        let Literal::Int(text) = self else {
            return None;
        };
        let digits: String = text.chars().filter(|c| *c != '_').collect();
        if let Some(hex) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            return u32::from_str_radix(hex, 16).ok();
        }
        if let Some(bin) = digits
            .strip_prefix("0b")
            .or_else(|| digits.strip_prefix("0B"))
        {
            return u32::from_str_radix(bin, 2).ok();
        }
        digits.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub receiver: Option<Box<Expr>>,
    pub type_args: Vec<TypeRef>,
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewObject {
    pub ty: TypeRef,
    pub args: Vec<Expr>,
    pub body: Option<ClassBody>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<LambdaParam>,
    pub parenthesized: bool,
    pub body: LambdaBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaParam {
    pub ty: Option<TypeRef>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::synthetic(),
        }
    }

    /// The identifier for `x` and `this.x`, `None` for anything else.
    pub fn simple_reference(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            ExprKind::FieldAccess { target, name } if matches!(target.kind, ExprKind::This) => {
                Some(name)
            }
            _ => None,
        }
    }

    pub fn as_method_call(&self) -> Option<&MethodCall> {
        match &self.kind {
            ExprKind::MethodCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExprKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Strips any number of enclosing parentheses.
    pub fn unparenthesized(&self) -> &Expr {
        let mut current = self;
        while let ExprKind::Paren(inner) = &current.kind {
            current = inner;
        }
        current
    }
}

// ============================================================================
// MODULE EXPORTS
// ============================================================================

pub mod builder;
pub mod visit;
