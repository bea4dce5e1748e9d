//! Data model of the rewrite engine.
//!
//! A [`RecordingBlock`] is found by the scanner, split into [`GroupedItem`]s by
//! the grouper, turned into [`Synthesized`] statements per record, and finally
//! assembled by the emitter. None of these values outlive the processing of
//! one method body.

use std::rc::Rc;

use serde::Serialize;

use crate::{
    ast::{Expr, MethodCall, Span, Stmt, TypeRef},
    bindings::{DslKind, MethodSig},
};

pub use crate::bindings::{MockKind, MockReference};

// ============================================================================
// BLOCKS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockMode {
    StubStrict,
    StubLenient,
    Verify,
    VerifyOrdered,
    VerifyExhaustive,
}

impl BlockMode {
    /// Mode of a recording-block class, `None` for combinations the engine
    /// does not model (ordered and exhaustive at once).
    pub fn of(kind: DslKind) -> Option<Self> {
        match kind {
            DslKind::Expectations | DslKind::StrictExpectations => Some(BlockMode::StubStrict),
            DslKind::NonStrictExpectations => Some(BlockMode::StubLenient),
            DslKind::Verifications => Some(BlockMode::Verify),
            DslKind::VerificationsInOrder => Some(BlockMode::VerifyOrdered),
            DslKind::FullVerifications => Some(BlockMode::VerifyExhaustive),
            DslKind::FullVerificationsInOrder => None,
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, BlockMode::StubStrict | BlockMode::StubLenient)
    }

    pub fn is_verify(&self) -> bool {
        !self.is_stub()
    }
}

/// Where a block's statement sits inside the method body. Blocks are found at
/// the top level and one level down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Container {
    Body,
    TryBody { stmt: usize },
    Catch { stmt: usize, clause: usize },
    Finally { stmt: usize },
    /// Block-bodied lambda passed as argument `arg` of the call in statement `stmt`.
    Lambda { stmt: usize, arg: usize },
}

impl Container {
    /// Index of the top-level statement holding the container.
    pub fn stmt(&self) -> Option<usize> {
        match *self {
            Container::Body => None,
            Container::TryBody { stmt }
            | Container::Catch { stmt, .. }
            | Container::Finally { stmt }
            | Container::Lambda { stmt, .. } => Some(stmt),
        }
    }

    /// The same container, held by top-level statement `index`.
    pub fn at(self, index: usize) -> Self {
        match self {
            Container::Body => Container::Body,
            Container::TryBody { .. } => Container::TryBody { stmt: index },
            Container::Catch { clause, .. } => Container::Catch { stmt: index, clause },
            Container::Finally { .. } => Container::Finally { stmt: index },
            Container::Lambda { arg, .. } => Container::Lambda { stmt: index, arg },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockLocation {
    pub container: Container,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingBlock {
    pub dsl: DslKind,
    pub mode: BlockMode,
    /// Constructor arguments, `None` for `()`. Stub blocks use them for
    /// partial mocking, exhaustive verification to narrow its mock set.
    pub ctor_args: Option<Vec<Expr>>,
    /// Bodies of all `{ }` sub-groups, concatenated.
    pub statements: Vec<Stmt>,
    pub location: BlockLocation,
    /// Span of the statement holding the instantiation.
    pub span: Span,
    /// Recognized by simple name only.
    pub provisional: bool,
}

impl RecordingBlock {
    /// Names passed as constructor arguments.
    pub fn ctor_names(&self) -> Vec<&str> {
        self.ctor_args
            .iter()
            .flatten()
            .filter_map(Expr::simple_reference)
            .collect()
    }
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentSlot {
    /// A matcher token of the source DSL and the type it implies, if any.
    Matcher {
        token: MatcherToken,
        hint: Option<TypeRef>,
    },
    Literal(Expr),
    VariableRef(Expr),
}

impl ArgumentSlot {
    pub fn is_matcher(&self) -> bool {
        matches!(self, ArgumentSlot::Matcher { .. })
    }
}

/// Matcher forms of the source DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherToken {
    /// `anyInt`, `anyString`, ..
    Field(String),
    /// Untyped `any`.
    Any,
    /// `(Type) any`
    CastAny(TypeRef),
    /// `withEqual(x)`, `withNotNull()`, ..
    Call { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelegateBody {
    /// Callback parameters in declaration order.
    pub params: Vec<(String, TypeRef)>,
    pub returns_void: bool,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultSpec {
    #[default]
    None,
    SingleValue(Expr),
    SequencedValues(Vec<Expr>),
    Thrown(Expr),
    Delegate(DelegateBody),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MultiplicityConstraint {
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub exact: Option<u32>,
}

impl MultiplicityConstraint {
    pub fn is_unspecified(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.exact.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpectationRecord {
    pub target: Rc<MockReference>,
    /// Receiver as written: `dep` or `this.dep`.
    pub receiver: Expr,
    pub call: MethodCall,
    pub signature: Option<MethodSig>,
    pub slots: Vec<ArgumentSlot>,
    pub result: ResultSpec,
    pub multiplicity: MultiplicityConstraint,
    /// Partially mocked through a constructor argument or declared as a spy.
    pub spy_style: bool,
    pub span: Span,
}

impl ExpectationRecord {
    /// `Some(true)` for a void method, `None` when the signature is unknown.
    pub fn returns_void(&self) -> Option<bool> {
        self.signature.as_ref().map(MethodSig::is_void)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupedItem {
    Record(ExpectationRecord),
    Setup(Stmt),
}

/// Mocks touched by a block, in first-reference order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DistinctMockSet {
    members: Vec<(Rc<MockReference>, Expr)>,
}

impl DistinctMockSet {
    pub fn of(items: &[GroupedItem]) -> Self {
        let mut set = Self::default();
        for item in items {
            if let GroupedItem::Record(r) = item {
                set.insert(&r.target, &r.receiver);
            }
        }
        set
    }

    fn insert(&mut self, target: &Rc<MockReference>, receiver: &Expr) {
        if !self.members.iter().any(|(m, _)| m.name == target.name) {
            self.members.push((Rc::clone(target), receiver.clone()));
        }
    }

    /// Keeps only the mocks named in `names`, in set order.
    pub fn restricted_to(&self, names: &[&str]) -> Self {
        Self {
            members: self
                .members
                .iter()
                .filter(|(m, _)| names.contains(&m.name.as_str()))
                .cloned()
                .collect(),
        }
    }

    pub fn receivers(&self) -> Vec<Expr> {
        self.members.iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.members.iter().map(|(m, _)| m.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }
}

// ============================================================================
// SYNTHESIS OUTPUT
// ============================================================================

/// One verification, kept as data until the emitter knows whether it goes
/// through an ordered-verification context.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifySpec {
    pub target: Expr,
    /// `times(2)`, `atLeast(1)`, `never()`; `None` means exactly once.
    pub mode: Option<Expr>,
    pub call: MethodCall,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Synthesized {
    pub stubs: Vec<Stmt>,
    pub verifies: Vec<VerifySpec>,
}
