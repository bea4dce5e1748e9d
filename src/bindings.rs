//! Type bindings
//!
//! Best-effort name and type resolution over the parsed sources:
//!
//! - [`TypeIndex`]: method signatures and supertypes of every type declared in
//!   the processed files, plus configured external signatures and the methods
//!   of `java.lang.Object`. Used to pick the overload a recorded call refers to.
//! - [`DslResolver`]: decides whether an instantiated type is one of the
//!   recording-block classes, through imports first and by simple name as a
//!   provisional fallback.
//! - [`MethodScope`]: mock references and declared variable types visible
//!   inside one test method.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    rc::Rc,
};

use serde::Serialize;

use crate::{
    ast::{
        visit::{self, Visit},
        CompilationUnit, Expr, ExprKind, FieldDecl, LocalVarDecl, MethodDecl, Modifiers, Stmt,
        StmtKind, TypeDecl, TypeKind, TypeRef,
    },
    diagnostics::DiagnosticKind,
    syntax::parse_method_signature,
    MockshiftError,
};

// ============================================================================
// METHOD SIGNATURES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<TypeRef>,
    pub varargs: bool,
    pub return_type: TypeRef,
}

impl MethodSig {
    /// Signature of a method declaration; constructors have none.
    pub fn from_decl(decl: &MethodDecl) -> Option<Self> {
        let return_type = decl.return_type.clone()?;
        Some(Self {
            name: decl.name.clone(),
            type_params: decl.type_params.iter().map(|p| p.name.clone()).collect(),
            params: decl.params.iter().map(|p| p.ty.clone()).collect(),
            varargs: decl.params.last().is_some_and(|p| p.varargs),
            return_type,
        })
    }

    fn builtin(name: &str, params: &[&str], ret: &str) -> Self {
        Self {
            name: name.to_string(),
            type_params: Vec::new(),
            params: params.iter().map(|p| TypeRef::named(*p)).collect(),
            varargs: false,
            return_type: TypeRef::named(ret),
        }
    }

    pub fn is_void(&self) -> bool {
        self.return_type.is_void()
    }

    /// Parameter type at argument position `i`, accounting for varargs.
    pub fn param_type(&self, i: usize) -> Option<TypeRef> {
        if self.varargs && i + 1 >= self.params.len() {
            let mut last = self.params.last()?.clone();
            last.dims = last.dims.saturating_sub(1);
            return Some(last);
        }
        self.params.get(i).cloned()
    }

    fn erased_params(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|p| format!("{}{}", p.simple_name(), "[]".repeat(p.dims)))
            .collect()
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.erased_params().join(", "))
    }
}

// ============================================================================
// TYPE INDEX
// ============================================================================

#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub qualified: String,
    pub kind: TypeKind,
    pub type_params: Vec<String>,
    pub supertypes: Vec<TypeRef>,
    pub methods: Vec<MethodSig>,
}

/// What is known about one argument of a recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgShape {
    Typed(TypeRef),
    Null,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(MethodSig),
    /// The receiver's type (or part of its hierarchy) is not indexed; callers
    /// proceed provisionally without a signature.
    Unbound,
}

impl Resolution {
    pub fn signature(&self) -> Option<&MethodSig> {
        match self {
            Resolution::Resolved(sig) => Some(sig),
            Resolution::Unbound => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    NoCandidate(String),
    Ambiguous(String),
}

impl ResolveError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ResolveError::NoCandidate(_) => DiagnosticKind::UnresolvedType,
            ResolveError::Ambiguous(_) => DiagnosticKind::AmbiguousOverload,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ResolveError::NoCandidate(m) | ResolveError::Ambiguous(m) => m,
        }
    }
}

const OBJECT: &str = "Object";

const WIDENING: [(&str, &[&str]); 6] = [
    ("byte", &["short", "int", "long", "float", "double"]),
    ("short", &["int", "long", "float", "double"]),
    ("char", &["int", "long", "float", "double"]),
    ("int", &["long", "float", "double"]),
    ("long", &["float", "double"]),
    ("float", &["double"]),
];

/// Supertypes of JDK types that commonly show up as argument types.
fn well_known_supertypes(simple: &str) -> Option<&'static [&'static str]> {
    match simple {
        "String" => Some(&["CharSequence", "Comparable", "Serializable"]),
        "Integer" | "Long" | "Short" | "Byte" | "Double" | "Float" => {
            Some(&["Number", "Comparable", "Serializable"])
        }
        "Boolean" | "Character" => Some(&["Comparable", "Serializable"]),
        "ArrayList" | "LinkedList" => Some(&["List", "Collection", "Iterable"]),
        "HashSet" | "TreeSet" | "LinkedHashSet" => Some(&["Set", "Collection", "Iterable"]),
        "HashMap" | "TreeMap" | "LinkedHashMap" => Some(&["Map"]),
        "List" | "Set" => Some(&["Collection", "Iterable"]),
        _ => None,
    }
}

fn unboxed(simple: &str) -> Option<&'static str> {
    Some(match simple {
        "Boolean" => "boolean",
        "Byte" => "byte",
        "Character" => "char",
        "Short" => "short",
        "Integer" => "int",
        "Long" => "long",
        "Float" => "float",
        "Double" => "double",
        _ => return None,
    })
}

#[derive(Debug, Clone)]
pub struct TypeIndex {
    types: HashMap<String, TypeInfo>,
}

impl Default for TypeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeIndex {
    /// An index that knows only `java.lang.Object`.
    pub fn new() -> Self {
        let object = TypeInfo {
            name: OBJECT.to_string(),
            qualified: "java.lang.Object".to_string(),
            kind: TypeKind::Class,
            type_params: Vec::new(),
            supertypes: Vec::new(),
            methods: vec![
                MethodSig::builtin("hashCode", &[], "int"),
                MethodSig::builtin("equals", &[OBJECT], "boolean"),
                MethodSig::builtin("toString", &[], "String"),
                MethodSig::builtin("getClass", &[], "Class"),
                MethodSig::builtin("notify", &[], "void"),
                MethodSig::builtin("notifyAll", &[], "void"),
                MethodSig::builtin("wait", &[], "void"),
                MethodSig::builtin("wait", &["long"], "void"),
                MethodSig::builtin("wait", &["long", "int"], "void"),
            ],
        };
        let mut types = HashMap::new();
        types.insert(OBJECT.to_string(), object);
        Self { types }
    }

    /// Indexes every type, nested ones included, declared in `unit`.
    pub fn add_unit(&mut self, unit: &CompilationUnit) {
        let prefix = unit.package.clone().unwrap_or_default();
        for decl in &unit.types {
            self.add_type(decl, &prefix);
        }
    }

    fn add_type(&mut self, decl: &TypeDecl, prefix: &str) {
        let qualified = if prefix.is_empty() {
            decl.name.clone()
        } else {
            format!("{prefix}.{}", decl.name)
        };
        for nested in decl.nested_types() {
            self.add_type(nested, &qualified);
        }
        let mut supertypes = decl.extends.clone();
        supertypes.extend(decl.implements.iter().cloned());
        let info = TypeInfo {
            name: decl.name.clone(),
            qualified,
            kind: decl.kind,
            type_params: decl.type_params.iter().map(|p| p.name.clone()).collect(),
            supertypes,
            methods: decl.methods().filter_map(MethodSig::from_decl).collect(),
        };
        self.types.insert(decl.name.clone(), info);
    }

    /// Adds an external type described by method signature strings.
    pub fn add_external(&mut self, type_name: &str, signatures: &[String]) -> Result<(), MockshiftError> {
        let methods = signatures
            .iter()
            .map(|text| {
                let decl = parse_method_signature(text)
                    .map_err(|e| e.with_help(format!("in configured signatures of {type_name}")))?;
                MethodSig::from_decl(&decl).ok_or_else(|| {
                    crate::err_msg!(Config, "signature '{}' of {} has no return type", text, type_name)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let simple = type_name.rsplit('.').next().unwrap_or(type_name).to_string();
        let entry = self.types.entry(simple.clone()).or_insert_with(|| TypeInfo {
            name: simple,
            qualified: type_name.to_string(),
            kind: TypeKind::Interface,
            type_params: Vec::new(),
            supertypes: Vec::new(),
            methods: Vec::new(),
        });
        entry.methods.extend(methods);
        Ok(())
    }

    pub fn get(&self, simple_name: &str) -> Option<&TypeInfo> {
        self.types.get(simple_name)
    }

    pub fn contains(&self, simple_name: &str) -> bool {
        self.types.contains_key(simple_name)
    }

    /// Breadth-first walk over `start` and its indexed supertypes. The flag is
    /// true when some type in the hierarchy is not indexed.
    fn hierarchy(&self, start: &str) -> (Vec<&TypeInfo>, bool) {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start.to_string()]);
        let mut found = Vec::new();
        let mut open = false;
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            match self.types.get(&name) {
                Some(info) => {
                    found.push(info);
                    for sup in &info.supertypes {
                        queue.push_back(sup.simple_name().to_string());
                    }
                }
                None => open = true,
            }
        }
        if let Some(object) = self.types.get(OBJECT) {
            if !found.iter().any(|t| t.name == OBJECT) {
                found.push(object);
            }
        }
        (found, open)
    }

    /// True when `sub` is `sup` or inherits from it, as far as the index knows.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup || sup == OBJECT {
            return true;
        }
        if well_known_supertypes(sub).is_some_and(|s| s.contains(&sup)) {
            return true;
        }
        let (chain, _) = self.hierarchy(sub);
        chain
            .iter()
            .any(|t| t.name == sup || t.supertypes.iter().any(|s| s.simple_name() == sup))
    }

    /// Exception types: anything inheriting from `Throwable`, or named like one
    /// when the hierarchy is not indexed.
    pub fn is_throwable(&self, ty: &TypeRef) -> bool {
        let name = ty.simple_name();
        let by_name = |n: &str| {
            n == "Throwable" || n.ends_with("Exception") || n.ends_with("Error")
        };
        if by_name(name) {
            return true;
        }
        let (chain, _) = self.hierarchy(name);
        chain
            .iter()
            .flat_map(|t| t.supertypes.iter())
            .any(|s| by_name(s.simple_name()))
    }

    /// Picks the method `owner.name(args)` refers to.
    pub fn resolve_method(
        &self,
        owner: &TypeRef,
        name: &str,
        args: &[ArgShape],
    ) -> Result<Resolution, ResolveError> {
        let (chain, open) = self.hierarchy(owner.simple_name());
        let mut seen = HashSet::new();
        let mut applicable: Vec<(&MethodSig, usize)> = Vec::new();
        for info in &chain {
            for sig in info.methods.iter().filter(|m| m.name == name) {
                if !seen.insert(sig.erased_params()) {
                    continue;
                }
                if let Some(exact) = self.applicability(sig, &info.type_params, args) {
                    applicable.push((sig, exact));
                }
            }
        }

        match applicable.len() {
            0 if open => Ok(Resolution::Unbound),
            0 => Err(ResolveError::NoCandidate(format!(
                "no method {}.{} accepts {} argument(s) of the recorded shape",
                owner.simple_name(),
                name,
                args.len()
            ))),
            1 => Ok(Resolution::Resolved(applicable[0].0.clone())),
            _ => {
                let best = applicable.iter().map(|(_, e)| *e).max().unwrap_or(0);
                let top: Vec<_> = applicable.iter().filter(|(_, e)| *e == best).collect();
                if top.len() == 1 {
                    return Ok(Resolution::Resolved(top[0].0.clone()));
                }
                let names: Vec<String> = top.iter().map(|(s, _)| s.to_string()).collect();
                Err(ResolveError::Ambiguous(format!(
                    "call to {}.{} matches {}",
                    owner.simple_name(),
                    name,
                    names.join(" and ")
                )))
            }
        }
    }

    /// `Some(number of exactly matching arguments)` if `sig` accepts `args`.
    fn applicability(&self, sig: &MethodSig, class_params: &[String], args: &[ArgShape]) -> Option<usize> {
        let arity_ok = if sig.varargs {
            args.len() + 1 >= sig.params.len()
        } else {
            args.len() == sig.params.len()
        };
        if !arity_ok {
            return None;
        }
        let is_type_var = |t: &TypeRef| {
            t.dims == 0
                && (sig.type_params.iter().any(|p| *p == t.name)
                    || class_params.iter().any(|p| *p == t.name))
        };
        let mut exact = 0;
        for (i, arg) in args.iter().enumerate() {
            let param = sig.param_type(i)?;
            if is_type_var(&param) {
                continue;
            }
            let varargs_array = sig.varargs && i + 1 == sig.params.len() && args.len() == sig.params.len();
            let fits = self.compatible(arg, &param).or_else(|| {
                if varargs_array {
                    self.compatible(arg, &sig.params[i])
                } else {
                    None
                }
            })?;
            if fits {
                exact += 1;
            }
        }
        Some(exact)
    }

    /// `Some(true)` for an exact fit, `Some(false)` for a loose one.
    fn compatible(&self, arg: &ArgShape, param: &TypeRef) -> Option<bool> {
        match arg {
            ArgShape::Unknown => Some(false),
            ArgShape::Null => (!param.is_primitive()).then_some(false),
            ArgShape::Typed(t) => {
                if t.same_erasure(param) {
                    return Some(true);
                }
                if t.dims != param.dims {
                    return (param.dims == 0 && param.simple_name() == OBJECT).then_some(false);
                }
                let (ts, ps) = (t.simple_name(), param.simple_name());
                match (t.is_primitive(), param.is_primitive()) {
                    (true, true) => widens(ts, ps).then_some(false),
                    (true, false) => {
                        let boxed = t.boxed_name();
                        (boxed == ps || self.is_subtype(boxed, ps)).then_some(false)
                    }
                    (false, true) => unboxed(ts)
                        .filter(|u| *u == ps || widens(u, ps))
                        .map(|_| false),
                    (false, false) => {
                        let opaque = !self.contains(ts) && well_known_supertypes(ts).is_none();
                        (opaque || self.is_subtype(ts, ps)).then_some(false)
                    }
                }
            }
        }
    }
}

fn widens(from: &str, to: &str) -> bool {
    WIDENING
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

// ============================================================================
// RECORDING-BLOCK TYPES
// ============================================================================

/// The recording-block classes of the source mocking DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DslKind {
    Expectations,
    StrictExpectations,
    NonStrictExpectations,
    Verifications,
    VerificationsInOrder,
    FullVerifications,
    FullVerificationsInOrder,
}

impl DslKind {
    pub const ALL: [DslKind; 7] = [
        DslKind::Expectations,
        DslKind::StrictExpectations,
        DslKind::NonStrictExpectations,
        DslKind::Verifications,
        DslKind::VerificationsInOrder,
        DslKind::FullVerifications,
        DslKind::FullVerificationsInOrder,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DslKind::Expectations => "Expectations",
            DslKind::StrictExpectations => "StrictExpectations",
            DslKind::NonStrictExpectations => "NonStrictExpectations",
            DslKind::Verifications => "Verifications",
            DslKind::VerificationsInOrder => "VerificationsInOrder",
            DslKind::FullVerifications => "FullVerifications",
            DslKind::FullVerificationsInOrder => "FullVerificationsInOrder",
        }
    }

    pub fn from_simple_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DslLookup {
    NotDsl,
    /// Recognized; `provisional` when only the simple name matched.
    Dsl { kind: DslKind, provisional: bool },
    /// The simple name matches but imports or local types say otherwise.
    Contradicted { kind: DslKind, reason: String },
}

const DSL_PACKAGE: &str = "mockit";

#[derive(Debug, Clone, Default)]
pub struct DslResolver {
    package_wildcard: bool,
    explicit: HashMap<String, String>,
    local_types: HashSet<String>,
}

impl DslResolver {
    pub fn for_unit(unit: &CompilationUnit) -> Self {
        let mut resolver = Self::default();
        for import in unit.imports.iter().filter(|i| !i.is_static) {
            if import.wildcard {
                resolver.package_wildcard |= import.path == DSL_PACKAGE;
            } else if let Some(simple) = import.simple_name() {
                resolver
                    .explicit
                    .insert(simple.to_string(), import.path.clone());
            }
        }
        fn collect(decl: &TypeDecl, out: &mut HashSet<String>) {
            out.insert(decl.name.clone());
            for nested in decl.nested_types() {
                collect(nested, out);
            }
        }
        for decl in &unit.types {
            collect(decl, &mut resolver.local_types);
        }
        resolver
    }

    pub fn resolve(&self, ty: &TypeRef) -> DslLookup {
        let simple = ty.simple_name();
        let Some(kind) = DslKind::from_simple_name(simple) else {
            return DslLookup::NotDsl;
        };
        if ty.name.contains('.') {
            return if ty.name == format!("{DSL_PACKAGE}.{simple}") {
                DslLookup::Dsl {
                    kind,
                    provisional: false,
                }
            } else {
                DslLookup::NotDsl
            };
        }
        if self.local_types.contains(simple) {
            return DslLookup::Contradicted {
                kind,
                reason: format!("{simple} is declared in this file"),
            };
        }
        match self.explicit.get(simple) {
            Some(path) if *path == format!("{DSL_PACKAGE}.{simple}") => DslLookup::Dsl {
                kind,
                provisional: false,
            },
            Some(path) => DslLookup::Contradicted {
                kind,
                reason: format!("{simple} is imported from {path}"),
            },
            None => DslLookup::Dsl {
                kind,
                provisional: !self.package_wildcard,
            },
        }
    }
}

// ============================================================================
// MOCK REFERENCES AND METHOD SCOPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MockKind {
    /// Plain mock: `@Mocked`, `@Capturing`, `@Mock`, `mock(..)`.
    Mock,
    /// Injectable dependency: `@Injectable`.
    Injectable,
    /// Partial mock: `@Spy`, `spy(..)`.
    Spy,
    /// Subject under test: `@Tested`, `@InjectMocks`.
    Subject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclSite {
    Field,
    Param,
    Local,
}

/// A declared field, parameter or local bound to a mock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MockReference {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub kind: MockKind,
    pub site: DeclSite,
}

impl MockReference {
    pub fn ty(&self) -> TypeRef {
        TypeRef::named(self.type_name.clone())
    }

    /// Whether calls on this reference may be recorded without a constructor argument.
    pub fn is_recordable(&self) -> bool {
        self.kind != MockKind::Subject
    }
}

fn mock_kind(modifiers: &Modifiers) -> Option<MockKind> {
    const TABLE: [(&str, MockKind); 7] = [
        ("Mocked", MockKind::Mock),
        ("Capturing", MockKind::Mock),
        ("Mock", MockKind::Mock),
        ("Injectable", MockKind::Injectable),
        ("Spy", MockKind::Spy),
        ("Tested", MockKind::Subject),
        ("InjectMocks", MockKind::Subject),
    ];
    TABLE
        .iter()
        .find(|(annotation, _)| modifiers.has_annotation(annotation))
        .map(|(_, kind)| *kind)
}

fn factory_kind(init: &Expr) -> Option<MockKind> {
    let call = init.unparenthesized().as_method_call()?;
    let owner_ok = match call.receiver.as_deref() {
        None => true,
        Some(r) => matches!(&r.kind, ExprKind::Name(n) if n == "Mockito"),
    };
    if !owner_ok {
        return None;
    }
    match call.name.as_str() {
        "mock" => Some(MockKind::Mock),
        "spy" => Some(MockKind::Spy),
        _ => None,
    }
}

/// Mock references and variable types visible inside one method.
#[derive(Debug, Clone, Default)]
pub struct MethodScope {
    mocks: Vec<Rc<MockReference>>,
    vars: HashMap<String, TypeRef>,
}

impl MethodScope {
    /// Scope of `method`, declared in a class with the given fields (outer
    /// classes' fields included by the caller).
    pub fn new<'a>(fields: impl IntoIterator<Item = &'a FieldDecl>, method: &MethodDecl) -> Self {
        let mut scope = Self::default();
        for field in fields {
            let kind = mock_kind(&field.modifiers);
            for d in &field.declarators {
                let kind = kind.or_else(|| d.init.as_ref().and_then(factory_kind));
                scope.declare(&d.name, &field.ty, kind, DeclSite::Field);
            }
        }
        for param in &method.params {
            scope.declare(&param.name, &param.ty, mock_kind(&param.modifiers), DeclSite::Param);
        }
        if let Some(body) = &method.body {
            let mut collector = LocalCollector { scope: &mut scope };
            visit::walk_block(&mut collector, body);
        }
        scope
    }

    fn declare(&mut self, name: &str, ty: &TypeRef, kind: Option<MockKind>, site: DeclSite) {
        self.vars.insert(name.to_string(), ty.clone());
        if let Some(kind) = kind {
            self.mocks.retain(|m| m.name != name);
            self.mocks.push(Rc::new(MockReference {
                name: name.to_string(),
                type_name: ty.name.clone(),
                kind,
                site,
            }));
        }
    }

    pub fn mock(&self, name: &str) -> Option<&Rc<MockReference>> {
        self.mocks.iter().find(|m| m.name == name)
    }

    pub fn mocks(&self) -> &[Rc<MockReference>] {
        &self.mocks
    }

    pub fn var_type(&self, name: &str) -> Option<&TypeRef> {
        self.vars.get(name)
    }

    pub fn add_var(&mut self, name: &str, ty: TypeRef) {
        self.vars.insert(name.to_string(), ty);
    }

    /// True when some mock is declared with this simple type name, so that a
    /// call through the type name is a static call on a mocked class.
    pub fn has_mocked_type(&self, type_name: &str) -> bool {
        self.mocks.iter().any(|m| {
            m.kind != MockKind::Subject && TypeRef::named(m.type_name.clone()).simple_name() == type_name
        })
    }
}

struct LocalCollector<'s> {
    scope: &'s mut MethodScope,
}

impl Visit for LocalCollector<'_> {
    fn visit_local_var(&mut self, decl: &LocalVarDecl) {
        for d in &decl.declarators {
            let kind = mock_kind(&decl.modifiers).or_else(|| d.init.as_ref().and_then(factory_kind));
            let mut ty = decl.ty.clone();
            ty.dims += d.dims;
            self.scope.declare(&d.name, &ty, kind, DeclSite::Local);
        }
        visit::walk_local_var(self, decl);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::ForEach { ty, name, .. } => self.scope.add_var(name, ty.clone()),
            StmtKind::Try { catches, .. } => {
                for c in catches.iter().filter(|c| c.types.len() == 1) {
                    self.scope.add_var(&c.name, c.types[0].clone());
                }
            }
            _ => {}
        }
        visit::walk_stmt(self, stmt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_compilation_unit;

    fn index_of(src: &str) -> TypeIndex {
        let unit = parse_compilation_unit(src, "T.java").unwrap();
        let mut index = TypeIndex::new();
        index.add_unit(&unit);
        index
    }

    fn typed(name: &str) -> ArgShape {
        ArgShape::Typed(TypeRef::named(name))
    }

    #[test]
    fn object_methods_resolve_on_unknown_types() {
        let index = TypeIndex::new();
        let owner = TypeRef::named("Collaborator");
        let res = index
            .resolve_method(&owner, "wait", &[typed("long"), typed("int")])
            .unwrap();
        assert!(res.signature().unwrap().is_void());
        assert_eq!(
            index.resolve_method(&owner, "find", &[ArgShape::Unknown]),
            Ok(Resolution::Unbound)
        );
    }

    #[test]
    fn overloads_pick_exact_match_or_report_ambiguity() {
        let index = index_of(
            "interface Repo { String find(String key); String find(Integer id); void save(Object o); }",
        );
        let owner = TypeRef::named("Repo");
        let res = index.resolve_method(&owner, "find", &[typed("String")]).unwrap();
        assert_eq!(res.signature().unwrap().params[0].name, "String");

        let res = index.resolve_method(&owner, "find", &[typed("int")]).unwrap();
        assert_eq!(res.signature().unwrap().params[0].name, "Integer");

        let err = index
            .resolve_method(&owner, "find", &[ArgShape::Unknown])
            .unwrap_err();
        assert_eq!(err.kind(), DiagnosticKind::AmbiguousOverload);

        let err = index.resolve_method(&owner, "missing", &[]).unwrap_err();
        assert_eq!(err.kind(), DiagnosticKind::UnresolvedType);
    }

    #[test]
    fn inherited_methods_and_throwables() {
        let index = index_of(
            "class Base { int count() { return 0; } } class Child extends Base {} \
             class Boom extends IllegalStateException {} class Oops extends Boom {}",
        );
        let res = index
            .resolve_method(&TypeRef::named("Child"), "count", &[])
            .unwrap();
        assert_eq!(res.signature().unwrap().return_type.name, "int");
        assert!(index.is_throwable(&TypeRef::named("Oops")));
        assert!(!index.is_throwable(&TypeRef::named("Child")));
    }

    #[test]
    fn external_signatures_from_configuration() {
        let mut index = TypeIndex::new();
        index
            .add_external("com.acme.Clock", &["long now()".to_string()])
            .unwrap();
        let res = index
            .resolve_method(&TypeRef::named("Clock"), "now", &[])
            .unwrap();
        assert_eq!(res.signature().unwrap().return_type.name, "long");
    }

    #[test]
    fn dsl_resolution_through_imports() {
        let unit = parse_compilation_unit("import mockit.Expectations; class T {}", "T.java").unwrap();
        let resolver = DslResolver::for_unit(&unit);
        assert_eq!(
            resolver.resolve(&TypeRef::named("Expectations")),
            DslLookup::Dsl {
                kind: DslKind::Expectations,
                provisional: false
            }
        );
        assert_eq!(
            resolver.resolve(&TypeRef::named("Verifications")),
            DslLookup::Dsl {
                kind: DslKind::Verifications,
                provisional: true
            }
        );

        let unit = parse_compilation_unit("import org.other.Expectations; class T {}", "T.java").unwrap();
        let resolver = DslResolver::for_unit(&unit);
        assert!(matches!(
            resolver.resolve(&TypeRef::named("Expectations")),
            DslLookup::Contradicted { .. }
        ));
    }

    #[test]
    fn scope_collects_annotated_and_factory_mocks() {
        let unit = parse_compilation_unit(
            "class T { @Mocked Repo repo; @Tested Service service; \
             void t(@Injectable Clock clock) { Mailer mailer = mock(Mailer.class); int n = 1; } }",
            "T.java",
        )
        .unwrap();
        let class = &unit.types[0];
        let method = class.methods().next().unwrap();
        let scope = MethodScope::new(class.fields(), method);
        assert_eq!(scope.mock("repo").unwrap().kind, MockKind::Mock);
        assert_eq!(scope.mock("clock").unwrap().kind, MockKind::Injectable);
        assert_eq!(scope.mock("mailer").unwrap().site, DeclSite::Local);
        assert!(!scope.mock("service").unwrap().is_recordable());
        assert!(scope.mock("n").is_none());
        assert_eq!(scope.var_type("n").unwrap().name, "int");
    }
}
