//! Record grouper
//!
//! Splits the flat statement list of a recording block into expectation
//! records and setup statements. One pass, one pending record: a call on a
//! mock opens a record, the `result`/`times`/.. assignments that follow
//! configure it, and the next recorded call (or the end of the block) closes
//! it. Closing a record resolves the called method against the type index.

use std::rc::Rc;

use crate::{
    ast::{Expr, ExprKind, Literal, Member, MethodCall, NewObject, Stmt, StmtKind, TypeRef},
    bindings::{ArgShape, DeclSite, DslResolver, MethodScope, MockKind, MockReference, TypeIndex},
    diagnostics::{Diagnostic, DiagnosticKind, SkipReason},
};

use super::{
    matchers::classify,
    scanner::find_dsl,
    types::{
        ArgumentSlot, DelegateBody, ExpectationRecord, GroupedItem, MatcherToken,
        MultiplicityConstraint, RecordingBlock, ResultSpec,
    },
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grouped {
    pub items: Vec<GroupedItem>,
    /// Non-fatal findings, such as overridden count constraints.
    pub warnings: Vec<Diagnostic>,
}

impl Grouped {
    pub fn records(&self) -> impl Iterator<Item = &ExpectationRecord> {
        self.items.iter().filter_map(|i| match i {
            GroupedItem::Record(r) => Some(r),
            GroupedItem::Setup(_) => None,
        })
    }
}

/// Groups the statements of `block`.
pub fn group(
    block: &RecordingBlock,
    scope: &MethodScope,
    index: &TypeIndex,
    dsl: &DslResolver,
) -> Result<Grouped, SkipReason> {
    let mut grouper = Grouper {
        block,
        scope,
        index,
        ctor_names: block.ctor_names(),
        items: Vec::new(),
        pending: None,
        warnings: Vec::new(),
    };
    for stmt in &block.statements {
        grouper.statement(stmt, dsl)?;
    }
    grouper.flush()?;
    Ok(Grouped {
        items: grouper.items,
        warnings: grouper.warnings,
    })
}

fn unsupported(message: impl Into<String>) -> SkipReason {
    SkipReason {
        kind: DiagnosticKind::UnsupportedShape,
        message: message.into(),
    }
}

fn unresolved(message: impl Into<String>) -> SkipReason {
    SkipReason {
        kind: DiagnosticKind::UnresolvedType,
        message: message.into(),
    }
}

/// Record under construction and the item slot it will occupy. The slot
/// follows the record's latest configuration statement, so setup statements
/// seen between the call and its `result`/`times` stay ahead of the record.
struct Pending {
    slot: usize,
    target: Rc<MockReference>,
    spy_style: bool,
    receiver: Expr,
    call: MethodCall,
    result: ResultSpec,
    multiplicity: MultiplicityConstraint,
    stmt: Stmt,
}

struct Grouper<'a> {
    block: &'a RecordingBlock,
    scope: &'a MethodScope,
    index: &'a TypeIndex,
    ctor_names: Vec<&'a str>,
    items: Vec<GroupedItem>,
    pending: Option<Pending>,
    warnings: Vec<Diagnostic>,
}

/// What an expression statement inside a recording block does.
enum Action<'e> {
    Record { target: Rc<MockReference>, spy_style: bool, receiver: &'e Expr, call: &'e MethodCall },
    Result(&'e Expr),
    Returns(&'e [Expr]),
    Count { field: &'static str, value: &'e Expr },
    Setup,
}

impl<'a> Grouper<'a> {
    fn statement(&mut self, stmt: &Stmt, dsl: &DslResolver) -> Result<(), SkipReason> {
        if !find_dsl(std::slice::from_ref(stmt), dsl).is_empty() {
            return Err(unsupported("recording block nested inside another recording block"));
        }
        match &stmt.kind {
            StmtKind::Empty => Ok(()),
            StmtKind::LocalVar(_) => {
                self.items.push(GroupedItem::Setup(stmt.clone()));
                Ok(())
            }
            StmtKind::Expr(expr) => match self.classify(expr)? {
                Action::Record {
                    target,
                    spy_style,
                    receiver,
                    call,
                } => {
                    self.flush()?;
                    self.pending = Some(Pending {
                        slot: self.items.len(),
                        target,
                        spy_style,
                        receiver: receiver.clone(),
                        call: call.clone(),
                        result: ResultSpec::None,
                        multiplicity: MultiplicityConstraint::default(),
                        stmt: stmt.clone(),
                    });
                    Ok(())
                }
                Action::Result(value) => self.add_result(value),
                Action::Returns(values) => self.add_values(values),
                Action::Count { field, value } => self.add_count(field, value),
                Action::Setup => {
                    self.items.push(GroupedItem::Setup(stmt.clone()));
                    Ok(())
                }
            },
            other => Err(unsupported(format!(
                "{} statement inside a recording block",
                statement_name(other)
            ))),
        }
    }

    fn classify<'e>(&self, expr: &'e Expr) -> Result<Action<'e>, SkipReason> {
        let expr = expr.unparenthesized();
        if let ExprKind::Assign { target, op, value } = &expr.kind {
            let field = match target.simple_reference() {
                Some("result") => Some("result"),
                Some("times") => Some("times"),
                Some("minTimes") => Some("minTimes"),
                Some("maxTimes") => Some("maxTimes"),
                _ => None,
            };
            return match (field, op.as_str()) {
                (Some("result"), "=") => Ok(Action::Result(value)),
                (Some(field), "=") => Ok(Action::Count { field, value }),
                (Some(field), op) => Err(unsupported(format!("compound assignment `{field} {op}`"))),
                (None, _) => Ok(Action::Setup),
            };
        }
        let Some(call) = expr.as_method_call() else {
            return Ok(Action::Setup);
        };
        let Some(receiver) = call.receiver.as_deref() else {
            return Ok(if call.name == "returns" {
                Action::Returns(&call.args)
            } else {
                Action::Setup
            });
        };
        if matches!(receiver.kind, ExprKind::This) {
            return Ok(Action::Setup);
        }
        let Some(name) = receiver.simple_reference() else {
            return self.complex_receiver(receiver, call);
        };

        let in_ctor = self.ctor_names.contains(&name);
        if let Some(mock) = self.scope.mock(name) {
            if mock.is_recordable() || in_ctor {
                let spy_style = in_ctor || mock.kind == MockKind::Spy;
                return Ok(Action::Record {
                    target: Rc::clone(mock),
                    spy_style,
                    receiver,
                    call,
                });
            }
            return Err(unsupported(format!(
                "`{name}` is the tested object; its calls can only be recorded when it is passed to {}",
                self.block.dsl.name()
            )));
        }
        if in_ctor {
            let ty = self.scope.var_type(name).cloned().unwrap_or_else(|| TypeRef::named("Object"));
            let target = Rc::new(MockReference {
                name: name.to_string(),
                type_name: ty.name,
                kind: MockKind::Spy,
                site: DeclSite::Local,
            });
            return Ok(Action::Record {
                target,
                spy_style: true,
                receiver,
                call,
            });
        }
        if self.scope.var_type(name).is_some() {
            return Err(unresolved(format!("`{name}` is not a mock")));
        }
        if name.starts_with(char::is_uppercase) {
            return if self.scope.has_mocked_type(name) {
                Err(unsupported(format!("static call `{name}.{}` on a mocked type", call.name)))
            } else {
                Ok(Action::Setup)
            };
        }
        Err(unresolved(format!("`{name}` is not declared in this method or class")))
    }

    fn complex_receiver<'e>(&self, receiver: &Expr, call: &MethodCall) -> Result<Action<'e>, SkipReason> {
        let mut root = receiver;
        loop {
            root = match &root.kind {
                ExprKind::FieldAccess { target, .. } if root.simple_reference().is_none() => &**target,
                ExprKind::MethodCall(MethodCall {
                    receiver: Some(r), ..
                }) => &**r,
                ExprKind::Paren(inner) => &**inner,
                _ => break,
            };
        }
        match root.simple_reference() {
            Some(name) if self.scope.mock(name).is_some() => Err(unsupported(format!(
                "cascaded call `.{}` through mock `{name}`",
                call.name
            ))),
            Some(name) if name.starts_with(char::is_uppercase) && !self.scope.has_mocked_type(name) => {
                Ok(Action::Setup)
            }
            Some(name) => Err(unresolved(format!("receiver of `.{}` rooted at `{name}` is not a mock", call.name))),
            None => Err(unsupported(format!("call `.{}` on a computed receiver", call.name))),
        }
    }

    fn pending(&mut self, what: &str) -> Result<&mut Pending, SkipReason> {
        self.pending
            .as_mut()
            .ok_or_else(|| unsupported(format!("`{what}` appears before any recorded call")))
    }

    /// The pending record, moved past every item pushed since its call.
    fn configure(&mut self, what: &str) -> Result<&mut Pending, SkipReason> {
        let here = self.items.len();
        let pending = self.pending(what)?;
        pending.slot = here;
        Ok(pending)
    }

    fn add_result(&mut self, value: &Expr) -> Result<(), SkipReason> {
        let delegate = as_delegate(value)?;
        let thrown = self.is_exception(value);
        let pending = self.configure("result")?;
        pending.result = match (std::mem::take(&mut pending.result), delegate) {
            (ResultSpec::None, Some(body)) => ResultSpec::Delegate(body),
            (_, Some(_)) | (ResultSpec::Delegate(_), _) => {
                return Err(unsupported("delegate combined with other results"))
            }
            (ResultSpec::None, None) if thrown => ResultSpec::Thrown(value.clone()),
            (ResultSpec::None, None) => ResultSpec::SingleValue(value.clone()),
            (ResultSpec::Thrown(_), None) => {
                return Err(unsupported("result sequence mixes thrown exceptions with other results"))
            }
            (_, None) if thrown => {
                return Err(unsupported("result sequence mixes returned values and thrown exceptions"))
            }
            (ResultSpec::SingleValue(first), None) => ResultSpec::SequencedValues(vec![first, value.clone()]),
            (ResultSpec::SequencedValues(mut values), None) => {
                values.push(value.clone());
                ResultSpec::SequencedValues(values)
            }
        };
        Ok(())
    }

    fn add_values(&mut self, values: &[Expr]) -> Result<(), SkipReason> {
        if values.iter().any(|v| self.is_exception(v)) {
            return Err(unsupported("`returns` with an exception value"));
        }
        let pending = self.configure("returns")?;
        let mut all = match std::mem::take(&mut pending.result) {
            ResultSpec::None => Vec::new(),
            ResultSpec::SingleValue(v) => vec![v],
            ResultSpec::SequencedValues(vs) => vs,
            ResultSpec::Thrown(_) | ResultSpec::Delegate(_) => {
                return Err(unsupported("`returns` combined with a thrown exception or delegate"))
            }
        };
        all.extend(values.iter().cloned());
        pending.result = match all.len() {
            0 => ResultSpec::None,
            1 => ResultSpec::SingleValue(all.remove(0)),
            _ => ResultSpec::SequencedValues(all),
        };
        Ok(())
    }

    fn add_count(&mut self, field: &'static str, value: &Expr) -> Result<(), SkipReason> {
        let count = count_literal(value)
            .ok_or_else(|| unsupported(format!("`{field}` is not assigned an integer literal")))?;
        let pending = self.configure(field)?;
        match field {
            "times" => pending.multiplicity.exact = Some(count),
            "minTimes" => pending.multiplicity.min = Some(count),
            _ => pending.multiplicity.max = Some(count),
        }
        Ok(())
    }

    fn is_exception(&self, value: &Expr) -> bool {
        match &value.unparenthesized().kind {
            ExprKind::New(new) => new.body.is_none() && self.index.is_throwable(&new.ty),
            ExprKind::Cast { ty, .. } => self.index.is_throwable(ty),
            _ => value
                .simple_reference()
                .and_then(|n| self.scope.var_type(n))
                .is_some_and(|ty| self.index.is_throwable(ty)),
        }
    }

    fn flush(&mut self) -> Result<(), SkipReason> {
        let Some(p) = self.pending.take() else {
            return Ok(());
        };
        let mut multiplicity = p.multiplicity;
        if multiplicity.exact.is_some() && (multiplicity.min.is_some() || multiplicity.max.is_some()) {
            self.warnings.push(Diagnostic::warning(
                DiagnosticKind::RedundantConstraint,
                format!(
                    "`times` overrides `minTimes`/`maxTimes` for {}.{}",
                    p.target.name, p.call.name
                ),
                p.stmt.span,
            ));
            multiplicity.min = None;
            multiplicity.max = None;
        }
        if let (Some(min), Some(max)) = (multiplicity.min, multiplicity.max) {
            if min > max {
                return Err(unsupported(format!(
                    "minTimes = {min} exceeds maxTimes = {max} for {}.{}",
                    p.target.name, p.call.name
                )));
            }
        }

        let slots: Vec<ArgumentSlot> = p.call.args.iter().map(classify).collect();
        let shapes: Vec<ArgShape> = slots.iter().map(|s| self.shape_of(s)).collect();
        let owner = self
            .scope
            .var_type(&p.target.name)
            .cloned()
            .unwrap_or_else(|| p.target.ty());
        let signature = self
            .index
            .resolve_method(&owner, &p.call.name, &shapes)
            .map_err(|e| SkipReason {
                kind: e.kind(),
                message: e.message().to_string(),
            })?
            .signature()
            .cloned();

        if let ResultSpec::Delegate(body) = &p.result {
            if body.params.len() > slots.len() {
                return Err(unsupported(format!(
                    "delegate for {}.{} declares {} parameter(s) but the call has {}",
                    p.target.name,
                    p.call.name,
                    body.params.len(),
                    slots.len()
                )));
            }
        }

        let record = ExpectationRecord {
            target: p.target,
            receiver: p.receiver,
            call: p.call,
            signature,
            slots,
            result: p.result,
            multiplicity,
            spy_style: p.spy_style,
            span: p.stmt.span,
        };
        self.items.insert(p.slot, GroupedItem::Record(record));
        Ok(())
    }

    fn shape_of(&self, slot: &ArgumentSlot) -> ArgShape {
        match slot {
            ArgumentSlot::Matcher { hint: Some(t), .. } => ArgShape::Typed(t.clone()),
            ArgumentSlot::Matcher {
                token: MatcherToken::Call { name, args },
                hint: None,
            } => match name.as_str() {
                "withNull" => ArgShape::Null,
                "withEqual" | "withSameInstance" | "withAny" => args
                    .first()
                    .map_or(ArgShape::Unknown, |a| self.expr_shape(a)),
                _ => ArgShape::Unknown,
            },
            ArgumentSlot::Matcher { .. } => ArgShape::Unknown,
            ArgumentSlot::Literal(e) | ArgumentSlot::VariableRef(e) => self.expr_shape(e),
        }
    }

    fn expr_shape(&self, expr: &Expr) -> ArgShape {
        let expr = expr.unparenthesized();
        match &expr.kind {
            ExprKind::Literal(Literal::Null) => ArgShape::Null,
            ExprKind::Literal(lit) => lit
                .type_name()
                .map_or(ArgShape::Unknown, |t| ArgShape::Typed(TypeRef::named(t))),
            ExprKind::New(NewObject { ty, .. }) | ExprKind::Cast { ty, .. } => ArgShape::Typed(ty.clone()),
            ExprKind::ClassLiteral(_) => ArgShape::Typed(TypeRef::named("Class")),
            ExprKind::Unary { op, operand, .. } if op == "-" || op == "+" => self.expr_shape(operand),
            ExprKind::Binary { first, rest } if rest.iter().all(|(op, _)| op == "+") => {
                let is_text = |e: &Expr| matches!(e.unparenthesized().as_literal(), Some(Literal::Str(_)));
                if is_text(first) || rest.iter().any(|(_, e)| is_text(e)) {
                    ArgShape::Typed(TypeRef::named("String"))
                } else {
                    ArgShape::Unknown
                }
            }
            _ => expr
                .simple_reference()
                .and_then(|n| self.scope.var_type(n))
                .map_or(ArgShape::Unknown, |t| ArgShape::Typed(t.clone())),
        }
    }
}

fn count_literal(value: &Expr) -> Option<u32> {
    value.unparenthesized().as_literal().and_then(Literal::as_u32)
}

/// The callback of `new Delegate() { T method(params) { .. } }`, or `None`
/// when `value` is not a delegate.
fn as_delegate(value: &Expr) -> Result<Option<DelegateBody>, SkipReason> {
    let ExprKind::New(new) = &value.unparenthesized().kind else {
        return Ok(None);
    };
    let Some(body) = new.body.as_ref().filter(|_| new.ty.simple_name() == "Delegate") else {
        return Ok(None);
    };
    let methods: Vec<_> = body
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Method(decl) => Some(decl),
            _ => None,
        })
        .collect();
    let [method] = methods.as_slice() else {
        return Err(unsupported(format!(
            "delegate declares {} methods instead of one",
            methods.len()
        )));
    };
    if body.members.len() != 1 {
        return Err(unsupported("delegate declares members besides its callback method"));
    }
    if method
        .params
        .first()
        .is_some_and(|p| p.ty.simple_name() == "Invocation")
    {
        return Err(unsupported(format!(
            "delegate `{}` takes an Invocation parameter",
            method.name
        )));
    }
    let stmts = method.body.as_ref().map(|b| b.stmts.clone()).unwrap_or_default();
    Ok(Some(DelegateBody {
        params: method
            .params
            .iter()
            .map(|p| (p.name.clone(), p.ty.clone()))
            .collect(),
        returns_void: method.is_void(),
        stmts,
    }))
}

fn statement_name(kind: &StmtKind) -> &'static str {
    match kind {
        StmtKind::Block(_) => "nested block",
        StmtKind::If { .. } => "`if`",
        StmtKind::While { .. } => "`while`",
        StmtKind::DoWhile { .. } => "`do`",
        StmtKind::For { .. } | StmtKind::ForEach { .. } => "`for`",
        StmtKind::Try { .. } => "`try`",
        StmtKind::Switch { .. } => "`switch`",
        StmtKind::Synchronized { .. } => "`synchronized`",
        StmtKind::Return(_) => "`return`",
        StmtKind::Throw(_) => "`throw`",
        StmtKind::Break(_) => "`break`",
        StmtKind::Continue(_) => "`continue`",
        StmtKind::Assert { .. } => "`assert`",
        StmtKind::LocalVar(_) | StmtKind::Expr(_) | StmtKind::Empty => "simple",
    }
}
