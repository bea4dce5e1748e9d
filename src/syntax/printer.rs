//! Java Printer
//!
//! Renders syntax-tree nodes back to Java source. Output is structural: the
//! printer never consults the original text, so layout inside a rendered
//! statement follows the printer's own conventions.
//!
//! Statements are rendered relative to a *base indent*, the leading
//! whitespace of the line the first statement lands on. The first line is not
//! prefixed; every following line starts with the base indent plus one indent
//! unit per nesting level.

use crate::ast::{
    Annotation, Block, ClassBody, Expr, ExprKind, ForInit, Lambda, LambdaBody, Literal,
    LocalVarDecl, Member, MethodCall, MethodDecl, Modifiers, Stmt, StmtKind, TypeArg, TypeDecl,
    TypeKind, TypeRef, VarDeclarator,
};

#[derive(Debug, Clone)]
pub struct Printer {
    indent_unit: String,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new("    ")
    }
}

impl Printer {
    pub fn new(indent_unit: impl Into<String>) -> Self {
        Self {
            indent_unit: indent_unit.into(),
        }
    }

    pub fn indent_unit(&self) -> &str {
        &self.indent_unit
    }

    /// Renders one statement; continuation lines are prefixed with `base`.
    pub fn statement(&self, stmt: &Stmt, base: &str) -> String {
        let mut w = self.writer(base);
        w.stmt(stmt);
        w.out
    }

    /// Renders a statement sequence, one statement per line.
    pub fn statements(&self, stmts: &[Stmt], base: &str) -> String {
        let mut w = self.writer(base);
        for (i, stmt) in stmts.iter().enumerate() {
            if i > 0 {
                w.newline();
            }
            w.stmt(stmt);
        }
        w.out
    }

    pub fn expr(&self, expr: &Expr) -> String {
        let mut w = self.writer("");
        w.expr(expr);
        w.out
    }

    pub fn type_ref(&self, ty: &TypeRef) -> String {
        let mut w = self.writer("");
        w.ty(ty);
        w.out
    }

    fn writer<'p>(&'p self, base: &'p str) -> Writer<'p> {
        Writer {
            unit: &self.indent_unit,
            base,
            level: 0,
            out: String::new(),
        }
    }
}

struct Writer<'p> {
    unit: &'p str,
    base: &'p str,
    level: usize,
    out: String,
}

impl Writer<'_> {
    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.out.push_str(self.base);
        for _ in 0..self.level {
            self.out.push_str(self.unit);
        }
    }

    fn separated<T>(&mut self, items: &[T], sep: &str, mut each: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            each(self, item);
        }
    }

    // ------------------------------------------------------------------------
    // Types and modifiers
    // ------------------------------------------------------------------------

    fn ty(&mut self, ty: &TypeRef) {
        self.push(&ty.name);
        if ty.diamond {
            self.push("<>");
        } else if !ty.args.is_empty() {
            self.push("<");
            self.separated(&ty.args, ", ", |w, arg| match arg {
                TypeArg::Type(t) => w.ty(t),
                TypeArg::Wildcard(None) => w.push("?"),
                TypeArg::Wildcard(Some(bound)) => {
                    w.push(if bound.upper { "? extends " } else { "? super " });
                    w.ty(&bound.ty);
                }
            });
            self.push(">");
        }
        for _ in 0..ty.dims {
            self.push("[]");
        }
    }

    fn annotation(&mut self, a: &Annotation) {
        self.push("@");
        self.push(&a.name);
        if a.args.is_empty() {
            return;
        }
        self.push("(");
        self.separated(&a.args, ", ", |w, arg| {
            if let Some(key) = &arg.key {
                w.push(key);
                w.push(" = ");
            }
            w.expr(&arg.value);
        });
        self.push(")");
    }

    /// Writes modifiers followed by a space, or nothing.
    fn modifiers(&mut self, m: &Modifiers) {
        for a in &m.annotations {
            self.annotation(a);
            self.push(" ");
        }
        for k in &m.keywords {
            self.push(k);
            self.push(" ");
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn block(&mut self, block: &Block) {
        self.stmt_list_braced(&block.stmts);
    }

    fn stmt_list_braced(&mut self, stmts: &[Stmt]) {
        if stmts.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{");
        self.level += 1;
        for stmt in stmts {
            self.newline();
            self.stmt(stmt);
        }
        self.level -= 1;
        self.newline();
        self.push("}");
    }

    /// Body of `if`/loops: braces stay on the same line, bare statements indent.
    fn body(&mut self, stmt: &Stmt) {
        if let StmtKind::Block(block) = &stmt.kind {
            self.push(" ");
            self.block(block);
        } else {
            self.level += 1;
            self.newline();
            self.stmt(stmt);
            self.level -= 1;
        }
    }

    fn local_var(&mut self, decl: &LocalVarDecl) {
        self.modifiers(&decl.modifiers);
        self.ty(&decl.ty);
        self.push(" ");
        self.declarators(&decl.declarators);
    }

    fn declarators(&mut self, decls: &[VarDeclarator]) {
        self.separated(decls, ", ", |w, d| {
            w.push(&d.name);
            for _ in 0..d.dims {
                w.push("[]");
            }
            if let Some(init) = &d.init {
                w.push(" = ");
                w.expr(init);
            }
        });
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::LocalVar(decl) => {
                self.local_var(decl);
                self.push(";");
            }
            StmtKind::Expr(e) => {
                self.expr(e);
                self.push(";");
            }
            StmtKind::Block(b) => self.block(b),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.push("if (");
                self.expr(cond);
                self.push(")");
                self.body(then);
                if let Some(other) = otherwise {
                    if matches!(then.kind, StmtKind::Block(_)) {
                        self.push(" ");
                    } else {
                        self.newline();
                    }
                    self.push("else");
                    if matches!(other.kind, StmtKind::If { .. }) {
                        self.push(" ");
                        self.stmt(other);
                    } else {
                        self.body(other);
                    }
                }
            }
            StmtKind::While { cond, body } => {
                self.push("while (");
                self.expr(cond);
                self.push(")");
                self.body(body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.push("do");
                self.body(body);
                self.push(" while (");
                self.expr(cond);
                self.push(");");
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                self.push("for (");
                match init {
                    Some(ForInit::Decl(decl)) => self.local_var(decl),
                    Some(ForInit::Exprs(exprs)) => self.separated(exprs, ", ", |w, e| w.expr(e)),
                    None => {}
                }
                self.push(";");
                if let Some(c) = cond {
                    self.push(" ");
                    self.expr(c);
                }
                self.push(";");
                if !update.is_empty() {
                    self.push(" ");
                    self.separated(update, ", ", |w, e| w.expr(e));
                }
                self.push(")");
                self.body(body);
            }
            StmtKind::ForEach {
                modifiers,
                ty,
                name,
                iterable,
                body,
            } => {
                self.push("for (");
                self.modifiers(modifiers);
                self.ty(ty);
                self.push(" ");
                self.push(name);
                self.push(" : ");
                self.expr(iterable);
                self.push(")");
                self.body(body);
            }
            StmtKind::Try {
                resources,
                body,
                catches,
                finally,
            } => {
                self.push("try ");
                if !resources.is_empty() {
                    self.push("(");
                    self.separated(resources, "; ", |w, r| w.local_var(r));
                    self.push(") ");
                }
                self.block(body);
                for c in catches {
                    self.push(" catch (");
                    self.modifiers(&c.modifiers);
                    self.separated(&c.types, " | ", |w, t| w.ty(t));
                    self.push(" ");
                    self.push(&c.name);
                    self.push(") ");
                    self.block(&c.body);
                }
                if let Some(f) = finally {
                    self.push(" finally ");
                    self.block(f);
                }
            }
            StmtKind::Switch { selector, groups } => {
                self.push("switch (");
                self.expr(selector);
                self.push(") {");
                self.level += 1;
                for group in groups {
                    for label in &group.labels {
                        self.newline();
                        match label {
                            Some(values) => {
                                self.push("case ");
                                self.separated(values, ", ", |w, e| w.expr(e));
                                self.push(":");
                            }
                            None => self.push("default:"),
                        }
                    }
                    self.level += 1;
                    for s in &group.stmts {
                        self.newline();
                        self.stmt(s);
                    }
                    self.level -= 1;
                }
                self.level -= 1;
                self.newline();
                self.push("}");
            }
            StmtKind::Synchronized { lock, body } => {
                self.push("synchronized (");
                self.expr(lock);
                self.push(") ");
                self.block(body);
            }
            StmtKind::Return(value) => {
                self.push("return");
                if let Some(v) = value {
                    self.push(" ");
                    self.expr(v);
                }
                self.push(";");
            }
            StmtKind::Throw(e) => {
                self.push("throw ");
                self.expr(e);
                self.push(";");
            }
            StmtKind::Break(label) | StmtKind::Continue(label) => {
                self.push(if matches!(stmt.kind, StmtKind::Break(_)) {
                    "break"
                } else {
                    "continue"
                });
                if let Some(l) = label {
                    self.push(" ");
                    self.push(l);
                }
                self.push(";");
            }
            StmtKind::Assert { cond, message } => {
                self.push("assert ");
                self.expr(cond);
                if let Some(m) = message {
                    self.push(" : ");
                    self.expr(m);
                }
                self.push(";");
            }
            StmtKind::Empty => self.push(";"),
        }
    }

    // ------------------------------------------------------------------------
    // Declarations inside anonymous class bodies
    // ------------------------------------------------------------------------

    fn class_body(&mut self, body: &ClassBody) {
        self.members(&body.members);
    }

    fn members(&mut self, members: &[Member]) {
        if members.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{");
        self.level += 1;
        for member in members {
            self.newline();
            self.member(member);
        }
        self.level -= 1;
        self.newline();
        self.push("}");
    }

    fn member(&mut self, member: &Member) {
        match member {
            Member::Field(f) => {
                self.modifiers(&f.modifiers);
                self.ty(&f.ty);
                self.push(" ");
                self.declarators(&f.declarators);
                self.push(";");
            }
            Member::Method(m) | Member::Constructor(m) => self.method(m),
            Member::Initializer { is_static, body } => {
                if *is_static {
                    self.push("static ");
                }
                self.block(body);
            }
            Member::Type(t) => self.type_decl(t),
        }
    }

    fn method(&mut self, m: &MethodDecl) {
        self.modifiers(&m.modifiers);
        if !m.type_params.is_empty() {
            self.push("<");
            self.separated(&m.type_params, ", ", |w, p| {
                w.push(&p.name);
                if !p.bounds.is_empty() {
                    w.push(" extends ");
                    w.separated(&p.bounds, " & ", |w, b| w.ty(b));
                }
            });
            self.push("> ");
        }
        if let Some(ret) = &m.return_type {
            self.ty(ret);
            self.push(" ");
        }
        self.push(&m.name);
        self.push("(");
        self.separated(&m.params, ", ", |w, p| {
            w.modifiers(&p.modifiers);
            w.ty(&p.ty);
            w.push(if p.varargs { "... " } else { " " });
            w.push(&p.name);
        });
        self.push(")");
        if !m.throws.is_empty() {
            self.push(" throws ");
            self.separated(&m.throws, ", ", |w, t| w.ty(t));
        }
        match &m.body {
            Some(body) => {
                self.push(" ");
                self.block(body);
            }
            None => self.push(";"),
        }
    }

    fn type_decl(&mut self, t: &TypeDecl) {
        self.modifiers(&t.modifiers);
        self.push(match t.kind {
            TypeKind::Class => "class ",
            TypeKind::Interface => "interface ",
            TypeKind::Enum => "enum ",
        });
        self.push(&t.name);
        if !t.extends.is_empty() {
            self.push(" extends ");
            self.separated(&t.extends, ", ", |w, ty| w.ty(ty));
        }
        if !t.implements.is_empty() {
            self.push(" implements ");
            self.separated(&t.implements, ", ", |w, ty| w.ty(ty));
        }
        self.push(" ");
        if t.kind == TypeKind::Enum {
            self.push("{");
            self.level += 1;
            self.newline();
            let constants = t.enum_constants.join(", ");
            self.push(&constants);
            self.push(";");
            for member in &t.members {
                self.newline();
                self.member(member);
            }
            self.level -= 1;
            self.newline();
            self.push("}");
        } else {
            self.members(&t.members);
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn args(&mut self, args: &[Expr]) {
        self.push("(");
        self.separated(args, ", ", |w, a| w.expr(a));
        self.push(")");
    }

    fn call(&mut self, call: &MethodCall) {
        if let Some(recv) = &call.receiver {
            self.expr(recv);
            self.push(".");
        }
        if !call.type_args.is_empty() {
            self.push("<");
            self.separated(&call.type_args, ", ", |w, t| w.ty(t));
            self.push(">");
        }
        self.push(&call.name);
        self.args(&call.args);
    }

    fn lambda(&mut self, lambda: &Lambda) {
        let bare = !lambda.parenthesized
            && lambda.params.len() == 1
            && lambda.params.iter().all(|p| p.ty.is_none());
        if bare {
            self.push(&lambda.params[0].name);
        } else {
            self.push("(");
            self.separated(&lambda.params, ", ", |w, p| {
                if let Some(t) = &p.ty {
                    w.ty(t);
                    w.push(" ");
                }
                w.push(&p.name);
            });
            self.push(")");
        }
        self.push(" -> ");
        match &lambda.body {
            LambdaBody::Expr(e) => self.expr(e),
            LambdaBody::Block(b) => self.block(b),
        }
    }

    fn literal(&mut self, lit: &Literal) {
        match lit {
            Literal::Int(t)
            | Literal::Long(t)
            | Literal::Float(t)
            | Literal::Double(t)
            | Literal::Char(t)
            | Literal::Str(t) => self.push(t),
            Literal::Bool(b) => self.push(if *b { "true" } else { "false" }),
            Literal::Null => self.push("null"),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(lit) => self.literal(lit),
            ExprKind::Name(n) => self.push(n),
            ExprKind::This => self.push("this"),
            ExprKind::Super => self.push("super"),
            ExprKind::FieldAccess { target, name } => {
                self.expr(target);
                self.push(".");
                self.push(name);
            }
            ExprKind::MethodCall(call) => self.call(call),
            ExprKind::New(obj) => {
                self.push("new ");
                self.ty(&obj.ty);
                self.args(&obj.args);
                if let Some(body) = &obj.body {
                    self.push(" ");
                    self.class_body(body);
                }
            }
            ExprKind::NewArray {
                element,
                dims,
                extra_dims,
                init,
            } => {
                self.push("new ");
                self.ty(element);
                for d in dims {
                    self.push("[");
                    self.expr(d);
                    self.push("]");
                }
                for _ in 0..*extra_dims {
                    self.push("[]");
                }
                if let Some(items) = init {
                    self.push(" {");
                    self.separated(items, ", ", |w, e| w.expr(e));
                    self.push("}");
                }
            }
            ExprKind::ArrayInit(items) => {
                self.push("{");
                self.separated(items, ", ", |w, e| w.expr(e));
                self.push("}");
            }
            ExprKind::ArrayAccess { array, index } => {
                self.expr(array);
                self.push("[");
                self.expr(index);
                self.push("]");
            }
            ExprKind::Cast { ty, expr } => {
                self.push("(");
                self.ty(ty);
                self.push(") ");
                self.expr(expr);
            }
            ExprKind::Lambda(l) => self.lambda(l),
            ExprKind::MethodRef { target, name } => {
                self.expr(target);
                self.push("::");
                self.push(name);
            }
            ExprKind::Unary {
                op,
                prefix,
                operand,
            } => {
                if *prefix {
                    self.push(op);
                    self.expr(operand);
                } else {
                    self.expr(operand);
                    self.push(op);
                }
            }
            ExprKind::Binary { first, rest } => {
                self.expr(first);
                for (op, e) in rest {
                    self.push(" ");
                    self.push(op);
                    self.push(" ");
                    self.expr(e);
                }
            }
            ExprKind::InstanceOf { expr, ty } => {
                self.expr(expr);
                self.push(" instanceof ");
                self.ty(ty);
            }
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.push(" ? ");
                self.expr(then);
                self.push(" : ");
                self.expr(otherwise);
            }
            ExprKind::Assign { target, op, value } => {
                self.expr(target);
                self.push(" ");
                self.push(op);
                self.push(" ");
                self.expr(value);
            }
            ExprKind::ClassLiteral(ty) => {
                self.ty(ty);
                self.push(".class");
            }
            ExprKind::Paren(inner) => {
                self.push("(");
                self.expr(inner);
                self.push(")");
            }
        }
    }
}
