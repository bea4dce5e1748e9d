//! Tree traversal for statements and expressions.
//!
//! `Visit` walks a tree by shared reference, `VisitMut` by mutable reference.
//! Implementors override the hooks they care about and call the matching
//! `walk_*` function to keep descending.

use super::{
    Block, ClassBody, Expr, ExprKind, ForInit, LambdaBody, LocalVarDecl, Member, Stmt, StmtKind,
};

// ============================================================================
// SHARED-REFERENCE VISITOR
// ============================================================================

pub trait Visit {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_class_body(&mut self, body: &ClassBody) {
        walk_class_body(self, body);
    }

    fn visit_local_var(&mut self, decl: &LocalVarDecl) {
        walk_local_var(self, decl);
    }
}

pub fn walk_block<V: Visit + ?Sized>(v: &mut V, block: &Block) {
    for stmt in &block.stmts {
        v.visit_stmt(stmt);
    }
}

pub fn walk_local_var<V: Visit + ?Sized>(v: &mut V, decl: &LocalVarDecl) {
    for d in &decl.declarators {
        if let Some(init) = &d.init {
            v.visit_expr(init);
        }
    }
}

pub fn walk_stmt<V: Visit + ?Sized>(v: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::LocalVar(decl) => v.visit_local_var(decl),
        StmtKind::Expr(e) | StmtKind::Throw(e) => v.visit_expr(e),
        StmtKind::Block(b) => walk_block(v, b),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            v.visit_expr(cond);
            v.visit_stmt(then);
            if let Some(other) = otherwise {
                v.visit_stmt(other);
            }
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            v.visit_expr(cond);
            v.visit_stmt(body);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Decl(decl)) => v.visit_local_var(decl),
                Some(ForInit::Exprs(exprs)) => exprs.iter().for_each(|e| v.visit_expr(e)),
                None => {}
            }
            if let Some(c) = cond {
                v.visit_expr(c);
            }
            update.iter().for_each(|e| v.visit_expr(e));
            v.visit_stmt(body);
        }
        StmtKind::ForEach { iterable, body, .. } => {
            v.visit_expr(iterable);
            v.visit_stmt(body);
        }
        StmtKind::Try {
            resources,
            body,
            catches,
            finally,
        } => {
            resources.iter().for_each(|r| v.visit_local_var(r));
            walk_block(v, body);
            for c in catches {
                walk_block(v, &c.body);
            }
            if let Some(f) = finally {
                walk_block(v, f);
            }
        }
        StmtKind::Switch { selector, groups } => {
            v.visit_expr(selector);
            for group in groups {
                for labels in group.labels.iter().flatten() {
                    labels.iter().for_each(|e| v.visit_expr(e));
                }
                group.stmts.iter().for_each(|s| v.visit_stmt(s));
            }
        }
        StmtKind::Synchronized { lock, body } => {
            v.visit_expr(lock);
            walk_block(v, body);
        }
        StmtKind::Return(value) => {
            if let Some(e) = value {
                v.visit_expr(e);
            }
        }
        StmtKind::Assert { cond, message } => {
            v.visit_expr(cond);
            if let Some(m) = message {
                v.visit_expr(m);
            }
        }
        StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Empty => {}
    }
}

pub fn walk_class_body<V: Visit + ?Sized>(v: &mut V, body: &ClassBody) {
    for member in &body.members {
        match member {
            Member::Field(f) => f
                .declarators
                .iter()
                .filter_map(|d| d.init.as_ref())
                .for_each(|e| v.visit_expr(e)),
            Member::Method(m) | Member::Constructor(m) => {
                if let Some(b) = &m.body {
                    walk_block(v, b);
                }
            }
            Member::Initializer { body, .. } => walk_block(v, body),
            Member::Type(_) => {}
        }
    }
}

pub fn walk_expr<V: Visit + ?Sized>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Name(_)
        | ExprKind::This
        | ExprKind::Super
        | ExprKind::ClassLiteral(_) => {}
        ExprKind::FieldAccess { target, .. } | ExprKind::MethodRef { target, .. } => {
            v.visit_expr(target)
        }
        ExprKind::MethodCall(call) => {
            if let Some(r) = &call.receiver {
                v.visit_expr(r);
            }
            call.args.iter().for_each(|a| v.visit_expr(a));
        }
        ExprKind::New(new) => {
            new.args.iter().for_each(|a| v.visit_expr(a));
            if let Some(body) = &new.body {
                v.visit_class_body(body);
            }
        }
        ExprKind::NewArray { dims, init, .. } => {
            dims.iter().for_each(|d| v.visit_expr(d));
            if let Some(items) = init {
                items.iter().for_each(|i| v.visit_expr(i));
            }
        }
        ExprKind::ArrayInit(items) => items.iter().for_each(|i| v.visit_expr(i)),
        ExprKind::ArrayAccess { array, index } => {
            v.visit_expr(array);
            v.visit_expr(index);
        }
        ExprKind::Cast { expr, .. }
        | ExprKind::InstanceOf { expr, .. }
        | ExprKind::Paren(expr) => v.visit_expr(expr),
        ExprKind::Unary { operand, .. } => v.visit_expr(operand),
        ExprKind::Lambda(lambda) => match &lambda.body {
            LambdaBody::Expr(e) => v.visit_expr(e),
            LambdaBody::Block(b) => walk_block(v, b),
        },
        ExprKind::Binary { first, rest } => {
            v.visit_expr(first);
            rest.iter().for_each(|(_, e)| v.visit_expr(e));
        }
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            v.visit_expr(cond);
            v.visit_expr(then);
            v.visit_expr(otherwise);
        }
        ExprKind::Assign { target, value, .. } => {
            v.visit_expr(target);
            v.visit_expr(value);
        }
    }
}

// ============================================================================
// MUTABLE VISITOR
// ============================================================================

pub trait VisitMut {
    fn visit_stmt_mut(&mut self, stmt: &mut Stmt) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        walk_expr_mut(self, expr);
    }
}

pub fn walk_block_mut<V: VisitMut + ?Sized>(v: &mut V, block: &mut Block) {
    for stmt in &mut block.stmts {
        v.visit_stmt_mut(stmt);
    }
}

fn walk_local_var_mut<V: VisitMut + ?Sized>(v: &mut V, decl: &mut LocalVarDecl) {
    for d in &mut decl.declarators {
        if let Some(init) = &mut d.init {
            v.visit_expr_mut(init);
        }
    }
}

pub fn walk_stmt_mut<V: VisitMut + ?Sized>(v: &mut V, stmt: &mut Stmt) {
    match &mut stmt.kind {
        StmtKind::LocalVar(decl) => walk_local_var_mut(v, decl),
        StmtKind::Expr(e) | StmtKind::Throw(e) => v.visit_expr_mut(e),
        StmtKind::Block(b) => walk_block_mut(v, b),
        StmtKind::If {
            cond,
            then,
            otherwise,
        } => {
            v.visit_expr_mut(cond);
            v.visit_stmt_mut(then);
            if let Some(other) = otherwise {
                v.visit_stmt_mut(other);
            }
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            v.visit_expr_mut(cond);
            v.visit_stmt_mut(body);
        }
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Decl(decl)) => walk_local_var_mut(v, decl),
                Some(ForInit::Exprs(exprs)) => exprs.iter_mut().for_each(|e| v.visit_expr_mut(e)),
                None => {}
            }
            if let Some(c) = cond {
                v.visit_expr_mut(c);
            }
            update.iter_mut().for_each(|e| v.visit_expr_mut(e));
            v.visit_stmt_mut(body);
        }
        StmtKind::ForEach { iterable, body, .. } => {
            v.visit_expr_mut(iterable);
            v.visit_stmt_mut(body);
        }
        StmtKind::Try {
            resources,
            body,
            catches,
            finally,
        } => {
            resources.iter_mut().for_each(|r| walk_local_var_mut(v, r));
            walk_block_mut(v, body);
            for c in catches {
                walk_block_mut(v, &mut c.body);
            }
            if let Some(f) = finally {
                walk_block_mut(v, f);
            }
        }
        StmtKind::Switch { selector, groups } => {
            v.visit_expr_mut(selector);
            for group in groups {
                for labels in group.labels.iter_mut().flatten() {
                    labels.iter_mut().for_each(|e| v.visit_expr_mut(e));
                }
                group.stmts.iter_mut().for_each(|s| v.visit_stmt_mut(s));
            }
        }
        StmtKind::Synchronized { lock, body } => {
            v.visit_expr_mut(lock);
            walk_block_mut(v, body);
        }
        StmtKind::Return(value) => {
            if let Some(e) = value {
                v.visit_expr_mut(e);
            }
        }
        StmtKind::Assert { cond, message } => {
            v.visit_expr_mut(cond);
            if let Some(m) = message {
                v.visit_expr_mut(m);
            }
        }
        StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Empty => {}
    }
}

pub fn walk_expr_mut<V: VisitMut + ?Sized>(v: &mut V, expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Name(_)
        | ExprKind::This
        | ExprKind::Super
        | ExprKind::ClassLiteral(_) => {}
        ExprKind::FieldAccess { target, .. } | ExprKind::MethodRef { target, .. } => {
            v.visit_expr_mut(target)
        }
        ExprKind::MethodCall(call) => {
            if let Some(r) = &mut call.receiver {
                v.visit_expr_mut(r);
            }
            call.args.iter_mut().for_each(|a| v.visit_expr_mut(a));
        }
        ExprKind::New(new) => {
            new.args.iter_mut().for_each(|a| v.visit_expr_mut(a));
            if let Some(body) = &mut new.body {
                for member in &mut body.members {
                    match member {
                        Member::Method(m) | Member::Constructor(m) => {
                            if let Some(b) = &mut m.body {
                                walk_block_mut(v, b);
                            }
                        }
                        Member::Initializer { body, .. } => walk_block_mut(v, body),
                        Member::Field(f) => {
                            for d in &mut f.declarators {
                                if let Some(init) = &mut d.init {
                                    v.visit_expr_mut(init);
                                }
                            }
                        }
                        Member::Type(_) => {}
                    }
                }
            }
        }
        ExprKind::NewArray { dims, init, .. } => {
            dims.iter_mut().for_each(|d| v.visit_expr_mut(d));
            if let Some(items) = init {
                items.iter_mut().for_each(|i| v.visit_expr_mut(i));
            }
        }
        ExprKind::ArrayInit(items) => items.iter_mut().for_each(|i| v.visit_expr_mut(i)),
        ExprKind::ArrayAccess { array, index } => {
            v.visit_expr_mut(array);
            v.visit_expr_mut(index);
        }
        ExprKind::Cast { expr, .. }
        | ExprKind::InstanceOf { expr, .. }
        | ExprKind::Paren(expr) => v.visit_expr_mut(expr),
        ExprKind::Unary { operand, .. } => v.visit_expr_mut(operand),
        ExprKind::Lambda(lambda) => match &mut lambda.body {
            LambdaBody::Expr(e) => v.visit_expr_mut(e),
            LambdaBody::Block(b) => walk_block_mut(v, b),
        },
        ExprKind::Binary { first, rest } => {
            v.visit_expr_mut(first);
            rest.iter_mut().for_each(|(_, e)| v.visit_expr_mut(e));
        }
        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            v.visit_expr_mut(cond);
            v.visit_expr_mut(then);
            v.visit_expr_mut(otherwise);
        }
        ExprKind::Assign { target, value, .. } => {
            v.visit_expr_mut(target);
            v.visit_expr_mut(value);
        }
    }
}

// ============================================================================
// COMMON QUERIES
// ============================================================================

/// Collects every simple name declared or referenced in a statement list.
///
/// Used to pick fresh identifiers that cannot collide with existing ones.
pub fn names_in(stmts: &[Stmt]) -> std::collections::HashSet<String> {
    struct Names(std::collections::HashSet<String>);

    impl Visit for Names {
        fn visit_local_var(&mut self, decl: &LocalVarDecl) {
            for d in &decl.declarators {
                self.0.insert(d.name.clone());
            }
            walk_local_var(self, decl);
        }

        fn visit_expr(&mut self, expr: &Expr) {
            match &expr.kind {
                ExprKind::Name(name) => {
                    self.0.insert(name.clone());
                }
                ExprKind::Lambda(lambda) => {
                    for p in &lambda.params {
                        self.0.insert(p.name.clone());
                    }
                }
                _ => {}
            }
            walk_expr(self, expr);
        }

        fn visit_stmt(&mut self, stmt: &Stmt) {
            match &stmt.kind {
                StmtKind::ForEach { name, .. } => {
                    self.0.insert(name.clone());
                }
                StmtKind::Try { catches, .. } => {
                    for c in catches {
                        self.0.insert(c.name.clone());
                    }
                }
                _ => {}
            }
            walk_stmt(self, stmt);
        }
    }

    let mut names = Names(Default::default());
    stmts.iter().for_each(|s| names.visit_stmt(s));
    names.0
}

/// Picks `base`, or `base1`, `base2`, .. when `base` is already taken.
pub fn fresh_name(base: &str, taken: &std::collections::HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder;

    #[test]
    fn fresh_name_skips_taken_names() {
        let taken: std::collections::HashSet<String> =
            ["inOrder", "inOrder1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(fresh_name("inOrder", &taken), "inOrder2");
        assert_eq!(fresh_name("invocation", &taken), "invocation");
    }

    #[test]
    fn names_in_sees_locals_and_references() {
        let stmts = vec![
            builder::local_var(
                crate::ast::TypeRef::named("int"),
                "count",
                builder::int_literal(1),
            ),
            builder::expr_stmt(builder::call(builder::name("mock"), "run", vec![])),
        ];
        let names = names_in(&stmts);
        assert!(names.contains("count"));
        assert!(names.contains("mock"));
    }
}
