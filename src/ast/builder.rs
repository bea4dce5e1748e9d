//! # AST Builder Module
//!
//! Constructors for synthesized nodes. Every node produced here carries a
//! synthetic span; the printer renders it and the file driver splices the
//! rendered text over the span of the statement it replaces.

use super::{
    Block, Expr, ExprKind, Lambda, LambdaBody, LambdaParam, Literal, LocalVarDecl, MethodCall,
    Modifiers, Stmt, StmtKind, TypeRef, VarDeclarator,
};
use crate::ast::Span;

// ============================================================================
// EXPRESSIONS
// ============================================================================

pub fn name(id: &str) -> Expr {
    Expr::new(ExprKind::Name(id.to_string()))
}

pub fn int_literal(value: u32) -> Expr {
    Expr::new(ExprKind::Literal(Literal::Int(value.to_string())))
}

pub fn null_literal() -> Expr {
    Expr::new(ExprKind::Literal(Literal::Null))
}

pub fn class_literal(ty: TypeRef) -> Expr {
    Expr::new(ExprKind::ClassLiteral(ty.erasure()))
}

/// `receiver.name(args)`
pub fn call(receiver: Expr, method: &str, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::MethodCall(MethodCall {
        receiver: Some(Box::new(receiver)),
        type_args: Vec::new(),
        name: method.to_string(),
        args,
    }))
}

/// `name(args)` with no receiver.
pub fn bare_call(method: &str, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::MethodCall(MethodCall {
        receiver: None,
        type_args: Vec::new(),
        name: method.to_string(),
        args,
    }))
}

/// `Owner.name(args)` when `owner` is given, `name(args)` otherwise.
///
/// Target-API entry points go through here so that the qualified style
/// (`Mockito.when`) and the static-import style (`when`) share one path.
pub fn api_call(owner: Option<&str>, method: &str, args: Vec<Expr>) -> Expr {
    match owner {
        Some(owner) => call(name(owner), method, args),
        None => bare_call(method, args),
    }
}

/// Re-targets an existing call at a new receiver, keeping name and type arguments.
pub fn call_on(receiver: Expr, original: &MethodCall, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::MethodCall(MethodCall {
        receiver: Some(Box::new(receiver)),
        type_args: original.type_args.clone(),
        name: original.name.clone(),
        args,
    }))
}

pub fn cast(ty: TypeRef, expr: Expr) -> Expr {
    Expr::new(ExprKind::Cast {
        ty,
        expr: Box::new(expr),
    })
}

pub fn paren(expr: Expr) -> Expr {
    Expr::new(ExprKind::Paren(Box::new(expr)))
}

/// `param -> { stmts }`
pub fn lambda_block(param: &str, stmts: Vec<Stmt>) -> Expr {
    Expr::new(ExprKind::Lambda(Lambda {
        params: vec![LambdaParam {
            ty: None,
            name: param.to_string(),
        }],
        parenthesized: false,
        body: LambdaBody::Block(Block::new(stmts)),
    }))
}

// ============================================================================
// STATEMENTS
// ============================================================================

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::new(StmtKind::Expr(expr))
}

pub fn return_stmt(value: Option<Expr>) -> Stmt {
    Stmt::new(StmtKind::Return(value))
}

/// `Type name = init;`
pub fn local_var(ty: TypeRef, var: &str, init: Expr) -> Stmt {
    Stmt::new(StmtKind::LocalVar(LocalVarDecl {
        modifiers: Modifiers::default(),
        ty,
        declarators: vec![VarDeclarator {
            name: var.to_string(),
            dims: 0,
            init: Some(init),
            span: Span::synthetic(),
        }],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_call_respects_qualification() {
        let qualified = api_call(Some("Mockito"), "verify", vec![name("a")]);
        let call = qualified.as_method_call().unwrap();
        assert_eq!(call.name, "verify");
        assert!(matches!(
            call.receiver.as_deref().map(|r| &r.kind),
            Some(ExprKind::Name(owner)) if owner == "Mockito"
        ));

        let bare = api_call(None, "verify", vec![name("a")]);
        assert!(bare.as_method_call().unwrap().receiver.is_none());
    }

    #[test]
    fn class_literal_drops_type_arguments() {
        let mut ty = TypeRef::named("List");
        ty.args.push(crate::ast::TypeArg::Type(TypeRef::named("String")));
        let ExprKind::ClassLiteral(lit) = class_literal(ty).kind else {
            panic!("expected a class literal");
        };
        assert!(lit.args.is_empty());
    }

    #[test]
    fn synthesized_nodes_have_synthetic_spans() {
        assert!(expr_stmt(null_literal()).span.is_synthetic());
        assert!(int_literal(3).span.is_synthetic());
    }
}
