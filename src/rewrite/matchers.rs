//! Matcher translation
//!
//! Maps the argument matchers of the recording DSL (`anyInt`, `(Foo) any`,
//! `withEqual(x)`, ..) onto target-API matcher calls. Classification turns
//! each recorded argument into an [`ArgumentSlot`]; [`lower_arguments`] turns
//! a slot list back into call arguments, keeping every call either all-matcher
//! or matcher-free.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::{
    ast::{
        builder::{api_call, class_literal},
        Expr, ExprKind, Literal, TypeRef,
    },
    bindings::MethodSig,
};

use super::types::{ArgumentSlot, MatcherToken};

/// Whether target-API calls are written through their owning class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiStyle {
    pub qualified: bool,
}

impl ApiStyle {
    pub fn mockito(&self) -> Option<&'static str> {
        self.qualified.then_some("Mockito")
    }

    pub fn matchers(&self) -> Option<&'static str> {
        self.qualified.then_some("ArgumentMatchers")
    }
}

// ============================================================================
// TABLES
// ============================================================================

/// Typed wildcard fields and the type they stand for.
static FIELD_MATCHERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("anyBoolean", "boolean"),
        ("anyByte", "byte"),
        ("anyChar", "char"),
        ("anyShort", "short"),
        ("anyInt", "int"),
        ("anyLong", "long"),
        ("anyFloat", "float"),
        ("anyDouble", "double"),
        ("anyString", "String"),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HintRule {
    None,
    Text,
    /// Type named by a class-literal first argument.
    ClassArg,
    /// Type of a literal first argument.
    ValueArg,
}

#[derive(Debug, Clone, Copy)]
struct WithRule {
    target: &'static str,
    hint: HintRule,
}

static WITH_MATCHERS: Lazy<HashMap<&'static str, WithRule>> = Lazy::new(|| {
    let rule = |target, hint| WithRule { target, hint };
    HashMap::from([
        ("withAny", rule("any", HintRule::ValueArg)),
        ("withEqual", rule("eq", HintRule::ValueArg)),
        ("withNotNull", rule("notNull", HintRule::None)),
        ("withNull", rule("isNull", HintRule::None)),
        ("withInstanceOf", rule("isA", HintRule::ClassArg)),
        ("withSameInstance", rule("same", HintRule::ValueArg)),
        ("withSubstring", rule("contains", HintRule::Text)),
        ("withPrefix", rule("startsWith", HintRule::Text)),
        ("withSuffix", rule("endsWith", HintRule::Text)),
        ("withMatch", rule("matches", HintRule::Text)),
        ("withArgThat", rule("argThat", HintRule::None)),
    ])
});

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Classifies one argument of a recorded call.
pub fn classify(arg: &Expr) -> ArgumentSlot {
    let inner = arg.unparenthesized();
    if let ExprKind::Cast { ty, expr } = &inner.kind {
        match token_of(expr.unparenthesized()) {
            Some((MatcherToken::Any, _)) => {
                return ArgumentSlot::Matcher {
                    token: MatcherToken::CastAny(ty.clone()),
                    hint: Some(ty.clone()),
                }
            }
            Some((token @ MatcherToken::Call { .. }, _)) => {
                return ArgumentSlot::Matcher {
                    token,
                    hint: Some(ty.clone()),
                }
            }
            _ => {}
        }
    }
    if let Some((token, hint)) = token_of(inner) {
        return ArgumentSlot::Matcher { token, hint };
    }
    match &inner.kind {
        ExprKind::Literal(_) => ArgumentSlot::Literal(arg.clone()),
        _ => ArgumentSlot::VariableRef(arg.clone()),
    }
}

fn token_of(expr: &Expr) -> Option<(MatcherToken, Option<TypeRef>)> {
    if let Some(name) = expr.simple_reference() {
        if name == "any" {
            return Some((MatcherToken::Any, None));
        }
        let ty = FIELD_MATCHERS.get(name)?;
        return Some((MatcherToken::Field(name.to_string()), Some(TypeRef::named(*ty))));
    }
    let call = expr.as_method_call()?;
    let receiver_ok = call
        .receiver
        .as_deref()
        .map_or(true, |r| matches!(r.kind, ExprKind::This));
    if !receiver_ok {
        return None;
    }
    let rule = WITH_MATCHERS.get(call.name.as_str())?;
    let first = call.args.first().map(Expr::unparenthesized);
    let hint = match rule.hint {
        HintRule::None => None,
        HintRule::Text => Some(TypeRef::named("String")),
        HintRule::ClassArg => first.and_then(|a| match &a.kind {
            ExprKind::ClassLiteral(ty) => Some(ty.clone()),
            _ => None,
        }),
        HintRule::ValueArg => first
            .and_then(Expr::as_literal)
            .and_then(Literal::type_name)
            .map(TypeRef::named),
    };
    Some((
        MatcherToken::Call {
            name: call.name.clone(),
            args: call.args.clone(),
        },
        hint,
    ))
}

// ============================================================================
// TRANSLATION
// ============================================================================

/// Target matcher for `token`. `param` is the bound parameter type of the
/// slot, when the call was resolved and the type is concrete.
pub fn translate(token: &MatcherToken, param: Option<&TypeRef>, style: ApiStyle) -> Expr {
    let owner = style.matchers();
    match token {
        MatcherToken::Field(name) => api_call(owner, name, Vec::new()),
        MatcherToken::Any => match param {
            Some(ty) => typed_any(ty, style),
            None => api_call(owner, "any", Vec::new()),
        },
        MatcherToken::CastAny(ty) => typed_any(ty, style),
        MatcherToken::Call { name, args } => {
            let Some(rule) = WITH_MATCHERS.get(name.as_str()) else {
                return api_call(owner, name, args.clone());
            };
            match rule.target {
                "any" => match param {
                    Some(ty) => typed_any(ty, style),
                    None => api_call(owner, "any", Vec::new()),
                },
                // Tolerance comparison lives outside the static-import set.
                "eq" if args.len() == 2 => api_call(Some("AdditionalMatchers"), "eq", args.clone()),
                target => api_call(owner, target, args.clone()),
            }
        }
    }
}

/// `anyInt()` for `int`, `anyString()` for `String`, `any(T.class)` otherwise.
fn typed_any(ty: &TypeRef, style: ApiStyle) -> Expr {
    let owner = style.matchers();
    if ty.is_primitive() {
        let mut name = String::from("any");
        let mut chars = ty.name.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
        return api_call(owner, &name, Vec::new());
    }
    if ty.dims == 0 && ty.simple_name() == "String" {
        return api_call(owner, "anyString", Vec::new());
    }
    api_call(owner, "any", vec![class_literal(ty.clone())])
}

/// `T`, `K2`: class-level type variables are not tracked per call site, so
/// short all-caps names are taken as type variables.
pub fn looks_like_type_variable(ty: &TypeRef) -> bool {
    ty.dims == 0
        && ty.name.len() <= 2
        && ty.name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Parameter type usable in a class literal: not a type variable.
fn concrete_param(sig: &MethodSig, i: usize) -> Option<TypeRef> {
    let ty = sig.param_type(i)?;
    let generic = sig.type_params.iter().any(|p| *p == ty.name) || looks_like_type_variable(&ty);
    (!generic).then_some(ty)
}

/// Call arguments for a slot list. Concrete values next to matchers are
/// wrapped in `eq(..)`, or `isNull()` for a `null` literal.
pub fn lower_arguments(slots: &[ArgumentSlot], sig: Option<&MethodSig>, style: ApiStyle) -> Vec<Expr> {
    let mixed = slots.iter().any(ArgumentSlot::is_matcher);
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| match slot {
            ArgumentSlot::Matcher { token, .. } => {
                let param = sig.and_then(|s| concrete_param(s, i));
                translate(token, param.as_ref(), style)
            }
            ArgumentSlot::Literal(e) | ArgumentSlot::VariableRef(e) if !mixed => e.clone(),
            ArgumentSlot::Literal(e) | ArgumentSlot::VariableRef(e) => {
                if matches!(e.unparenthesized().as_literal(), Some(Literal::Null)) {
                    api_call(style.matchers(), "isNull", Vec::new())
                } else {
                    api_call(style.matchers(), "eq", vec![e.clone()])
                }
            }
        })
        .collect()
}

/// True when `expr` is a call produced by [`translate`] or an `eq`/`isNull` wrapper.
pub fn is_target_matcher(expr: &Expr) -> bool {
    let Some(call) = expr.as_method_call() else {
        return false;
    };
    let owner_ok = match call.receiver.as_deref().map(|r| &r.kind) {
        None => true,
        Some(ExprKind::Name(n)) => n == "ArgumentMatchers" || n == "AdditionalMatchers",
        Some(_) => false,
    };
    owner_ok
        && (FIELD_MATCHERS.contains_key(call.name.as_str())
            || WITH_MATCHERS.values().any(|r| r.target == call.name)
            || call.name == "eq"
            || call.name == "isNull")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{syntax::Printer, test_support::expr};

    fn render(e: &Expr) -> String {
        Printer::default().expr(e)
    }

    fn sig(text: &str) -> MethodSig {
        let decl = crate::syntax::parse_method_signature(text).unwrap();
        MethodSig::from_decl(&decl).unwrap()
    }

    #[test]
    fn typed_fields_keep_their_name() {
        let slot = classify(&expr("anyLong"));
        let ArgumentSlot::Matcher { token, hint } = &slot else {
            panic!("expected a matcher, got {slot:?}");
        };
        assert_eq!(hint.as_ref().map(|t| t.name.as_str()), Some("long"));
        assert_eq!(render(&translate(token, None, ApiStyle::default())), "anyLong()");
    }

    #[test]
    fn untyped_any_follows_the_parameter_type() {
        let s = sig("void put(int key, String value, java.util.List<String> rest)");
        let slots: Vec<_> = ["any", "any", "any"].iter().map(|a| classify(&expr(a))).collect();
        let lowered: Vec<_> = lower_arguments(&slots, Some(&s), ApiStyle::default())
            .iter()
            .map(render)
            .collect();
        assert_eq!(lowered, vec!["anyInt()", "anyString()", "any(java.util.List.class)"]);
        let unbound = lower_arguments(&slots[..1], None, ApiStyle::default());
        assert_eq!(render(&unbound[0]), "any()");
    }

    #[test]
    fn type_variables_lower_to_plain_any() {
        let s = sig("<T> void accept(T item)");
        let lowered = lower_arguments(&[classify(&expr("any"))], Some(&s), ApiStyle::default());
        assert_eq!(render(&lowered[0]), "any()");
    }

    #[test]
    fn cast_any_uses_the_cast_type() {
        let slot = classify(&expr("(Widget) any"));
        assert!(matches!(&slot, ArgumentSlot::Matcher { token: MatcherToken::CastAny(t), .. } if t.name == "Widget"));
        let lowered = lower_arguments(&[slot], None, ApiStyle::default());
        assert_eq!(render(&lowered[0]), "any(Widget.class)");
    }

    #[test]
    fn with_methods_map_to_target_names() {
        let cases = [
            ("withEqual(5)", "eq(5)"),
            ("withNotNull()", "notNull()"),
            ("withNull()", "isNull()"),
            ("withInstanceOf(Foo.class)", "isA(Foo.class)"),
            ("withSameInstance(x)", "same(x)"),
            ("withSubstring(\"ab\")", "contains(\"ab\")"),
            ("withPrefix(\"a\")", "startsWith(\"a\")"),
            ("withSuffix(\"z\")", "endsWith(\"z\")"),
            ("withMatch(\"[a-z]+\")", "matches(\"[a-z]+\")"),
            ("withArgThat(m)", "argThat(m)"),
            ("withEqual(1.0, 0.1)", "AdditionalMatchers.eq(1.0, 0.1)"),
        ];
        for (source, expected) in cases {
            let lowered = lower_arguments(&[classify(&expr(source))], None, ApiStyle::default());
            assert_eq!(render(&lowered[0]), expected, "lowering {source}");
        }
    }

    #[test]
    fn concrete_values_next_to_matchers_are_wrapped() {
        let slots = vec![
            classify(&expr("\"key\"")),
            classify(&expr("anyInt")),
            classify(&expr("null")),
            classify(&expr("local")),
        ];
        let lowered: Vec<_> = lower_arguments(&slots, None, ApiStyle::default())
            .iter()
            .map(render)
            .collect();
        assert_eq!(lowered, vec!["eq(\"key\")", "anyInt()", "isNull()", "eq(local)"]);
        assert!(lower_arguments(&slots, None, ApiStyle::default())
            .iter()
            .all(is_target_matcher));
    }

    #[test]
    fn matcher_free_arguments_pass_through() {
        let slots = vec![classify(&expr("1")), classify(&expr("name"))];
        let lowered: Vec<_> = lower_arguments(&slots, None, ApiStyle::default())
            .iter()
            .map(render)
            .collect();
        assert_eq!(lowered, vec!["1", "name"]);
    }

    #[test]
    fn qualified_style_names_the_owner() {
        let style = ApiStyle { qualified: true };
        let lowered = lower_arguments(&[classify(&expr("anyString")), classify(&expr("3"))], None, style);
        let rendered: Vec<_> = lowered.iter().map(render).collect();
        assert_eq!(rendered, vec!["ArgumentMatchers.anyString()", "ArgumentMatchers.eq(3)"]);
    }

    #[test]
    fn unknown_names_are_variable_references() {
        assert!(matches!(classify(&expr("anything")), ArgumentSlot::VariableRef(_)));
        assert!(matches!(classify(&expr("helper.withEqual(1)")), ArgumentSlot::VariableRef(_)));
    }
}
