use std::collections::HashMap;
use swc_core::common::DUMMY_SP;
use swc_core::ecma::ast::{AssignExpr, AssignOp, BinaryOp, CallExpr, Callee, Expr, FnDecl, Function, Pat, Program, Stmt, VarDeclarator};
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};
use tracing::debug;

use super::util::{assign_target_chain, dotted_chain, unparen};

/// What a helper function's single `return` does with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum HelperKind {
    Binary(BinaryOp),
    Logical(BinaryOp),

    /// `return a(b, c)`. `forwards` is set when the callee is the first
    /// parameter and the arguments are the remaining ones, in order.
    Call {
        forwards: bool
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HelperFunction {
    pub arity: usize,
    pub kind: HelperKind
}

impl HelperFunction {
    /// Recognises `function (a, b) { return <binary, logical or call>; }`.
    pub fn from_function(function: &Function) -> Option<Self> {
        let body = function.body.as_ref()?;
        let arg = match body.stmts.as_slice() {
            [Stmt::Return(ret)] => ret.arg.as_deref()?,
            _ => return None
        };

        let params: Vec<_> = function.params
            .iter()
            .map(|param| match &param.pat {
                Pat::Ident(binding) => Some(&binding.id.sym),
                _ => None
            })
            .collect::<Option<_>>()?;

        let kind = match unparen(arg) {
            Expr::Bin(bin) if matches!(bin.op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing) => HelperKind::Logical(bin.op),
            Expr::Bin(bin) => HelperKind::Binary(bin.op),
            Expr::Call(call) => {
                let callee = match &call.callee {
                    Callee::Expr(callee) => Some(unparen(callee)),
                    _ => None
                };
                let forwards = match (callee, params.split_first()) {
                    (Some(Expr::Ident(callee)), Some((first, rest))) => {
                        callee.sym == **first
                            && call.args.len() == rest.len()
                            && call.args.iter().zip(rest).all(|(arg, param)| {
                                arg.spread.is_none() && matches!(&*arg.expr, Expr::Ident(id) if id.sym == **param)
                            })
                    }
                    _ => false
                };
                HelperKind::Call { forwards }
            }
            _ => return None
        };

        Some(Self {
            arity: params.len(),
            kind
        })
    }
}

/// Helper functions by the name or dotted chain they are bound to.
///
/// A name bound to two different helpers is dropped.
#[derive(Debug, Default)]
pub struct Registry {
    helpers: HashMap<String, Option<HelperFunction>>
}

impl Registry {
    pub fn collect(program: &Program) -> Self {
        let mut registry = Self::default();
        program.visit_with(&mut registry);
        registry
    }

    pub fn get(&self, name: &str) -> Option<&HelperFunction> {
        self.helpers.get(name).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.helpers.values().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(&mut self, name: String, function: &Function) {
        let helper = match HelperFunction::from_function(function) {
            Some(helper) => helper,
            None => return
        };

        self.helpers
            .entry(name)
            .and_modify(|existing| {
                if existing.as_ref() != Some(&helper) {
                    *existing = None;
                }
            })
            .or_insert_with(|| Some(helper.clone()));
    }
}

impl Visit for Registry {
    fn visit_fn_decl(&mut self, fn_decl: &FnDecl) {
        self.register(fn_decl.ident.sym.to_string(), &fn_decl.function);
        fn_decl.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, declarator: &VarDeclarator) {
        if let (Pat::Ident(binding), Some(Expr::Fn(fn_expr))) = (&declarator.name, declarator.init.as_deref()) {
            self.register(binding.id.sym.to_string(), &fn_expr.function);
        }
        declarator.visit_children_with(self);
    }

    fn visit_assign_expr(&mut self, assign: &AssignExpr) {
        if let (AssignOp::Assign, Expr::Fn(fn_expr)) = (assign.op, unparen(&assign.right)) {
            match assign_target_chain(&assign.left) {
                Ok(chain) => self.register(chain, &fn_expr.function),
                Err(e) => debug!("helper function skipped, {}", e)
            }
        }
        assign.visit_children_with(self);
    }
}

/// Inlines calls through forwarding helpers.
///
/// Example:
/// ```js
/// o.h = function (a, b, c) { return a(b, c); };
/// o.h(f, 1, 2);
/// ```
///
/// is replaced with:
///
/// ```js
/// o.h = function (a, b, c) { return a(b, c); };
/// f(1, 2);
/// ```
pub struct Visitor;

impl VisitMut for Visitor {
    fn visit_mut_program(&mut self, program: &mut Program) {
        let registry = Registry::collect(program);
        debug!("found {} helper functions", registry.len());

        if !registry.is_empty() {
            program.visit_mut_with(&mut Inliner {
                registry
            });
        }
    }
}

struct Inliner {
    registry: Registry
}

impl Inliner {
    fn inline(&self, call: &mut CallExpr) -> Option<CallExpr> {
        let callee = match &call.callee {
            Callee::Expr(callee) => dotted_chain(callee).ok()?,
            _ => return None
        };
        let helper = self.registry.get(&callee)?;

        if helper.kind != (HelperKind::Call { forwards: true })
            || call.args.len() != helper.arity
            || call.args.iter().any(|arg| arg.spread.is_some())
        {
            return None;
        }

        let mut args = std::mem::take(&mut call.args);
        let target = args.remove(0);
        Some(CallExpr {
            span: DUMMY_SP,
            callee: Callee::Expr(target.expr),
            args,
            type_args: None
        })
    }
}

impl VisitMut for Inliner {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);

        if let Expr::Call(call) = expr {
            if let Some(inlined) = self.inline(call) {
                *expr = Expr::Call(inlined);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    fn inline(code: &str) -> String {
        transform(code, |program| program.visit_mut_with(&mut Visitor))
    }

    #[test]
    fn test_inline_declared_helper() {
        assert_eq!(
            inline("function h(a, b, c) { return a(b, c); } h(f, 1, 2);"),
            normalize("function h(a, b, c) { return a(b, c); } f(1, 2);")
        );
    }

    #[test]
    fn test_inline_assigned_helpers() {
        assert_eq!(
            inline("o.p.q = function (a, b) { return a(b); }; var k = function (a) { return a(); }; o.p.q(g, 3); k(x);"),
            normalize("o.p.q = function (a, b) { return a(b); }; var k = function (a) { return a(); }; g(3); x();")
        );
    }

    #[test]
    fn test_keeps_other_helpers() {
        let code = r#"
            function h(a, b) { return b(a); }
            function e(a, b) { return a == b; }
            o[k] = function (a) { return a(); };
            h(f, 1); e(1, 2); o[k](x); h(f);
        "#;

        assert_eq!(inline(code), normalize(code));
    }

    #[test]
    fn test_registry() {
        let code = r#"
            function e(a, b) { return a == b; }
            function l(a, b) { return a || b; }
            a.b = function (a, b) { return a(b); };
            function n(a) { return a; }
        "#;
        let mut registry = None;
        transform(code, |program| registry = Some(Registry::collect(program)));
        let registry = registry.unwrap();

        assert_eq!(registry.get("e"), Some(&HelperFunction { arity: 2, kind: HelperKind::Binary(BinaryOp::EqEq) }));
        assert_eq!(registry.get("l"), Some(&HelperFunction { arity: 2, kind: HelperKind::Logical(BinaryOp::LogicalOr) }));
        assert_eq!(registry.get("a.b"), Some(&HelperFunction { arity: 2, kind: HelperKind::Call { forwards: true } }));
        assert_eq!(registry.get("n"), None);
    }

    #[test]
    fn test_conflicting_names_are_dropped() {
        let code = "o.h = function (a, b) { return a(b); }; o.h = function (a, b) { return b(a); }; o.h(f, 1);";
        assert_eq!(inline(code), normalize(code));
    }
}
