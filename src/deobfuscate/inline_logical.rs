use std::collections::HashSet;
use swc_core::common::DUMMY_SP;
use swc_core::common::util::take::Take;
use swc_core::ecma::ast::{AssignExpr, AssignOp, BinaryOp, BindingIdent, Decl, Expr, ExprStmt, Ident, IfStmt, ModuleItem, Pat, PatOrExpr, Program, ReturnStmt, Stmt, VarDecl, VarDeclKind, VarDeclarator};
use swc_core::ecma::atoms::JsWord;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use super::scope::BindingTable;
use super::util::{block, expr_stmt, into_single_stmt, is_stable_target, rewrite_stmts, unparen};

/// Rewrites a value-producing `&&` into an `if` over a temporary.
///
/// Example:
/// ```js
/// function a() {
///     return h instanceof g.Function && g.Function.prototype.toString.call(h);
/// }
/// ```
///
/// is replaced with:
///
/// ```js
/// function a() {
///     var _temp = h instanceof g.Function;
///     if (_temp) {
///         _temp = g.Function.prototype.toString.call(h);
///     }
///     return _temp;
/// }
/// ```
///
/// Only an `&&` that is the whole value of a `return`, of a single variable
/// declarator, of an assignment statement or of an expression statement is
/// rewritten. Assignment targets must be names or property chains.
#[derive(Default)]
pub struct Visitor {
    taken: HashSet<JsWord>,
    counter: usize
}

impl Visitor {
    fn fresh_temp(&mut self) -> Ident {
        loop {
            self.counter += 1;
            let name = match self.counter {
                1 => JsWord::from("_temp"),
                n => JsWord::from(format!("_temp{}", n))
            };
            if self.taken.insert(name.clone()) {
                return Ident::new(name, DUMMY_SP);
            }
        }
    }

    /// Returns the statements computing `expr` and the expression that
    /// holds its value afterwards.
    fn expand(&mut self, expr: Box<Expr>) -> (Vec<Stmt>, Box<Expr>) {
        let bin = match *expr {
            Expr::Paren(paren) if is_and(&paren.expr) => return self.expand(paren.expr),
            Expr::Bin(bin) if bin.op == BinaryOp::LogicalAnd => bin,
            other => return (Vec::new(), Box::new(other))
        };

        let (mut out, left) = self.expand(bin.left);
        // A nested `&&` on the left already produced a temporary
        let temp = match &*left {
            Expr::Ident(temp) if !out.is_empty() => temp.clone(),
            _ => {
                let temp = self.fresh_temp();
                out.push(var_decl(temp.clone(), left));
                temp
            }
        };

        let (mut then, right) = self.expand(bin.right);
        then.push(assign(temp.clone(), right));
        out.push(Stmt::If(IfStmt {
            span: bin.span,
            test: Box::new(Expr::Ident(temp.clone())),
            cons: block(then),
            alt: None
        }));

        (out, Box::new(Expr::Ident(temp)))
    }

    fn rewrite(&mut self, stmt: Stmt) -> Vec<Stmt> {
        match stmt {
            Stmt::Return(ReturnStmt { span, arg: Some(arg) }) if is_and(&arg) => {
                let (mut out, value) = self.expand(arg);
                out.push(Stmt::Return(ReturnStmt {
                    span,
                    arg: Some(value)
                }));
                out
            }
            Stmt::Decl(Decl::Var(mut var)) if var.decls.len() == 1 => {
                let init = match var.decls[0].init.take() {
                    Some(init) if is_and(&init) => init,
                    init => {
                        var.decls[0].init = init;
                        return vec![Stmt::Decl(Decl::Var(var))];
                    }
                };

                let (mut out, value) = self.expand(init);
                var.decls[0].init = Some(value);
                out.push(Stmt::Decl(Decl::Var(var)));
                out
            }
            // The value of a bare `a && b();` is dropped
            Stmt::Expr(ExprStmt { expr, .. }) if is_and(&expr) => self.expand(expr).0,
            Stmt::Expr(ExprStmt { span, expr }) => match *expr {
                Expr::Assign(mut assign) if assign.op == AssignOp::Assign
                    && is_stable_target(&assign.left)
                    && is_and(&assign.right) =>
                {
                    let right = Take::take(&mut *assign.right);
                    let (mut out, value) = self.expand(Box::new(right));
                    assign.right = value;
                    out.push(Stmt::Expr(ExprStmt {
                        span,
                        expr: Box::new(Expr::Assign(assign))
                    }));
                    out
                }
                expr => vec![Stmt::Expr(ExprStmt {
                    span,
                    expr: Box::new(expr)
                })]
            },
            other => vec![other]
        }
    }
}

impl VisitMut for Visitor {
    fn visit_mut_program(&mut self, program: &mut Program) {
        self.taken = BindingTable::analyze(program).symbols().clone();
        program.visit_mut_children_with(self);
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        rewrite_stmts(self, stmts, Self::rewrite);
    }

    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        rewrite_stmts(self, items, Self::rewrite);
    }

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        stmt.visit_mut_children_with(self);

        // A declaration can't stand alone outside of a list
        if matches!(stmt, Stmt::Decl(_)) {
            return;
        }
        *stmt = into_single_stmt(self.rewrite(stmt.take()));
    }
}

fn is_and(expr: &Expr) -> bool {
    matches!(unparen(expr), Expr::Bin(bin) if bin.op == BinaryOp::LogicalAnd)
}

fn var_decl(name: Ident, init: Box<Expr>) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        kind: VarDeclKind::Var,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(BindingIdent::from(name)),
            init: Some(init),
            definite: false
        }]
    })))
}

fn assign(name: Ident, value: Box<Expr>) -> Stmt {
    expr_stmt(Box::new(Expr::Assign(AssignExpr {
        span: DUMMY_SP,
        op: AssignOp::Assign,
        left: PatOrExpr::Pat(Box::new(Pat::Ident(BindingIdent::from(name)))),
        right: value
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    fn expand(code: &str) -> String {
        transform(code, |program| program.visit_mut_with(&mut Visitor::default()))
    }

    #[test]
    fn test_return() {
        assert_eq!(
            expand("function f() { return a && b; }"),
            normalize("function f() { var _temp = a; if (_temp) { _temp = b; } return _temp; }")
        );
    }

    #[test]
    fn test_declarator_with_chain() {
        assert_eq!(
            expand("let x = a && b && c;"),
            normalize("var _temp = a; if (_temp) { _temp = b; } if (_temp) { _temp = c; } let x = _temp;")
        );
    }

    #[test]
    fn test_nested_right_operand() {
        assert_eq!(
            expand("x = a && (b && c);"),
            normalize("var _temp = a; if (_temp) { var _temp2 = b; if (_temp2) { _temp2 = c; } _temp = _temp2; } x = _temp;")
        );
    }

    #[test]
    fn test_temporaries_avoid_existing_names() {
        assert_eq!(
            expand("var _temp = 1; y = a && b;"),
            normalize("var _temp = 1; var _temp2 = a; if (_temp2) { _temp2 = b; } y = _temp2;")
        );
    }

    #[test]
    fn test_expression_statement() {
        assert_eq!(
            expand("a && b(); if (x) c && d();"),
            normalize("var _temp2 = a; if (_temp2) { _temp2 = b(); } if (x) { var _temp = c; if (_temp) { _temp = d(); } }")
        );
    }

    #[test]
    fn test_property_targets() {
        assert_eq!(
            expand("o.p = a && b; q.r.s = c && d;"),
            normalize("var _temp = a; if (_temp) { _temp = b; } o.p = _temp; var _temp2 = c; if (_temp2) { _temp2 = d; } q.r.s = _temp2;")
        );
    }

    #[test]
    fn test_other_positions_are_kept() {
        let code = "if (a && b) c(); f(a && b); o[k()] = a && b; x += a && b; var m = 1, n = a && b;";
        assert_eq!(expand(code), normalize(code));
    }

    #[test]
    fn test_second_run_is_unchanged() {
        let once = expand("function f() { return a && b && c; } o.p = d && e; g && h();");
        assert_eq!(expand(&once), once);
    }
}
