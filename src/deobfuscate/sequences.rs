use swc_core::common::DUMMY_SP;
use swc_core::common::util::take::Take;
use swc_core::ecma::ast::{AssignOp, Callee, Expr, ExprStmt, ForStmt, LabeledStmt, ModuleItem, ParenExpr, ReturnStmt, Stmt, VarDeclOrExpr};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use super::util::{expr_stmt, into_single_stmt, is_stable_target, rewrite_stmts, undefined, unparen};

/// Splits comma expressions into separate statements.
///
/// Example:
/// ```js
/// function f() {
///     return a(), b = (c(), d), e;
/// }
/// ```
///
/// is replaced with:
///
/// ```js
/// function f() {
///     a();
///     c();
///     b = d;
///     return e;
/// }
/// ```
///
/// Handles `return` arguments, `if` tests, the right side of an assignment
/// statement, expression statements and `for` initializers.
pub struct Visitor;

impl Visitor {
    fn rewrite(&mut self, stmt: Stmt) -> Vec<Stmt> {
        split(stmt)
    }
}

impl VisitMut for Visitor {
    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        rewrite_stmts(self, stmts, Self::rewrite);
    }

    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        rewrite_stmts(self, items, Self::rewrite);
    }

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        stmt.visit_mut_children_with(self);
        *stmt = into_single_stmt(split(stmt.take()));
    }

    // The labelled statement itself hoists a `for` initializer, so the
    // loop stays directly under its label.
    fn visit_mut_labeled_stmt(&mut self, labeled: &mut LabeledStmt) {
        labeled.body.visit_mut_children_with(self);
    }
}

fn split(stmt: Stmt) -> Vec<Stmt> {
    match stmt {
        Stmt::Return(ReturnStmt { span, arg: Some(arg) }) if is_seq(&arg) => {
            let mut exprs = flatten(arg);
            let last = pop_last(&mut exprs);

            let mut out = to_stmts(exprs);
            out.push(Stmt::Return(ReturnStmt {
                span,
                arg: Some(last)
            }));
            out
        }
        Stmt::If(mut if_stmt) if is_seq(&if_stmt.test) => {
            let mut exprs = flatten(Box::new(Take::take(&mut *if_stmt.test)));
            if_stmt.test = pop_last(&mut exprs);

            let mut out = to_stmts(exprs);
            out.push(Stmt::If(if_stmt));
            out
        }
        Stmt::Expr(ExprStmt { span, expr }) => match *expr {
            Expr::Assign(mut assign) if assign.op == AssignOp::Assign
                && is_seq(&assign.right)
                && is_stable_target(&assign.left) =>
            {
                let mut exprs = flatten(Box::new(Take::take(&mut *assign.right)));
                assign.right = pop_last(&mut exprs);

                let mut out = to_stmts(exprs);
                out.push(Stmt::Expr(ExprStmt {
                    span,
                    expr: Box::new(Expr::Assign(assign))
                }));
                out
            }
            expr if is_seq(&expr) => to_stmts(flatten(Box::new(expr))),
            expr => vec![Stmt::Expr(ExprStmt {
                span,
                expr: Box::new(expr)
            })]
        },
        Stmt::For(mut for_stmt) => {
            let mut out = hoist_for_init(&mut for_stmt);
            out.push(Stmt::For(for_stmt));
            out
        }
        Stmt::Labeled(mut labeled) => {
            let mut out = match &mut *labeled.body {
                Stmt::For(for_stmt) => hoist_for_init(for_stmt),
                _ => Vec::new()
            };
            out.push(Stmt::Labeled(labeled));
            out
        }
        other => vec![other]
    }
}

/// Moves all but the last expression of a comma initializer in front of
/// the loop.
fn hoist_for_init(for_stmt: &mut ForStmt) -> Vec<Stmt> {
    let init = match &mut for_stmt.init {
        Some(VarDeclOrExpr::Expr(init)) if is_seq(init) => init,
        _ => return Vec::new()
    };

    let mut exprs = flatten(Box::new(Take::take(&mut **init)));
    *init = pop_last(&mut exprs);
    to_stmts(exprs)
}

fn is_seq(expr: &Expr) -> bool {
    matches!(unparen(expr), Expr::Seq(_))
}

/// The elements of a (possibly nested) comma expression, in evaluation order.
fn flatten(expr: Box<Expr>) -> Vec<Box<Expr>> {
    match *expr {
        Expr::Seq(seq) => seq.exprs.into_iter().flat_map(flatten).collect(),
        Expr::Paren(paren) if is_seq(&paren.expr) => flatten(paren.expr),
        other => vec![Box::new(other)]
    }
}

fn pop_last(exprs: &mut Vec<Box<Expr>>) -> Box<Expr> {
    exprs.pop().unwrap_or_else(|| Box::new(undefined()))
}

/// Turns each expression into a statement, splitting the results again.
fn to_stmts(exprs: Vec<Box<Expr>>) -> Vec<Stmt> {
    exprs
        .into_iter()
        .map(|expr| {
            if is_iife(&expr) {
                expr_stmt(Box::new(Expr::Paren(ParenExpr {
                    span: DUMMY_SP,
                    expr
                })))
            } else {
                expr_stmt(expr)
            }
        })
        .flat_map(split)
        .collect()
}

fn is_iife(expr: &Expr) -> bool {
    match unparen(expr) {
        Expr::Call(call) => matches!(&call.callee, Callee::Expr(callee) if matches!(unparen(callee), Expr::Fn(_))),
        _ => false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    fn desugar(code: &str) -> String {
        transform(code, |program| program.visit_mut_with(&mut Visitor))
    }

    #[test]
    fn test_return() {
        assert_eq!(
            desugar("function f() { return a(), b(), c; }"),
            normalize("function f() { a(); b(); return c; }")
        );
    }

    #[test]
    fn test_if_test() {
        assert_eq!(desugar("if (a(), b) c();"), normalize("a(); if (b) c();"));
    }

    #[test]
    fn test_assignment() {
        assert_eq!(desugar("x = (a(), b); o.p = (c(), d);"), normalize("a(); x = b; c(); o.p = d;"));
    }

    #[test]
    fn test_nested() {
        assert_eq!(
            desugar("function f() { return a(), b = (c(), d), e; }"),
            normalize("function f() { a(); c(); b = d; return e; }")
        );
    }

    #[test]
    fn test_expression_statement() {
        assert_eq!(desugar("a(), b(), c();"), normalize("a(); b(); c();"));
    }

    #[test]
    fn test_for_init() {
        assert_eq!(
            desugar("for (a(), i = 0; i < 1; i++) {}"),
            normalize("a(); for (i = 0; i < 1; i++) {}")
        );
        assert_eq!(
            desugar("l: for (a(), i = 0; ; ) { continue l; }"),
            normalize("a(); l: for (i = 0; ; ) { continue l; }")
        );
    }

    #[test]
    fn test_outside_lists() {
        assert_eq!(
            desugar("function f() { if (x) return a(), b; }"),
            normalize("function f() { if (x) { a(); return b; } }")
        );
    }

    #[test]
    fn test_iife() {
        let result = desugar("function f() { return function () { g(); }(), x; }");

        assert!(result.contains("return x"), "{}", result);
        assert!(!result.contains("return function"), "{}", result);
        assert!(result.contains("(function"), "{}", result);
    }

    #[test]
    fn test_property_chain_target() {
        assert_eq!(
            desugar("p.q.r = (c(), d); this.s = (e(), f);"),
            normalize("c(); p.q.r = d; e(); this.s = f;")
        );
    }

    #[test]
    fn test_unstable_target_is_kept() {
        let code = "o[k()] = (a(), b); g().h = (c(), d);";
        assert_eq!(desugar(code), normalize(code));
    }

    #[test]
    fn test_second_run_is_unchanged() {
        let once = desugar("function f() { if (x) return a(), b = (c(), d), e; } for (g(), i = 0; ;) {} h(), j();");
        assert_eq!(desugar(&once), once);
    }
}
