use swc_core::common::util::take::Take;
use swc_core::ecma::ast::{AssignExpr, Expr, IfStmt, Stmt};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use super::util::{block, expr_stmt, is_stable_target};

/// Rewrites assignments of a conditional expression into `if`/`else`.
///
/// Example:
/// ```js
/// a.c = a < b ? "less" : "not less";
/// ```
///
/// is replaced with:
///
/// ```js
/// if (a < b) {
///     a.c = "less";
/// } else {
///     a.c = "not less";
/// }
/// ```
pub struct Visitor;

impl VisitMut for Visitor {
    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        if let Some(if_stmt) = expand(stmt) {
            *stmt = if_stmt;
        }
        stmt.visit_mut_children_with(self);
    }
}

fn expand(stmt: &mut Stmt) -> Option<Stmt> {
    let statement = match stmt {
        Stmt::Expr(statement) => statement,
        _ => return None
    };
    let assign = match &mut *statement.expr {
        Expr::Assign(assign) if is_stable_target(&assign.left) => assign,
        _ => return None
    };
    let cond = match &mut *assign.right {
        Expr::Cond(cond) => cond,
        _ => return None
    };

    let branch = |value: Box<Expr>| {
        block(vec![expr_stmt(Box::new(Expr::Assign(AssignExpr {
            span: assign.span,
            op: assign.op,
            left: assign.left.clone(),
            right: value
        })))])
    };
    let cons = branch(Box::new(Take::take(&mut *cond.cons)));
    let alt = branch(Box::new(Take::take(&mut *cond.alt)));

    Some(Stmt::If(IfStmt {
        span: statement.span,
        test: Box::new(Take::take(&mut *cond.test)),
        cons,
        alt: Some(alt)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    fn expand_ifs(code: &str) -> String {
        transform(code, |program| program.visit_mut_with(&mut Visitor))
    }

    #[test]
    fn test_member_target() {
        assert_eq!(
            expand_ifs(r#"a.c = a < b ? "less" : "not less";"#),
            normalize(r#"if (a < b) { a.c = "less"; } else { a.c = "not less"; }"#)
        );
    }

    #[test]
    fn test_compound_and_nested() {
        assert_eq!(
            expand_ifs("x += a ? 1 : b ? 2 : 3;"),
            normalize("if (a) { x += 1; } else { if (b) { x += 2; } else { x += 3; } }")
        );
    }

    #[test]
    fn test_property_chain_targets() {
        assert_eq!(
            expand_ifs(r#"a.b.c = t ? x : y; this.k = t ? 1 : 2; o["k"] = t ? 3 : 4;"#),
            normalize(r#"
                if (t) { a.b.c = x; } else { a.b.c = y; }
                if (t) { this.k = 1; } else { this.k = 2; }
                if (t) { o["k"] = 3; } else { o["k"] = 4; }
            "#)
        );
    }

    #[test]
    fn test_other_shapes_are_kept() {
        let code = "f(a ? 1 : 2); o[k()] = a ? 1 : 2; g().h = a ? 1 : 2; x = a ? 1 : 2, y();";
        assert_eq!(expand_ifs(code), normalize(code));
    }

    #[test]
    fn test_second_run_is_unchanged() {
        let once = expand_ifs("x += a ? 1 : b ? 2 : 3; o.p = c ? d : e;");
        assert_eq!(expand_ifs(&once), once);
    }
}
