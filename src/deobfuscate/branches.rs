use swc_core::common::util::take::Take;
use swc_core::ecma::ast::{Expr, IfStmt, Lit, ModuleItem, Stmt};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use super::util::{expr_stmt, guard_dangling_else, has_lexical_decl, into_single_stmt, is_pure, negate, rewrite_stmts, unparen};

/// Removes conditionals whose test is a boolean literal, keeping the
/// branch that is taken.
///
/// Example:
/// ```js
/// if (true) { a(); } else { b(); }
/// if (false) c();
/// ```
///
/// is replaced with:
///
/// ```js
/// a();
/// ```
///
/// A block branch is spread into the enclosing list unless it declares
/// block-scoped names.
pub struct UselessIf;

impl UselessIf {
    fn rewrite(&mut self, stmt: Stmt) -> Vec<Stmt> {
        let if_stmt = match stmt {
            Stmt::If(if_stmt) => if_stmt,
            other => return vec![other]
        };
        let test = match unparen(&if_stmt.test) {
            Expr::Lit(Lit::Bool(b)) => b.value,
            _ => return vec![Stmt::If(if_stmt)]
        };

        let taken = if test { Some(if_stmt.cons) } else { if_stmt.alt };
        match taken.map(|stmt| *stmt) {
            None => Vec::new(),
            Some(Stmt::Block(block)) if !has_lexical_decl(&block.stmts) => block.stmts,
            Some(stmt) => vec![stmt]
        }
    }
}

impl VisitMut for UselessIf {
    fn visit_mut_if_stmt(&mut self, if_stmt: &mut IfStmt) {
        if_stmt.visit_mut_children_with(self);
        guard_dangling_else(if_stmt);
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        rewrite_stmts(self, stmts, Self::rewrite);
    }

    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        rewrite_stmts(self, items, Self::rewrite);
    }

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        stmt.visit_mut_children_with(self);
        *stmt = into_single_stmt(self.rewrite(stmt.take()));
    }
}

/// Prunes branches that can't do anything.
///
/// A branch is dead if it is an empty statement or a block of dead
/// statements. A dead `else` is dropped, a dead `then` with a live `else`
/// becomes `if (!test) else`, and an `if` with no live branch is reduced to
/// its test, or removed when the test has no effects.
pub struct DeadElse;

impl DeadElse {
    fn rewrite(&mut self, stmt: Stmt) -> Vec<Stmt> {
        let mut if_stmt = match stmt {
            Stmt::If(if_stmt) => if_stmt,
            other => return vec![other]
        };

        if if_stmt.alt.as_deref().map_or(false, is_dead) {
            if_stmt.alt = None;
        }
        if !is_dead(&if_stmt.cons) {
            return vec![Stmt::If(if_stmt)];
        }

        match if_stmt.alt.take() {
            Some(alt) => vec![Stmt::If(IfStmt {
                test: negate(if_stmt.test),
                cons: alt,
                alt: None,
                ..if_stmt
            })],
            None if is_pure(&if_stmt.test) => Vec::new(),
            None => vec![expr_stmt(if_stmt.test)]
        }
    }
}

fn is_dead(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Empty(_) => true,
        Stmt::Block(block) => block.stmts.iter().all(is_dead),
        _ => false
    }
}

impl VisitMut for DeadElse {
    fn visit_mut_if_stmt(&mut self, if_stmt: &mut IfStmt) {
        if_stmt.visit_mut_children_with(self);
        guard_dangling_else(if_stmt);
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        rewrite_stmts(self, stmts, Self::rewrite);
    }

    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        rewrite_stmts(self, items, Self::rewrite);
    }

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        stmt.visit_mut_children_with(self);
        *stmt = into_single_stmt(self.rewrite(stmt.take()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    fn useless_if(code: &str) -> String {
        transform(code, |program| program.visit_mut_with(&mut UselessIf))
    }

    fn dead_else(code: &str) -> String {
        transform(code, |program| program.visit_mut_with(&mut DeadElse))
    }

    #[test]
    fn test_useless_if_splices_taken_branch() {
        assert_eq!(
            useless_if("if (true) { a(); b(); } else { c(); } if (false) d(); else e(); if (false) f();"),
            normalize("a(); b(); e();")
        );
    }

    #[test]
    fn test_useless_if_keeps_lexical_blocks() {
        assert_eq!(
            useless_if("if (true) { let x = 1; g(x); }"),
            normalize("{ let x = 1; g(x); }")
        );
    }

    #[test]
    fn test_useless_if_outside_lists() {
        assert_eq!(
            useless_if("for (;;) if (true) { a(); b(); }"),
            normalize("for (;;) { a(); b(); }")
        );
        assert_eq!(useless_if("while (x) if (false) a();"), normalize("while (x) ;"));
    }

    #[test]
    fn test_useless_if_keeps_other_tests() {
        let code = "if (x) a(); if (1) b();";
        assert_eq!(useless_if(code), normalize(code));
    }

    #[test]
    fn test_dead_else_is_dropped() {
        assert_eq!(dead_else("if (x) a(); else { ; {} }"), normalize("if (x) a();"));
    }

    #[test]
    fn test_dead_then_inverts() {
        assert_eq!(dead_else("if (x) {} else b();"), normalize("if (!x) b();"));
        assert_eq!(dead_else("if (x && y) ; else b();"), normalize("if (!(x && y)) b();"));
    }

    #[test]
    fn test_else_stays_with_outer_if() {
        assert_eq!(
            dead_else("if (p) if (x) {} else b(); else c();"),
            normalize("if (p) { if (!x) b(); } else c();")
        );
        assert_eq!(
            useless_if("if (p) if (false) ; else { if (x) a(); } else c();"),
            normalize("if (p) { if (x) a(); } else c();")
        );
        assert_eq!(
            useless_if("if (p) if (true) { for (;;) if (x) a(); } else d(); else c();"),
            normalize("if (p) { for (;;) if (x) a(); } else c();")
        );
    }

    #[test]
    fn test_second_run_is_unchanged() {
        let code = "if (p) if (x) {} else b(); else c(); if (true) { if (false) d(); else { e(); } } if (y) ; else { ; }";
        let once = dead_else(&useless_if(code));

        assert_eq!(dead_else(&useless_if(&once)), once);
        assert_eq!(useless_if(&once), once);
        assert_eq!(dead_else(&once), once);
    }

    #[test]
    fn test_dead_if_is_removed() {
        assert_eq!(dead_else("a(); if (x) {} b();"), normalize("a(); b();"));
        assert_eq!(dead_else("if (f()) {} else {}"), normalize("f();"));
    }
}
