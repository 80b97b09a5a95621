use swc_core::ecma::ast::{ModuleItem, Stmt};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

/// Removes empty statements (stray `;`) from statement lists.
///
/// A `;` that is the whole body of a loop or an `if` is left alone.
pub struct Visitor;

impl VisitMut for Visitor {
    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        stmts.visit_mut_children_with(self);
        stmts.retain(|stmt| !matches!(stmt, Stmt::Empty(..)));
    }

    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        items.visit_mut_children_with(self);
        items.retain(|item| !matches!(item, ModuleItem::Stmt(Stmt::Empty(..))));
    }
}
