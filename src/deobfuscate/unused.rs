use swc_core::common::util::take::Take;
use swc_core::ecma::ast::{Decl, ForStmt, Ident, ModuleItem, Pat, Program, Stmt, VarDeclOrExpr, VarDeclarator};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};
use tracing::debug;

use super::scope::BindingTable;
use super::util::{into_single_stmt, is_pure, rewrite_stmts};

/// Removes variables and functions that are never referenced.
///
/// Example:
/// ```js
/// function _aegh() { debugger; }
/// var a = 1, b = 2;
/// f(b);
/// ```
///
/// is replaced with:
///
/// ```js
/// var b = 2;
/// f(b);
/// ```
///
/// Only constant bindings are removed, and a declarator is kept if its
/// initializer may have effects. Runs until nothing else can be removed.
pub struct Visitor;

impl VisitMut for Visitor {
    fn visit_mut_program(&mut self, program: &mut Program) {
        loop {
            let table = BindingTable::analyze(program);
            let mut remover = Remover::new(Unused {
                table: &table
            });
            program.visit_mut_with(&mut remover);

            if remover.removed == 0 {
                break;
            }
            debug!("removed {} unused declarations", remover.removed);
        }
    }
}

/// Decides which declarations a [Remover] deletes.
pub(super) trait Removal {
    fn remove_declarator(&self, declarator: &VarDeclarator) -> bool;

    fn remove_function(&self, _ident: &Ident) -> bool {
        false
    }
}

struct Unused<'a> {
    table: &'a BindingTable
}

impl Unused<'_> {
    fn is_unused(&self, ident: &Ident) -> bool {
        self.table
            .get(&ident.to_id())
            .map_or(false, |binding| binding.is_constant() && !binding.is_referenced())
    }
}

impl Removal for Unused<'_> {
    fn remove_declarator(&self, declarator: &VarDeclarator) -> bool {
        match &declarator.name {
            Pat::Ident(binding) => {
                self.is_unused(&binding.id) && declarator.init.as_deref().map_or(true, is_pure)
            }
            _ => false
        }
    }

    fn remove_function(&self, ident: &Ident) -> bool {
        self.is_unused(ident)
    }
}

/// Deletes declarations, then the declaration statements (and `for`
/// initializers) left without declarators.
pub(super) struct Remover<R> {
    rule: R,
    pub(super) removed: usize
}

impl<R: Removal> Remover<R> {
    pub(super) fn new(rule: R) -> Self {
        Self {
            rule,
            removed: 0
        }
    }

    fn rewrite(&mut self, stmt: Stmt) -> Vec<Stmt> {
        let remove = match &stmt {
            Stmt::Decl(Decl::Fn(fn_decl)) if self.rule.remove_function(&fn_decl.ident) => {
                self.removed += 1;
                true
            }
            Stmt::Decl(Decl::Var(var)) => var.decls.is_empty(),
            _ => false
        };

        if remove { Vec::new() } else { vec![stmt] }
    }
}

impl<R: Removal> VisitMut for Remover<R> {
    fn visit_mut_var_declarators(&mut self, declarators: &mut Vec<VarDeclarator>) {
        declarators.visit_mut_children_with(self);

        for declarator in declarators.iter_mut() {
            if self.rule.remove_declarator(declarator) {
                // Mark declarator for deletion
                declarator.name.take();
                self.removed += 1;
            }
        }
        declarators.retain(|node| !node.name.is_invalid());
    }

    fn visit_mut_for_stmt(&mut self, for_stmt: &mut ForStmt) {
        for_stmt.visit_mut_children_with(self);

        if let Some(VarDeclOrExpr::VarDecl(var)) = &for_stmt.init {
            if var.decls.is_empty() {
                for_stmt.init = None;
            }
        }
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
