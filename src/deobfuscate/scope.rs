use std::collections::{HashMap, HashSet};
use swc_core::ecma::ast::{ArrowExpr, AssignExpr, AssignOp, AssignPat, AssignPatProp, BindingIdent, BreakStmt, CatchClause, ClassDecl, ClassExpr, ContinueStmt, Decl, ExportDecl, Expr, FnDecl, FnExpr, ForInStmt, ForOfStmt, Id, Ident, ImportDefaultSpecifier, ImportNamedSpecifier, ImportStarAsSpecifier, KeyValuePatProp, KeyValueProp, LabeledStmt, MemberProp, ObjectPatProp, Param, Pat, PrivateName, Program, Prop, PropName, SuperProp, UpdateExpr, VarDecl, VarDeclKind, VarDeclarator};
use swc_core::ecma::atoms::JsWord;
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};

use super::util::pat_idents;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    Param,
    CatchParam,
    Import
}

/// Everything known about one binding, keyed by its [Id] in [BindingTable].
///
/// Ordinals count identifier occurrences in document order, so comparing
/// `declared_at` with `first_reference` tells whether the binding is read
/// before it is declared.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    /// `None` for globals (referenced but never declared).
    pub kind: Option<BindingKind>,
    pub declarations: usize,
    pub references: usize,
    pub assignments: usize,
    pub declared_at: Option<usize>,
    pub first_reference: Option<usize>,

    /// Declared by a shorthand pattern with a default (`{ a = 1 }`), which
    /// can't be renamed without changing the property read.
    pub pinned: bool
}

impl Binding {
    /// Declared exactly once and never reassigned.
    pub fn is_constant(&self) -> bool {
        self.kind.is_some() && self.declarations == 1 && self.assignments == 0
    }

    pub fn is_referenced(&self) -> bool {
        self.references > 0
    }
}

/// Binding information for a whole program.
///
/// Built over a resolver-marked tree, so every scope's bindings have their
/// own [Id]. On an unmarked tree, bindings of the same name merge and every
/// query becomes more conservative.
#[derive(Debug, Default)]
pub struct BindingTable {
    bindings: HashMap<Id, Binding>,

    /// Every identifier name in the program, declared or not.
    symbols: HashSet<JsWord>
}

impl BindingTable {
    pub fn analyze(program: &Program) -> Self {
        let mut collector = Collector {
            table: BindingTable::default(),
            ordinal: 0,
            mode: Mode::Reference,
            for_head: false,
            var_kind: BindingKind::Var
        };
        program.visit_with(&mut collector);
        collector.table
    }

    pub fn get(&self, id: &Id) -> Option<&Binding> {
        self.bindings.get(id)
    }

    pub fn is_constant(&self, id: &Id) -> bool {
        self.get(id).map_or(false, Binding::is_constant)
    }

    pub fn symbols(&self) -> &HashSet<JsWord> {
        &self.symbols
    }

    /// Names of every declared binding, in any scope.
    pub fn declared_symbols(&self) -> HashSet<JsWord> {
        self.bindings
            .iter()
            .filter(|(_, binding)| binding.kind.is_some())
            .map(|(id, _)| id.0.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Reference,
    Declare(BindingKind),
    /// `read` for compound assignments and updates, which also read the target.
    Assign { read: bool }
}

struct Collector {
    table: BindingTable,
    ordinal: usize,
    mode: Mode,
    for_head: bool,
    var_kind: BindingKind
}

impl Collector {
    fn record(&mut self, ident: &Ident) {
        self.ordinal += 1;
        self.table.symbols.insert(ident.sym.clone());

        let ordinal = self.ordinal;
        let binding = self.table.bindings.entry(ident.to_id()).or_default();
        match self.mode {
            Mode::Reference => {
                binding.references += 1;
                binding.first_reference.get_or_insert(ordinal);
            }
            Mode::Declare(kind) => {
                binding.kind.get_or_insert(kind);
                binding.declarations += 1;
                binding.declared_at.get_or_insert(ordinal);
                // `for (var k in o)` assigns `k` on every iteration
                if self.for_head {
                    binding.assignments += 1;
                }
            }
            Mode::Assign { read } => {
                binding.assignments += 1;
                if read {
                    binding.references += 1;
                    binding.first_reference.get_or_insert(ordinal);
                }
            }
        }
    }

    fn with_mode<N: VisitWith<Self> + ?Sized>(&mut self, mode: Mode, node: &N) {
        let old = std::mem::replace(&mut self.mode, mode);
        node.visit_with(self);
        self.mode = old;
    }

    fn declare(&mut self, kind: BindingKind, ident: &Ident) {
        let old = std::mem::replace(&mut self.mode, Mode::Declare(kind));
        self.record(ident);
        self.mode = old;
    }
}

impl Visit for Collector {
    fn visit_ident(&mut self, ident: &Ident) {
        self.record(ident);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => self.record(ident),
            _ => {
                let old = std::mem::replace(&mut self.mode, Mode::Reference);
                expr.visit_children_with(self);
                self.mode = old;
            }
        }
    }

    fn visit_var_decl(&mut self, var: &VarDecl) {
        let old = self.var_kind;
        self.var_kind = match var.kind {
            VarDeclKind::Var => BindingKind::Var,
            VarDeclKind::Let => BindingKind::Let,
            VarDeclKind::Const => BindingKind::Const
        };
        var.visit_children_with(self);
        self.var_kind = old;
    }

    fn visit_var_declarator(&mut self, declarator: &VarDeclarator) {
        let kind = self.var_kind;
        self.with_mode(Mode::Declare(kind), &declarator.name);

        let for_head = std::mem::replace(&mut self.for_head, false);
        self.with_mode(Mode::Reference, &declarator.init);
        self.for_head = for_head;
    }

    fn visit_fn_decl(&mut self, fn_decl: &FnDecl) {
        self.declare(BindingKind::Function, &fn_decl.ident);
        self.with_mode(Mode::Reference, &fn_decl.function);
    }

    fn visit_fn_expr(&mut self, fn_expr: &FnExpr) {
        if let Some(ident) = &fn_expr.ident {
            self.declare(BindingKind::Function, ident);
        }
        self.with_mode(Mode::Reference, &fn_expr.function);
    }

    fn visit_class_decl(&mut self, class_decl: &ClassDecl) {
        self.declare(BindingKind::Class, &class_decl.ident);
        self.with_mode(Mode::Reference, &class_decl.class);
    }

    fn visit_class_expr(&mut self, class_expr: &ClassExpr) {
        if let Some(ident) = &class_expr.ident {
            self.declare(BindingKind::Class, ident);
        }
        self.with_mode(Mode::Reference, &class_expr.class);
    }

    fn visit_param(&mut self, param: &Param) {
        self.with_mode(Mode::Reference, &param.decorators);
        self.with_mode(Mode::Declare(BindingKind::Param), &param.pat);
    }

    fn visit_arrow_expr(&mut self, arrow: &ArrowExpr) {
        self.with_mode(Mode::Declare(BindingKind::Param), &arrow.params);
        self.with_mode(Mode::Reference, &arrow.body);
    }

    fn visit_catch_clause(&mut self, catch: &CatchClause) {
        self.with_mode(Mode::Declare(BindingKind::CatchParam), &catch.param);
        self.with_mode(Mode::Reference, &catch.body);
    }

    fn visit_assign_expr(&mut self, assign: &AssignExpr) {
        let read = assign.op != AssignOp::Assign;
        self.with_mode(Mode::Assign { read }, &assign.left);
        self.with_mode(Mode::Reference, &assign.right);
    }

    fn visit_update_expr(&mut self, update: &UpdateExpr) {
        self.with_mode(Mode::Assign { read: true }, &update.arg);
    }

    fn visit_for_in_stmt(&mut self, for_in: &ForInStmt) {
        self.for_head = true;
        self.with_mode(Mode::Assign { read: false }, &for_in.left);
        self.for_head = false;
        self.with_mode(Mode::Reference, &for_in.right);
        self.with_mode(Mode::Reference, &for_in.body);
    }

    fn visit_for_of_stmt(&mut self, for_of: &ForOfStmt) {
        self.for_head = true;
        self.with_mode(Mode::Assign { read: false }, &for_of.left);
        self.for_head = false;
        self.with_mode(Mode::Reference, &for_of.right);
        self.with_mode(Mode::Reference, &for_of.body);
    }

    // Defaults are read, not declared
    fn visit_assign_pat(&mut self, assign: &AssignPat) {
        assign.left.visit_with(self);
        self.with_mode(Mode::Reference, &assign.right);
    }

    fn visit_assign_pat_prop(&mut self, prop: &AssignPatProp) {
        self.record(&prop.key);
        if prop.value.is_some() {
            if let Some(binding) = self.table.bindings.get_mut(&prop.key.to_id()) {
                binding.pinned = true;
            }
        }
        self.with_mode(Mode::Reference, &prop.value);
    }

    fn visit_member_prop(&mut self, prop: &MemberProp) {
        if let MemberProp::Computed(computed) = prop {
            self.with_mode(Mode::Reference, &computed.expr);
        }
    }

    fn visit_super_prop(&mut self, prop: &SuperProp) {
        if let SuperProp::Computed(computed) = prop {
            self.with_mode(Mode::Reference, &computed.expr);
        }
    }

    fn visit_prop_name(&mut self, name: &PropName) {
        if let PropName::Computed(computed) = name {
            self.with_mode(Mode::Reference, &computed.expr);
        }
    }

    fn visit_private_name(&mut self, _: &PrivateName) {}

    fn visit_labeled_stmt(&mut self, labeled: &LabeledStmt) {
        labeled.body.visit_with(self);
    }

    fn visit_break_stmt(&mut self, _: &BreakStmt) {}

    fn visit_continue_stmt(&mut self, _: &ContinueStmt) {}

    fn visit_import_named_specifier(&mut self, specifier: &ImportNamedSpecifier) {
        self.declare(BindingKind::Import, &specifier.local);
    }

    fn visit_import_default_specifier(&mut self, specifier: &ImportDefaultSpecifier) {
        self.declare(BindingKind::Import, &specifier.local);
    }

    fn visit_import_star_as_specifier(&mut self, specifier: &ImportStarAsSpecifier) {
        self.declare(BindingKind::Import, &specifier.local);
    }

    // Exported bindings are used by whoever imports them
    fn visit_export_decl(&mut self, export: &ExportDecl) {
        export.visit_children_with(self);

        let idents = match &export.decl {
            Decl::Fn(fn_decl) => vec![&fn_decl.ident],
            Decl::Class(class_decl) => vec![&class_decl.ident],
            Decl::Var(var) => var.decls.iter().flat_map(|d| pat_idents(&d.name)).collect(),
            _ => Vec::new()
        };
        for ident in idents {
            let binding = self.table.bindings.entry(ident.to_id()).or_default();
            binding.references += 1;
        }
    }
}

/// Renames bindings, and every reference to them, by [Id].
///
/// Property names, labels and private names are left alone. A shorthand
/// property (`{ a }`) is expanded to `{ a: renamed }` so the key survives.
pub struct BindingRenamer {
    names: HashMap<Id, JsWord>
}

impl BindingRenamer {
    pub fn new(names: HashMap<Id, JsWord>) -> Self {
        Self {
            names
        }
    }

    fn renamed(&self, ident: &Ident) -> Option<Ident> {
        self.names.get(&ident.to_id()).map(|sym| Ident {
            span: ident.span,
            sym: sym.clone(),
            optional: ident.optional
        })
    }
}

impl VisitMut for BindingRenamer {
    fn visit_mut_ident(&mut self, ident: &mut Ident) {
        if let Some(renamed) = self.renamed(ident) {
            *ident = renamed;
        }
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = prop {
            if let Some(renamed) = self.renamed(ident) {
                *prop = Prop::KeyValue(KeyValueProp {
                    key: PropName::Ident(ident.clone()),
                    value: Box::new(Expr::Ident(renamed))
                });
            }
            return;
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_object_pat_prop(&mut self, prop: &mut ObjectPatProp) {
        if let ObjectPatProp::Assign(assign) = prop {
            if assign.value.is_none() {
                if let Some(renamed) = self.renamed(&assign.key) {
                    *prop = ObjectPatProp::KeyValue(KeyValuePatProp {
                        key: PropName::Ident(assign.key.clone()),
                        value: Box::new(Pat::Ident(BindingIdent::from(renamed)))
                    });
                    return;
                }
            }
        }
        prop.visit_mut_children_with(self);
    }

    fn visit_mut_member_prop(&mut self, prop: &mut MemberProp) {
        if let MemberProp::Computed(computed) = prop {
            computed.visit_mut_with(self);
        }
    }

    fn visit_mut_super_prop(&mut self, prop: &mut SuperProp) {
        if let SuperProp::Computed(computed) = prop {
            computed.visit_mut_with(self);
        }
    }

    fn visit_mut_prop_name(&mut self, name: &mut PropName) {
        if let PropName::Computed(computed) = name {
            computed.visit_mut_with(self);
        }
    }

    fn visit_mut_private_name(&mut self, _: &mut PrivateName) {}

    fn visit_mut_labeled_stmt(&mut self, labeled: &mut LabeledStmt) {
        labeled.body.visit_mut_with(self);
    }

    fn visit_mut_break_stmt(&mut self, _: &mut BreakStmt) {}

    fn visit_mut_continue_stmt(&mut self, _: &mut ContinueStmt) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{resolve, transform};

    /// Finds the binding of the first declaration named `name`.
    fn binding(table: &BindingTable, name: &str) -> Binding {
        table.bindings
            .iter()
            .filter(|(id, b)| &*id.0 == name && b.kind.is_some())
            .map(|(_, b)| b.clone())
            .next()
            .expect("binding not found")
    }

    fn analyze(code: &str) -> BindingTable {
        let mut table = None;
        transform(code, |program| {
            resolve(program);
            table = Some(BindingTable::analyze(program));
        });
        table.expect("analysis didn't run")
    }

    #[test]
    fn test_counts() {
        let table = analyze("var a = 1, b = 2; b = a; a.x = 3; var c; c += 1; function f() { return f; }");

        let a = binding(&table, "a");
        assert_eq!((a.declarations, a.references, a.assignments), (1, 2, 0));
        assert!(a.is_constant());

        let b = binding(&table, "b");
        assert_eq!((b.references, b.assignments), (0, 1));
        assert!(!b.is_constant());

        let c = binding(&table, "c");
        assert_eq!((c.references, c.assignments), (1, 1));

        assert_eq!(binding(&table, "f").kind, Some(BindingKind::Function));
    }

    #[test]
    fn test_property_names_are_not_references() {
        let table = analyze("var a; o.a; o = { a: 1 }; label: for (;;) { break label; }");

        assert_eq!(binding(&table, "a").references, 0);
        assert!(table.symbols().contains(&JsWord::from("o")));
    }

    #[test]
    fn test_scopes_are_separate() {
        let table = analyze("var a = 1; function f(a) { return a; } f(a);");
        let declared: Vec<_> = table.bindings
            .iter()
            .filter(|(id, b)| &*id.0 == "a" && b.kind.is_some())
            .map(|(_, b)| b.kind)
            .collect();

        assert_eq!(declared.len(), 2);
        assert!(declared.contains(&Some(BindingKind::Param)));
    }

    #[test]
    fn test_reference_before_declaration() {
        let table = analyze("g(x); var x = 1;");
        let x = binding(&table, "x");

        assert!(x.first_reference < x.declared_at);
    }

    #[test]
    fn test_for_in_head_is_an_assignment() {
        let table = analyze("for (var k in o) {}");

        assert!(!binding(&table, "k").is_constant());
    }

    #[test]
    fn test_renamer_expands_shorthand() {
        let result = transform("var a = 1; var o = { a }; var { a: b } = o; ({ a } = o);", |program| {
            resolve(program);
            let table = BindingTable::analyze(program);
            let id = table.bindings
                .keys()
                .find(|id| &*id.0 == "a")
                .expect("no binding")
                .clone();
            program.visit_mut_with(&mut BindingRenamer::new(HashMap::from([(id, JsWord::from("renamed"))])));
        });

        assert!(result.contains("var renamed = 1"), "{}", result);
        assert!(result.contains("a: renamed"), "{}", result);
        assert!(result.contains("a: b"), "{}", result);
    }
}
