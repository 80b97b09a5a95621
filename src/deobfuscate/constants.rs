use std::collections::{HashMap, HashSet};
use swc_core::ecma::ast::{Expr, Id, KeyValueProp, Lit, Pat, Program, Prop, PropName, VarDeclarator};
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};
use tracing::debug;

use super::scope::BindingTable;
use super::unused::{Removal, Remover};

/// Replaces references to constant variables with their literal value.
///
/// Example:
/// ```js
/// const z = "l";
/// window.console.log(z);
/// ```
///
/// is replaced with:
///
/// ```js
/// window.console.log("l");
/// ```
///
/// A variable qualifies if it is initialized to a string, number, boolean,
/// `null` or bigint literal, never reassigned, and never referenced before
/// its declaration. The declaration is removed once every reference has
/// been replaced.
pub struct Visitor;

impl VisitMut for Visitor {
    fn visit_mut_program(&mut self, program: &mut Program) {
        let table = BindingTable::analyze(program);

        let mut candidates = Candidates {
            table: &table,
            values: HashMap::new()
        };
        program.visit_with(&mut candidates);
        if candidates.values.is_empty() {
            return;
        }

        let mut replacer = Replacer {
            values: &candidates.values,
            replaced: HashMap::new()
        };
        program.visit_mut_with(&mut replacer);

        let inlined: HashSet<Id> = candidates.values
            .keys()
            .filter(|id| {
                let references = table.get(id).map_or(0, |binding| binding.references);
                replacer.replaced.get(*id).copied().unwrap_or(0) == references
            })
            .cloned()
            .collect();
        debug!("inlined {} constants", inlined.len());

        program.visit_mut_with(&mut Remover::new(Inlined {
            ids: &inlined
        }));
    }
}

/// Finds the declarators whose references can be replaced.
struct Candidates<'a> {
    table: &'a BindingTable,
    values: HashMap<Id, Lit>
}

impl Visit for Candidates<'_> {
    fn visit_var_declarator(&mut self, declarator: &VarDeclarator) {
        declarator.visit_children_with(self);

        let ident = match &declarator.name {
            Pat::Ident(binding) => &binding.id,
            _ => return
        };
        let lit = match declarator.init.as_deref() {
            Some(Expr::Lit(lit @ (Lit::Str(_) | Lit::Num(_) | Lit::Bool(_) | Lit::Null(_) | Lit::BigInt(_)))) => lit,
            _ => return
        };

        let id = ident.to_id();
        let binding = match self.table.get(&id) {
            Some(binding) if binding.is_constant() => binding,
            _ => return
        };
        // Hoisted reads see `undefined`
        if binding.first_reference.is_some() && binding.first_reference < binding.declared_at {
            return;
        }

        self.values.insert(id, lit.clone());
    }
}

struct Replacer<'a> {
    values: &'a HashMap<Id, Lit>,
    replaced: HashMap<Id, usize>
}

impl Replacer<'_> {
    fn value(&mut self, id: Id) -> Option<Lit> {
        let lit = self.values.get(&id)?.clone();
        *self.replaced.entry(id).or_default() += 1;
        Some(lit)
    }
}

impl VisitMut for Replacer<'_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if let Expr::Ident(ident) = expr {
            if let Some(lit) = self.value(ident.to_id()) {
                *expr = Expr::Lit(lit);
            }
            return;
        }
        expr.visit_mut_children_with(self);
    }

    fn visit_mut_prop(&mut self, prop: &mut Prop) {
        if let Prop::Shorthand(ident) = prop {
            if let Some(lit) = self.value(ident.to_id()) {
                *prop = Prop::KeyValue(KeyValueProp {
                    key: PropName::Ident(ident.clone()),
                    value: Box::new(Expr::Lit(lit))
                });
            }
            return;
        }
        prop.visit_mut_children_with(self);
    }
}

struct Inlined<'a> {
    ids: &'a HashSet<Id>
}

impl Removal for Inlined<'_> {
    fn remove_declarator(&self, declarator: &VarDeclarator) -> bool {
        match &declarator.name {
            Pat::Ident(binding) => self.ids.contains(&binding.id.to_id()),
            _ => false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, resolve, transform};

    fn inline(code: &str) -> String {
        transform(code, |program| {
            resolve(program);
            program.visit_mut_with(&mut Visitor);
        })
    }

    #[test]
    fn test_inlines_literal() {
        assert_eq!(inline("var x = 5; f(x);"), normalize("f(5);"));
    }

    #[test]
    fn test_shorthand_properties() {
        assert_eq!(
            inline(r#"const s = "a"; o = { s }; g(s + s);"#),
            normalize(r#"o = { s: "a" }; g("a" + "a");"#)
        );
    }

    #[test]
    fn test_keeps_non_constants() {
        let code = "var y = 1; y = 2; f(y); f(z); var z = 1; var w = a; f(w); var r = /x/; f(r);";
        assert_eq!(inline(code), normalize(code));
    }

    #[test]
    fn test_respects_scopes() {
        assert_eq!(
            inline("var a = 1; function g(a) { return a; } g(a);"),
            normalize("function g(a) { return a; } g(1);")
        );
    }

    #[test]
    fn test_keeps_other_declarators() {
        assert_eq!(inline("var a = 1, b = c(); f(a, b);"), normalize("var b = c(); f(1, b);"));
    }
}
