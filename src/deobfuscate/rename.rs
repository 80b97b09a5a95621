use std::collections::HashMap;
use swc_core::ecma::ast::{FnDecl, Function, Id, Pat, Program, VarDeclarator};
use swc_core::ecma::atoms::JsWord;
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};
use tracing::debug;

use crate::Config;
use super::names::{NameGenerator, NamePool};
use super::scope::{BindingRenamer, BindingTable};

/// Renames function declarations to `func_<name>` and variables to
/// `var_<name>`, in document order.
///
/// Names come from [Config::custom_names] first, then from the name pool.
/// Each binding is renamed together with all of its references.
pub struct Renamer {
    pool: NamePool,
    custom: Vec<String>
}

impl Renamer {
    pub fn new(config: &Config) -> Self {
        Self {
            pool: pool(config),
            custom: config.custom_names.clone()
        }
    }
}

impl VisitMut for Renamer {
    fn visit_mut_program(&mut self, program: &mut Program) {
        let mut declarations = Declarations::default();
        program.visit_with(&mut declarations);

        let generator = NameGenerator::new(self.pool.clone(), self.custom.clone(), Default::default());
        rename(program, declarations.order, generator);
    }
}

/// Renames the parameters of every function to `arg_<name>`.
pub struct ArgumentRenamer {
    pool: NamePool
}

impl ArgumentRenamer {
    pub fn new(config: &Config) -> Self {
        Self {
            pool: pool(config)
        }
    }
}

impl VisitMut for ArgumentRenamer {
    fn visit_mut_program(&mut self, program: &mut Program) {
        let mut params = Params::default();
        program.visit_with(&mut params);

        let generator = NameGenerator::new(self.pool.clone(), Vec::new(), Default::default());
        rename(program, params.order, generator);
    }
}

fn pool(config: &Config) -> NamePool {
    config.name_pool
        .clone()
        .map(NamePool::new)
        .unwrap_or_default()
}

/// Gives every binding in `order` the next generated name, skipping names
/// already in the program.
fn rename(program: &mut Program, order: Vec<(Id, &'static str)>, generator: NameGenerator) {
    let table = BindingTable::analyze(program);
    let mut generator = generator.with_taken(table.symbols().iter().cloned());

    let mut names: HashMap<Id, JsWord> = HashMap::new();
    for (id, prefix) in order {
        if names.contains_key(&id) || table.get(&id).map_or(false, |binding| binding.pinned) {
            continue;
        }
        names.insert(id, generator.next_name(prefix));
    }

    debug!("renaming {} bindings", names.len());
    program.visit_mut_with(&mut BindingRenamer::new(names));
}

#[derive(Default)]
struct Declarations {
    order: Vec<(Id, &'static str)>
}

impl Visit for Declarations {
    fn visit_fn_decl(&mut self, fn_decl: &FnDecl) {
        self.order.push((fn_decl.ident.to_id(), "func_"));
        fn_decl.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, declarator: &VarDeclarator) {
        if let Pat::Ident(binding) = &declarator.name {
            self.order.push((binding.id.to_id(), "var_"));
        }
        declarator.visit_children_with(self);
    }
}

#[derive(Default)]
struct Params {
    order: Vec<(Id, &'static str)>
}

impl Visit for Params {
    fn visit_function(&mut self, function: &Function) {
        for param in &function.params {
            if let Pat::Ident(binding) = &param.pat {
                self.order.push((binding.id.to_id(), "arg_"));
            }
        }
        function.visit_children_with(self);
    }
}
