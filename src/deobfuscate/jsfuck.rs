use swc_core::common::DUMMY_SP;
use swc_core::ecma::ast::{ArrayLit, Expr, ExprOrSpread, Ident, Program, UnaryOp};
use swc_core::ecma::atoms::JsWord;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use super::evaluate::{Evaluation, Evaluator, Value};
use super::scope::BindingTable;

/// Folds JSFuck-style expressions (`(![] + [])[+[]]`) with the generic
/// evaluator.
///
/// Works top-down so the largest constant subtree is folded in one go. A
/// result is only used if it is a plain literal, so `-1`, `NaN`, `Infinity`
/// and arrays are left as they are. Unary `-` and `void` are never folded.
#[derive(Default)]
pub struct Visitor {
    evaluator: Evaluator,

    /// The program declares its own `undefined`.
    undefined_shadowed: bool
}

impl Visitor {
    fn fold(&self, expr: &Expr) -> Option<Expr> {
        let value = match self.evaluator.evaluate(expr) {
            Evaluation::Known(value) => value,
            Evaluation::Unknown => return None
        };

        match value {
            Value::Array(_) => None,
            Value::Undefined if self.undefined_shadowed => None,
            value => value.to_expr()
        }
    }
}

impl VisitMut for Visitor {
    fn visit_mut_program(&mut self, program: &mut Program) {
        let declared = BindingTable::analyze(program).declared_symbols();
        self.undefined_shadowed = declared.contains(&JsWord::from("undefined"));
        self.evaluator = Evaluator::new(declared);

        program.visit_mut_children_with(self);
    }

    fn visit_mut_array_lit(&mut self, array: &mut ArrayLit) {
        if !self.undefined_shadowed {
            for elem in array.elems.iter_mut().filter(|elem| elem.is_none()) {
                *elem = Some(ExprOrSpread {
                    spread: None,
                    expr: Box::new(Expr::Ident(Ident::new(JsWord::from("undefined"), DUMMY_SP)))
                });
            }
        }
        array.visit_mut_children_with(self);
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        let foldable = match expr {
            Expr::Unary(unary) => !matches!(unary.op, UnaryOp::Minus | UnaryOp::Void),
            Expr::Bin(_) => true,
            _ => false
        };

        if foldable {
            if let Some(folded) = self.fold(expr) {
                *expr = folded;
                return;
            }
        }
        expr.visit_mut_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, resolve, transform};

    fn fold(code: &str) -> String {
        transform(code, |program| {
            resolve(program);
            program.visit_mut_with(&mut Visitor::default());
        })
    }

    #[test]
    fn test_jsfuck_letters() {
        assert_eq!(
            fold("alert((![] + [])[+[]] + (!![] + [])[+!![]]);"),
            normalize(r#"alert("fr");"#)
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(fold("a = +!![] + +!![]; b = 1 - 2; c = 1 / 0;"), normalize("a = 2; b = 1 - 2; c = 1 / 0;"));
    }

    #[test]
    fn test_minus_and_void_are_kept() {
        let code = "a = -1; b = void 0; c = x + 1;";
        assert_eq!(fold(code), normalize(code));
    }

    #[test]
    fn test_holes() {
        assert_eq!(fold("a = [, 1];"), normalize("a = [undefined, 1];"));
    }

    #[test]
    fn test_shadowed_undefined() {
        let code = "var undefined = 1; a = [, 1]; b = [][0] + 1;";
        let result = fold(code);

        assert!(!result.contains("[undefined, 1]"), "{}", result);
    }

    #[test]
    fn test_second_run_is_unchanged() {
        let once = fold("alert((![] + [])[+[]] + (!![] + [])[+!![]]); a = [, +!![] + +!![]]; b = -1;");
        assert_eq!(fold(&once), once);
    }
}
