use swc_core::ecma::ast::{BinaryOp, BinExpr, Expr, Lit};
use swc_core::ecma::atoms::JsWord;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use super::evaluate::{Evaluation, Evaluator};
use super::util::bool_lit;

/// Folds binary expressions over string literals.
///
/// Example:
/// ```js
/// window["c" + "o" + "nsole"]["log"](x + "a" + "b", "a" && "b");
/// ```
///
/// is replaced with:
///
/// ```js
/// window["console"]["log"](x + "ab", true);
/// ```
#[derive(Default)]
pub struct Visitor {
    evaluator: Evaluator
}

impl VisitMut for Visitor {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);

        let bin = match expr {
            Expr::Bin(bin) => bin,
            _ => return
        };

        // "a" && "b"
        if bin.op == BinaryOp::LogicalAnd {
            if let (Some(left), Some(right)) = (str_value(&bin.left), str_value(&bin.right)) {
                *expr = bool_lit(!left.is_empty() && !right.is_empty());
                return;
            }
        }

        if str_value(&bin.left).is_some() && str_value(&bin.right).is_some() {
            if let Evaluation::Known(value) = self.evaluator.evaluate(expr) {
                if let Some(folded @ Expr::Lit(_)) = value.to_expr() {
                    *expr = folded;
                }
            }
            return;
        }

        // (x + "a") + "b"
        if let Some(spliced) = splice_concat(bin) {
            *expr = spliced;
        }
    }
}

fn str_value(expr: &Expr) -> Option<&JsWord> {
    match expr {
        Expr::Lit(Lit::Str(s)) => Some(&s.value),
        _ => None
    }
}

/// Joins the trailing literal of a left-associative `+` chain with the
/// literal after it.
fn splice_concat(bin: &mut BinExpr) -> Option<Expr> {
    if bin.op != BinaryOp::Add {
        return None;
    }
    let right = str_value(&bin.right)?.clone();

    let left = match &mut *bin.left {
        Expr::Bin(left) if left.op == BinaryOp::Add => left,
        _ => return None
    };
    let inner = match &mut *left.right {
        Expr::Lit(Lit::Str(s)) => s,
        _ => return None
    };

    inner.value = JsWord::from(format!("{}{}", inner.value, right));
    inner.raw = None;
    Some(Expr::Bin(left.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    fn fold(code: &str) -> String {
        transform(code, |program| program.visit_mut_with(&mut Visitor::default()))
    }

    #[test]
    fn test_concat() {
        assert_eq!(fold(r#"a = "a" + "b";"#), normalize(r#"a = "ab";"#));
        assert_eq!(fold(r#"a = "x" + "y" + "z";"#), normalize(r#"a = "xyz";"#));
    }

    #[test]
    fn test_logical_and() {
        assert_eq!(fold(r#"a = "a" && "b"; b = "" && "b";"#), normalize("a = true; b = false;"));
    }

    #[test]
    fn test_splices_left_chain() {
        assert_eq!(fold(r#"a = x + "a" + "b";"#), normalize(r#"a = x + "ab";"#));
        assert_eq!(fold(r#"a = x + "a" + "b" + "c";"#), normalize(r#"a = x + "abc";"#));
    }

    #[test]
    fn test_string_comparison() {
        assert_eq!(fold(r#"a = "1" - "1"; b = "a" == "b";"#), normalize("a = 0; b = false;"));
    }

    #[test]
    fn test_non_literal_operands_are_kept() {
        let code = r#"a = x + 1; b = "a" + y; c = 1 + 2; d = x - "a" - "b";"#;
        assert_eq!(fold(code), normalize(code));
    }

    #[test]
    fn test_idempotent() {
        let once = fold(r#"f("a" + "b", x + "c" + "d");"#);
        assert_eq!(fold(&once), once);
    }
}
