use swc_core::ecma::ast::{Expr, Lit, UnaryExpr, UnaryOp};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use super::util::bool_lit;

/// Replaces the boolean masks `!![]`, `![]` and `!1` with `true`, `false`
/// and `false`.
pub struct Visitor;

impl VisitMut for Visitor {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if let Some(value) = masked_bool(expr) {
            *expr = bool_lit(value);
            return;
        }
        expr.visit_mut_children_with(self);
    }
}

fn masked_bool(expr: &Expr) -> Option<bool> {
    let arg = match expr {
        Expr::Unary(UnaryExpr { op: UnaryOp::Bang, arg, .. }) => &**arg,
        _ => return None
    };

    match arg {
        Expr::Unary(UnaryExpr { op: UnaryOp::Bang, arg, .. }) if is_empty_array(arg) => Some(true),
        Expr::Array(_) if is_empty_array(arg) => Some(false),
        Expr::Lit(Lit::Num(n)) if n.value == 1.0 => Some(false),
        _ => None
    }
}

fn is_empty_array(expr: &Expr) -> bool {
    matches!(expr, Expr::Array(array) if array.elems.is_empty())
}
