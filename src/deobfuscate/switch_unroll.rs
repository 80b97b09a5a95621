use std::collections::HashMap;
use swc_core::common::util::take::Take;
use swc_core::ecma::ast::{AssignOp, BreakStmt, Callee, Decl, Expr, ExprStmt, ForStmt, Ident, Lit, MemberProp, ModuleItem, Pat, Program, Stmt, SwitchCase, SwitchStmt, UnaryOp, UpdateOp, VarDecl, VarDeclOrExpr};
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};
use tracing::{debug, warn};

use super::{PatternError, report};
use super::fingerprint::{fingerprint_expr, fingerprint_var_decl};
use super::util::{assign_target_chain, assign_target_ident, block, dotted_chain, expr_stmt, rewrite_stmts, unparen};

/// Reverses switch-based control-flow flattening.
///
/// Example:
/// ```js
/// for (f = "1|0".split("|"), g = 0; ; ) {
///     switch (f[g++]) {
///         case "0": a(); continue;
///         case "1": b(); continue;
///     }
///     break;
/// }
/// ```
///
/// is replaced with:
///
/// ```js
/// f = "1|0".split("|");
/// b();
/// a();
/// ```
///
/// Loops whose order string is missing or doesn't match their cases are left
/// alone.
pub fn deobfuscate(program: &mut Program) -> Result<(), PatternError> {
    let orders = OrderStrings::collect(program);
    debug!("found {} order strings", orders.len());

    let mut unroller = Unroller {
        orders: &orders,
        unrolled: 0,
        skipped: Vec::new()
    };
    program.visit_mut_with(&mut unroller);

    if unroller.unrolled == 0 {
        return Err(unroller.skipped
            .into_iter()
            .next()
            .unwrap_or(PatternError::Mismatch("no flattened loop")));
    }

    debug!("unrolled {} loops", unroller.unrolled);
    for e in unroller.skipped {
        warn!("switch unrolling: {}", e);
    }
    Ok(())
}

/// Runs [deobfuscate] as a pass, logging why it didn't apply.
pub struct Visitor;

impl VisitMut for Visitor {
    fn visit_mut_program(&mut self, program: &mut Program) {
        report("switch unrolling", deobfuscate(program));
    }
}

/// Order strings (`"2|0|1"`) assigned in the program, keyed by the
/// fingerprint of the statement or initializer assigning them and the name
/// they are assigned to.
#[derive(Default)]
pub struct OrderStrings {
    orders: HashMap<(String, String), String>,

    /// Strings containing `|`, by the last segment of their target, for
    /// `x.y = "1|0"; f = x.y.split("|")`.
    remembered: HashMap<String, String>
}

impl OrderStrings {
    pub fn collect(program: &Program) -> Self {
        let mut orders = Self::default();
        program.visit_with(&mut orders);
        orders
    }

    pub fn get(&self, fingerprint: &str, target: &str) -> Option<&str> {
        self.orders
            .get(&(fingerprint.to_string(), target.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Records the `(target, descriptor)` pairs of one owner. The owner is
    /// only fingerprinted if one of them can be an order string.
    fn record<F>(&mut self, fingerprint: F, assignments: Vec<(String, String)>)
        where F: FnOnce() -> Result<String, PatternError>
    {
        let assignments: Vec<_> = assignments
            .into_iter()
            .filter(|(_, descriptor)| descriptor.contains('|') || descriptor.contains("split"))
            .collect();
        if assignments.is_empty() {
            return;
        }
        let prefix = match fingerprint() {
            Ok(prefix) => prefix,
            Err(_) => return
        };

        for (target, descriptor) in assignments {
            let segments: Vec<&str> = descriptor.split('.').collect();

            if descriptor.contains('|') {
                let head = segments[0];
                let last = target.rsplit('.').next().unwrap_or(&target);
                self.remembered.insert(last.to_string(), head.to_string());

                if head.contains('|') {
                    self.orders.insert((prefix.clone(), target), head.to_string());
                }
            } else if let Some(position) = segments.iter().position(|s| *s == "split") {
                let order = position
                    .checked_sub(1)
                    .and_then(|i| self.remembered.get(segments[i]))
                    .cloned();
                if let Some(order) = order {
                    self.orders.insert((prefix.clone(), target), order);
                }
            }
        }
    }
}

/// Describes an assigned value: `"1|0"` for a literal, `b` for a name or a
/// call of it, and `b.c`, `b.c.d`, `b().c`, `this.c` or `"x".c` for method
/// calls.
fn descriptor(expr: &Expr) -> Option<String> {
    match unparen(expr) {
        Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
        Expr::Lit(Lit::Num(n)) => Some(n.value.to_string()),
        Expr::Lit(Lit::Bool(b)) => Some(b.value.to_string()),
        Expr::Ident(id) => Some(id.sym.to_string()),
        Expr::Call(call) => {
            let callee = match &call.callee {
                Callee::Expr(callee) => unparen(callee),
                _ => return None
            };
            match callee {
                Expr::Ident(id) => Some(id.sym.to_string()),
                Expr::Member(member) => {
                    let method = match &member.prop {
                        MemberProp::Ident(prop) => &*prop.sym,
                        _ => return None
                    };
                    let object = match unparen(&member.obj) {
                        Expr::Ident(id) => id.sym.to_string(),
                        Expr::This(_) => String::from("this"),
                        Expr::Lit(Lit::Str(s)) => s.value.to_string(),
                        Expr::Member(inner) => match (unparen(&inner.obj), &inner.prop) {
                            (Expr::Ident(id), MemberProp::Ident(prop)) => format!("{}.{}", id.sym, prop.sym),
                            _ => return None
                        },
                        Expr::Call(inner) => match &inner.callee {
                            Callee::Expr(inner_callee) => match unparen(inner_callee) {
                                Expr::Ident(id) => format!("{}()", id.sym),
                                _ => return None
                            },
                            _ => return None
                        },
                        _ => return None
                    };
                    Some(format!("{}.{}", object, method))
                }
                _ => None
            }
        }
        _ => None
    }
}

/// The `(target, descriptor)` pairs of the assignments directly in `expr`,
/// itself or as elements of a sequence.
fn assignments(expr: &Expr) -> Vec<(String, String)> {
    let exprs: Vec<&Expr> = match unparen(expr) {
        Expr::Seq(seq) => seq.exprs.iter().map(|e| &**e).collect(),
        other => vec![other]
    };

    exprs
        .into_iter()
        .filter_map(|expr| match unparen(expr) {
            Expr::Assign(assign) if assign.op == AssignOp::Assign => {
                let target = assign_target_chain(&assign.left).ok()?;
                Some((target, descriptor(&assign.right)?))
            }
            _ => None
        })
        .collect()
}

impl Visit for OrderStrings {
    fn visit_expr_stmt(&mut self, stmt: &ExprStmt) {
        self.record(|| fingerprint_expr(&stmt.expr), assignments(&stmt.expr));
        stmt.visit_children_with(self);
    }

    fn visit_for_stmt(&mut self, for_stmt: &ForStmt) {
        if let Some(VarDeclOrExpr::Expr(init)) = &for_stmt.init {
            self.record(|| fingerprint_expr(init), assignments(init));
        }
        for_stmt.visit_children_with(self);
    }

    fn visit_var_decl(&mut self, var: &VarDecl) {
        let declarators = var.decls
            .iter()
            .filter_map(|declarator| match (&declarator.name, &declarator.init) {
                (Pat::Ident(binding), Some(init)) => Some((binding.id.sym.to_string(), descriptor(init)?)),
                _ => None
            })
            .collect();
        self.record(|| fingerprint_var_decl(var), declarators);
        var.visit_children_with(self);
    }
}

struct Unroller<'a> {
    orders: &'a OrderStrings,
    unrolled: usize,
    skipped: Vec<PatternError>
}

impl Unroller<'_> {
    fn rewrite(&mut self, stmt: Stmt) -> Vec<Stmt> {
        let for_stmt = match stmt {
            Stmt::For(for_stmt) => for_stmt,
            other => return vec![other]
        };

        match self.unroll(&for_stmt) {
            Ok(stmts) => {
                self.unrolled += 1;
                stmts
            }
            Err(e) => {
                if let PatternError::InconsistentCount { .. } = e {
                    self.skipped.push(e);
                }
                vec![Stmt::For(for_stmt)]
            }
        }
    }

    /// Builds the straight-line replacement of a flattened loop without
    /// touching the loop itself.
    fn unroll(&self, for_stmt: &ForStmt) -> Result<Vec<Stmt>, PatternError> {
        let switch = flattened_switch(&for_stmt.body).ok_or(PatternError::Mismatch("loop body isn't a switch"))?;
        let (object, counter, step) = dispatch(&switch.discriminant).ok_or(PatternError::Mismatch("switch isn't on obj[counter++]"))?;
        let init = for_stmt.init.as_ref().ok_or(PatternError::Mismatch("loop has no initializer"))?;

        let prefix = match init {
            VarDeclOrExpr::VarDecl(var) => fingerprint_var_decl(var)?,
            VarDeclOrExpr::Expr(expr) => fingerprint_expr(expr)?
        };
        let order = self.orders
            .get(&prefix, &object)
            .ok_or(PatternError::Mismatch("no order string for the loop"))?;

        let entries: Vec<&str> = order.split('|').collect();
        if entries.len() != switch.cases.len() {
            return Err(PatternError::InconsistentCount {
                entries: entries.len(),
                cases: switch.cases.len()
            });
        }

        // The first case to run is at the counter's reset value, one further
        // when the counter is bumped before it's read.
        let start = counter_start(init, counter)
            .and_then(|value| usize::try_from(value + step as i64).ok())
            .filter(|&start| start <= entries.len())
            .ok_or(PatternError::Mismatch("counter doesn't start inside the order"))?;

        let mut stmts = init_stmts(init, counter);
        for entry in &entries[start..] {
            let case = select_case(&switch.cases, entry).ok_or(PatternError::Mismatch("order entry matches no case"))?;
            match case.cons.first() {
                Some(Stmt::Break(_) | Stmt::Continue(_)) | None => {}
                Some(first) => stmts.push(first.clone())
            }
        }
        Ok(stmts)
    }
}

impl VisitMut for Unroller<'_> {
    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        rewrite_stmts(self, stmts, Self::rewrite);
    }

    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        rewrite_stmts(self, items, Self::rewrite);
    }

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        stmt.visit_mut_children_with(self);
        if !matches!(stmt, Stmt::For(_)) {
            return;
        }

        let mut stmts = self.rewrite(stmt.take());
        *stmt = match stmts.len() {
            1 if matches!(stmts[0], Stmt::For(_)) => stmts.remove(0),
            _ => *block(stmts)
        };
    }
}

/// The switch of `for (...) { switch (...) { ... } break; }`, the trailing
/// `break` being optional.
fn flattened_switch(body: &Stmt) -> Option<&SwitchStmt> {
    match body {
        Stmt::Switch(switch) => Some(switch),
        Stmt::Block(block) => match block.stmts.as_slice() {
            [Stmt::Switch(switch)] | [Stmt::Switch(switch), Stmt::Break(BreakStmt { label: None, .. })] => Some(switch),
            _ => None
        },
        _ => None
    }
}

/// Splits `obj[counter++]` into the chain of `obj` and the counter. The
/// pre-incrementing forms `obj[++counter]` and `obj[counter += 1]` read one
/// past the counter's starting value, which the returned step records.
fn dispatch(discriminant: &Expr) -> Option<(String, &Ident, usize)> {
    let member = match unparen(discriminant) {
        Expr::Member(member) => member,
        _ => return None
    };
    let computed = match &member.prop {
        MemberProp::Computed(computed) => computed,
        _ => return None
    };
    let (counter, step) = match unparen(&computed.expr) {
        Expr::Update(update) if update.op == UpdateOp::PlusPlus => match unparen(&update.arg) {
            Expr::Ident(id) => (id, usize::from(update.prefix)),
            _ => return None
        },
        Expr::Assign(assign) if assign.op == AssignOp::AddAssign && is_one(&assign.right) => {
            (assign_target_ident(&assign.left)?, 1)
        }
        _ => return None
    };

    Some((dotted_chain(&member.obj).ok()?, counter, step))
}

fn is_one(expr: &Expr) -> bool {
    matches!(unparen(expr), Expr::Lit(Lit::Num(n)) if n.value == 1.0)
}

/// The value the loop initializer resets the counter to; zero when it
/// doesn't mention the counter.
fn counter_start(init: &VarDeclOrExpr, counter: &Ident) -> Option<i64> {
    match init {
        VarDeclOrExpr::Expr(expr) => {
            let exprs: Vec<&Expr> = match unparen(expr) {
                Expr::Seq(seq) => seq.exprs.iter().map(|expr| &**expr).collect(),
                expr => vec![expr]
            };
            exprs
                .into_iter()
                .find_map(|expr| match unparen(expr) {
                    Expr::Assign(assign) if is_counter_reset(expr, counter) => index_value(&assign.right),
                    _ => None
                })
                .or(Some(0))
        }
        VarDeclOrExpr::VarDecl(var) => match var.decls.iter().find(|declarator| {
            matches!(&declarator.name, Pat::Ident(binding) if binding.id.sym == counter.sym)
        }) {
            Some(declarator) => index_value(declarator.init.as_deref()?),
            None => Some(0)
        }
    }
}

/// An integer literal, possibly negated.
fn index_value(expr: &Expr) -> Option<i64> {
    let value = match unparen(expr) {
        Expr::Lit(Lit::Num(n)) => n.value,
        Expr::Unary(unary) if unary.op == UnaryOp::Minus => match unparen(&unary.arg) {
            Expr::Lit(Lit::Num(n)) => -n.value,
            _ => return None
        },
        _ => return None
    };

    (value.fract() == 0.0 && value.abs() < u32::MAX as f64).then(|| value as i64)
}

/// The loop initializer as statements, without the counter reset.
fn init_stmts(init: &VarDeclOrExpr, counter: &Ident) -> Vec<Stmt> {
    match init {
        VarDeclOrExpr::Expr(expr) => {
            let exprs: Vec<&Box<Expr>> = match &**expr {
                Expr::Seq(seq) => seq.exprs.iter().collect(),
                _ => vec![expr]
            };
            exprs
                .into_iter()
                .filter(|expr| !is_counter_reset(expr, counter))
                .map(|expr| expr_stmt(expr.clone()))
                .collect()
        }
        VarDeclOrExpr::VarDecl(var) => {
            let mut var = var.clone();
            var.decls.retain(|declarator| match &declarator.name {
                Pat::Ident(binding) if binding.id.sym == counter.sym => {
                    declarator.init.as_deref().map_or(false, |init| index_value(init).is_none())
                }
                _ => true
            });

            if var.decls.is_empty() {
                Vec::new()
            } else {
                vec![Stmt::Decl(Decl::Var(var))]
            }
        }
    }
}

fn is_counter_reset(expr: &Expr, counter: &Ident) -> bool {
    match unparen(expr) {
        Expr::Assign(assign) if assign.op == AssignOp::Assign => {
            assign_target_ident(&assign.left).map_or(false, |id| id.sym == counter.sym)
                && index_value(&assign.right).is_some()
        }
        _ => false
    }
}

/// The case whose test is `entry`, or else the case at position `entry`.
fn select_case<'a>(cases: &'a [SwitchCase], entry: &str) -> Option<&'a SwitchCase> {
    let by_test = cases.iter().find(|case| match case.test.as_deref().map(unparen) {
        Some(Expr::Lit(Lit::Str(s))) => &*s.value == entry,
        Some(Expr::Lit(Lit::Num(n))) => entry.parse::<f64>().map_or(false, |value| value == n.value),
        _ => false
    });

    by_test.or_else(|| entry.parse::<usize>().ok().and_then(|index| cases.get(index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    const FLATTENED: &str = r#"
        for (f = "1|0".split("|"), g = 0; ; ) {
            switch (f[g++]) {
                case "0": a(); continue;
                case "1": b(); continue;
            }
            break;
        }
    "#;

    fn unroll(code: &str) -> (String, Result<(), PatternError>) {
        let mut result = Ok(());
        let code = transform(code, |program| result = deobfuscate(program));
        (code, result)
    }

    #[test]
    fn test_unroll_in_list() {
        let (code, result) = unroll(FLATTENED);

        assert_eq!(result, Ok(()));
        assert_eq!(code, normalize(r#"f = "1|0".split("|"); b(); a();"#));
    }

    #[test]
    fn test_unroll_outside_of_list() {
        let (code, _) = unroll(&format!("if (x) {}", FLATTENED.trim()));

        assert_eq!(code, normalize(r#"if (x) { f = "1|0".split("|"); b(); a(); }"#));
    }

    #[test]
    fn test_unroll_var_initializer() {
        let (code, _) = unroll(r#"
            for (var f = "2|0|1".split("|"), g = 0; ; ) {
                switch (f[g++]) {
                    case "0": a(); continue;
                    case "1": b(); continue;
                    case "2": c(); continue;
                }
                break;
            }
        "#);

        assert_eq!(code, normalize(r#"var f = "2|0|1".split("|"); c(); a(); b();"#));
    }

    #[test]
    fn test_order_through_another_name() {
        let (code, _) = unroll(r#"
            o.k = "1|0";
            for (f = o.k.split("|"), g = 0; ; ) {
                switch (f[g++]) {
                    case "0": a(); continue;
                    case "1": b(); continue;
                }
                break;
            }
        "#);

        assert_eq!(code, normalize(r#"o.k = "1|0"; f = o.k.split("|"); b(); a();"#));
    }

    #[test]
    fn test_positional_fallback() {
        let (code, _) = unroll(r#"
            for (f = "1|0".split("|"), g = 0; ; ) {
                switch (f[g++]) {
                    case x: a(); continue;
                    case y: b(); continue;
                }
                break;
            }
        "#);

        assert_eq!(code, normalize(r#"f = "1|0".split("|"); b(); a();"#));
    }

    #[test]
    fn test_pre_incremented_counter() {
        let (code, result) = unroll(r#"
            for (f = "2|0|1".split("|"), g = -1; ; ) {
                switch (f[++g]) {
                    case "0": a(); continue;
                    case "1": b(); continue;
                    case "2": c(); continue;
                }
                break;
            }
            for (h = "1|0".split("|"), i = -1; ; ) {
                switch (h[i += 1]) {
                    case "0": d(); continue;
                    case "1": e(); continue;
                }
                break;
            }
        "#);

        assert_eq!(result, Ok(()));
        assert_eq!(code, normalize(r#"f = "2|0|1".split("|"); c(); a(); b(); h = "1|0".split("|"); e(); d();"#));
    }

    #[test]
    fn test_pre_increment_from_zero_skips_first_entry() {
        let (code, _) = unroll(r#"
            for (var f = "2|0|1".split("|"), g = 0; ; ) {
                switch (f[++g]) {
                    case "0": a(); continue;
                    case "1": b(); continue;
                    case "2": c(); continue;
                }
                break;
            }
        "#);

        assert_eq!(code, normalize(r#"var f = "2|0|1".split("|"); a(); b();"#));
    }

    #[test]
    fn test_inconsistent_count_is_untouched() {
        let code = r#"
            for (f = "2|1|0".split("|"), g = 0; ; ) {
                switch (f[g++]) {
                    case "0": a(); continue;
                    case "1": b(); continue;
                }
                break;
            }
        "#;
        let (result_code, result) = unroll(code);

        assert_eq!(result, Err(PatternError::InconsistentCount { entries: 3, cases: 2 }));
        assert_eq!(result_code, normalize(code));
    }

    #[test]
    fn test_descriptors() {
        let cases = [
            (r#""1|0""#, "1|0"),
            ("b", "b"),
            ("b()", "b"),
            ("b.c()", "b.c"),
            ("b.c.d()", "b.c.d"),
            ("b().c()", "b().c"),
            ("this.c()", "this.c"),
            (r#""1|0".split("|")"#, "1|0.split")
        ];
        for (code, expected) in cases {
            let expr = crate::deobfuscate::tests::parse_expr(code);
            assert_eq!(descriptor(&expr).as_deref(), Some(expected), "{}", code);
        }
    }
}
