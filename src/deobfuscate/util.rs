use swc_core::common::DUMMY_SP;
use swc_core::common::util::take::Take;
use swc_core::ecma::ast::{ArrayLit, BlockStmt, Bool, Decl, Expr, EmptyStmt, ExprOrSpread, ExprStmt, Ident, IfStmt, Lit, MemberProp, ModuleItem, Number, ObjectPatProp, Pat, PatOrExpr, Prop, PropName, PropOrSpread, SeqExpr, Stmt, Str, UnaryExpr, UnaryOp, VarDeclKind};
use swc_core::ecma::atoms::JsWord;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use super::PatternError;

/// How many member accesses a dotted chain may contain.
pub const MAX_CHAIN_DEPTH: usize = 32;

/// A statement list element: either a plain [Stmt] (function bodies,
/// blocks, scripts) or a [ModuleItem] (module bodies).
pub trait StmtLike: Sized {
    /// Returns the statement, or gives `self` back if it isn't one.
    fn into_stmt(self) -> Result<Stmt, Self>;

    fn from_stmt(stmt: Stmt) -> Self;

    /// Visits what is inside the statement, without handing the statement
    /// itself to [VisitMut::visit_mut_stmt].
    fn visit_mut_stmt_children<V: VisitMut>(&mut self, visitor: &mut V);
}

impl StmtLike for Stmt {
    fn into_stmt(self) -> Result<Stmt, Self> {
        Ok(self)
    }

    fn from_stmt(stmt: Stmt) -> Self {
        stmt
    }

    fn visit_mut_stmt_children<V: VisitMut>(&mut self, visitor: &mut V) {
        self.visit_mut_children_with(visitor);
    }
}

impl StmtLike for ModuleItem {
    fn into_stmt(self) -> Result<Stmt, Self> {
        match self {
            ModuleItem::Stmt(stmt) => Ok(stmt),
            other => Err(other)
        }
    }

    fn from_stmt(stmt: Stmt) -> Self {
        ModuleItem::Stmt(stmt)
    }

    fn visit_mut_stmt_children<V: VisitMut>(&mut self, visitor: &mut V) {
        match self {
            ModuleItem::Stmt(stmt) => stmt.visit_mut_children_with(visitor),
            ModuleItem::ModuleDecl(decl) => decl.visit_mut_with(visitor)
        }
    }
}

/// Replaces every statement of `items` with the statements `expand` returns
/// for it, keeping non-statement items (imports, exports) in place.
pub fn splice_stmts<T, F>(items: &mut Vec<T>, mut expand: F)
    where T: StmtLike, F: FnMut(Stmt) -> Vec<Stmt>
{
    let old = std::mem::take(items);
    items.reserve(old.len());
    for item in old {
        match item.into_stmt() {
            Ok(stmt) => items.extend(expand(stmt).into_iter().map(T::from_stmt)),
            Err(other) => items.push(other)
        }
    }
}

/// Visits a statement list bottom-up, then replaces each statement with
/// what `rewrite` returns for it.
///
/// Passes call this from `visit_mut_stmts` and `visit_mut_module_items`,
/// which leaves their `visit_mut_stmt` to handle statements outside of
/// lists only.
pub fn rewrite_stmts<V, T, F>(visitor: &mut V, items: &mut Vec<T>, mut rewrite: F)
    where V: VisitMut, T: StmtLike, F: FnMut(&mut V, Stmt) -> Vec<Stmt>
{
    for item in items.iter_mut() {
        item.visit_mut_stmt_children(visitor);
    }
    splice_stmts(items, |stmt| rewrite(visitor, stmt));
}

/// Packs a statement list into the single statement a non-list position
/// (an `if` branch, a loop body) can hold.
pub fn into_single_stmt(mut stmts: Vec<Stmt>) -> Stmt {
    match stmts.len() {
        0 => Stmt::dummy(),
        1 => stmts.remove(0),
        _ => Stmt::Block(BlockStmt {
            span: DUMMY_SP,
            stmts
        })
    }
}

pub fn expr_stmt(expr: Box<Expr>) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr
    })
}

pub fn block(stmts: Vec<Stmt>) -> Box<Stmt> {
    Box::new(Stmt::Block(BlockStmt {
        span: DUMMY_SP,
        stmts
    }))
}

pub fn str_lit(value: &str) -> Expr {
    Expr::Lit(Lit::Str(Str {
        span: DUMMY_SP,
        value: JsWord::from(value),
        raw: None
    }))
}

pub fn bool_lit(value: bool) -> Expr {
    Expr::Lit(Lit::Bool(Bool {
        span: DUMMY_SP,
        value
    }))
}

pub fn num_lit(value: f64) -> Expr {
    Expr::Lit(Lit::Num(Number {
        span: DUMMY_SP,
        value,
        raw: None
    }))
}

/// `void 0`
pub fn undefined() -> Expr {
    Expr::Unary(UnaryExpr {
        span: DUMMY_SP,
        op: UnaryOp::Void,
        arg: Box::new(num_lit(0.0))
    })
}

/// `!expr`. The printer's fixer adds parentheses where precedence needs them.
pub fn negate(expr: Box<Expr>) -> Box<Expr> {
    Box::new(Expr::Unary(UnaryExpr {
        span: DUMMY_SP,
        op: UnaryOp::Bang,
        arg: expr
    }))
}

/// Strips any number of parentheses.
pub fn unparen(mut expr: &Expr) -> &Expr {
    while let Expr::Paren(paren) = expr {
        expr = &*paren.expr;
    }
    expr
}

/// If the name is a legal bare identifier, ie `obj.name` can be written
/// instead of `obj["name"]`. Reserved words are rejected.
pub fn is_bare_identifier(name: &str) -> bool {
    Ident::verify_symbol(name).is_ok()
}

/// The identifier an assignment writes to, if it is a plain name.
pub fn assign_target_ident(target: &PatOrExpr) -> Option<&Ident> {
    match target {
        PatOrExpr::Pat(pat) => match &**pat {
            Pat::Ident(binding) => Some(&binding.id),
            Pat::Expr(expr) => match unparen(expr) {
                Expr::Ident(id) => Some(id),
                _ => None
            },
            _ => None
        },
        PatOrExpr::Expr(expr) => match unparen(expr) {
            Expr::Ident(id) => Some(id),
            _ => None
        }
    }
}

/// The expression an assignment writes to, unless it destructures.
pub fn assign_target_expr(target: &PatOrExpr) -> Option<&Expr> {
    match target {
        PatOrExpr::Expr(expr) => Some(unparen(expr)),
        PatOrExpr::Pat(pat) => match &**pat {
            Pat::Expr(expr) => Some(unparen(expr)),
            _ => None
        }
    }
}

/// The dotted chain an assignment writes to, ie `a` or `a.b.c`.
pub fn assign_target_chain(target: &PatOrExpr) -> Result<String, PatternError> {
    if let Some(id) = assign_target_ident(target) {
        return Ok(id.sym.to_string());
    }
    match assign_target_expr(target) {
        Some(expr) => dotted_chain(expr),
        None => Err(PatternError::UnsupportedBindingShape)
    }
}

/// If evaluating the right side of an assignment before its target can't
/// change what the target refers to: a plain name, or a property chain such
/// as `a.b.c`, `this.x` or `o[k]` whose computed keys have no effects.
pub fn is_stable_target(target: &PatOrExpr) -> bool {
    if assign_target_ident(target).is_some() {
        return true;
    }
    match assign_target_expr(target) {
        Some(expr @ Expr::Member(_)) => is_stable_chain(expr, 0),
        _ => false
    }
}

fn is_stable_chain(expr: &Expr, depth: usize) -> bool {
    if depth > MAX_CHAIN_DEPTH {
        return false;
    }
    match unparen(expr) {
        Expr::Ident(_) | Expr::This(_) => true,
        Expr::Member(member) => {
            let key = match &member.prop {
                MemberProp::Ident(_) | MemberProp::PrivateName(_) => true,
                MemberProp::Computed(computed) => is_pure(&computed.expr)
            };
            key && is_stable_chain(&member.obj, depth + 1)
        }
        _ => false
    }
}

/// Rebuilds the textual chain of a callee or assignment target, ie `a.b.c`
/// for `a.b.c` or `a["b"].c`.
///
/// Only identifiers, non-computed properties and computed string properties
/// are understood; anything else, or a chain deeper than
/// [MAX_CHAIN_DEPTH], is an [PatternError::UnsupportedBindingShape].
pub fn dotted_chain(expr: &Expr) -> Result<String, PatternError> {
    let mut segments: Vec<&str> = Vec::new();
    let mut current = unparen(expr);

    loop {
        if segments.len() > MAX_CHAIN_DEPTH {
            return Err(PatternError::UnsupportedBindingShape);
        }
        match current {
            Expr::Ident(id) => {
                segments.push(&*id.sym);
                break;
            }
            Expr::Member(member) => {
                match &member.prop {
                    MemberProp::Ident(prop) => segments.push(&*prop.sym),
                    MemberProp::Computed(computed) => match &*computed.expr {
                        Expr::Lit(Lit::Str(s)) => segments.push(&*s.value),
                        _ => return Err(PatternError::UnsupportedBindingShape)
                    },
                    MemberProp::PrivateName(_) => return Err(PatternError::UnsupportedBindingShape)
                }
                current = unparen(&member.obj);
            }
            _ => return Err(PatternError::UnsupportedBindingShape)
        }
    }

    segments.reverse();
    Ok(segments.join("."))
}

/// Collects every identifier a binding pattern declares.
pub fn pat_idents(pat: &Pat) -> Vec<&Ident> {
    let mut idents = Vec::new();
    let mut stack = vec![pat];

    while let Some(pat) = stack.pop() {
        match pat {
            Pat::Ident(binding) => idents.push(&binding.id),
            Pat::Array(array) => stack.extend(array.elems.iter().flatten()),
            Pat::Rest(rest) => stack.push(&rest.arg),
            Pat::Assign(assign) => stack.push(&assign.left),
            Pat::Object(object) => {
                for prop in &object.props {
                    match prop {
                        ObjectPatProp::KeyValue(kv) => stack.push(&kv.value),
                        ObjectPatProp::Assign(assign) => idents.push(&assign.key),
                        ObjectPatProp::Rest(rest) => stack.push(&rest.arg)
                    }
                }
            }
            Pat::Expr(_) | Pat::Invalid(_) => {}
        }
    }

    idents
}

/// If evaluating the expression can't have observable effects.
///
/// Property reads count as effects (getters), as does anything
/// involving calls, assignments, `new`, `delete` or `yield`/`await`.
pub fn is_pure(expr: &Expr) -> bool {
    match expr {
        Expr::Lit(_) | Expr::Ident(_) | Expr::This(_) | Expr::Fn(_) | Expr::Arrow(_) => true,
        Expr::Paren(paren) => is_pure(&paren.expr),
        Expr::Unary(unary) => unary.op != UnaryOp::Delete && is_pure(&unary.arg),
        Expr::Bin(bin) => is_pure(&bin.left) && is_pure(&bin.right),
        Expr::Cond(cond) => is_pure(&cond.test) && is_pure(&cond.cons) && is_pure(&cond.alt),
        Expr::Seq(seq) => seq.exprs.iter().all(|e| is_pure(e)),
        Expr::Tpl(tpl) => tpl.exprs.iter().all(|e| is_pure(e)),
        Expr::Array(array) => array.elems.iter().all(|elem| match elem {
            Some(ExprOrSpread { spread: None, expr }) => is_pure(expr),
            Some(_) => false,
            None => true
        }),
        Expr::Object(object) => object.props.iter().all(|prop| match prop {
            PropOrSpread::Prop(prop) => match &**prop {
                Prop::Shorthand(_) => true,
                Prop::KeyValue(kv) => is_pure_key(&kv.key) && is_pure(&kv.value),
                Prop::Method(method) => is_pure_key(&method.key),
                Prop::Getter(getter) => is_pure_key(&getter.key),
                Prop::Setter(setter) => is_pure_key(&setter.key),
                Prop::Assign(_) => false
            },
            PropOrSpread::Spread(_) => false
        }),
        _ => false
    }
}

fn is_pure_key(key: &PropName) -> bool {
    match key {
        PropName::Computed(computed) => is_pure(&computed.expr),
        _ => true
    }
}

/// Wraps the consequent of an `if` with an `else` in a block when it ends
/// in an `if` without one, so the `else` keeps attaching to the outer `if`.
pub fn guard_dangling_else(if_stmt: &mut IfStmt) {
    if if_stmt.alt.is_some() && ends_in_bare_if(&if_stmt.cons) {
        let cons = Take::take(&mut *if_stmt.cons);
        if_stmt.cons = block(vec![cons]);
    }
}

fn ends_in_bare_if(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::If(inner) => match &inner.alt {
            Some(alt) => ends_in_bare_if(alt),
            None => true
        },
        Stmt::For(for_stmt) => ends_in_bare_if(&for_stmt.body),
        Stmt::ForIn(for_in) => ends_in_bare_if(&for_in.body),
        Stmt::ForOf(for_of) => ends_in_bare_if(&for_of.body),
        Stmt::While(while_stmt) => ends_in_bare_if(&while_stmt.body),
        Stmt::With(with) => ends_in_bare_if(&with.body),
        Stmt::Labeled(labeled) => ends_in_bare_if(&labeled.body),
        _ => false
    }
}

/// If a block declares names scoped to itself, so its statements can't be
/// spread into the enclosing list.
pub fn has_lexical_decl(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Decl(Decl::Var(var)) => var.kind != VarDeclKind::Var,
        Stmt::Decl(_) => true,
        _ => false
    })
}

/// Removes expressions that a pass replaced with [Expr::Invalid] to mark
/// them as deleted.
///
/// Statements holding only a deleted expression are dropped, deleted
/// sequence elements, arguments and array elements are removed, and a
/// deleted expression anywhere else becomes `void 0` so the tree stays valid.
pub struct Cleanup;

fn is_deleted(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Expr(expr_stmt) if expr_stmt.expr.is_invalid())
}

impl VisitMut for Cleanup {
    // Outside a list the statement can only be emptied
    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        if is_deleted(stmt) {
            *stmt = Stmt::Empty(EmptyStmt { span: DUMMY_SP });
            return;
        }
        stmt.visit_mut_children_with(self);
    }

    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        stmts.retain(|stmt| !is_deleted(stmt));
        stmts.visit_mut_children_with(self);
    }

    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        items.retain(|item| !matches!(item, ModuleItem::Stmt(stmt) if is_deleted(stmt)));
        items.visit_mut_children_with(self);
    }

    // Template holes keep their position, so they fall through to `void 0`
    fn visit_mut_seq_expr(&mut self, seq: &mut SeqExpr) {
        seq.exprs.retain(|expr| !expr.is_invalid());
        seq.visit_mut_children_with(self);
    }

    // Call arguments
    fn visit_mut_expr_or_spreads(&mut self, args: &mut Vec<ExprOrSpread>) {
        args.retain(|arg| !arg.expr.is_invalid());
        args.visit_mut_children_with(self);
    }

    fn visit_mut_array_lit(&mut self, array: &mut ArrayLit) {
        array.elems.retain(|elem| !matches!(elem, Some(e) if e.expr.is_invalid()));
        array.visit_mut_children_with(self);
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);

        match expr {
            Expr::Seq(seq) if seq.exprs.len() == 1 => {
                *expr = *seq.exprs.remove(0);
            }
            Expr::Seq(seq) if seq.exprs.is_empty() => {
                *expr = undefined();
            }
            Expr::Invalid(..) => {
                *expr = undefined();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use swc_core::ecma::ast::Callee;

    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    /// Marks every `del()` call as deleted.
    struct MarkDeleted;

    impl VisitMut for MarkDeleted {
        fn visit_mut_expr(&mut self, expr: &mut Expr) {
            expr.visit_mut_children_with(self);
            if let Expr::Call(call) = expr {
                if matches!(&call.callee, Callee::Expr(callee) if matches!(&**callee, Expr::Ident(id) if &*id.sym == "del")) {
                    *expr = Expr::Invalid(swc_core::ecma::ast::Invalid { span: DUMMY_SP });
                }
            }
        }
    }

    fn cleanup(code: &str) -> String {
        transform(code, |program| {
            program.visit_mut_with(&mut MarkDeleted);
            program.visit_mut_with(&mut Cleanup);
        })
    }

    #[test]
    fn test_cleanup_removes_marked_statements_only() {
        assert_eq!(cleanup("a(); del(); ; b(); function f() { del(); ; }"), normalize("a(); ; b(); function f() { ; }"));
        assert_eq!(cleanup("if (c) del(); else d();"), normalize("if (c) ; else d();"));
    }

    #[test]
    fn test_cleanup_removes_list_elements() {
        assert_eq!(cleanup("x = (del(), 1, del()); f(del(), 2); z = [del(), 3];"), normalize("x = 1; f(2); z = [3];"));
    }

    #[test]
    fn test_cleanup_keeps_template_holes() {
        assert_eq!(cleanup("t = `${del()}-${y}`;"), normalize("t = `${void 0}-${y}`;"));
    }
}
