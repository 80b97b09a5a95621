use swc_core::ecma::ast::{Expr, Ident, Lit, MemberExpr, MemberProp};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use super::util::is_bare_identifier;

/// Replaces computed member properties with identifiers, when the
/// property name can be written as one (`obj["name"]` to `obj.name`).
pub struct Visitor;

impl VisitMut for Visitor {
    fn visit_mut_member_expr(&mut self, member_expr: &mut MemberExpr) {
        member_expr.visit_mut_children_with(self);

        if let MemberProp::Computed(property) = &member_expr.prop {
            if let Expr::Lit(Lit::Str(s)) = &*property.expr {
                if is_bare_identifier(&s.value) {
                    member_expr.prop = MemberProp::Ident(Ident::new(
                        s.value.clone(),
                        property.span
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    fn normalize_members(code: &str) -> String {
        transform(code, |program| program.visit_mut_with(&mut Visitor))
    }

    #[test]
    fn test_identifier_names() {
        assert_eq!(
            normalize_members(r#"window["console"]["log"](a["$b"], c["_d1"]);"#),
            normalize("window.console.log(a.$b, c._d1);")
        );
    }

    #[test]
    fn test_other_names_stay_computed() {
        let code = r#"a["foo-bar"]; a["1x"]; a[""]; a["if"]; a[0]; a[b];"#;
        assert_eq!(normalize_members(code), normalize(code));
    }

    #[test]
    fn test_second_run_is_unchanged() {
        let once = normalize_members(r#"window["document"]["title"] = a["foo-bar"][b]["c"];"#);
        assert_eq!(normalize_members(&once), once);
    }
}
