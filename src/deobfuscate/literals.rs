use swc_core::ecma::ast::{Number, Str};
use swc_core::ecma::visit::VisitMut;

/// Drops the raw text of string and number literals, so escapes like
/// `"\x68\x69"` and `0x1F` are printed from their decoded values.
pub struct Visitor;

impl VisitMut for Visitor {
    fn visit_mut_str(&mut self, s: &mut Str) {
        s.raw = None;
    }

    fn visit_mut_number(&mut self, n: &mut Number) {
        n.raw = None;
    }
}

#[cfg(test)]
mod tests {
    use swc_core::ecma::visit::VisitMutWith;
    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    #[test]
    fn test_decodes_escapes() {
        let result = transform(r#"var a = "\x68i", b = 0x1F, c = 1e3;"#, |program| {
            program.visit_mut_with(&mut Visitor);
        });

        assert_eq!(result, normalize(r#"var a = "hi", b = 31, c = 1000;"#));
    }
}
