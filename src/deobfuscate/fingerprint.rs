use md5::{Digest, Md5};
use swc_core::common::{DUMMY_SP, SourceMap};
use swc_core::common::sync::Lrc;
use swc_core::ecma::ast::{Decl, Expr, Script, Stmt, VarDecl};
use swc_core::ecma::codegen::Emitter;
use swc_core::ecma::codegen::text_writer::JsWriter;

use super::PatternError;
use super::util::expr_stmt;

/// How many leading hex digits of the digest make up a fingerprint.
pub const FINGERPRINT_PREFIX_LEN: usize = 5;

/// Fingerprints an expression by the code generated for it.
///
/// Two structurally identical expressions get the same fingerprint, wherever
/// they are in the program.
pub fn fingerprint_expr(expr: &Expr) -> Result<String, PatternError> {
    fingerprint_stmt(expr_stmt(Box::new(expr.clone())))
}

pub fn fingerprint_var_decl(var: &VarDecl) -> Result<String, PatternError> {
    fingerprint_stmt(Stmt::Decl(Decl::Var(Box::new(var.clone()))))
}

fn fingerprint_stmt(stmt: Stmt) -> Result<String, PatternError> {
    let script = Script {
        span: DUMMY_SP,
        body: vec![stmt],
        shebang: None
    };

    let cm = Lrc::<SourceMap>::default();
    let mut buf = Vec::new();
    {
        let mut emitter = Emitter {
            cfg: Default::default(),
            cm: cm.clone(),
            comments: None,
            wr: JsWriter::new(cm, "\n", &mut buf, None)
        };
        emitter.emit_script(&script).map_err(|_| PatternError::Mismatch("unprintable statement"))?;
    }

    let mut hasher = Md5::new();
    hasher.update(&buf);
    let digest = format!("{:x}", hasher.finalize());

    Ok(digest[..FINGERPRINT_PREFIX_LEN].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::parse_expr;

    #[test]
    fn test_fingerprint_is_structural() {
        let a = fingerprint_expr(&parse_expr(r#"f = "1|0".split("|"), g = 0"#)).unwrap();
        let b = fingerprint_expr(&parse_expr(r#"f   =  "1|0".split("|"),g=0"#)).unwrap();
        let c = fingerprint_expr(&parse_expr(r#"f = "0|1".split("|"), g = 0"#)).unwrap();

        assert_eq!(a.len(), FINGERPRINT_PREFIX_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
