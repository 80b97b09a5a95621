use swc_core::common::DUMMY_SP;
use swc_core::ecma::ast::{CallExpr, Callee, Expr, Invalid, Lit, Program};
use swc_core::ecma::atoms::JsWord;
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};
use tracing::debug;

use crate::Config;
use super::{PatternError, report};
use super::util::{Cleanup, str_lit};

/// Recovers the string table hidden in one long, separator-joined and
/// rotated string literal, and replaces the accessor calls indexing it.
///
/// Nothing is changed unless the payload, its separator and the rotating
/// call are all found.
pub fn deobfuscate(program: &mut Program, config: &Config) -> Result<(), PatternError> {
    let mut scanner = Scanner::new(config);
    program.visit_with(&mut scanner);

    let payload = scanner.payload.ok_or(PatternError::Mismatch("no string payload"))?;
    let separator = scanner.separator.ok_or(PatternError::Mismatch("no separator literal"))?;
    let rotation = scanner.rotation.ok_or(PatternError::Mismatch("no rotating call"))?;

    let table = chunks(&payload.value, &separator.value, rotation.value);
    debug!("recovered {} strings, rotated {} times", table.len(), rotation.value);

    program.visit_mut_with(&mut Extractor {
        payload: payload.ordinal,
        separator: separator.ordinal,
        rotation: rotation.ordinal,
        strings: 0,
        calls: 0
    });
    program.visit_mut_with(&mut Cleanup);

    program.visit_mut_with(&mut Substitution {
        accessors: config.accessor_names.iter().map(|name| JsWord::from(name.as_str())).collect(),
        table
    });

    Ok(())
}

/// Runs [deobfuscate] as a pass, logging why it didn't apply.
pub struct Visitor<'a> {
    config: &'a Config
}

impl<'a> Visitor<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config
        }
    }
}

impl VisitMut for Visitor<'_> {
    fn visit_mut_program(&mut self, program: &mut Program) {
        report("mixed strings", deobfuscate(program, self.config));
    }
}

/// Splits the payload and rotates it left `rotation` times.
pub fn chunks(payload: &str, separator: &str, rotation: usize) -> Vec<String> {
    let mut chunks: Vec<String> = payload.split(separator).map(String::from).collect();
    if !chunks.is_empty() {
        let len = chunks.len();
        chunks.rotate_left(rotation % len);
    }
    chunks
}

/// A node found by the scan, with its pre-order position among nodes of the
/// same kind.
struct Found<T> {
    ordinal: usize,
    value: T
}

struct Scanner<'a> {
    threshold: usize,
    separators: &'a str,
    strings: usize,
    calls: usize,
    payload: Option<Found<String>>,
    separator: Option<Found<String>>,
    rotation: Option<Found<usize>>
}

impl<'a> Scanner<'a> {
    fn new(config: &'a Config) -> Self {
        Self {
            threshold: config.mixed_string_threshold,
            separators: &config.separators,
            strings: 0,
            calls: 0,
            payload: None,
            separator: None,
            rotation: None
        }
    }
}

impl Visit for Scanner<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Lit(Lit::Str(s)) => {
                let ordinal = self.strings;
                self.strings += 1;

                // Lengths are in UTF-16 code units, as JavaScript counts them
                let value = &*s.value;
                let len = value.encode_utf16().count();
                if self.payload.is_none() && len > self.threshold {
                    self.payload = Some(Found { ordinal, value: value.to_string() });
                } else if self.separator.is_none() && len == 1 && self.separators.contains(value) {
                    self.separator = Some(Found { ordinal, value: value.to_string() });
                }
            }
            Expr::Call(call) => {
                let ordinal = self.calls;
                self.calls += 1;

                if self.rotation.is_none() {
                    if let Some(value) = rotation_argument(call) {
                        self.rotation = Some(Found { ordinal, value });
                    }
                }
            }
            _ => {}
        }
        expr.visit_children_with(self);
    }
}

/// The second argument of a two-argument call, if it's a non-negative
/// integer literal.
fn rotation_argument(call: &CallExpr) -> Option<usize> {
    if call.args.len() != 2 || call.args.iter().any(|arg| arg.spread.is_some()) {
        return None;
    }
    match &*call.args[1].expr {
        Expr::Lit(Lit::Num(n)) => integer(n.value),
        _ => None
    }
}

fn integer(value: f64) -> Option<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as usize)
    } else {
        None
    }
}

/// Blanks the payload and marks the separator and the rotating call for
/// [Cleanup]. Counts nodes exactly like [Scanner].
struct Extractor {
    payload: usize,
    separator: usize,
    rotation: usize,
    strings: usize,
    calls: usize
}

impl VisitMut for Extractor {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        let mut remove = false;
        match expr {
            Expr::Lit(Lit::Str(s)) => {
                if self.strings == self.payload {
                    s.value = JsWord::from("");
                    s.raw = None;
                } else if self.strings == self.separator {
                    remove = true;
                }
                self.strings += 1;
            }
            Expr::Call(_) => {
                remove = self.calls == self.rotation;
                self.calls += 1;
            }
            _ => {}
        }

        expr.visit_mut_children_with(self);
        if remove {
            *expr = Expr::Invalid(Invalid { span: DUMMY_SP });
        }
    }
}

/// Replaces `b(3)` with the fourth string of the table.
struct Substitution {
    accessors: Vec<JsWord>,
    table: Vec<String>
}

impl Substitution {
    fn lookup(&self, call: &CallExpr) -> Option<&str> {
        let callee = match &call.callee {
            Callee::Expr(callee) => callee,
            _ => return None
        };
        match &**callee {
            Expr::Ident(id) if self.accessors.contains(&id.sym) => {}
            _ => return None
        }

        if call.args.len() != 1 || call.args[0].spread.is_some() {
            return None;
        }
        let index = match &*call.args[0].expr {
            Expr::Lit(Lit::Num(n)) => integer(n.value)?,
            _ => return None
        };
        self.table.get(index).map(String::as_str)
    }
}

impl VisitMut for Substitution {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);

        if let Expr::Call(call) = expr {
            if let Some(value) = self.lookup(call) {
                *expr = str_lit(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscate::tests::{normalize, transform};

    #[test]
    fn test_chunks_rotate_left() {
        assert_eq!(chunks("bar,foo,baz", ",", 1), vec!["foo", "baz", "bar"]);
        assert_eq!(chunks("bar,foo,baz", ",", 3), vec!["bar", "foo", "baz"]);
        assert_eq!(chunks("bar;foo", ";", 0), vec!["bar", "foo"]);
    }

    #[test]
    fn test_extracts_and_substitutes() {
        let config = Config {
            mixed_string_threshold: 5,
            ..Config::default()
        };
        let result = transform(r#"var t = "bar,foo,baz"; x = ","; r(t, 1); f(b(0), c(1), b(3), d(0));"#, |program| {
            deobfuscate(program, &config).unwrap();
        });

        assert_eq!(result, normalize(r#"var t = ""; x = void 0; f("foo", "baz", b(3), d(0));"#));
    }

    #[test]
    fn test_default_threshold() {
        let payload: Vec<String> = (0..100).map(|i| format!("s{}", i)).collect();
        let code = format!(r#"var t = "{}"; r(t.split(";"), 2); log(b(0), b(99));"#, payload.join(";"));

        let result = transform(&code, |program| {
            deobfuscate(program, &Config::default()).unwrap();
        });

        assert_eq!(result, normalize(r#"var t = ""; log("s2", "s1");"#));
    }

    #[test]
    fn test_threshold_counts_utf16_units() {
        let config = Config {
            mixed_string_threshold: 5,
            ..Config::default()
        };
        // Three characters, six code units
        let result = transform(r#"var s = "😀😀😀"; var t = "bar,foo"; x = ","; r(t, 0); f(b(1));"#, |program| {
            deobfuscate(program, &config).unwrap();
        });

        assert_eq!(result, normalize(r#"var s = ""; var t = "bar,foo"; x = void 0; f(b(1));"#));
    }

    #[test]
    fn test_incomplete_pattern_is_untouched() {
        let config = Config {
            mixed_string_threshold: 5,
            ..Config::default()
        };
        let code = r#"var t = "bar,foo,baz"; f(b(0));"#;

        let mut error = None;
        let result = transform(code, |program| {
            error = deobfuscate(program, &config).err();
        });

        assert_eq!(error, Some(PatternError::Mismatch("no separator literal")));
        assert_eq!(result, normalize(code));
    }
}
