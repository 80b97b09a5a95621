use std::fmt::{Display, Formatter};
use swc_core::common::Mark;
use swc_core::ecma::ast::Program;
use swc_core::ecma::visit::VisitMutWith;
use swc_ecma_transforms::resolver;
use tracing::{debug, warn};

use crate::Config;

pub mod branches;
pub mod computed_member_expr;
pub mod constant_folding;
pub mod constants;
pub mod empty_statements;
pub mod evaluate;
pub mod fingerprint;
pub mod helper_fns;
pub mod inline_if;
pub mod inline_logical;
pub mod jsfuck;
pub mod literals;
pub mod mixed_strings;
pub mod names;
pub mod rename;
pub mod scope;
pub mod sequences;
pub mod switch_unroll;
pub mod unmask;
pub mod unused;
pub mod util;

/// Why a pattern-driven pass declined to rewrite.
///
/// These never escape the pipeline: the pass leaves the tree as it was and
/// the pipeline carries on.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternError {
    /// The code doesn't have the expected shape.
    Mismatch(&'static str),

    /// An order-string doesn't have one entry per `switch` case.
    InconsistentCount {
        entries: usize,
        cases: usize
    },

    /// A callee or assignment target isn't a plain dotted chain.
    UnsupportedBindingShape
}

impl Display for PatternError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mismatch(what) => write!(f, "Mismatch: {}", what),
            Self::InconsistentCount { entries, cases } => write!(
                f,
                "InconsistentCount: order has {} entries but the switch has {} cases",
                entries,
                cases
            ),
            Self::UnsupportedBindingShape => write!(f, "UnsupportedBindingShape")
        }
    }
}

impl std::error::Error for PatternError {}

/// Logs the outcome of a pattern-driven stage. Mismatches are expected on
/// code the stage doesn't target, so only inconsistent counts are warnings.
pub(crate) fn report(stage: &str, result: Result<(), PatternError>) {
    match result {
        Ok(()) => debug!("{}: applied", stage),
        Err(e @ PatternError::InconsistentCount { .. }) => warn!("{}: {}", stage, e),
        Err(e) => debug!("{}: skipped, {}", stage, e)
    }
}

/// Runs the configured passes, in a fixed order, over one program.
pub struct Pipeline<'a> {
    config: &'a Config
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config
        }
    }

    /// Reverses the string mixing and switch-based control-flow flattening.
    ///
    /// Each stage either applies completely or leaves the tree untouched.
    pub fn deobfuscate_cloudflare(&self, program: &mut Program) {
        program.visit_mut_with(&mut mixed_strings::Visitor::new(self.config));
        program.visit_mut_with(&mut switch_unroll::Visitor);
    }

    /// Must be called inside [swc_core::common::GLOBALS] (the resolver
    /// creates marks). [crate::with_program] takes care of that.
    pub fn run(&self, program: &mut Program) {
        let config = self.config;

        program.visit_mut_with(&mut resolver(Mark::new(), Mark::new(), false));
        program.visit_mut_with(&mut literals::Visitor);

        if config.cloudflare {
            self.deobfuscate_cloudflare(program);
        }
        if config.inline_helpers {
            program.visit_mut_with(&mut helper_fns::Visitor);
        }

        if config.jsfuck {
            program.visit_mut_with(&mut jsfuck::Visitor::default());
        } else {
            program.visit_mut_with(&mut unmask::Visitor);
        }

        program.visit_mut_with(&mut unused::Visitor);
        program.visit_mut_with(&mut constants::Visitor);
        program.visit_mut_with(&mut constant_folding::Visitor::default());
        program.visit_mut_with(&mut computed_member_expr::Visitor);

        if config.split_sequences {
            program.visit_mut_with(&mut sequences::Visitor);
        }
        if config.expand_ternaries {
            program.visit_mut_with(&mut inline_if::Visitor);
        }
        if config.expand_logical {
            program.visit_mut_with(&mut inline_logical::Visitor::default());
        }

        program.visit_mut_with(&mut branches::UselessIf);
        program.visit_mut_with(&mut branches::DeadElse);
        program.visit_mut_with(&mut empty_statements::Visitor);

        // Folding and pruning leave new unused declarations behind.
        program.visit_mut_with(&mut unused::Visitor);

        if config.rename_arguments {
            program.visit_mut_with(&mut rename::ArgumentRenamer::new(config));
        }
        if config.rename {
            program.visit_mut_with(&mut rename::Renamer::new(config));
        }
        debug!("pipeline finished");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use swc_core::common::{FileName, SourceMap};
    use swc_core::common::sync::Lrc;
    use swc_core::ecma::ast::Expr;
    use swc_ecma_parser::{Parser, StringInput, Syntax};

    use super::*;

    /// Parses `code`, applies `f` and prints the result.
    pub fn transform<F>(code: &str, f: F) -> String
        where F: FnOnce(&mut Program)
    {
        crate::with_program(code, f).expect("failed to transform")
    }

    /// Parses and prints `code` unchanged, to compare against pass output.
    pub fn normalize(code: &str) -> String {
        transform(code, |_| {})
    }

    pub fn resolve(program: &mut Program) {
        program.visit_mut_with(&mut resolver(Mark::new(), Mark::new(), false));
    }

    pub fn parse_expr(code: &str) -> Box<Expr> {
        let cm: Lrc<SourceMap> = Default::default();
        let fm = cm.new_source_file(FileName::Anon, code.to_string());
        let mut parser = Parser::new(Syntax::Es(Default::default()), StringInput::from(&*fm), None);

        parser.parse_expr().expect("failed to parse expression")
    }

    fn run(code: &str, config: &Config) -> String {
        transform(code, |program| Pipeline::new(config).run(program))
    }

    #[test]
    fn test_pattern_error_display() {
        let e = PatternError::InconsistentCount { entries: 3, cases: 2 };
        assert_eq!(e.to_string(), "InconsistentCount: order has 3 entries but the switch has 2 cases");
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let config = Config {
            rename: false,
            rename_arguments: false,
            ..Config::default()
        };
        let code = r#"
            var a = "xy", b = 2;
            if (!![]) { log(a, b); } else { ; }
            function g(p) { return p = q ? 1 : 2, p; }
            window["document"]["title"] = g(3);
        "#;

        let once = run(code, &config);
        let twice = run(&once, &config);

        assert_eq!(once, twice);
        assert!(once.contains("log(\"xy\", 2)"), "{}", once);
        assert!(once.contains("window.document.title"), "{}", once);
    }

    #[test]
    fn test_jsfuck_mode() {
        let config = Config {
            jsfuck: true,
            rename: false,
            ..Config::default()
        };
        let result = run("alert((![] + [])[+[]] + (![] + [])[+!![]]);", &config);

        assert_eq!(result, normalize(r#"alert("fa");"#));
    }

    #[test]
    fn test_cloudflare_stages() {
        let config = Config {
            rename: false,
            ..Config::default()
        };
        let table: Vec<String> = (0..100).map(|i| format!("s{}", i)).collect();
        let code = format!(
            r#"
            var t = "{}";
            r(t.split(","), 0);
            for (f = "1|0".split("|"), g = 0; ; ) {{
                switch (f[g++]) {{
                    case "0": log(b(0)); continue;
                    case "1": log(b(1)); continue;
                }}
                break;
            }}
            "#,
            table.join(",")
        );

        assert_eq!(run(&code, &config), normalize(r#"f = "1|0".split("|"); log("s1"); log("s0");"#));
    }

    #[test]
    fn test_passes_can_be_disabled() {
        let config = Config {
            split_sequences: false,
            expand_ternaries: false,
            rename: false,
            rename_arguments: false,
            ..Config::default()
        };
        let code = "a(), b(); x = y ? 1 : 2;";

        assert_eq!(run(code, &config), normalize(code));
    }
}
