use std::fmt::{Debug, Display, Formatter};
use std::io::Write;
use std::sync::Arc;
use swc::config::IsModule;
use swc_core::common::{FileName, GLOBALS, Globals, SourceMap};
use swc_core::common::errors::{EmitterWriter, Handler};
use swc_core::ecma::ast::{EsVersion, Program};
use swc_core::ecma::codegen::Emitter;
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::visit::FoldWith;
use swc_ecma_parser::{EsConfig, Syntax};
use swc_ecma_transforms::fixer::fixer;

pub mod config;
pub mod deobfuscate;
mod shared_cursor;

pub use config::Config;

/// A deobfuscation error.
///
/// Pattern mismatches inside the passes are never reported here; only
/// failures of the surrounding parse/print machinery are.
#[derive(Debug)]
pub enum DeobfuscateError {
    /// SWC failed to parse the JavaScript code.
    ParseError(anyhow::Error),

    /// The parser emitted one or more diagnostics.
    Diagnostics(Vec<String>),

    /// Failed to emit the transformed program.
    PrintError(std::io::Error),

    /// The emitted code or the captured diagnostics were not valid UTF-8.
    EncodingError(std::string::FromUtf8Error),

    /// Failed to parse a configuration file.
    ConfigError(serde_json::Error)
}

impl Display for DeobfuscateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseError(e) => write!(f, "ParseError: {}", e),
            Self::Diagnostics(errs) => write!(f, "Diagnostics: {}", errs.join(", ")),
            Self::PrintError(e) => write!(f, "PrintError: {}", e),
            Self::EncodingError(e) => write!(f, "EncodingError: {}", e),
            Self::ConfigError(e) => write!(f, "ConfigError: {}", e)
        }
    }
}

impl std::error::Error for DeobfuscateError {}

impl From<anyhow::Error> for DeobfuscateError {
    fn from(err: anyhow::Error) -> Self {
        Self::ParseError(err)
    }
}

impl From<Vec<String>> for DeobfuscateError {
    fn from(errors: Vec<String>) -> Self {
        Self::Diagnostics(errors)
    }
}

impl From<std::io::Error> for DeobfuscateError {
    fn from(err: std::io::Error) -> Self {
        Self::PrintError(err)
    }
}

impl From<std::string::FromUtf8Error> for DeobfuscateError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::EncodingError(err)
    }
}

impl From<serde_json::Error> for DeobfuscateError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigError(err)
    }
}

/// Deobfuscates the given script with the pass list described by `config`
/// and returns the regenerated source.
pub fn deobfuscate(code: &str, config: &Config) -> Result<String, DeobfuscateError> {
    with_program(code, |program| {
        deobfuscate::Pipeline::new(config).run(program);
    })
}

/// Parses `code`, hands the tree to `transform`, and prints the result.
///
/// `transform` runs inside a fresh set of SWC [Globals], so it may create
/// [swc_core::common::Mark]s (the resolver needs them).
pub fn with_program<F>(code: &str, transform: F) -> Result<String, DeobfuscateError>
    where F: FnOnce(&mut Program)
{
    let cm = Arc::<SourceMap>::default();
    let err_dst = shared_cursor::SharedCursor::new();
    let handler = Handler::with_emitter(
        false,
        false,
        Box::new(EmitterWriter::new(
            Box::new(err_dst.clone()) as Box<dyn Write + Send>,
            None,
            true,
            false
        ))
    );
    let compiler = swc::Compiler::new(cm.clone());
    let fm = cm.new_source_file(FileName::Custom("input.js".into()), code.to_string());

    let globals = Globals::new();
    // We can't return an error inside a closure, so the outcome is deferred.
    let result = GLOBALS.set(&globals, || -> Result<Vec<u8>, DeobfuscateError> {
        let mut program = compiler.parse_js(
            fm,
            &handler,
            EsVersion::latest(),
            Syntax::Es(EsConfig::default()),
            IsModule::Bool(false),
            None
        )?;

        transform(&mut program);

        // Re-insert the parentheses some rewrites (negation, spliced operands) need.
        let program = program.fold_with(&mut fixer(None));

        let mut buf = Vec::new();
        {
            let mut emitter = Emitter {
                cfg: Default::default(),
                cm: cm.clone(),
                comments: None,
                wr: JsWriter::new(cm.clone(), "\n", &mut buf, None)
            };
            emitter.emit_program(&program)?;
        }
        Ok(buf)
    });

    // Parse emitted errors
    let errors = err_dst.lines()?;
    let buf = match result {
        Ok(buf) => buf,
        Err(DeobfuscateError::ParseError(e)) if !errors.is_empty() => {
            return Err(DeobfuscateError::ParseError(e.context(errors.join("\n"))));
        }
        Err(e) => return Err(e)
    };
    // Return error if not empty
    if !errors.is_empty() {
        return Err(DeobfuscateError::from(errors));
    }

    Ok(String::from_utf8(buf)?)
}
