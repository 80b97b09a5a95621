use serde::Deserialize;

use crate::DeobfuscateError;

/// Controls which passes [crate::deobfuscate::Pipeline] runs and how the
/// pattern-driven ones recognise their input.
///
/// Every field has a default, so a configuration file only needs the keys
/// it wants to change:
///
/// ```json
/// { "jsfuck": true, "custom_names": ["decoder", "payload"] }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reverse the mixed-string table and switch-based control-flow flattening.
    pub cloudflare: bool,

    /// Inline calls through trivial forwarding wrappers.
    pub inline_helpers: bool,

    /// Use the generic constant evaluator (for JSFuck-style code) instead of
    /// the narrower `!![]` / `![]` / `!1` unmasking.
    pub jsfuck: bool,

    /// Split comma expressions into statements.
    pub split_sequences: bool,

    /// Rewrite `x = a ? b : c;` into `if`/`else`.
    pub expand_ternaries: bool,

    /// Rewrite value-producing `&&` into an `if` over a temporary.
    pub expand_logical: bool,

    /// Rename declarations with readable names. Always runs last.
    pub rename: bool,

    /// Rename function parameters with readable names.
    pub rename_arguments: bool,

    /// Names used, in order, before falling back to the name pool.
    pub custom_names: Vec<String>,

    /// Replaces the built-in name pool.
    pub name_pool: Option<Vec<String>>,

    /// Minimum length of the scrambled string payload.
    pub mixed_string_threshold: usize,

    /// Characters accepted as the payload separator.
    pub separators: String,

    /// Names of the one-letter functions that index the string table.
    pub accessor_names: Vec<String>
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cloudflare: true,
            inline_helpers: true,
            jsfuck: false,
            split_sequences: true,
            expand_ternaries: true,
            expand_logical: false,
            rename: true,
            rename_arguments: true,
            custom_names: Vec::new(),
            name_pool: None,
            mixed_string_threshold: 200,
            separators: String::from(",;{}[]"),
            accessor_names: vec![String::from("b"), String::from("c")]
        }
    }
}

impl Config {
    /// Reads a configuration from JSON. Missing keys keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, DeobfuscateError> {
        Ok(serde_json::from_str(raw)?)
    }
}
