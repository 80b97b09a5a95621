use std::collections::HashSet;
use swc_core::ecma::atoms::JsWord;

const BUILT_IN: &[&str] = &[
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel",
    "india", "juliett", "kilo", "lima", "mike", "november", "oscar", "papa",
    "quebec", "romeo", "sierra", "tango", "uniform", "victor", "whiskey",
    "xray", "yankee", "zulu"
];

/// An endless sequence of readable names.
///
/// Once the list runs out it starts over with the round number appended:
/// `alpha`, ..., `zulu`, `alpha2`, ..., `zulu2`, `alpha3`.
#[derive(Debug, Clone)]
pub struct NamePool {
    names: Vec<String>
}

impl Default for NamePool {
    fn default() -> Self {
        Self {
            names: BUILT_IN.iter().map(|s| s.to_string()).collect()
        }
    }
}

impl NamePool {
    /// A pool over `names`. An empty list falls back to plain numbers.
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names
        }
    }

    pub fn get(&self, index: usize) -> String {
        if self.names.is_empty() {
            return index.to_string();
        }

        let base = &self.names[index % self.names.len()];
        match index / self.names.len() {
            0 => base.clone(),
            round => format!("{}{}", base, round + 1)
        }
    }
}

/// Hands out prefixed names that never repeat and never collide with a
/// symbol already in the program.
pub struct NameGenerator {
    pool: NamePool,
    custom: Vec<String>,
    next: usize,
    taken: HashSet<JsWord>
}

impl NameGenerator {
    /// `custom` names are used, in order, before the pool's.
    pub fn new(pool: NamePool, custom: Vec<String>, taken: HashSet<JsWord>) -> Self {
        Self {
            pool,
            custom,
            next: 0,
            taken
        }
    }

    /// Marks more names as taken.
    pub fn with_taken<I: IntoIterator<Item = JsWord>>(mut self, names: I) -> Self {
        self.taken.extend(names);
        self
    }

    pub fn next_name(&mut self, prefix: &str) -> JsWord {
        let index = self.next;
        self.next += 1;

        let base = match self.custom.get(index) {
            Some(custom) => format!("{}{}", prefix, custom),
            None => format!("{}{}", prefix, self.pool.get(index))
        };

        let mut name = JsWord::from(base.as_str());
        let mut suffix = 2;
        while self.taken.contains(&name) {
            name = JsWord::from(format!("{}{}", base, suffix));
            suffix += 1;
        }

        self.taken.insert(name.clone());
        name
    }
}
