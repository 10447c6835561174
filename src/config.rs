use clap::ValueEnum;
use regex::Regex;
use std::path::PathBuf;

/// Selects which instruction the backend receives for each matched function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Personality {
    /// Generate structured documentation for the function.
    Docbot,
    /// Generate a unit test for the function.
    Testbot,
}

impl Personality {
    pub fn instruction(&self) -> &'static str {
        match self {
            Personality::Docbot => "Create doxygen documentation for this function.",
            Personality::Testbot => "Write a unit test for this function.",
        }
    }
}

/// Resolved run options. Immutable after construction; every downstream
/// component takes this by reference.
#[derive(Debug, Clone)]
pub struct Options {
    pub input_file: PathBuf,
    /// Full-match pattern for unqualified function names.
    ///
    /// Anchored at construction so `foo` never matches `foobar`.
    pub function_name: Regex,
    pub api_key: String,
    /// Extra include directories (`-I`). Accepted for command-line
    /// compatibility; the tree-sitter grammars do not run a preprocessor,
    /// so these do not affect parsing.
    pub search_paths: Vec<PathBuf>,
    pub personality: Personality,
}

/// Anchor a user-supplied pattern so it must match an entire name.
pub fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}
