use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tree_sitter::{Language, Node, Parser, Tree};

/// Byte offsets into an immutable source buffer.
///
/// `end` points one past the last byte of the final token, so slicing a
/// declaration always includes its trailing brace or semicolon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    /// Slice the exact source text covered by this span.
    ///
    /// Pure: same inputs always yield the same output. Returns `None` when
    /// either offset is out of range, the span is inverted, or an offset
    /// would split a UTF-8 code point.
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        if self.start > self.end || self.end > source.len() {
            return None;
        }
        if !source.is_char_boundary(self.start) || !source.is_char_boundary(self.end) {
            return None;
        }
        Some(&source[self.start..self.end])
    }
}

/// One function declaration found in a parsed unit.
///
/// Parser-agnostic: downstream code only needs the unqualified name, the
/// textual span, and whether a body is present.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub span: SourceSpan,
    /// False for prototypes / forward declarations.
    pub has_body: bool,
    /// 1-indexed line of the declaration start (for log messages).
    pub line: usize,
}

pub trait LanguageDriver: Send + Sync {
    fn name(&self) -> &'static str;
    /// File extensions handled by this driver (lowercase, without dot).
    fn extensions(&self) -> &'static [&'static str];
    fn language(&self) -> Language;
}

struct CDriver;
impl LanguageDriver for CDriver {
    fn name(&self) -> &'static str {
        "c"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["c", "h"]
    }

    fn language(&self) -> Language {
        tree_sitter_c::LANGUAGE.into()
    }
}

struct CppDriver;
impl LanguageDriver for CppDriver {
    fn name(&self) -> &'static str {
        "cpp"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["cpp", "cc", "cxx", "hpp", "hxx", "hh"]
    }

    fn language(&self) -> Language {
        tree_sitter_cpp::LANGUAGE.into()
    }
}

struct LanguageConfig {
    drivers: Vec<Box<dyn LanguageDriver>>,
    by_ext: HashMap<String, usize>,
}

impl LanguageConfig {
    fn driver_for_path(&self, path: &Path) -> Option<&dyn LanguageDriver> {
        let ext = path_ext_lower(path);
        self.by_ext.get(&ext).map(|&idx| self.drivers[idx].as_ref())
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        let drivers: Vec<Box<dyn LanguageDriver>> = vec![Box::new(CDriver), Box::new(CppDriver)];

        let mut cfg = Self {
            drivers,
            by_ext: HashMap::new(),
        };

        for (idx, d) in cfg.drivers.iter().enumerate() {
            for ext in d.extensions() {
                cfg.by_ext.insert(ext.to_string(), idx);
            }
        }

        cfg
    }
}

fn language_config() -> &'static LanguageConfig {
    static CFG: OnceLock<LanguageConfig> = OnceLock::new();
    CFG.get_or_init(LanguageConfig::default)
}

fn path_ext_lower(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Parse a source buffer with the grammar selected by the file extension.
pub fn parse_source(path: &Path, source: &str) -> Result<Tree> {
    let driver = language_config()
        .driver_for_path(path)
        .ok_or_else(|| anyhow!("unsupported file extension: {}", path.display()))?;
    log::debug!("parsing {} with the {} grammar", path.display(), driver.name());

    let mut parser = Parser::new();
    parser
        .set_language(&driver.language())
        .context("failed to set tree-sitter language")?;
    parser
        .parse(source, None)
        .ok_or_else(|| anyhow!("failed to parse {}", path.display()))
}

/// Collect every function declaration in the unit, in source order.
///
/// Both definitions (with a body) and bare prototypes are returned; the
/// caller filters on `has_body`. Overloads appear once per declaration.
pub fn collect_functions(root: Node, source: &str) -> Vec<FunctionDecl> {
    let mut out = Vec::new();
    walk(root, source.as_bytes(), &mut out);
    out
}

fn walk(node: Node, source: &[u8], out: &mut Vec<FunctionDecl>) {
    match node.kind() {
        "function_definition" => {
            if let Some(decl) = function_from_node(node, source, true) {
                out.push(decl);
            }
        }
        "declaration" => {
            // A declaration whose declarator resolves to a function_declarator
            // is a prototype. Anything else (variables, function pointers) is
            // skipped.
            if find_function_declarator(node).is_some() {
                if let Some(decl) = function_from_node(node, source, false) {
                    out.push(decl);
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, out);
    }
}

fn function_from_node(node: Node, source: &[u8], has_body: bool) -> Option<FunctionDecl> {
    let declarator = find_function_declarator(node)?;
    let name_node = declarator.child_by_field_name("declarator")?;
    let name = unqualified_name(name_node, source)?;

    // A definition without a resolvable body field is malformed; keep the
    // has_body flag honest rather than trusting the node kind alone.
    let has_body = has_body && node.child_by_field_name("body").is_some();

    Some(FunctionDecl {
        name,
        span: SourceSpan {
            start: node.start_byte(),
            end: node.end_byte(),
        },
        has_body,
        line: node.start_position().row + 1,
    })
}

/// Descend through pointer/reference declarators to the function declarator.
fn find_function_declarator(node: Node) -> Option<Node> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "function_declarator" => return Some(current),
            "pointer_declarator" | "reference_declarator" => {
                current = current.child_by_field_name("declarator")?;
            }
            _ => return None,
        }
    }
}

/// Resolve the unqualified name of a declarator child node.
///
/// `ns::Class::method` resolves to `method`; destructors and operators keep
/// their spelled form (`~Foo`, `operator+`).
fn unqualified_name(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" | "field_identifier" | "destructor_name" | "operator_name" => {
            node.utf8_text(source).ok().map(str::to_string)
        }
        "qualified_identifier" | "template_function" => {
            unqualified_name(node.child_by_field_name("name")?, source)
        }
        _ => None,
    }
}

/// Keep function definitions (body required) whose unqualified name fully
/// matches the pattern. Order is source order; no dedup.
pub fn filter_matches<'a>(decls: &'a [FunctionDecl], pattern: &Regex) -> Vec<&'a FunctionDecl> {
    decls
        .iter()
        .filter(|d| d.has_body && pattern.is_match(&d.name))
        .collect()
}
