use std::fmt;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One parser diagnostic, collected rather than acted on.
///
/// The caller decides what to do with the list; the parser layer never
/// terminates the process itself.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// 1-indexed source line.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: line {}: {}", self.severity, self.line, self.message)
    }
}

/// Collect parse diagnostics from a syntax tree.
///
/// ERROR nodes become `Error` diagnostics; missing tokens inserted by the
/// parser's recovery become `Warning`s.
pub fn collect(root: Node, source: &str) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    if root.has_error() {
        walk(root, source.as_bytes(), &mut out);
    }
    out
}

pub fn has_fatal(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.severity == Severity::Error)
}

fn walk(node: Node, source: &[u8], out: &mut Vec<Diagnostic>) {
    if node.is_error() {
        out.push(Diagnostic {
            severity: Severity::Error,
            line: node.start_position().row + 1,
            message: format!("unparsable input near `{}`", snippet(node, source)),
        });
        // Children of an ERROR node repeat the same failure.
        return;
    }

    if node.is_missing() {
        out.push(Diagnostic {
            severity: Severity::Warning,
            line: node.start_position().row + 1,
            message: format!("missing `{}` inserted by parser recovery", node.kind()),
        });
        return;
    }

    if !node.has_error() {
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, out);
    }
}

fn snippet(node: Node, source: &[u8]) -> String {
    const MAX_SNIPPET_CHARS: usize = 40;
    let text = node.utf8_text(source).unwrap_or("<non-utf8>");
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(MAX_SNIPPET_CHARS).collect();
    if trimmed.chars().count() > MAX_SNIPPET_CHARS {
        out.push_str("...");
    }
    out
}
