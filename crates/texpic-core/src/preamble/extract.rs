//! Preamble synthesis from document declarations.
//!
//! Only the declarations that can influence how a picture renders are kept:
//! package and library imports, style blocks and colour definitions. The
//! patterns tolerate up to three levels of brace nesting inside style blocks;
//! anything deeper is not matched.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::region::strip_comment;

/// Package every picture needs.
pub const BASELINE_IMPORT: &str = "\\usepackage{tikz}";

/// Brace group with up to three levels of nesting.
const BRACED: &str = r"\{(?:[^{}]|\{(?:[^{}]|\{[^{}]*\})*\})*\}";

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    let patterns = [
        r"\\usepackage\s*(?:\[[^\]]*\])?\s*\{[^}]*\}".to_string(),
        r"\\usetikzlibrary\s*\{[^}]*\}".to_string(),
        r"\\usepgfplotslibrary\s*\{[^}]*\}".to_string(),
        format!(r"\\(?:tikzset|pgfplotsset)\s*{}", BRACED),
        r"\\tikzstyle\s*\{[^}]*\}\s*=\s*\[[^\]]*\]".to_string(),
        r"\\definecolor\s*\{[^}]*\}\s*\{[^}]*\}\s*\{[^}]*\}".to_string(),
        r"\\colorlet\s*\{[^}]*\}\s*\{[^}]*\}".to_string(),
    ];
    Regex::new(&patterns.join("|")).unwrap()
});

static PACKAGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\usepackage\s*(?:\[[^\]]*\])?\s*\{([^}]*)\}").unwrap());

static DOCUMENT_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\begin\s*\{document\}").unwrap());

/// Portion of the document scanned for declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Everything before `\begin{document}`, or the whole text without one.
    Document,
    /// The first `n` lines.
    UpToLine(u32),
}

/// Inputs to extraction beyond the document itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Scan the document at all; when false only the baseline, the extra
    /// declarations and the trailer are emitted.
    pub parse_document: bool,
    /// User-supplied declarations appended after the scanned ones.
    pub extra_declarations: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            parse_document: true,
            extra_declarations: String::new(),
        }
    }
}

/// Synthesize the preamble for pictures of a document.
///
/// Output is a pure function of the arguments.
pub fn extract(text: &str, document_dir: &Path, scope: Scope, options: &ExtractOptions) -> String {
    let declarations: Vec<String> = if options.parse_document {
        let window = window(text, scope);
        DECLARATION
            .find_iter(&window)
            .map(|m| m.as_str().to_string())
            .collect()
    } else {
        Vec::new()
    };

    let mut out = String::new();

    if !declarations.iter().any(|d| loads_tikz(d)) {
        out.push_str(BASELINE_IMPORT);
        out.push('\n');
    }

    for declaration in &declarations {
        out.push_str(declaration);
        out.push('\n');
    }

    let extra = options.extra_declarations.trim();
    if !extra.is_empty() {
        out.push_str(extra);
        out.push('\n');
    }

    out.push_str(&trailer(document_dir));
    out
}

/// Comment-free text that declarations are searched in.
fn window(text: &str, scope: Scope) -> String {
    let lines = text.lines().map(strip_comment);
    let stripped = match scope {
        Scope::UpToLine(n) => lines.take(n as usize).collect::<Vec<_>>().join("\n"),
        Scope::Document => lines.collect::<Vec<_>>().join("\n"),
    };

    match scope {
        Scope::Document => match DOCUMENT_START.find(&stripped) {
            Some(m) => stripped[..m.start()].to_string(),
            None => stripped,
        },
        Scope::UpToLine(_) => stripped,
    }
}

fn loads_tikz(declaration: &str) -> bool {
    PACKAGES
        .captures(declaration)
        .and_then(|c| c.get(1))
        .is_some_and(|list| list.as_str().split(',').any(|p| p.trim() == "tikz"))
}

/// Search-path hint and uncompressed output directives.
fn trailer(document_dir: &Path) -> String {
    let dir = document_dir.display().to_string().replace('\\', "/");
    let dir = dir.trim_end_matches('/');
    format!(
        "\\makeatletter\n\\def\\input@path{{{{{}/}}}}\n\\makeatother\n\\pdfcompresslevel=0\n\\pdfobjcompresslevel=0\n",
        dir
    )
}
