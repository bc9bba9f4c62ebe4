//! Promotion of fenced code blocks to executable samples.
//!
//! A code block becomes a [`Sample`] when its language is executable. The
//! annotation comments around it supply extra source: the nearest
//! non-ignored comment before the block is the header, the nearest one
//! after it is the footer. A header equal to the skip marker drops the
//! block entirely.
//!
//! The assembled [`Sample::source_unit`] is padded with blank lines so the
//! body's first line sits on the same line number it has in the manuscript.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::Tree;
use crate::node::{InlineNode, Node, NodeKind, plain_text};

/// Number of `$N` flags declared ahead of every sample.
pub const BOOTSTRAP_FLAGS: usize = 5;

/// Lines between the padding and the header that are not part of either:
/// three blank-line separators plus the line the padding run ends on.
const SEPARATOR_LINES: usize = 4;

/// `if (...) {` followed by exactly one `//` comment line and a closing brace.
static COMMENTED_IF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*if\s*\(.*\)\s*\{[ \t]*\n)([ \t]*)(//[^\n]*\n[ \t]*\})").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Language {
    Js,
    Jsx,
    Ts,
    Tsx,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::Js, Language::Jsx, Language::Ts, Language::Tsx];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "js" => Some(Language::Js),
            "jsx" => Some(Language::Jsx),
            "ts" => Some(Language::Ts),
            "tsx" => Some(Language::Tsx),
            _ => None,
        }
    }

    /// Fence tag, also used as the file extension.
    pub fn tag(self) -> &'static str {
        match self {
            Language::Js => "js",
            Language::Jsx => "jsx",
            Language::Ts => "ts",
            Language::Tsx => "tsx",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::from_tag(s).ok_or_else(|| format!("unknown sample language '{}'", s))
    }
}

/// Which code blocks are samples and how annotations are read.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    pub languages: Vec<Language>,
    /// Annotation texts that header/footer resolution walks past.
    pub ignore: Vec<String>,
    pub skip_marker: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            languages: Language::ALL.to_vec(),
            ignore: vec![
                "prettier-ignore".to_string(),
                "textlint-disable".to_string(),
                "textlint-enable".to_string(),
            ],
            skip_marker: "test-skip".to_string(),
        }
    }
}

/// One fenced code block promoted to an executable test case.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub language: Language,
    pub header: String,
    pub body: String,
    pub footer: String,
    pub chapter_title: String,
    /// Manuscript line of the opening fence.
    pub start_line: usize,
}

impl Sample {
    /// The complete program: padding, flag declarations, header, body and
    /// footer, separated by blank lines.
    pub fn source_unit(&self) -> String {
        let padding = "\n".repeat(padding_lines(self.start_line, &self.header));
        let body = instrument(&self.body).source;
        [
            padding.as_str(),
            bootstrap().as_str(),
            self.header.as_str(),
            body.as_str(),
            self.footer.as_str(),
        ]
        .join("\n\n")
    }

    /// File name shown in stack traces, e.g. `010_Intro.md.tsx`.
    pub fn display_name(&self, document_name: &str) -> String {
        format!("{}.{}", document_name, self.language)
    }
}

/// Flag declarations consumed by the `if` instrumentation, one per line.
pub fn bootstrap() -> String {
    (1..=BOOTSTRAP_FLAGS)
        .map(|n| format!("let ${} = false;", n))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Blank lines needed ahead of the unit so the body starts on `start_line + 1`.
pub fn padding_lines(start_line: usize, header: &str) -> usize {
    let header_lines = header.split('\n').count();
    start_line.saturating_sub(BOOTSTRAP_FLAGS + header_lines + SEPARATOR_LINES)
}

/// Result of [`instrument`].
#[derive(Debug, Clone, PartialEq)]
pub struct Instrumented {
    pub source: String,
    /// Number of flags assigned.
    pub flags: usize,
}

/// Make comment-only `if` bodies observable: the comment line gains a
/// `$N = true;` prefix. Line structure is unchanged. Matches past
/// [`BOOTSTRAP_FLAGS`] are left alone since no flag is declared for them.
pub fn instrument(body: &str) -> Instrumented {
    let mut flags = 0;
    let source = COMMENTED_IF.replace_all(body, |caps: &Captures| {
        if flags == BOOTSTRAP_FLAGS {
            return caps[0].to_string();
        }
        flags += 1;
        format!("{}{}${} = true; {}", &caps[1], &caps[2], flags, &caps[3])
    });
    Instrumented {
        source: source.into_owned(),
        flags,
    }
}

/// Header for the code block at `index`: the nearest preceding annotation,
/// walking through ignore-listed ones. Empty when a non-annotation comes first.
pub fn resolve_header<'a>(siblings: &'a [Node], index: usize, ignore: &[String]) -> &'a str {
    resolve(siblings, (0..index).rev(), ignore)
}

/// Footer for the code block at `index`, resolved like the header but forwards.
pub fn resolve_footer<'a>(siblings: &'a [Node], index: usize, ignore: &[String]) -> &'a str {
    resolve(siblings, index + 1..siblings.len(), ignore)
}

fn resolve<'a>(
    siblings: &'a [Node],
    positions: impl Iterator<Item = usize>,
    ignore: &[String],
) -> &'a str {
    for position in positions {
        match siblings[position].annotation() {
            Some(text) if ignore.iter().any(|directive| directive == text) => continue,
            Some(text) => return text,
            None => break,
        }
    }
    ""
}

/// Title of the nearest heading before `index`; empty when there is none.
pub fn chapter_title(siblings: &[Node], index: usize) -> String {
    nearest_heading(siblings, index).unwrap_or_default()
}

fn nearest_heading(siblings: &[Node], index: usize) -> Option<String> {
    siblings[..index.min(siblings.len())]
        .iter()
        .rev()
        .find_map(|node| match &node.kind {
            NodeKind::Heading { content, .. } => Some(heading_title(content)),
            _ => None,
        })
}

/// The heading's first inline; a leading link contributes its inner text.
fn heading_title(content: &[InlineNode]) -> String {
    let title = match content.first() {
        Some(InlineNode::Link { content, .. }) => plain_text(content),
        Some(first) => first.plain_text(),
        None => String::new(),
    };
    title.trim().to_string()
}

/// Every sample in `tree`, in document order.
pub fn extract(tree: &Tree, options: &ExtractOptions) -> Vec<Sample> {
    let mut samples = Vec::new();
    let mut ancestors = Vec::new();
    visit(&tree.nodes, &mut ancestors, options, &mut samples);
    tracing::debug!(samples = samples.len(), "extracted samples");
    samples
}

fn visit<'a>(
    siblings: &'a [Node],
    ancestors: &mut Vec<(&'a [Node], usize)>,
    options: &ExtractOptions,
    out: &mut Vec<Sample>,
) {
    for (index, node) in siblings.iter().enumerate() {
        match &node.kind {
            NodeKind::CodeBlock { language, source } => {
                let Some(language) = language
                    .as_deref()
                    .and_then(Language::from_tag)
                    .filter(|lang| options.languages.contains(lang))
                else {
                    continue;
                };

                let header = resolve_header(siblings, index, &options.ignore);
                if header == options.skip_marker {
                    continue;
                }
                let footer = resolve_footer(siblings, index, &options.ignore);

                // Blocks nested in lists or quotes fall back to the headings
                // around their container.
                let chapter_title = nearest_heading(siblings, index)
                    .or_else(|| {
                        ancestors
                            .iter()
                            .rev()
                            .find_map(|(parent, position)| nearest_heading(parent, *position))
                    })
                    .unwrap_or_default();

                out.push(Sample {
                    language,
                    header: header.to_string(),
                    body: source.strip_suffix('\n').unwrap_or(source).to_string(),
                    footer: footer.to_string(),
                    chapter_title,
                    start_line: node.line,
                });
            }
            NodeKind::Container { children, .. } => {
                ancestors.push((siblings, index));
                visit(children, ancestors, options, out);
                ancestors.pop();
            }
            _ => {}
        }
    }
}
