//! Cross-reference checks for in-book links.
//!
//! Chapters are anchored with a `{#id}` line, a blank line, then a `#` or
//! `##` heading. Links of the form `[label](#id)` must point at an existing
//! anchor and repeat that heading's title exactly.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::document::Document;

static ANCHORED_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{#([^}]+)\}\n\n##?\s+([^\n]+)").unwrap());

static LOCAL_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(.*?)\]\(#(.*?)\)").unwrap());

/// An anchored chapter heading.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub id: String,
    pub title: String,
    pub path: PathBuf,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    DuplicateAnchor {
        id: String,
        title: String,
        path: PathBuf,
        line: usize,
    },
    MissingAnchor {
        id: String,
        label: String,
        path: PathBuf,
        line: usize,
    },
    LabelMismatch {
        id: String,
        title: String,
        label: String,
        path: PathBuf,
        line: usize,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateAnchor {
                id,
                title,
                path,
                line,
            } => write!(
                f,
                "{}:{}: link with ID #{} already exists, linked as \"{}\"",
                path.display(),
                line,
                id,
                title
            ),
            Violation::MissingAnchor {
                id,
                label,
                path,
                line,
            } => write!(
                f,
                "{}:{}: chapter with ID #{} not found, linked as \"{}\"",
                path.display(),
                line,
                id,
                label
            ),
            Violation::LabelMismatch {
                id,
                title,
                label,
                path,
                line,
            } => write!(
                f,
                "{}:{}: link label doesn't match chapter title #{}: chapter \"{}\" linked as \"{}\"",
                path.display(),
                line,
                id,
                title,
                label
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct LintReport {
    pub anchors: usize,
    pub links: usize,
    pub violations: Vec<Violation>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

fn line_at(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

fn is_ignored(document: &Document, ignore: &[String]) -> bool {
    ignore.iter().any(|name| *name == document.name)
}

/// Collect anchors from all documents. A repeated id keeps its first
/// definition; later ones are reported as violations.
pub fn collect_anchors(
    documents: &[Document],
    ignore: &[String],
) -> (HashMap<String, Anchor>, Vec<Violation>) {
    let mut anchors: HashMap<String, Anchor> = HashMap::new();
    let mut violations = Vec::new();

    for document in documents.iter().filter(|d| !is_ignored(d, ignore)) {
        for caps in ANCHORED_HEADING.captures_iter(&document.text) {
            let id = caps[1].to_string();
            let title = caps[2].trim_end().to_string();
            let line = caps
                .get(2)
                .map(|m| line_at(&document.text, m.start()))
                .unwrap_or(1);

            if anchors.contains_key(&id) {
                violations.push(Violation::DuplicateAnchor {
                    id,
                    title,
                    path: document.path.clone(),
                    line,
                });
                continue;
            }

            anchors.insert(
                id.clone(),
                Anchor {
                    id,
                    title,
                    path: document.path.clone(),
                    line,
                },
            );
        }
    }

    (anchors, violations)
}

/// Check every local link against the collected anchors.
pub fn check_links(
    documents: &[Document],
    anchors: &HashMap<String, Anchor>,
    ignore: &[String],
) -> (usize, Vec<Violation>) {
    let mut links = 0;
    let mut violations = Vec::new();

    for document in documents.iter().filter(|d| !is_ignored(d, ignore)) {
        tracing::debug!(path = %document.path.display(), "checking links");
        for caps in LOCAL_LINK.captures_iter(&document.text) {
            links += 1;
            let label = caps[1].to_string();
            let id = caps[2].to_string();
            let line = caps
                .get(0)
                .map(|m| line_at(&document.text, m.start()))
                .unwrap_or(1);

            match anchors.get(&id) {
                None => violations.push(Violation::MissingAnchor {
                    id,
                    label,
                    path: document.path.clone(),
                    line,
                }),
                Some(anchor) if anchor.title != label => {
                    violations.push(Violation::LabelMismatch {
                        id,
                        title: anchor.title.clone(),
                        label,
                        path: document.path.clone(),
                        line,
                    })
                }
                Some(_) => {}
            }
        }
    }

    (links, violations)
}

/// Run both passes over the whole book. Never stops at the first problem.
pub fn lint(documents: &[Document], ignore: &[String]) -> LintReport {
    let (anchors, mut violations) = collect_anchors(documents, ignore);
    let (links, link_violations) = check_links(documents, &anchors, ignore);
    violations.extend(link_violations);
    LintReport {
        anchors: anchors.len(),
        links,
        violations,
    }
}
