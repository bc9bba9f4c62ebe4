use std::sync::LazyLock;

use regex::Regex;

use crate::document::Document;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-z]*\n.*?\n```").unwrap());

/// Size of the book's code, as printed by `folio stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeStats {
    pub examples: usize,
    pub lines: usize,
}

/// Count fenced code blocks and the lines between their fences.
pub fn count(documents: &[Document]) -> CodeStats {
    let mut stats = CodeStats::default();
    for document in documents {
        for block in FENCED_BLOCK.find_iter(&document.text) {
            stats.examples += 1;
            // both fence lines
            stats.lines += block.as_str().split('\n').count() - 2;
        }
    }
    stats
}
