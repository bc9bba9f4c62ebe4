pub mod error;
mod structural;

pub use error::ParseError;

use crate::Tree;

/// Parser entry point.
pub struct Parser<'a> {
    source: &'a str,
    file_id: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the manuscript Markdown into a block tree.
    ///
    /// A broken manuscript (an annotation comment or code fence that never
    /// closes) is reported as a list of errors covering the whole document.
    pub fn parse(&self) -> Result<Tree, Vec<ParseError>> {
        let nodes = structural::parse_nodes(self.source, self.file_id)?;
        Ok(Tree {
            nodes,
            source_id: self.file_id,
        })
    }
}
