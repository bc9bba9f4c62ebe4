use std::ops::Range;

/// A block-level node of a parsed manuscript.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// 1-based line of the node's first source line. For fenced code this is
    /// the opening fence.
    pub line: usize,
    /// Byte span in source for error reporting.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Heading {
        level: u8,
        content: Vec<InlineNode>,
    },
    /// An HTML comment block with non-empty text between the delimiters.
    Annotation { text: String },
    CodeBlock {
        /// First word of the fence info string, if any.
        language: Option<String>,
        source: String,
    },
    Paragraph(Vec<InlineNode>),
    /// A block that owns its own sibling list.
    Container {
        kind: ContainerKind,
        children: Vec<Node>,
    },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    BlockQuote,
    List,
    Item,
}

/// Inline elements that appear within a line of text.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineNode {
    Text(String),
    Strong(Vec<InlineNode>),
    Emphasis(Vec<InlineNode>),
    Strikethrough(Vec<InlineNode>),
    CodeSpan(String),
    Link {
        dest: String,
        content: Vec<InlineNode>,
    },
    Image {
        dest: String,
        alt: Vec<InlineNode>,
    },
    Html(String),
    SoftBreak,
    HardBreak,
}

impl Node {
    /// Unwrapped annotation text, if this node is an annotation comment.
    pub fn annotation(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Annotation { text } => Some(text),
            _ => None,
        }
    }
}

impl InlineNode {
    /// Concatenated text content, without Markdown markup.
    pub fn plain_text(&self) -> String {
        match self {
            InlineNode::Text(s) | InlineNode::CodeSpan(s) | InlineNode::Html(s) => s.clone(),
            InlineNode::Strong(children)
            | InlineNode::Emphasis(children)
            | InlineNode::Strikethrough(children)
            | InlineNode::Link {
                content: children, ..
            }
            | InlineNode::Image { alt: children, .. } => plain_text(children),
            InlineNode::SoftBreak | InlineNode::HardBreak => " ".to_string(),
        }
    }
}

pub fn plain_text(inlines: &[InlineNode]) -> String {
    inlines.iter().map(InlineNode::plain_text).collect()
}
