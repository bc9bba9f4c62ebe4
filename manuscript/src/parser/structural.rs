use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::node::{ContainerKind, InlineNode, Node, NodeKind};
use crate::parser::error::ParseError;

type Events<'a> = [(Event<'a>, Range<usize>)];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse Markdown source text into the top-level sibling list.
pub fn parse_nodes(source: &str, file_id: usize) -> Result<Vec<Node>, Vec<ParseError>> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let parser = CmarkParser::new_ext(source, options);
    let events: Vec<(Event<'_>, Range<usize>)> = parser.into_offset_iter().collect();

    let mut state = ParseState::new(source, file_id);
    let mut i = 0;
    let nodes = state.collect_nodes(&events, &mut i, &|_| false);
    state.finalize(nodes)
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    source: &'a str,
    file_id: usize,
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
    errors: Vec<ParseError>,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(pos, _)| pos + 1))
            .collect();
        ParseState {
            source,
            file_id,
            line_starts,
            errors: Vec::new(),
        }
    }

    /// 1-based line number containing `offset`.
    fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }

    fn node(&self, kind: NodeKind, span: Range<usize>) -> Node {
        Node {
            kind,
            line: self.line_of(span.start),
            span,
        }
    }

    /// Collect block nodes until a matching End tag (or the end of input).
    fn collect_nodes(
        &mut self,
        events: &Events<'_>,
        i: &mut usize,
        is_end: &dyn Fn(&TagEnd) -> bool,
    ) -> Vec<Node> {
        let mut nodes = Vec::new();

        while *i < events.len() {
            let (ref ev, ref range) = events[*i];

            match ev {
                Event::End(tag_end) if is_end(tag_end) => {
                    *i += 1;
                    break;
                }

                Event::Start(Tag::Heading { level, .. }) => {
                    let level = heading_level_to_u8(level);
                    *i += 1;
                    let content = self.collect_inlines(events, i, &|e| {
                        matches!(e, TagEnd::Heading(_))
                    });
                    nodes.push(self.node(NodeKind::Heading { level, content }, range.clone()));
                }

                Event::Start(Tag::Paragraph) => {
                    *i += 1;
                    let inlines = self.collect_inlines(events, i, &|e| {
                        matches!(e, TagEnd::Paragraph)
                    });
                    nodes.push(self.node(NodeKind::Paragraph(inlines), range.clone()));
                }

                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(|lang| lang.to_string()),
                        CodeBlockKind::Indented => None,
                    };
                    if matches!(kind, CodeBlockKind::Fenced(_)) {
                        if let Some(fence) = unclosed_fence(&self.source[range.clone()]) {
                            self.errors
                                .push(ParseError::unclosed_fence(&fence, range.clone(), self.file_id));
                        }
                    }
                    *i += 1;
                    let source = collect_text_until(events, i, |e| matches!(e, TagEnd::CodeBlock));
                    nodes.push(self.node(NodeKind::CodeBlock { language, source }, range.clone()));
                }

                Event::Start(Tag::HtmlBlock) => {
                    *i += 1;
                    let raw = collect_text_until(events, i, |e| matches!(e, TagEnd::HtmlBlock));
                    let kind = self.classify_html(&raw, range.clone());
                    nodes.push(self.node(kind, range.clone()));
                }

                Event::Start(Tag::BlockQuote(_)) => {
                    *i += 1;
                    let children = self.collect_nodes(events, i, &|e| {
                        matches!(e, TagEnd::BlockQuote(_))
                    });
                    nodes.push(self.container(ContainerKind::BlockQuote, children, range.clone()));
                }

                Event::Start(Tag::List(_)) => {
                    *i += 1;
                    let children = self.collect_nodes(events, i, &|e| matches!(e, TagEnd::List(_)));
                    nodes.push(self.container(ContainerKind::List, children, range.clone()));
                }

                Event::Start(Tag::Item) => {
                    *i += 1;
                    let children = self.collect_nodes(events, i, &|e| matches!(e, TagEnd::Item));
                    nodes.push(self.container(ContainerKind::Item, children, range.clone()));
                }

                // Tables, footnote definitions and the like are opaque
                Event::Start(_) => {
                    skip_tag(events, i);
                    nodes.push(self.node(NodeKind::Other, range.clone()));
                }

                Event::Rule => {
                    nodes.push(self.node(NodeKind::Other, range.clone()));
                    *i += 1;
                }

                // Loose inline events (tight list items) carry no structure
                _ => {
                    *i += 1;
                }
            }
        }

        nodes
    }

    fn container(&self, kind: ContainerKind, children: Vec<Node>, span: Range<usize>) -> Node {
        self.node(NodeKind::Container { kind, children }, span)
    }

    /// Classify a raw HTML block: comments with text become annotations.
    fn classify_html(&mut self, raw: &str, span: Range<usize>) -> NodeKind {
        let raw = raw.trim();
        if !raw.starts_with("<!--") {
            return NodeKind::Other;
        }
        if !raw.contains("-->") {
            self.errors.push(ParseError::unclosed_comment(span, self.file_id));
            return NodeKind::Other;
        }
        match unwrap_comment(raw) {
            Some(text) if !text.is_empty() => NodeKind::Annotation {
                text: text.to_string(),
            },
            _ => NodeKind::Other,
        }
    }

    /// Collect inline nodes until a matching End tag.
    fn collect_inlines(
        &self,
        events: &Events<'_>,
        i: &mut usize,
        is_end: &dyn Fn(&TagEnd) -> bool,
    ) -> Vec<InlineNode> {
        let mut inlines = Vec::new();

        while *i < events.len() {
            let (ref ev, _) = events[*i];
            match ev {
                Event::End(tag_end) if is_end(tag_end) => {
                    *i += 1;
                    break;
                }
                // Entities, escapes and stray brackets split one run of text
                // into several events.
                Event::Text(s) => {
                    match inlines.last_mut() {
                        Some(InlineNode::Text(prev)) => prev.push_str(s),
                        _ => inlines.push(InlineNode::Text(s.to_string())),
                    }
                    *i += 1;
                }
                Event::Code(s) => {
                    inlines.push(InlineNode::CodeSpan(s.to_string()));
                    *i += 1;
                }
                Event::InlineHtml(s) => {
                    inlines.push(InlineNode::Html(s.to_string()));
                    *i += 1;
                }
                Event::SoftBreak => {
                    inlines.push(InlineNode::SoftBreak);
                    *i += 1;
                }
                Event::HardBreak => {
                    inlines.push(InlineNode::HardBreak);
                    *i += 1;
                }
                Event::Start(Tag::Strong) => {
                    *i += 1;
                    let children = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Strong));
                    inlines.push(InlineNode::Strong(children));
                }
                Event::Start(Tag::Emphasis) => {
                    *i += 1;
                    let children = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Emphasis));
                    inlines.push(InlineNode::Emphasis(children));
                }
                Event::Start(Tag::Strikethrough) => {
                    *i += 1;
                    let children =
                        self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Strikethrough));
                    inlines.push(InlineNode::Strikethrough(children));
                }
                Event::Start(Tag::Link { dest_url, .. }) => {
                    let dest = dest_url.to_string();
                    *i += 1;
                    let content = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Link));
                    inlines.push(InlineNode::Link { dest, content });
                }
                Event::Start(Tag::Image { dest_url, .. }) => {
                    let dest = dest_url.to_string();
                    *i += 1;
                    let alt = self.collect_inlines(events, i, &|e| matches!(e, TagEnd::Image));
                    inlines.push(InlineNode::Image { dest, alt });
                }
                _ => {
                    *i += 1;
                }
            }
        }

        inlines
    }

    fn finalize(self, nodes: Vec<Node>) -> Result<Vec<Node>, Vec<ParseError>> {
        if self.errors.is_empty() {
            Ok(nodes)
        } else {
            Err(self.errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Strip `<!--` and `-->` from a comment and trim the rest.
pub(crate) fn unwrap_comment(raw: &str) -> Option<&str> {
    raw.trim()
        .strip_prefix("<!--")
        .and_then(|rest| rest.strip_suffix("-->"))
        .map(str::trim)
}

/// Skip over a Start event and everything up to its matching End.
fn skip_tag(events: &Events<'_>, i: &mut usize) {
    let mut depth = 0u32;
    while *i < events.len() {
        match events[*i].0 {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            _ => {}
        }
        *i += 1;
        if depth == 0 {
            break;
        }
    }
}

/// Collect all text content until a matching End tag.
fn collect_text_until(
    events: &Events<'_>,
    i: &mut usize,
    is_end: impl Fn(&TagEnd) -> bool,
) -> String {
    let mut text = String::new();
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        match ev {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) | Event::Html(s) => {
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}

/// Returns the opening fence when a fenced block has no closing fence line.
/// pulldown-cmark silently runs such blocks to the end of the document.
fn unclosed_fence(raw: &str) -> Option<String> {
    let mut lines = raw.lines().map(strip_container_prefix);
    let opening = lines.next()?;
    let marker = opening.chars().next()?;
    let width = opening.chars().take_while(|c| *c == marker).count();

    let closed = lines.last().is_some_and(|last| {
        let last = last.trim_end();
        last.len() >= width && last.chars().all(|c| c == marker)
    });

    if closed {
        None
    } else {
        Some(marker.to_string().repeat(width))
    }
}

/// Remove indentation and block quote markers from the start of a line.
fn strip_container_prefix(line: &str) -> &str {
    line.trim_start_matches(|c: char| c == '>' || c.is_whitespace())
}
