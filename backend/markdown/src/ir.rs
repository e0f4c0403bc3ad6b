//! Markdown Intermediate Representation
//!
//! Parses model output into a small typed tree that the plain-text, ANSI and
//! terminal UI renderers walk.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MarkdownNode {
    Heading(u32, Vec<MarkdownNode>),
    Paragraph(Vec<MarkdownNode>),
    Text(String),
    Strong(Vec<MarkdownNode>),
    Emphasis(Vec<MarkdownNode>),
    Strikethrough(Vec<MarkdownNode>),
    InlineCode(String),
    CodeBlock(String, String), // language, content
    /// Ordered lists carry their start number.
    List(Option<u64>, Vec<MarkdownNode>),
    ListItem(Vec<MarkdownNode>),
    Blockquote(Vec<MarkdownNode>),
    Link(String, String),  // url, text
    Image(String, String), // url, alt_text
    LineBreak,
    Rule,
}

impl MarkdownNode {
    /// Concatenated text content, without any markup.
    pub fn text_content(&self) -> String {
        match self {
            Self::Text(t) | Self::InlineCode(t) => t.clone(),
            Self::CodeBlock(_, content) => content.clone(),
            Self::Link(_, text) | Self::Image(_, text) => text.clone(),
            Self::LineBreak => "\n".into(),
            Self::Rule => String::new(),
            Self::Heading(_, c)
            | Self::Paragraph(c)
            | Self::Strong(c)
            | Self::Emphasis(c)
            | Self::Strikethrough(c)
            | Self::List(_, c)
            | Self::ListItem(c)
            | Self::Blockquote(c) => c.iter().map(Self::text_content).collect(),
        }
    }
}

enum Frame {
    Root,
    Heading(u32),
    Paragraph,
    Strong,
    Emphasis,
    Strikethrough,
    CodeBlock(String),
    List(Option<u64>),
    Item,
    Blockquote,
    Link(String),
    Image(String),
    /// Footnote definitions: children are kept, the container is dropped.
    Transparent,
}

fn heading_level(level: HeadingLevel) -> u32 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn frame_for(tag: Tag<'_>) -> Frame {
    match tag {
        Tag::Paragraph => Frame::Paragraph,
        Tag::Heading(level, _, _) => Frame::Heading(heading_level(level)),
        Tag::BlockQuote => Frame::Blockquote,
        Tag::CodeBlock(CodeBlockKind::Fenced(info)) => Frame::CodeBlock(
            info.split_whitespace().next().unwrap_or_default().to_string(),
        ),
        Tag::CodeBlock(CodeBlockKind::Indented) => Frame::CodeBlock(String::new()),
        Tag::List(start) => Frame::List(start),
        Tag::Item => Frame::Item,
        Tag::Emphasis => Frame::Emphasis,
        Tag::Strong => Frame::Strong,
        Tag::Strikethrough => Frame::Strikethrough,
        Tag::Link(_, url, _) => Frame::Link(url.to_string()),
        Tag::Image(_, url, _) => Frame::Image(url.to_string()),
        _ => Frame::Transparent,
    }
}

fn flatten(children: &[MarkdownNode]) -> String {
    children.iter().map(MarkdownNode::text_content).collect()
}

fn close(frame: Frame, children: Vec<MarkdownNode>) -> Vec<MarkdownNode> {
    let node = match frame {
        Frame::Root | Frame::Transparent => return children,
        Frame::Heading(level) => MarkdownNode::Heading(level, children),
        Frame::Paragraph => MarkdownNode::Paragraph(children),
        Frame::Strong => MarkdownNode::Strong(children),
        Frame::Emphasis => MarkdownNode::Emphasis(children),
        Frame::Strikethrough => MarkdownNode::Strikethrough(children),
        Frame::CodeBlock(lang) => MarkdownNode::CodeBlock(lang, flatten(&children)),
        Frame::List(start) => MarkdownNode::List(start, children),
        Frame::Item => MarkdownNode::ListItem(children),
        Frame::Blockquote => MarkdownNode::Blockquote(children),
        Frame::Link(url) => MarkdownNode::Link(url, flatten(&children)),
        Frame::Image(url) => MarkdownNode::Image(url, flatten(&children)),
    };
    vec![node]
}

pub struct IrParser;

impl IrParser {
    /// Parse Markdown into the IR. Raw HTML is kept as text.
    pub fn parse(markdown: &str) -> Vec<MarkdownNode> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let mut stack: Vec<(Frame, Vec<MarkdownNode>)> = vec![(Frame::Root, Vec::new())];
        for event in Parser::new_ext(markdown, options) {
            match event {
                Event::Start(tag) => stack.push((frame_for(tag), Vec::new())),
                Event::End(_) => {
                    if stack.len() > 1 {
                        if let Some((frame, children)) = stack.pop() {
                            let nodes = close(frame, children);
                            if let Some((_, parent)) = stack.last_mut() {
                                parent.extend(nodes);
                            }
                        }
                    }
                }
                Event::Text(text) | Event::Html(text) => push_text(&mut stack, &text),
                Event::Code(code) => push(&mut stack, MarkdownNode::InlineCode(code.to_string())),
                Event::SoftBreak => push_text(&mut stack, " "),
                Event::HardBreak => push(&mut stack, MarkdownNode::LineBreak),
                Event::Rule => push(&mut stack, MarkdownNode::Rule),
                Event::TaskListMarker(done) => push_text(&mut stack, if done { "[x] " } else { "[ ] " }),
                Event::FootnoteReference(label) => push_text(&mut stack, &format!("[{label}]")),
            }
        }

        // Unterminated containers (streamed, partial output) are closed here.
        while stack.len() > 1 {
            if let Some((frame, children)) = stack.pop() {
                let nodes = close(frame, children);
                if let Some((_, parent)) = stack.last_mut() {
                    parent.extend(nodes);
                }
            }
        }
        stack.pop().map(|(_, nodes)| nodes).unwrap_or_default()
    }
}

fn push(stack: &mut [(Frame, Vec<MarkdownNode>)], node: MarkdownNode) {
    if let Some((_, children)) = stack.last_mut() {
        children.push(node);
    }
}

/// Adjacent text runs are merged.
fn push_text(stack: &mut [(Frame, Vec<MarkdownNode>)], text: &str) {
    if let Some((_, children)) = stack.last_mut() {
        if let Some(MarkdownNode::Text(last)) = children.last_mut() {
            last.push_str(text);
        } else {
            children.push(MarkdownNode::Text(text.to_string()));
        }
    }
}
