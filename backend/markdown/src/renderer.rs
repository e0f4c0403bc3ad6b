//! Renderers for the Markdown IR
//!
//! Plain text for files and pipes, ANSI for terminals.

use crate::ir::MarkdownNode;

const BOLD: &str = "\x1b[1m";
const ITALIC: &str = "\x1b[3m";
const UNDERLINE: &str = "\x1b[4m";
const STRIKE: &str = "\x1b[9m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";
const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

#[derive(Clone, Copy, PartialEq)]
enum Style {
    Plain,
    Ansi,
}

pub struct Renderer;

impl Renderer {
    /// Renders the IR to plain text, stripping all formatting.
    pub fn to_plain_text(nodes: &[MarkdownNode]) -> String {
        let mut out = String::new();
        render_blocks(nodes, Style::Plain, &mut out);
        out.trim_end().to_string()
    }

    /// Renders the IR with ANSI escape codes.
    pub fn to_ansi(nodes: &[MarkdownNode]) -> String {
        let mut out = String::new();
        render_blocks(nodes, Style::Ansi, &mut out);
        out.trim_end().to_string()
    }
}

fn wrap(out: &mut String, style: Style, code: &str, body: impl FnOnce(&mut String)) {
    if style == Style::Ansi {
        out.push_str(code);
        body(out);
        out.push_str(RESET);
    } else {
        body(out);
    }
}

fn render_blocks(nodes: &[MarkdownNode], style: Style, out: &mut String) {
    for node in nodes {
        render_block(node, style, out);
    }
}

fn render_block(node: &MarkdownNode, style: Style, out: &mut String) {
    match node {
        MarkdownNode::Heading(level, children) => {
            let code = if *level <= 2 { "\x1b[1;4m" } else { BOLD };
            wrap(out, style, code, |out| render_inlines(children, style, out));
            out.push_str("\n\n");
        }
        MarkdownNode::Paragraph(children) => {
            render_inlines(children, style, out);
            out.push_str("\n\n");
        }
        MarkdownNode::CodeBlock(_, content) => {
            for line in content.lines() {
                out.push_str("    ");
                wrap(out, style, CYAN, |out| out.push_str(line));
                out.push('\n');
            }
            out.push('\n');
        }
        MarkdownNode::List(start, items) => {
            for (i, item) in items.iter().enumerate() {
                let marker = match start {
                    Some(n) => format!("{}. ", n + i as u64),
                    None => "- ".to_string(),
                };
                let mut body = String::new();
                match item {
                    MarkdownNode::ListItem(children) => render_item(children, style, &mut body),
                    other => render_block(other, style, &mut body),
                }
                let indent = " ".repeat(marker.len());
                for (n, line) in body.trim_end().lines().enumerate() {
                    if n == 0 {
                        out.push_str(&marker);
                    } else if !line.is_empty() {
                        out.push_str(&indent);
                    }
                    out.push_str(line);
                    out.push('\n');
                }
            }
            out.push('\n');
        }
        MarkdownNode::Blockquote(children) => {
            let mut body = String::new();
            render_blocks(children, style, &mut body);
            for line in body.trim_end().lines() {
                wrap(out, style, DIM, |out| out.push_str("> "));
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        MarkdownNode::Rule => out.push_str("---\n\n"),
        inline => {
            render_inline(inline, style, out);
            out.push('\n');
        }
    }
}

/// Tight list items hold inlines directly; loose ones hold paragraphs.
fn render_item(children: &[MarkdownNode], style: Style, out: &mut String) {
    let mut inline_run = false;
    for child in children {
        if is_inline(child) {
            render_inline(child, style, out);
            inline_run = true;
        } else {
            if inline_run {
                out.push('\n');
                inline_run = false;
            }
            render_block(child, style, out);
        }
    }
}

fn is_inline(node: &MarkdownNode) -> bool {
    matches!(
        node,
        MarkdownNode::Text(_)
            | MarkdownNode::Strong(_)
            | MarkdownNode::Emphasis(_)
            | MarkdownNode::Strikethrough(_)
            | MarkdownNode::InlineCode(_)
            | MarkdownNode::Link(..)
            | MarkdownNode::Image(..)
            | MarkdownNode::LineBreak
    )
}

fn render_inlines(nodes: &[MarkdownNode], style: Style, out: &mut String) {
    for node in nodes {
        render_inline(node, style, out);
    }
}

fn render_inline(node: &MarkdownNode, style: Style, out: &mut String) {
    match node {
        MarkdownNode::Text(text) => out.push_str(text),
        MarkdownNode::Strong(children) => wrap(out, style, BOLD, |out| render_inlines(children, style, out)),
        MarkdownNode::Emphasis(children) => {
            wrap(out, style, ITALIC, |out| render_inlines(children, style, out))
        }
        MarkdownNode::Strikethrough(children) => {
            wrap(out, style, STRIKE, |out| render_inlines(children, style, out))
        }
        MarkdownNode::InlineCode(code) => wrap(out, style, CYAN, |out| out.push_str(code)),
        MarkdownNode::Link(url, text) => {
            if text.is_empty() || text == url {
                wrap(out, style, BLUE, |out| out.push_str(url));
            } else {
                wrap(out, style, UNDERLINE, |out| out.push_str(text));
                out.push_str(" (");
                wrap(out, style, BLUE, |out| out.push_str(url));
                out.push(')');
            }
        }
        MarkdownNode::Image(_, alt) => {
            let label = if alt.is_empty() { "image" } else { alt.as_str() };
            wrap(out, style, DIM, |out| out.push_str(&format!("[image: {label}]")));
        }
        MarkdownNode::LineBreak => out.push('\n'),
        block => render_block(block, style, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrParser;

    fn plain(markdown: &str) -> String {
        Renderer::to_plain_text(&IrParser::parse(markdown))
    }

    #[test]
    fn strips_formatting() {
        assert_eq!(
            plain("## Key points\n\nEntropy **never** _decreases_."),
            "Key points\n\nEntropy never decreases."
        );
    }

    #[test]
    fn renders_lists_with_markers() {
        assert_eq!(plain("- heat\n- work\n"), "- heat\n- work");
        assert_eq!(plain("2. first\n3. second\n"), "2. first\n3. second");
    }

    #[test]
    fn renders_links_and_images() {
        assert_eq!(
            plain("[notes](https://example.org) ![board](b.png)"),
            "notes (https://example.org) [image: board]"
        );
    }

    #[test]
    fn indents_code_and_quotes() {
        assert_eq!(plain("```\nx = 1\n```"), "    x = 1");
        assert_eq!(plain("> quoted"), "> quoted");
    }

    #[test]
    fn ansi_wraps_strong_text() {
        let out = Renderer::to_ansi(&IrParser::parse("**bold**"));
        assert_eq!(out, format!("{BOLD}bold{RESET}"));
    }
}
