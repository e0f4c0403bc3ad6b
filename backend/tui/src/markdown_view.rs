//! Markdown IR to styled ratatui lines, for chat replies and summaries.

use markdown::{IrParser, MarkdownNode};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

pub fn markdown_lines(markdown: &str) -> Vec<Line<'static>> {
    to_lines(&IrParser::parse(markdown))
}

pub fn to_lines(nodes: &[MarkdownNode]) -> Vec<Line<'static>> {
    let mut out = LineBuilder::default();
    for node in nodes {
        render_block(node, &mut out);
    }
    let mut lines = out.finish();
    while lines.last().is_some_and(|l| l.spans.is_empty()) {
        lines.pop();
    }
    lines
}

#[derive(Default)]
struct LineBuilder {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
}

impl LineBuilder {
    fn push(&mut self, text: &str, style: Style) {
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            if !first.is_empty() {
                self.current.push(Span::styled(first.to_string(), style));
            }
        }
        for part in parts {
            self.break_line();
            if !part.is_empty() {
                self.current.push(Span::styled(part.to_string(), style));
            }
        }
    }

    fn break_line(&mut self) {
        self.lines.push(Line::from(std::mem::take(&mut self.current)));
    }

    fn blank(&mut self) {
        if !self.current.is_empty() {
            self.break_line();
        }
        self.lines.push(Line::default());
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if !self.current.is_empty() {
            self.break_line();
        }
        self.lines
    }
}

fn render_block(node: &MarkdownNode, out: &mut LineBuilder) {
    match node {
        MarkdownNode::Heading(level, children) => {
            let mut style = Style::default().add_modifier(Modifier::BOLD);
            if *level <= 2 {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            render_inlines(children, style, out);
            out.blank();
        }
        MarkdownNode::Paragraph(children) => {
            render_inlines(children, Style::default(), out);
            out.blank();
        }
        MarkdownNode::CodeBlock(_, content) => {
            for line in content.lines() {
                out.push("    ", Style::default());
                out.push(line, Style::default().fg(Color::Cyan));
                out.break_line();
            }
            out.blank();
        }
        MarkdownNode::List(start, items) => {
            for (i, item) in items.iter().enumerate() {
                let marker = match start {
                    Some(n) => format!("{}. ", n + i as u64),
                    None => "• ".to_string(),
                };
                let mut body = LineBuilder::default();
                match item {
                    MarkdownNode::ListItem(children) => render_item(children, &mut body),
                    other => render_block(other, &mut body),
                }
                let indent = " ".repeat(marker.chars().count());
                let body = body.finish();
                let body = body.into_iter().filter(|l| !l.spans.is_empty());
                for (n, line) in body.enumerate() {
                    let prefix = if n == 0 { marker.clone() } else { indent.clone() };
                    out.lines.push(prefixed(prefix, Style::default().fg(Color::Yellow), line));
                }
            }
            out.blank();
        }
        MarkdownNode::Blockquote(children) => {
            let mut body = LineBuilder::default();
            for child in children {
                render_block(child, &mut body);
            }
            let mut lines = body.finish();
            while lines.last().is_some_and(|l| l.spans.is_empty()) {
                lines.pop();
            }
            for line in lines {
                out.lines.push(prefixed("│ ".into(), Style::default().fg(Color::DarkGray), line));
            }
            out.blank();
        }
        MarkdownNode::Rule => {
            out.push(&"─".repeat(24), Style::default().fg(Color::DarkGray));
            out.blank();
        }
        inline => {
            render_inline(inline, Style::default(), out);
            out.break_line();
        }
    }
}

fn prefixed(prefix: String, style: Style, line: Line<'static>) -> Line<'static> {
    let mut spans = vec![Span::styled(prefix, style)];
    spans.extend(line.spans);
    Line::from(spans)
}

fn render_item(children: &[MarkdownNode], out: &mut LineBuilder) {
    for child in children {
        match child {
            MarkdownNode::Paragraph(inner) => {
                render_inlines(inner, Style::default(), out);
                out.break_line();
            }
            MarkdownNode::List(..) | MarkdownNode::CodeBlock(..) | MarkdownNode::Blockquote(_) => {
                if !out.current.is_empty() {
                    out.break_line();
                }
                render_block(child, out);
            }
            inline => render_inline(inline, Style::default(), out),
        }
    }
}

fn render_inlines(nodes: &[MarkdownNode], style: Style, out: &mut LineBuilder) {
    for node in nodes {
        render_inline(node, style, out);
    }
}

fn render_inline(node: &MarkdownNode, style: Style, out: &mut LineBuilder) {
    match node {
        MarkdownNode::Text(text) => out.push(text, style),
        MarkdownNode::Strong(children) => render_inlines(children, style.add_modifier(Modifier::BOLD), out),
        MarkdownNode::Emphasis(children) => render_inlines(children, style.add_modifier(Modifier::ITALIC), out),
        MarkdownNode::Strikethrough(children) => {
            render_inlines(children, style.add_modifier(Modifier::CROSSED_OUT), out)
        }
        MarkdownNode::InlineCode(code) => out.push(code, style.fg(Color::Cyan)),
        MarkdownNode::Link(url, text) => {
            if text.is_empty() || text == url {
                out.push(url, style.fg(Color::Blue));
            } else {
                out.push(text, style.add_modifier(Modifier::UNDERLINED));
                out.push(&format!(" ({url})"), style.fg(Color::Blue));
            }
        }
        MarkdownNode::Image(_, alt) => {
            let label = if alt.is_empty() { "image" } else { alt.as_str() };
            out.push(&format!("[image: {label}]"), style.fg(Color::DarkGray));
        }
        MarkdownNode::LineBreak => out.break_line(),
        block => render_block(block, out),
    }
}
