//! Rendering a rich-text tree as text.
//!
//! Block nodes are separated by a blank line. Marks degrade to wrapping
//! punctuation, which depends on the [`MarkStyle`].

use super::tree::{Mark, RichTextDocument, RichTextNode};

/// How inline marks are spelled in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkStyle {
    /// Display form: `*bold*`, `_italic_`, `` `code` ``, `~strike~`.
    #[default]
    Readable,
    /// Inline-markup dialect: `**bold**`, `*italic*`, `` `code` ``,
    /// `~~strike~~`. Suitable as input to wiki conversion.
    Markup,
}

impl MarkStyle {
    fn delimiter(self, mark: &Mark) -> &'static str {
        match (self, mark) {
            (MarkStyle::Readable, Mark::Bold) => "*",
            (MarkStyle::Readable, Mark::Italic) => "_",
            (MarkStyle::Readable, Mark::Strike) => "~",
            (MarkStyle::Markup, Mark::Bold) => "**",
            (MarkStyle::Markup, Mark::Italic) => "*",
            (MarkStyle::Markup, Mark::Strike) => "~~",
            (_, Mark::Code) => "`",
            (_, Mark::Link { .. }) => "",
        }
    }
}

/// Render a whole document.
pub fn render(doc: &RichTextDocument, style: MarkStyle) -> String {
    let renderer = Renderer { style };
    renderer.blocks(&doc.content).trim_end().to_string()
}

struct Renderer {
    style: MarkStyle,
}

impl Renderer {
    fn blocks(&self, nodes: &[RichTextNode]) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut inline: Vec<&RichTextNode> = Vec::new();

        for node in nodes {
            if node.is_inline() {
                inline.push(node);
                continue;
            }
            if !inline.is_empty() {
                parts.push(self.inline_refs(&inline));
                inline.clear();
            }
            let block = self.block(node);
            if !block.is_empty() {
                parts.push(block);
            }
        }
        if !inline.is_empty() {
            parts.push(self.inline_refs(&inline));
        }

        parts.join("\n\n")
    }

    fn block(&self, node: &RichTextNode) -> String {
        match node {
            RichTextNode::Paragraph(children) => self.inline(children),
            RichTextNode::Heading { level, children } => {
                format!("{} {}", "#".repeat(*level as usize), self.inline(children))
            }
            RichTextNode::CodeBlock { language, text } => {
                let body = trim_trailing_blank_lines(text);
                format!("```{}\n{}\n```", language.as_deref().unwrap_or(""), body)
            }
            RichTextNode::BulletList(items) => self.list(items, None, 0),
            RichTextNode::OrderedList { start, items } => self.list(items, Some(*start), 0),
            RichTextNode::ListItem(_) => self.list(std::slice::from_ref(node), None, 0),
            RichTextNode::Blockquote(children) => self
                .blocks(children)
                .lines()
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {}", line)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            RichTextNode::Rule => "---".to_string(),
            RichTextNode::Text { .. } | RichTextNode::HardBreak => {
                self.inline(std::slice::from_ref(node))
            }
        }
    }

    fn list(&self, items: &[RichTextNode], start: Option<u32>, depth: usize) -> String {
        let indent = "  ".repeat(depth);
        let mut lines = Vec::new();

        for (i, item) in items.iter().enumerate() {
            let marker = match start {
                Some(start) => format!("{}. ", start as usize + i),
                None => "- ".to_string(),
            };
            let children: &[RichTextNode] = match item {
                RichTextNode::ListItem(children) => children,
                other => std::slice::from_ref(other),
            };

            let mut first = true;
            for child in children {
                match child {
                    RichTextNode::BulletList(nested) => {
                        lines.push(self.list(nested, None, depth + 1));
                    }
                    RichTextNode::OrderedList { start, items } => {
                        lines.push(self.list(items, Some(*start), depth + 1));
                    }
                    other => {
                        let text = self.block(other);
                        for (n, line) in text.lines().enumerate() {
                            if first && n == 0 {
                                lines.push(format!("{}{}{}", indent, marker, line));
                            } else {
                                lines.push(format!("{}  {}", indent, line));
                            }
                        }
                        first = false;
                    }
                }
            }
            if first {
                lines.push(format!("{}{}", indent, marker.trim_end()));
            }
        }

        lines.join("\n")
    }

    fn inline(&self, nodes: &[RichTextNode]) -> String {
        let refs: Vec<&RichTextNode> = nodes.iter().collect();
        self.inline_refs(&refs)
    }

    fn inline_refs(&self, nodes: &[&RichTextNode]) -> String {
        let mut out = String::new();
        for node in nodes {
            match node {
                RichTextNode::Text { text, marks } => out.push_str(&self.marked(text, marks)),
                RichTextNode::HardBreak => out.push('\n'),
                block => out.push_str(&self.block(block)),
            }
        }
        out
    }

    /// Apply marks innermost-first: code, strike, italic, bold, then link.
    fn marked(&self, text: &str, marks: &[Mark]) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let mut out = text.to_string();
        for kind in [Mark::Code, Mark::Strike, Mark::Italic, Mark::Bold] {
            if marks.contains(&kind) {
                let delim = self.style.delimiter(&kind);
                out = format!("{}{}{}", delim, out, delim);
            }
        }
        if let Some(href) = marks.iter().find_map(|m| match m {
            Mark::Link { href } => Some(href),
            _ => None,
        }) {
            out = if out == *href {
                out
            } else {
                format!("[{}]({})", out, href)
            };
        }
        out
    }
}

/// Remove trailing lines that are empty or whitespace only.
pub(crate) fn trim_trailing_blank_lines(text: &str) -> &str {
    let mut end = text.len();
    for line in text.rsplit('\n') {
        if !line.trim().is_empty() {
            break;
        }
        end = end.saturating_sub(line.len() + 1);
    }
    &text[..end.min(text.len())]
}
