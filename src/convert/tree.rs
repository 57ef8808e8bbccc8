//! Structured rich-text document tree.
//!
//! The tree is built bottom-up from a parse of the JSON document format and
//! never mutated afterwards. Nodes own their children, so there are no
//! back-references and no cycles.

use serde_json::{json, Map, Value};

use super::ConversionError;

/// Inline formatting applied to a text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    Bold,
    Italic,
    Code,
    Strike,
    Link { href: String },
}

/// One node of a rich-text document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichTextNode {
    Text { text: String, marks: Vec<Mark> },
    Paragraph(Vec<RichTextNode>),
    Heading { level: u8, children: Vec<RichTextNode> },
    CodeBlock { language: Option<String>, text: String },
    BulletList(Vec<RichTextNode>),
    OrderedList { start: u32, items: Vec<RichTextNode> },
    ListItem(Vec<RichTextNode>),
    Blockquote(Vec<RichTextNode>),
    Rule,
    HardBreak,
}

impl RichTextNode {
    /// Plain text run without marks.
    pub fn text(text: &str) -> Self {
        RichTextNode::Text {
            text: text.to_string(),
            marks: Vec::new(),
        }
    }

    /// Text run with marks.
    pub fn marked(text: &str, marks: Vec<Mark>) -> Self {
        RichTextNode::Text {
            text: text.to_string(),
            marks,
        }
    }

    /// Whether this node is rendered inline.
    pub fn is_inline(&self) -> bool {
        matches!(self, RichTextNode::Text { .. } | RichTextNode::HardBreak)
    }
}

/// A complete rich-text document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RichTextDocument {
    pub content: Vec<RichTextNode>,
}

impl RichTextDocument {
    pub fn new(content: Vec<RichTextNode>) -> Self {
        Self { content }
    }

    /// Parse the JSON document format (`{"type": "doc", "content": [...]}`).
    ///
    /// Mentions, emoji and inline cards degrade to text; media nodes are
    /// dropped; unknown containers contribute their children.
    pub fn from_adf(value: &Value) -> Result<Self, ConversionError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ConversionError::Malformed("document is not an object".to_string()))?;
        match obj.get("type").and_then(Value::as_str) {
            Some("doc") => {}
            Some(other) => {
                return Err(ConversionError::Malformed(format!(
                    "expected a doc node, found '{}'",
                    other
                )))
            }
            None => {
                return Err(ConversionError::Malformed(
                    "document has no type".to_string(),
                ))
            }
        }
        Ok(Self {
            content: parse_children(obj)?,
        })
    }

    /// Serialize back to the JSON document format.
    pub fn to_adf(&self) -> Value {
        json!({
            "type": "doc",
            "version": 1,
            "content": self.content.iter().map(node_to_adf).collect::<Vec<_>>(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

fn parse_children(obj: &Map<String, Value>) -> Result<Vec<RichTextNode>, ConversionError> {
    let Some(content) = obj.get("content") else {
        return Ok(Vec::new());
    };
    let items = content
        .as_array()
        .ok_or_else(|| ConversionError::Malformed("content is not an array".to_string()))?;

    let mut nodes = Vec::with_capacity(items.len());
    for item in items {
        nodes.extend(parse_node(item)?);
    }
    Ok(nodes)
}

/// Parse one node. Returns zero nodes for dropped content, several when an
/// unknown container is flattened.
fn parse_node(value: &Value) -> Result<Vec<RichTextNode>, ConversionError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ConversionError::Malformed("node is not an object".to_string()))?;
    let node_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ConversionError::Malformed("node has no type".to_string()))?;
    let attrs = obj.get("attrs");
    let attr_str = |name: &str| {
        attrs
            .and_then(|a| a.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let node = match node_type {
        "text" => {
            let text = obj
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| ConversionError::Malformed("text node has no text".to_string()))?;
            RichTextNode::Text {
                text: text.to_string(),
                marks: parse_marks(obj.get("marks")),
            }
        }
        "paragraph" => RichTextNode::Paragraph(parse_children(obj)?),
        "heading" => {
            let level = attrs
                .and_then(|a| a.get("level"))
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 6) as u8;
            RichTextNode::Heading {
                level,
                children: parse_children(obj)?,
            }
        }
        "codeBlock" => {
            let text: String = parse_children(obj)?
                .into_iter()
                .filter_map(|n| match n {
                    RichTextNode::Text { text, .. } => Some(text),
                    RichTextNode::HardBreak => Some("\n".to_string()),
                    _ => None,
                })
                .collect();
            RichTextNode::CodeBlock {
                language: attr_str("language").filter(|l| !l.is_empty()),
                text,
            }
        }
        "bulletList" => RichTextNode::BulletList(parse_children(obj)?),
        "orderedList" => RichTextNode::OrderedList {
            start: attrs
                .and_then(|a| a.get("order"))
                .and_then(Value::as_u64)
                .unwrap_or(1) as u32,
            items: parse_children(obj)?,
        },
        "listItem" => RichTextNode::ListItem(parse_children(obj)?),
        "blockquote" => RichTextNode::Blockquote(parse_children(obj)?),
        "rule" => RichTextNode::Rule,
        "hardBreak" => RichTextNode::HardBreak,
        "mention" => {
            let name = attr_str("text").unwrap_or_default();
            let name = name.trim_start_matches('@');
            RichTextNode::text(&format!("@{}", name))
        }
        "emoji" => match attr_str("shortName").or_else(|| attr_str("text")) {
            Some(short) => RichTextNode::text(&short),
            None => return Ok(Vec::new()),
        },
        "inlineCard" | "blockCard" => match attr_str("url") {
            Some(url) => RichTextNode::marked(&url, vec![Mark::Link { href: url.clone() }]),
            None => return Ok(Vec::new()),
        },
        "mediaGroup" | "mediaSingle" | "media" => return Ok(Vec::new()),
        _ => return parse_children(obj),
    };
    Ok(vec![node])
}

fn parse_marks(marks: Option<&Value>) -> Vec<Mark> {
    marks
        .and_then(Value::as_array)
        .map(|marks| {
            marks
                .iter()
                .filter_map(|mark| match mark.get("type").and_then(Value::as_str)? {
                    "strong" => Some(Mark::Bold),
                    "em" => Some(Mark::Italic),
                    "code" => Some(Mark::Code),
                    "strike" => Some(Mark::Strike),
                    "link" => mark
                        .get("attrs")
                        .and_then(|a| a.get("href"))
                        .and_then(Value::as_str)
                        .map(|href| Mark::Link {
                            href: href.to_string(),
                        }),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn node_to_adf(node: &RichTextNode) -> Value {
    let children = |nodes: &[RichTextNode]| nodes.iter().map(node_to_adf).collect::<Vec<_>>();
    match node {
        RichTextNode::Text { text, marks } => {
            let mut value = json!({"type": "text", "text": text});
            if !marks.is_empty() {
                value["marks"] = Value::Array(marks.iter().map(mark_to_adf).collect());
            }
            value
        }
        RichTextNode::Paragraph(content) => json!({"type": "paragraph", "content": children(content)}),
        RichTextNode::Heading { level, children: content } => json!({
            "type": "heading",
            "attrs": {"level": level},
            "content": children(content),
        }),
        RichTextNode::CodeBlock { language, text } => {
            let mut value = json!({"type": "codeBlock", "content": [{"type": "text", "text": text}]});
            if let Some(language) = language {
                value["attrs"] = json!({"language": language});
            }
            value
        }
        RichTextNode::BulletList(items) => json!({"type": "bulletList", "content": children(items)}),
        RichTextNode::OrderedList { start, items } => json!({
            "type": "orderedList",
            "attrs": {"order": start},
            "content": children(items),
        }),
        RichTextNode::ListItem(content) => json!({"type": "listItem", "content": children(content)}),
        RichTextNode::Blockquote(content) => json!({"type": "blockquote", "content": children(content)}),
        RichTextNode::Rule => json!({"type": "rule"}),
        RichTextNode::HardBreak => json!({"type": "hardBreak"}),
    }
}

fn mark_to_adf(mark: &Mark) -> Value {
    match mark {
        Mark::Bold => json!({"type": "strong"}),
        Mark::Italic => json!({"type": "em"}),
        Mark::Code => json!({"type": "code"}),
        Mark::Strike => json!({"type": "strike"}),
        Mark::Link { href } => json!({"type": "link", "attrs": {"href": href}}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paragraph_with_marks() {
        let doc = RichTextDocument::from_adf(&json!({
            "type": "doc",
            "version": 1,
            "content": [{
                "type": "paragraph",
                "content": [
                    {"type": "text", "text": "Hello "},
                    {"type": "text", "text": "world", "marks": [{"type": "strong"}, {"type": "em"}]}
                ]
            }]
        }))
        .unwrap();

        assert_eq!(
            doc.content,
            vec![RichTextNode::Paragraph(vec![
                RichTextNode::text("Hello "),
                RichTextNode::marked("world", vec![Mark::Bold, Mark::Italic]),
            ])]
        );
    }

    #[test]
    fn test_parse_code_block_language() {
        let doc = RichTextDocument::from_adf(&json!({
            "type": "doc",
            "content": [{
                "type": "codeBlock",
                "attrs": {"language": "rust"},
                "content": [{"type": "text", "text": "fn main() {}"}]
            }]
        }))
        .unwrap();

        assert_eq!(
            doc.content,
            vec![RichTextNode::CodeBlock {
                language: Some("rust".to_string()),
                text: "fn main() {}".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_mention_and_media() {
        let doc = RichTextDocument::from_adf(&json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [
                    {"type": "mention", "attrs": {"id": "1", "text": "@John Doe"}}
                ]},
                {"type": "mediaSingle", "content": [{"type": "media"}]}
            ]
        }))
        .unwrap();

        assert_eq!(
            doc.content,
            vec![RichTextNode::Paragraph(vec![RichTextNode::text("@John Doe")])]
        );
    }

    #[test]
    fn test_unknown_container_flattens() {
        let doc = RichTextDocument::from_adf(&json!({
            "type": "doc",
            "content": [{
                "type": "panel",
                "attrs": {"panelType": "info"},
                "content": [{"type": "paragraph", "content": [{"type": "text", "text": "note"}]}]
            }]
        }))
        .unwrap();

        assert_eq!(
            doc.content,
            vec![RichTextNode::Paragraph(vec![RichTextNode::text("note")])]
        );
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(RichTextDocument::from_adf(&json!("plain")).is_err());
        assert!(RichTextDocument::from_adf(&json!({"type": "paragraph"})).is_err());
        assert!(RichTextDocument::from_adf(&json!({"type": "doc", "content": {}})).is_err());
        assert!(RichTextDocument::from_adf(&json!({
            "type": "doc",
            "content": [{"type": "paragraph", "content": [{"type": "text"}]}]
        }))
        .is_err());
    }

    #[test]
    fn test_to_adf_roundtrip_structure() {
        let doc = RichTextDocument::new(vec![
            RichTextNode::Heading {
                level: 2,
                children: vec![RichTextNode::text("Title")],
            },
            RichTextNode::BulletList(vec![RichTextNode::ListItem(vec![
                RichTextNode::Paragraph(vec![RichTextNode::marked(
                    "docs",
                    vec![Mark::Link {
                        href: "https://example.com".to_string(),
                    }],
                )]),
            ])]),
            RichTextNode::Rule,
        ]);

        let parsed = RichTextDocument::from_adf(&doc.to_adf()).unwrap();
        assert_eq!(parsed, doc);
    }
}
