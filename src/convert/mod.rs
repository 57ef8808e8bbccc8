//! Conversion between rich-text trees, inline markup and wiki markup.
//!
//! The `try_*` functions report malformed input. The plain functions never
//! fail: on malformed input they log a warning and return the original text,
//! so a bad description degrades instead of blocking a write.

pub mod text;
pub mod tree;
pub mod wiki;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub use text::MarkStyle;
pub use tree::{Mark, RichTextDocument, RichTextNode};

/// Malformed converter input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Malformed rich-text document: {0}")]
    Malformed(String),

    #[error("Code block opened on line {line} is never closed")]
    UnterminatedCodeBlock { line: usize },

    #[error("Input contains reserved character {0:?}")]
    ReservedCharacter(char),
}

/// Render a document as text.
pub fn tree_to_text(doc: &RichTextDocument, style: MarkStyle) -> String {
    text::render(doc, style)
}

/// Parse rich-text JSON and render it as text.
pub fn try_adf_to_text(value: &Value, style: MarkStyle) -> Result<String, ConversionError> {
    RichTextDocument::from_adf(value).map(|doc| text::render(&doc, style))
}

/// Render rich-text JSON as text. A bare JSON string passes through; other
/// malformed input falls back to its JSON encoding.
pub fn adf_to_text(value: &Value, style: MarkStyle) -> String {
    if let Value::String(s) = value {
        return s.clone();
    }
    try_adf_to_text(value, style).unwrap_or_else(|e| {
        warn!("Rich-text conversion failed, using raw value: {}", e);
        value.to_string()
    })
}

/// Convert inline markup to wiki markup, reporting malformed input.
pub fn try_markup_to_wiki(input: &str) -> Result<String, ConversionError> {
    wiki::markup_to_wiki(input)
}

/// Convert inline markup to wiki markup, falling back to the input.
pub fn markup_to_wiki(input: &str) -> String {
    wiki::markup_to_wiki(input).unwrap_or_else(|e| {
        warn!("Wiki conversion failed, sending original text: {}", e);
        input.to_string()
    })
}

/// Convert wiki markup to inline markup, reporting malformed input.
pub fn try_wiki_to_markup(input: &str) -> Result<String, ConversionError> {
    wiki::wiki_to_markup(input)
}

/// Convert wiki markup to inline markup, falling back to the input.
pub fn wiki_to_markup(input: &str) -> String {
    wiki::wiki_to_markup(input).unwrap_or_else(|e| {
        warn!("Markup conversion failed, keeping original text: {}", e);
        input.to_string()
    })
}

/// Degrade a document to wiki markup for servers that only accept wiki text.
///
/// Marks are rendered in the inline-markup style first so bold and italic
/// survive the second conversion.
pub fn tree_to_wiki(doc: &RichTextDocument) -> String {
    markup_to_wiki(&text::render(doc, MarkStyle::Markup))
}
