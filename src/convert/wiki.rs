//! Inline markup ⇄ wiki markup.
//!
//! Both directions work the same way: code blocks are lifted out into
//! placeholders before anything else runs, then each remaining line is split
//! into a block prefix (heading, list marker, quote) and inline content, and
//! the inline content goes through ordered substitutions. Placeholders are
//! restored last, so code contents are never rewritten.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::text::trim_trailing_blank_lines;
use super::ConversionError;

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';
/// Stands in for a bold asterisk while italic rules run.
const BOLD_SENTINEL: char = '\u{E002}';
const RESERVED: [char; 3] = [PLACEHOLDER_OPEN, PLACEHOLDER_CLOSE, BOLD_SENTINEL];

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!("Invalid regex ", stringify!($name))));
    };
}

pattern!(PLACEHOLDER, "\u{E000}(\\d+)\u{E001}");

// Inline markup patterns.
pattern!(MD_FENCE, r"^\s*```\s*([\w+#.-]*)\s*$");
pattern!(MD_HEADING, r"^(#{1,6})\s+(.*)$");
pattern!(MD_RULE, r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$");
pattern!(MD_QUOTE, r"^>\s?(.*)$");
pattern!(MD_LIST, r"^(\s*)([-*+]|\d+[.)])\s+(.*)$");
pattern!(MD_INLINE_CODE, r"`([^`]+)`");
pattern!(MD_IMAGE, r"!\[[^\]]*\]\(([^)\s]+)\)");
pattern!(MD_LINK, r"\[([^\]]+)\]\(([^)\s]+)\)");
pattern!(MD_BOLD_STARS, r"\*\*(\S(?:.*?\S)?)\*\*");
pattern!(MD_BOLD_UNDERSCORES, r"__(\S(?:.*?\S)?)__");
pattern!(MD_ITALIC, r"\*([^*\s](?:[^*]*?[^*\s])?)\*");
pattern!(MD_STRIKE, r"~~(\S(?:.*?\S)?)~~");

// Wiki markup patterns.
pattern!(
    WIKI_CODE,
    r"(?s)\{code(?::([^}|]*))?(?:\|[^}]*)?\}\n?(.*?)\{code\}"
);
pattern!(WIKI_NOFORMAT, r"(?s)\{noformat(?:\|[^}]*)?\}\n?(.*?)\{noformat\}");
pattern!(WIKI_HEADING, r"^h([1-6])\.\s*(.*)$");
pattern!(WIKI_RULE, r"^\s*-{4,}\s*$");
pattern!(WIKI_QUOTE, r"^bq\.\s?(.*)$");
pattern!(WIKI_LIST, r"^([*#-]+)\s+(.*)$");
pattern!(WIKI_MONOSPACE, r"\{\{(.+?)\}\}");
pattern!(WIKI_LINK, r"\[([^\]|]+)\|([^\]]+)\]");
pattern!(WIKI_BARE_LINK, r"\[((?:https?|mailto):[^\]\s]+)\]");
pattern!(
    WIKI_IMAGE,
    r"!((?:https?://)?[^!\s|]+\.[A-Za-z0-9]+)(?:\|[^!]*)?!"
);
pattern!(WIKI_BOLD, r"(^|[^\w*])\*([^*\s](?:[^*]*?[^*\s])?)\*($|[^\w*])");
pattern!(WIKI_ITALIC, r"(^|[^\w_])_([^_\s](?:[^_]*?[^_\s])?)_($|[^\w_])");
pattern!(WIKI_STRIKE, r"(^|[^\w-])-([^-\s](?:[^-]*?[^-\s])?)-($|[^\w-])");

/// Protected fragments, restored after all substitutions.
#[derive(Default)]
struct Placeholders(Vec<String>);

impl Placeholders {
    fn hold(&mut self, content: String) -> String {
        self.0.push(content);
        format!("{}{}{}", PLACEHOLDER_OPEN, self.0.len() - 1, PLACEHOLDER_CLOSE)
    }

    fn restore(&self, text: &str) -> String {
        let mut out = text.to_string();
        // Held fragments may themselves contain placeholders.
        for _ in 0..4 {
            if !out.contains(PLACEHOLDER_OPEN) {
                break;
            }
            out = PLACEHOLDER
                .replace_all(&out, |caps: &Captures| {
                    caps[1]
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| self.0.get(i))
                        .cloned()
                        .unwrap_or_default()
                })
                .into_owned();
        }
        out
    }
}

fn check_reserved(text: &str) -> Result<(), ConversionError> {
    match text.chars().find(|c| RESERVED.contains(c)) {
        Some(c) => Err(ConversionError::ReservedCharacter(c)),
        None => Ok(()),
    }
}

/// Apply `re` repeatedly until the text stops changing. Boundary-consuming
/// patterns miss adjacent matches on a single pass.
fn replace_until_stable(re: &Regex, text: &str, rep: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..4 {
        let next = re.replace_all(&current, rep).into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Convert inline markup to wiki markup.
pub fn markup_to_wiki(text: &str) -> Result<String, ConversionError> {
    check_reserved(text)?;
    let mut held = Placeholders::default();
    let text = extract_fenced_blocks(text, &mut held)?;

    let lines: Vec<String> = text
        .lines()
        .map(|line| markup_line_to_wiki(line, &mut held))
        .collect();

    Ok(held.restore(&lines.join("\n")))
}

/// Lift fenced code blocks into placeholders, one per block.
fn extract_fenced_blocks(text: &str, held: &mut Placeholders) -> Result<String, ConversionError> {
    let mut out: Vec<String> = Vec::new();
    let mut lines = text.lines().enumerate();

    while let Some((number, line)) = lines.next() {
        let Some(caps) = MD_FENCE.captures(line) else {
            out.push(line.to_string());
            continue;
        };
        let language = caps[1].to_string();

        let mut body = Vec::new();
        let mut closed = false;
        for (_, inner) in lines.by_ref() {
            if inner.trim() == "```" {
                closed = true;
                break;
            }
            body.push(inner);
        }
        if !closed {
            return Err(ConversionError::UnterminatedCodeBlock { line: number + 1 });
        }

        let body = body.join("\n");
        let body = trim_trailing_blank_lines(&body);
        let open = if language.is_empty() {
            "{code}".to_string()
        } else {
            format!("{{code:{}}}", language)
        };
        let block = if body.is_empty() {
            format!("{}\n{{code}}", open)
        } else {
            format!("{}\n{}\n{{code}}", open, body)
        };
        out.push(held.hold(block));
    }

    Ok(out.join("\n"))
}

fn markup_line_to_wiki(line: &str, held: &mut Placeholders) -> String {
    if MD_RULE.is_match(line) {
        return "----".to_string();
    }
    if let Some(caps) = MD_HEADING.captures(line) {
        return format!("h{}. {}", caps[1].len(), markup_inline_to_wiki(&caps[2], held));
    }
    if let Some(caps) = MD_QUOTE.captures(line) {
        return format!("bq. {}", markup_inline_to_wiki(&caps[1], held));
    }
    if let Some(caps) = MD_LIST.captures(line) {
        let depth = caps[1].replace('\t', "  ").len() / 2 + 1;
        let symbol = if caps[2].chars().next().is_some_and(|c| c.is_ascii_digit()) {
            "#"
        } else {
            "*"
        };
        return format!(
            "{} {}",
            symbol.repeat(depth),
            markup_inline_to_wiki(&caps[3], held)
        );
    }
    markup_inline_to_wiki(line, held)
}

fn markup_inline_to_wiki(text: &str, held: &mut Placeholders) -> String {
    let text = MD_INLINE_CODE.replace_all(text, |caps: &Captures| {
        held.hold(format!("{{{{{}}}}}", &caps[1]))
    });
    let text = MD_IMAGE.replace_all(&text, |caps: &Captures| held.hold(format!("!{}!", &caps[1])));
    let text = MD_LINK
        .replace_all(&text, |caps: &Captures| {
            let label = markup_emphasis_to_wiki(&caps[1]);
            held.hold(format!("[{}|{}]", label, &caps[2]))
        })
        .into_owned();
    markup_emphasis_to_wiki(&text)
}

/// Bold is resolved first into a sentinel so the italic rule cannot split a
/// `**` run.
fn markup_emphasis_to_wiki(text: &str) -> String {
    let bold = format!("{s}${{1}}{s}", s = BOLD_SENTINEL);
    let text = MD_BOLD_STARS.replace_all(text, bold.as_str());
    let text = MD_BOLD_UNDERSCORES.replace_all(&text, bold.as_str());
    let text = MD_ITALIC.replace_all(&text, "_${1}_");
    let text = MD_STRIKE.replace_all(&text, "-${1}-");
    text.replace(BOLD_SENTINEL, "*")
}

/// Convert wiki markup to inline markup.
pub fn wiki_to_markup(text: &str) -> Result<String, ConversionError> {
    check_reserved(text)?;
    let mut held = Placeholders::default();

    let text = WIKI_CODE.replace_all(text, |caps: &Captures| {
        let language = caps.get(1).map_or("", |m| m.as_str().trim());
        let body = trim_trailing_blank_lines(&caps[2]);
        held.hold(format!("```{}\n{}\n```", language, body))
    });
    let text = WIKI_NOFORMAT.replace_all(&text, |caps: &Captures| {
        let body = trim_trailing_blank_lines(&caps[1]);
        held.hold(format!("```\n{}\n```", body))
    });
    if let Some(line) = unterminated_wiki_block(&text) {
        return Err(ConversionError::UnterminatedCodeBlock { line });
    }

    let lines: Vec<String> = text
        .lines()
        .map(|line| wiki_line_to_markup(line, &mut held))
        .collect();

    Ok(held.restore(&lines.join("\n")))
}

fn unterminated_wiki_block(text: &str) -> Option<usize> {
    text.lines()
        .position(|line| line.contains("{code") || line.contains("{noformat"))
        .map(|i| i + 1)
}

fn wiki_line_to_markup(line: &str, held: &mut Placeholders) -> String {
    if WIKI_RULE.is_match(line) {
        return "---".to_string();
    }
    if let Some(caps) = WIKI_HEADING.captures(line) {
        let level: usize = caps[1].parse().unwrap_or(1);
        return format!("{} {}", "#".repeat(level), wiki_inline_to_markup(&caps[2], held));
    }
    if let Some(caps) = WIKI_QUOTE.captures(line) {
        return format!("> {}", wiki_inline_to_markup(&caps[1], held));
    }
    if let Some(caps) = WIKI_LIST.captures(line) {
        let markers = &caps[1];
        let indent = "  ".repeat(markers.len() - 1);
        let marker = if markers.ends_with('#') { "1." } else { "-" };
        return format!(
            "{}{} {}",
            indent,
            marker,
            wiki_inline_to_markup(&caps[2], held)
        );
    }
    wiki_inline_to_markup(line, held)
}

fn wiki_inline_to_markup(text: &str, held: &mut Placeholders) -> String {
    let text = WIKI_MONOSPACE.replace_all(text, |caps: &Captures| {
        held.hold(format!("`{}`", &caps[1]))
    });
    let text = WIKI_LINK.replace_all(&text, |caps: &Captures| {
        let label = wiki_emphasis_to_markup(&caps[1]);
        held.hold(format!("[{}]({})", label, caps[2].trim()))
    });
    let text = WIKI_BARE_LINK.replace_all(&text, |caps: &Captures| {
        held.hold(format!("<{}>", &caps[1]))
    });
    let text = WIKI_IMAGE
        .replace_all(&text, |caps: &Captures| held.hold(format!("![]({})", &caps[1])))
        .into_owned();
    wiki_emphasis_to_markup(&text)
}

fn wiki_emphasis_to_markup(text: &str) -> String {
    let bold = format!("${{1}}{s}{s}${{2}}{s}{s}${{3}}", s = BOLD_SENTINEL);
    let text = replace_until_stable(&WIKI_BOLD, text, &bold);
    let text = replace_until_stable(&WIKI_ITALIC, &text, "${1}*${2}*${3}");
    let text = replace_until_stable(&WIKI_STRIKE, &text, "${1}~~${2}~~${3}");
    text.replace(BOLD_SENTINEL, "*")
}
