//! Text normalization and escaping

use quick_xml::escape::{escape, partial_escape};
use std::borrow::Cow;
use xmlview_model::TextNormalization;

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Apply an element's whitespace normalization mode.
pub fn normalize(text: &str, mode: TextNormalization) -> Cow<'_, str> {
    match mode {
        TextNormalization::None => Cow::Borrowed(text),
        TextNormalization::Replace => {
            if text.contains(['\t', '\r', '\n']) {
                Cow::Owned(text.replace(['\t', '\r', '\n'], " "))
            } else {
                Cow::Borrowed(text)
            }
        }
        TextNormalization::Collapse => {
            let collapsed = text
                .split(is_xml_space)
                .filter(|word| !word.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if collapsed == text {
                Cow::Borrowed(text)
            } else {
                Cow::Owned(collapsed)
            }
        }
    }
}

/// XML 1.0 `Char`: tab, LF, CR and everything from U+0020 except the
/// U+FFFE/U+FFFF non-characters.
pub fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && !matches!(c, '\u{fffe}' | '\u{ffff}'))
}

/// Drop characters XML cannot carry and reference the ones `needs_ref` picks.
fn sanitize<'a>(escaped: Cow<'a, str>, needs_ref: impl Fn(char) -> bool) -> Cow<'a, str> {
    if escaped.chars().all(|c| is_xml_char(c) && !needs_ref(c)) {
        return escaped;
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for c in escaped.chars().filter(|c| is_xml_char(*c)) {
        if needs_ref(c) {
            out.push_str(&format!("&#x{:X};", u32::from(c)));
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Escape element text. Carriage returns become character references; other
/// C0 controls except tab and line feed are dropped.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    sanitize(partial_escape(text), |c| c == '\r')
}

/// Escape an attribute value, including quotes and whitespace controls.
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    sanitize(escape(value), |c| matches!(c, '\t' | '\n' | '\r'))
}

/// Keep comment text well formed: no `--` and no trailing `-`.
pub fn comment_text(text: &str) -> String {
    let mut out: String = text.chars().filter(|c| is_xml_char(*c)).collect();
    while out.contains("--") {
        out = out.replace("--", "- -");
    }
    if out.ends_with('-') {
        out.push(' ');
    }
    out
}
