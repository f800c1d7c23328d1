//! Post-processing: deterministic cleanup of model-generated alt text.
//!
//! Vision models wrap their answer in quotes or code fences, prefix it with
//! "Alt text:", or run long despite the prompt. Screen readers read every
//! character aloud, so each of those artefacts is removed here.
//!
//! ## Rule Order
//!
//! Fences are stripped before prefixes so a fenced `Alt text: …` is handled;
//! quotes after prefixes because models write `Alt text: "…"`; the length cap
//! runs last on the fully collapsed text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on cleaned alt text, in characters.
pub const MAX_ALT_TEXT_CHARS: usize = 250;

/// Apply all cleanup rules. An empty result means the model produced nothing
/// usable.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Strip invisible Unicode
/// 3. Strip "Alt text:" style prefixes
/// 4. Strip surrounding quotes
/// 5. Collapse whitespace to single spaces
/// 6. Cap length on a word boundary
pub fn clean_alt_text(input: &str) -> String {
    let s = strip_fences(input);
    let s = remove_invisible_chars(&s);
    let s = strip_label_prefix(&s);
    let s = strip_quotes(&s);
    let s = collapse_whitespace(&s);
    cap_length(&s, MAX_ALT_TEXT_CHARS)
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n?(.*?)\n?```$").unwrap());

fn strip_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Rule 2: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Strip label prefixes ─────────────────────────────────────────────

static RE_LABEL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:alt[\s-]?text|alternative text|image description|description)\s*:\s*")
        .unwrap()
});

fn strip_label_prefix(input: &str) -> String {
    RE_LABEL_PREFIX.replace(input, "").to_string()
}

// ── Rule 4: Strip surrounding quotes ─────────────────────────────────────────

fn strip_quotes(input: &str) -> String {
    let s = input.trim();
    let pairs = [('"', '"'), ('\'', '\''), ('\u{201C}', '\u{201D}'), ('`', '`')];
    for (open, close) in pairs {
        if s.len() >= 2 && s.starts_with(open) && s.ends_with(close) {
            let inner = &s[open.len_utf8()..s.len() - close.len_utf8()];
            return inner.trim().to_string();
        }
    }
    s.to_string()
}

// ── Rule 5: Collapse whitespace ──────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Rule 6: Cap length ───────────────────────────────────────────────────────

/// Truncate to at most `max` characters, cutting at the last space when one
/// exists and dropping dangling punctuation.
fn cap_length(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    let cut: String = input.chars().take(max).collect();
    let cut = match cut.rfind(' ') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    cut.trim_end_matches([',', ';', ':', '-', ' ']).to_string()
}
