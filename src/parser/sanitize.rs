//! Text cleanup for captions, titles and descriptions
//!
//! Rendered Facebook text carries invisible characters, truncation links and
//! uneven whitespace. Everything that lands in a record as free text goes
//! through [`sanitize_text`].

use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

static MULTI_NEWLINE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

static SEE_MORE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\s*…|\s*\.\.\.)?\s*see (more|less)\s*$").unwrap());

/// Sanitize extracted text content
///
/// Removes invisible and control characters, drops a trailing
/// "See more"/"See less" toggle, and normalizes whitespace line by line.
/// Returns `None` when nothing but whitespace remains.
///
/// # Examples
///
/// ```
/// use fbmedia::parser::sanitize::sanitize_text;
///
/// let clean = sanitize_text("Lake\u{200B} day   \n\n\n\nwith friends... See more");
/// assert_eq!(clean.as_deref(), Some("Lake day\n\nwith friends"));
/// ```
pub fn sanitize_text(text: &str) -> Option<String> {
    let mut result = remove_zero_width(text);
    result = remove_control_chars(&result);
    result = result.replace('\u{00A0}', " ");
    result = SEE_MORE_REGEX.replace(&result, "").to_string();
    result = WHITESPACE_REGEX.replace_all(&result, " ").to_string();
    result = trim_lines(&result);
    result = MULTI_NEWLINE_REGEX.replace_all(&result, "\n\n").to_string();

    let trimmed = result.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Remove zero-width spaces, direction marks and similar invisible characters
pub fn remove_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(*c,
                '\u{200B}'..='\u{200F}' |
                '\u{2028}'..='\u{202F}' |
                '\u{FEFF}'
            )
        })
        .collect()
}

/// Remove control characters except newline and tab
pub fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

fn trim_lines(text: &str) -> String {
    text.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}
