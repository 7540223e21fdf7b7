use once_cell::sync::Lazy;
use regex::Regex;

/// Longest free-text value kept after sanitising, in characters
pub const MAX_TEXT_LENGTH: usize = 1000;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static JAVASCRIPT_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript\s*:").expect("valid regex"));

/// Strip script blocks, remaining markup and `javascript:` references until
/// none are left, then trim and cap the length. Not a full HTML sanitiser.
pub fn sanitize_text(input: &str) -> String {
    let mut text = input.to_string();
    loop {
        let stripped = strip_once(&text);
        if stripped == text {
            break;
        }
        text = stripped;
    }
    text.trim().chars().take(MAX_TEXT_LENGTH).collect()
}

fn strip_once(input: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(input, "");
    let text = TAG.replace_all(&text, "");
    JAVASCRIPT_SCHEME.replace_all(&text, "").into_owned()
}

pub fn sanitize_opt(input: Option<String>) -> Option<String> {
    input.map(|text| sanitize_text(&text))
}
