//! Post-processing: deterministic cleanup of model output and fetched pages.
//!
//! Small local models routinely wrap JSON in fences, prepend a sentence before
//! the object, leak `<think>` spans from reasoning mode, or put line breaks in
//! fields that must be single-line. Each quirk gets one pure `&str → String`
//! rule here, so the prompt stays about *what* to write and each rule is
//! independently testable.

use once_cell::sync::Lazy;
use regex::Regex;

// ── Reasoning spans ──────────────────────────────────────────────────────────

static RE_THINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Remove every `<think>…</think>` span and trim the remainder.
pub fn strip_think_tags(input: &str) -> String {
    RE_THINK.replace_all(input, "").trim().to_string()
}

// ── JSON extraction ──────────────────────────────────────────────────────────

static RE_JSON_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*)\n```\s*$").unwrap());

fn strip_json_fences(input: &str) -> String {
    if let Some(caps) = RE_JSON_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

/// Reduce raw formatter output to the JSON object it contains.
///
/// Rules (applied in order):
/// 1. Drop `<think>` spans
/// 2. Strip outer ```` ```json ```` fences
/// 3. Cut everything before the first `{` and after the last `}`
///
/// If no braces are found the (stripped) input is returned unchanged so the
/// JSON parser produces a meaningful error.
pub fn extract_json_object(input: &str) -> String {
    let s = strip_think_tags(input);
    let s = strip_json_fences(&s);
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => s[start..=end].to_string(),
        _ => s.trim().to_string(),
    }
}

// ── Field text ───────────────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse every whitespace run (including newlines) into one space and trim.
pub fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input.trim(), " ").to_string()
}

/// Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …).
pub fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

/// Normalise one gist field: single line, no invisible characters.
pub fn clean_field(input: &str) -> String {
    collapse_whitespace(&remove_invisible_chars(input))
}

// ── HTML reduction ───────────────────────────────────────────────────────────

static RE_DROPPED_ELEMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>")
        .unwrap()
});
static RE_COMMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Reduce an HTML document to its visible text.
///
/// Drops `script`/`style`/`noscript` elements and comments, replaces every
/// remaining tag with a space, decodes the common entities, and collapses
/// whitespace.
pub fn html_to_text(html: &str) -> String {
    let s = RE_DROPPED_ELEMENTS.replace_all(html, " ");
    let s = RE_COMMENTS.replace_all(&s, " ");
    let s = RE_TAGS.replace_all(&s, " ");
    let s = decode_entities(&s);
    collapse_whitespace(&s)
}

fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

// ── Placeholder URLs ─────────────────────────────────────────────────────────
//
// Models invent `example.com`-style links when asked for references. These
// are never real sources and are dropped before any network check.

const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "placeholder.com",
    "via.placeholder.com",
    "dummyimage.com",
    "lorempixel.com",
    "picsum.photos",
    "placehold.it",
    "localhost",
];

/// Whether `host` is (a subdomain of) a known placeholder domain.
pub fn is_placeholder_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    PLACEHOLDER_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

// ── Tests ────────────────────────────────────────────────────────────────────
