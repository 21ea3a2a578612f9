//! Lexical analysis of URL templates.
//!
//! A template is split into three literal pieces, in this order:
//!
//! | Piece | Delimiter | Placeholders allowed |
//! |-------|-----------|----------------------|
//! | path | — | yes |
//! | query | first `?` before the fragment | no |
//! | fragment | first `#` | no |
//!
//! The same helpers are used at compile time by the validator and at call
//! time by the resolver in `restwire-runtime`.

use std::sync::LazyLock;

use regex::Regex;

use crate::ir::UrlKind;

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:").expect("valid regex"));

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("valid regex"));

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_\-]*$").expect("valid regex"));

/// Classify a literal URL by its leading characters.
pub fn classify(template: &str) -> UrlKind {
    if template.starts_with("//") {
        UrlKind::ProtocolRelative
    } else if template.starts_with('/') {
        UrlKind::Absolute
    } else if SCHEME_RE.is_match(template) {
        UrlKind::Full
    } else {
        UrlKind::Relative
    }
}

/// The scheme of a full URL, without the trailing `:`.
pub fn scheme(template: &str) -> Option<&str> {
    SCHEME_RE
        .find(template)
        .map(|m| &template[..m.end() - 1])
}

/// A template split into path, query and fragment.
///
/// `query` is `Some("")` for a present-but-empty `?`, and likewise for the
/// fragment, so both distinctions survive resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitTemplate<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

pub fn split(template: &str) -> SplitTemplate<'_> {
    let (rest, fragment) = match template.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (template, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    SplitTemplate {
        path,
        query,
        fragment,
    }
}

/// One `{name}` occurrence, with its byte span in the scanned string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

/// The outcome of scanning a string for placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    /// Well-formed placeholders in order of appearance, duplicates included.
    pub placeholders: Vec<Placeholder>,
    /// Text of anything brace-shaped that is not a legal placeholder:
    /// `{}`, `{1x}`, or a stray `{` / `}`.
    pub malformed: Vec<String>,
}

pub fn scan(text: &str) -> Scan {
    let mut out = Scan::default();
    let mut covered = vec![false; text.len()];
    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        covered[whole.start()..whole.end()].iter_mut().for_each(|c| *c = true);
        if NAME_RE.is_match(name.as_str()) {
            out.placeholders.push(Placeholder {
                name: name.as_str().to_string(),
                start: whole.start(),
                end: whole.end(),
            });
        } else {
            out.malformed.push(whole.as_str().to_string());
        }
    }
    for (i, b) in text.bytes().enumerate() {
        if (b == b'{' || b == b'}') && !covered[i] {
            out.malformed.push((b as char).to_string());
        }
    }
    out
}

/// Replace each placeholder in `path` with the value `lookup` returns for
/// its name. Placeholders without a value are left as they are.
pub fn substitute<'a>(path: &str, mut lookup: impl FnMut(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last = 0;
    for p in scan(path).placeholders {
        out.push_str(&path[last..p.start]);
        match lookup(&p.name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&path[p.start..p.end]),
        }
        last = p.end;
    }
    out.push_str(&path[last..]);
    out
}

/// `true` if `segment`, after percent-decoding, is `.` or `..`.
///
/// Decoding makes `%2e`, `%2E` and mixed forms such as `.%2E` match too.
pub fn is_traversal_segment(segment: &str) -> bool {
    let decoded = urlencoding::decode_binary(segment.as_bytes());
    decoded.as_ref() == b"." || decoded.as_ref() == b".."
}

/// The first traversal segment in a `/`-separated path, if any.
pub fn traversal_segment(path: &str) -> Option<&str> {
    path.split('/').find(|s| is_traversal_segment(s))
}

/// The first traversal segment in a value bound into a path.
///
/// The whole value is percent-decoded before it is split, so an encoded
/// separator (`..%2f..`) cannot hide a segment from the check.
pub fn value_traversal_segment(value: &str) -> Option<String> {
    let decoded = urlencoding::decode_binary(value.as_bytes());
    String::from_utf8_lossy(&decoded)
        .split('/')
        .find(|s| *s == "." || *s == "..")
        .map(str::to_string)
}
