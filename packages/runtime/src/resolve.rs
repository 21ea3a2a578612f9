//! URL resolution: base URL + URL source + arguments → absolute URL.
//!
//! | Kind | Example | Result against `https://x/base/` |
//! |------|---------|----------------------------------|
//! | absolute-path | `/a/b` | `https://x/a/b` |
//! | protocol-relative | `//host/a` | `https://host/a` |
//! | full | `http://host/a` | `http://host/a` |
//! | relative | `a/b` | `https://x/base/a/b` |
//!
//! Placeholders are substituted textually, then the whole path is
//! percent-encoded as one unit. A substituted value has its `%` escaped
//! first, so the server decodes exactly the text the caller passed.
//!
//! Every path segment that decodes to `.` or `..` is rejected with a
//! [`SecurityError`]: first in the literal template, then in each
//! substituted value (decoded before it is split on `/`), then in the
//! assembled path.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use restwire::ir::{self, QueryBinding, UrlKind};
use restwire::url_template;
use url::{Position, Url};

use crate::error::{ConfigError, SecurityError, UrlError, ValueError};
use crate::value::{binding_pairs, ArgValue, Arguments};

/// Characters escaped in a path. `%` is left alone so escapes written in
/// the template survive, and `/` because substituted values may span
/// segments.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Characters escaped in a literal query string.
const QUERY: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>');

// ---------------------------------------------------------------------------
// BaseUrl
// ---------------------------------------------------------------------------

/// A base URL that satisfies the client invariants: http or https, no query,
/// no fragment, and a path ending in `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Url);

impl BaseUrl {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(input).map_err(|e| ConfigError::InvalidBaseUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.query().is_some() {
            return Err(ConfigError::BaseHasQuery);
        }
        if url.fragment().is_some() {
            return Err(ConfigError::BaseHasFragment);
        }
        if !url.path().ends_with('/') {
            return Err(ConfigError::MissingTrailingSlash(input.to_string()));
        }
        Ok(Self(url))
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for BaseUrl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve `target` against `base` with the call's `args`.
pub fn resolve(base: &BaseUrl, target: &ir::Url, args: &Arguments) -> Result<Url, UrlError> {
    let mut url = match target {
        ir::Url::Template {
            template,
            kind,
            path_params,
            ..
        } => {
            let split = url_template::split(template);
            reject_traversal(split.path, "the URL template")?;

            let mut values: HashMap<&str, String> = HashMap::new();
            for binding in path_params {
                let parameter = binding.parameter.as_str();
                let value = match args.value(parameter) {
                    v @ (ArgValue::List(_) | ArgValue::Map(_)) => {
                        return Err(ValueError::Shape {
                            parameter: parameter.to_string(),
                            expected: "a single value",
                            found: v.kind(),
                        }
                        .into())
                    }
                    v => v
                        .to_text(parameter)?
                        .ok_or_else(|| ValueError::Missing(parameter.to_string()))?,
                };
                reject_value_traversal(&value, parameter)?;
                values.insert(binding.placeholder.as_str(), value.replace('%', "%25"));
            }

            let path = url_template::substitute(split.path, |name| {
                values.get(name).map(String::as_str)
            });
            splice(base, *kind, &path, split.query, split.fragment)?
        }
        ir::Url::Dynamic { parameter, .. } => {
            let raw = match args.value(parameter) {
                ArgValue::Str(s) => s.as_str(),
                ArgValue::Null => return Err(ValueError::Missing(parameter.clone()).into()),
                other => {
                    return Err(ValueError::Shape {
                        parameter: parameter.clone(),
                        expected: "a string",
                        found: other.kind(),
                    }
                    .into())
                }
            };
            let split = url_template::split(raw);
            reject_value_traversal(split.path, parameter)?;
            let kind = url_template::classify(raw);
            splice(base, kind, split.path, split.query, split.fragment)?
        }
    };

    append_queries(&mut url, target.queries(), args)?;
    Ok(url)
}

fn reject_traversal(path: &str, origin: &str) -> Result<(), SecurityError> {
    match url_template::traversal_segment(path) {
        Some(segment) => Err(SecurityError::PathTraversal {
            segment: segment.to_string(),
            origin: origin.to_string(),
        }),
        None => Ok(()),
    }
}

fn reject_value_traversal(value: &str, parameter: &str) -> Result<(), SecurityError> {
    match url_template::value_traversal_segment(value) {
        Some(segment) => Err(SecurityError::PathTraversal {
            segment,
            origin: format!("parameter {parameter}"),
        }),
        None => Ok(()),
    }
}

/// Join the substituted path with the base according to its kind, then
/// re-attach the literal query and fragment.
fn splice(
    base: &BaseUrl,
    kind: UrlKind,
    path: &str,
    query: Option<&str>,
    fragment: Option<&str>,
) -> Result<Url, UrlError> {
    reject_traversal(path, "the resolved path")?;
    let encoded = utf8_percent_encode(path, PATH).to_string();

    let mut out = match kind {
        UrlKind::ProtocolRelative => format!("{}:{}", base.as_url().scheme(), encoded),
        UrlKind::Absolute => format!("{}{}", &base.as_url()[..Position::BeforePath], encoded),
        UrlKind::Full => {
            let scheme = url_template::scheme(path).unwrap_or_default();
            if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
                return Err(UrlError::UnsupportedScheme(scheme.to_string()));
            }
            encoded
        }
        UrlKind::Relative => format!("{}{}", base.as_str(), encoded),
    };

    if let Some(query) = query {
        out.push('?');
        out.extend(utf8_percent_encode(query, QUERY));
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }

    Url::parse(&out).map_err(|source| UrlError::Invalid { url: out, source })
}

/// Append dynamic query pairs after the literal ones. Nulls are skipped.
fn append_queries(url: &mut Url, queries: &[QueryBinding], args: &Arguments) -> Result<(), UrlError> {
    let pairs = binding_pairs(queries, args)?;
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(())
}
