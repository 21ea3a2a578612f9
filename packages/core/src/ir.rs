//! The Service IR: the validated, immutable description of one service.
//!
//! IR values are only ever built by [`crate::validation`]; every invariant
//! documented here has already been checked by the time a caller sees one.
//! They serialise to JSON so a validated service can be stored and later
//! executed without re-running the validator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::typing::TypeRef;

/// A validated service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDescription {
    pub name: String,
    /// Name of the contract the generated client implements.
    pub implements: String,
    /// Functions in declaration order. Names are unique.
    pub functions: Vec<Function>,
}

impl ServiceDescription {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// One HTTP-bound function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub method: HttpMethod,
    pub url: Url,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    pub returns: ReturnShape,
}

impl Function {
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    #[serde(rename = "custom")]
    Custom { token: String, has_body: bool },
}

impl HttpMethod {
    /// Map a standard method name to its variant. Matching is exact; custom
    /// tokens are case-sensitive on the wire.
    pub fn standard(name: &str) -> Option<Self> {
        match name {
            "DELETE" => Some(HttpMethod::Delete),
            "GET" => Some(HttpMethod::Get),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            "PATCH" => Some(HttpMethod::Patch),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Delete => "DELETE",
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Custom { token, .. } => token,
        }
    }

    /// Whether requests with this method may carry content.
    pub fn permits_body(&self) -> bool {
        match self {
            HttpMethod::Delete | HttpMethod::Get | HttpMethod::Head | HttpMethod::Options => false,
            HttpMethod::Patch | HttpMethod::Post | HttpMethod::Put => true,
            HttpMethod::Custom { has_body, .. } => *has_body,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// URL
// ---------------------------------------------------------------------------

/// How a literal URL relates to the client's base URL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UrlKind {
    /// `/a/b`: replaces the base path.
    Absolute,
    /// `https://host/a`: used verbatim.
    Full,
    /// `//host/a`: takes the base scheme.
    ProtocolRelative,
    /// `a/b`: appended to the base path.
    Relative,
}

impl fmt::Display for UrlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlKind::Absolute => write!(f, "absolute"),
            UrlKind::Full => write!(f, "full"),
            UrlKind::ProtocolRelative => write!(f, "protocol-relative"),
            UrlKind::Relative => write!(f, "relative"),
        }
    }
}

/// The URL source of a function: exactly one per function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Url {
    Template {
        template: String,
        kind: UrlKind,
        /// In bijection with the template's placeholders.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path_params: Vec<PathBinding>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        queries: Vec<QueryBinding>,
    },
    Dynamic {
        parameter: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        queries: Vec<QueryBinding>,
    },
}

impl Url {
    pub fn queries(&self) -> &[QueryBinding] {
        match self {
            Url::Template { queries, .. } | Url::Dynamic { queries, .. } => queries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathBinding {
    pub placeholder: String,
    pub parameter: String,
}

/// A parameter contributing zero or more name/value pairs to a query
/// string or a form.
///
/// `name` is `None` only for [`ValueMode::Map`], whose entries carry their
/// own names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValueBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parameter: String,
    pub mode: ValueMode,
}

pub type QueryBinding = ValueBinding;
pub type FieldBinding = ValueBinding;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", content = "map_type", rename_all = "snake_case")]
pub enum ValueMode {
    /// One value, stringified.
    Single,
    /// Each element contributes one pair under the same name.
    Iterable,
    /// Each entry contributes one pair under its own key.
    Map(MapType),
}

/// Shape of a many-valued parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    /// `Map<String, V>`.
    Map,
    /// Ordered `List<Pair<String, V>>`.
    PairList,
    /// Opaque multi-value container; each key maps to a list of values.
    MultiValue,
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// A header binding. Never names Content-Type or Content-Length.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Header {
    Static {
        name: String,
        value: String,
    },
    Single {
        name: String,
        parameter: String,
        /// One header line per element.
        iterable: bool,
    },
    Map {
        parameter: String,
        map_type: MapType,
    },
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    Body(BodyBinding),
    /// At least one field.
    FormUrlEncoded { fields: Vec<FieldBinding> },
    /// At least one part.
    Multipart {
        subtype: String,
        parts: Vec<PartBinding>,
    },
}

impl Content {
    /// The `Content-Type` for form and multipart content, without the
    /// multipart boundary parameter. Bodies report their own declared type.
    pub fn media_type(&self) -> String {
        match self {
            Content::Body(body) => body.content_type.clone(),
            Content::FormUrlEncoded { .. } => "application/x-www-form-urlencoded".to_string(),
            Content::Multipart { subtype, .. } => format!("multipart/{subtype}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BodyBinding {
    pub parameter: String,
    pub content_type: String,
    /// The parameter is a `ByteStream`; converters are bypassed.
    #[serde(default)]
    pub raw: bool,
    /// The parameter type is nullable; a null value sends an empty payload.
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartBinding {
    /// Form-field name for single and iterable parts. `None` for map parts,
    /// whose entries name themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parameter: String,
    pub content_type: String,
    pub mode: ValueMode,
    /// The part payload is a `ByteStream`.
    #[serde(default)]
    pub raw: bool,
}

// ---------------------------------------------------------------------------
// Return shape
// ---------------------------------------------------------------------------

/// What a call site receives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", content = "type", rename_all = "snake_case")]
pub enum ReturnShape {
    /// The decoded value itself; errors escape to the caller.
    Plain(TypeRef),
    /// `Result<T>`: outcomes, including failures, are captured as values.
    Wrapped(TypeRef),
    /// `Result<*>`: the outcome is captured and the body discarded.
    WrappedWildcard,
}

impl ReturnShape {
    pub fn is_wrapped(&self) -> bool {
        !matches!(self, ReturnShape::Plain(_))
    }
}

impl fmt::Display for ReturnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnShape::Plain(t) => write!(f, "{t}"),
            ReturnShape::Wrapped(t) => write!(f, "Result<{t}>"),
            ReturnShape::WrappedWildcard => write!(f, "Result<*>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_body_permission() {
        assert!(!HttpMethod::Get.permits_body());
        assert!(!HttpMethod::Options.permits_body());
        assert!(HttpMethod::Patch.permits_body());
        let custom = HttpMethod::Custom {
            token: "PROPFIND".into(),
            has_body: true,
        };
        assert!(custom.permits_body());
        assert_eq!(custom.as_str(), "PROPFIND");
    }

    #[test]
    fn ir_serialises_with_tags() {
        let f = Function {
            name: "get".into(),
            parameters: vec![Parameter {
                name: "id".into(),
                ty: TypeRef::named("Long"),
            }],
            method: HttpMethod::Get,
            url: Url::Template {
                template: "users/{id}".into(),
                kind: UrlKind::Relative,
                path_params: vec![PathBinding {
                    placeholder: "id".into(),
                    parameter: "id".into(),
                }],
                queries: vec![ValueBinding {
                    name: None,
                    parameter: "filters".into(),
                    mode: ValueMode::Map(MapType::PairList),
                }],
            },
            headers: vec![],
            content: None,
            returns: ReturnShape::Wrapped(TypeRef::named("User")),
        };
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["method"]["kind"], "GET");
        assert_eq!(json["url"]["source"], "template");
        assert_eq!(json["url"]["queries"][0]["mode"]["map_type"], "pair_list");
        assert_eq!(json["returns"]["shape"], "wrapped");
        let back: Function = serde_json::from_value(json).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn multipart_media_type() {
        let c = Content::Multipart {
            subtype: "mixed".into(),
            parts: vec![],
        };
        assert_eq!(c.media_type(), "multipart/mixed");
    }
}
