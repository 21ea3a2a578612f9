//! Raw service declarations: the validator's input.
//!
//! These structures mirror what a host-language front end extracts from an
//! annotated interface. They carry no guarantees; everything here is checked
//! by [`crate::validation`] before an IR is produced. All types deserialise
//! from JSON so declarations can be produced by any tool:
//!
//! ```json
//! {
//!   "name": "Users",
//!   "functions": [{
//!     "name": "get",
//!     "annotations": [{ "kind": "http", "method": "GET", "path": "users/{id}" }],
//!     "parameters": [{
//!       "name": "id", "type": "Long",
//!       "annotations": [{ "kind": "path" }]
//!     }],
//!     "return_type": "User"
//!   }],
//!   "serializable_types": ["User"]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::typing::TypeRef;

/// Where a declaration came from. Every diagnostic points at one of these.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceLocation {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

/// Formats as `file:line:column`, or `<unknown>` when no file is recorded.
impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "<unknown>:{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// The kind of type the host declared the service as.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    #[default]
    Interface,
    Class,
    Object,
    Enum,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclKind::Interface => write!(f, "interface"),
            DeclKind::Class => write!(f, "class"),
            DeclKind::Object => write!(f, "object"),
            DeclKind::Enum => write!(f, "enum"),
        }
    }
}

fn yes() -> bool {
    true
}

/// One declared service type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDecl {
    pub name: String,

    #[serde(default)]
    pub kind: DeclKind,

    /// `false` when the type is nested inside another declaration.
    #[serde(default = "yes")]
    pub top_level: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDecl>,

    #[serde(default)]
    pub functions: Vec<FunctionDecl>,

    /// Type names the host type system marked serializable. Built-in types
    /// never need to be listed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub serializable_types: Vec<String>,

    #[serde(default)]
    pub location: SourceLocation,
}

/// A property declared on the service type. Services may not have any; the
/// declaration exists only so the validator can point at it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDecl {
    pub name: String,

    #[serde(default)]
    pub annotations: Vec<FunctionAnnotation>,

    #[serde(default = "yes")]
    pub is_suspend: bool,

    #[serde(default)]
    pub has_default_body: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<String>,

    #[serde(default)]
    pub parameters: Vec<ParameterDecl>,

    #[serde(default = "TypeRef::unit")]
    pub return_type: TypeRef,

    #[serde(default)]
    pub location: SourceLocation,
}

/// Function-level markers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FunctionAnnotation {
    /// The HTTP method marker. `method` is one of the seven standard
    /// methods or a custom token; `has_body` is only consulted for custom
    /// tokens and defaults to `false`.
    Http {
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_body: Option<bool>,
    },
    /// Static headers, each written as `Name: value`.
    Headers { values: Vec<String> },
    FormUrlEncoded,
    Multipart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtype: Option<String>,
    },
}

impl FunctionAnnotation {
    pub fn label(&self) -> &'static str {
        match self {
            FunctionAnnotation::Http { .. } => "@Http",
            FunctionAnnotation::Headers { .. } => "@Headers",
            FunctionAnnotation::FormUrlEncoded => "@FormUrlEncoded",
            FunctionAnnotation::Multipart { .. } => "@Multipart",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterDecl {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: TypeRef,

    #[serde(default)]
    pub annotations: Vec<ParamAnnotation>,

    #[serde(default)]
    pub location: SourceLocation,
}

/// Parameter role markers. A valid parameter carries exactly one.
///
/// Optional `name`s default to the parameter's own name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamAnnotation {
    Path {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Url,
    Query {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    QueryMap,
    Header {
        name: String,
    },
    HeaderMap,
    Field {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    FieldMap,
    Part {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
    PartMap {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
    Body {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
}

impl ParamAnnotation {
    pub fn label(&self) -> &'static str {
        match self {
            ParamAnnotation::Path { .. } => "@Path",
            ParamAnnotation::Url => "@Url",
            ParamAnnotation::Query { .. } => "@Query",
            ParamAnnotation::QueryMap => "@QueryMap",
            ParamAnnotation::Header { .. } => "@Header",
            ParamAnnotation::HeaderMap => "@HeaderMap",
            ParamAnnotation::Field { .. } => "@Field",
            ParamAnnotation::FieldMap => "@FieldMap",
            ParamAnnotation::Part { .. } => "@Part",
            ParamAnnotation::PartMap { .. } => "@PartMap",
            ParamAnnotation::Body { .. } => "@Body",
        }
    }
}
