use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::decl::SourceLocation;
use crate::http_syntax::SyntaxError;

/// Where in a declaration a type appears, for serializability messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeContext {
    Body,
    Part,
    Field,
    Return,
}

impl fmt::Display for TypeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeContext::Body => write!(f, "body"),
            TypeContext::Part => write!(f, "part"),
            TypeContext::Field => write!(f, "field"),
            TypeContext::Return => write!(f, "return"),
        }
    }
}

/// A single rule violation in a service declaration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    // -- service ------------------------------------------------------------
    #[error("service {name} must be an interface, found {found}")]
    NotAnInterface { name: String, found: String },

    #[error("service {0} must be a top-level declaration")]
    NotTopLevel(String),

    #[error("service {name} must not extend other types, found {supertypes}")]
    HasSupertypes { name: String, supertypes: String },

    #[error("service {0} must not declare type parameters")]
    ServiceTypeParameters(String),

    #[error("service must not declare properties, found {0}")]
    ServiceProperty(String),

    // -- function shape -----------------------------------------------------
    #[error("function {0} has no HTTP method annotation")]
    MissingHttpMethod(String),

    #[error("function {0} has more than one HTTP method annotation")]
    MultipleHttpMethods(String),

    #[error("function {0} must be a suspending function")]
    NotSuspending(String),

    #[error("function {0} must not have a default implementation")]
    DefaultBody(String),

    #[error("function {0} must not declare type parameters")]
    FunctionTypeParameters(String),

    #[error("HTTP method {method:?} is not a valid token: {reason}")]
    InvalidMethodToken { method: String, reason: SyntaxError },

    #[error("{annotation} may appear at most once per function")]
    DuplicateAnnotation { annotation: &'static str },

    // -- URL source ---------------------------------------------------------
    #[error("function {0} needs either a path on its HTTP annotation or a @Url parameter")]
    MissingUrl(String),

    #[error("function {0} declares both a path and a @Url parameter")]
    ConflictingUrl(String),

    #[error("function {0} declares more than one @Url parameter")]
    MultipleUrlParameters(String),

    #[error("@Url parameter {name} must be of type String, found {found}")]
    UrlParameterType { name: String, found: String },

    #[error("URL scheme {0:?} is not supported; use http or https")]
    UnsupportedScheme(String),

    #[error("URL template must not contain the path segment {0:?}")]
    TraversalInTemplate(String),

    // -- placeholders -------------------------------------------------------
    #[error("placeholder {{{0}}} has no matching @Path parameter")]
    PlaceholderWithoutParameter(String),

    #[error("@Path parameter {0} does not match any placeholder in the URL template")]
    ParameterWithoutPlaceholder(String),

    #[error("placeholder {{{0}}} appears more than once in the URL template")]
    DuplicatePlaceholder(String),

    #[error("placeholder {{{0}}} is bound by more than one @Path parameter")]
    DuplicatePathBinding(String),

    #[error("malformed placeholder {0:?}; names must match [a-zA-Z][a-zA-Z0-9_-]*")]
    MalformedPlaceholder(String),

    #[error("placeholder {{{0}}} may only appear in the path, not the query or fragment")]
    PlaceholderOutsidePath(String),

    #[error("@Path parameter {0} cannot be used with a @Url parameter")]
    PathWithDynamicUrl(String),

    #[error("@Path parameter {0} must not be nullable")]
    PathParameterNullable(String),

    #[error("@Path parameter {name} must be a single value, found {found}")]
    PathParameterNotScalar { name: String, found: String },

    // -- parameters ---------------------------------------------------------
    #[error("parameter {0} has no role annotation")]
    MissingParameterRole(String),

    #[error("parameter {name} has more than one role annotation: {roles}")]
    MultipleParameterRoles { name: String, roles: String },

    #[error("{annotation} name on parameter {parameter} must not be empty")]
    EmptyBindingName {
        annotation: &'static str,
        parameter: String,
    },

    // -- content ------------------------------------------------------------
    #[error("function {0} has more than one @Body parameter")]
    MultipleBodies(String),

    #[error("{annotation} is not allowed on a {method} request")]
    BodyNotAllowed {
        annotation: &'static str,
        method: String,
    },

    #[error("@FormUrlEncoded and @Multipart are mutually exclusive")]
    FormAndMultipart,

    #[error("@Body cannot be combined with {0}")]
    BodyWithForm(&'static str),

    #[error("@FormUrlEncoded requires at least one @Field or @FieldMap parameter")]
    EmptyForm,

    #[error("@Multipart requires at least one @Part or @PartMap parameter")]
    EmptyMultipart,

    #[error("{annotation} parameter {parameter} requires @FormUrlEncoded")]
    FieldWithoutForm {
        annotation: &'static str,
        parameter: String,
    },

    #[error("{annotation} parameter {parameter} requires @Multipart")]
    PartWithoutMultipart {
        annotation: &'static str,
        parameter: String,
    },

    #[error("multipart subtype {subtype:?} is not a valid token: {reason}")]
    InvalidMultipartSubtype { subtype: String, reason: SyntaxError },

    #[error("content type {content_type:?} is invalid: {reason}")]
    InvalidContentType {
        content_type: String,
        reason: SyntaxError,
    },

    // -- maps ---------------------------------------------------------------
    #[error(
        "{annotation} parameter {parameter} must be Map<String, V>, \
         List<Pair<String, V>> or MultiValueMap, found {found}"
    )]
    UnsupportedMapType {
        annotation: &'static str,
        parameter: String,
        found: String,
    },

    #[error("{annotation} parameter {parameter} must have String keys, found {found}")]
    MapKeyNotString {
        annotation: &'static str,
        parameter: String,
        found: String,
    },

    #[error("{annotation} parameter {parameter} must not have nullable keys")]
    MapKeyNullable {
        annotation: &'static str,
        parameter: String,
    },

    // -- headers ------------------------------------------------------------
    #[error("{0} is set by the request content and cannot be declared as a header")]
    ContentHeaderForbidden(String),

    #[error("static header {0:?} must have the form \"Name: value\"")]
    MalformedStaticHeader(String),

    #[error("header name {name:?} is invalid: {reason}")]
    InvalidHeaderName { name: String, reason: SyntaxError },

    #[error("value of header {name} is invalid: {reason}")]
    InvalidHeaderValue { name: String, reason: SyntaxError },

    // -- types --------------------------------------------------------------
    #[error("{context} type {type_name} is not serializable")]
    NotSerializable {
        type_name: String,
        context: TypeContext,
    },

    #[error("ByteStream may only be used directly as a body, part or return type, found in {0}")]
    ByteStreamNotAllowed(String),

    #[error("the wildcard * may only be used as the argument of a Result return type, found in {0}")]
    WildcardNotAllowed(String),

    #[error("Result may only be used as the outermost return type, found in {0}")]
    ResultNotAllowed(String),

    #[error("{type_name} takes {expected} type argument(s), found {found}")]
    TypeArity {
        type_name: String,
        expected: usize,
        found: usize,
    },

    #[error("HEAD functions must return Unit, Result<Unit> or Result<*>, found {0}")]
    HeadReturnType(String),
}

/// A [`ValidationError`] tied to the declaration it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub location: SourceLocation,
    pub error: ValidationError,
}

impl Diagnostic {
    pub fn new(location: SourceLocation, error: ValidationError) -> Self {
        Self { location, error }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.error)
    }
}

impl std::error::Error for Diagnostic {}

/// Serialises as `{ "location": ..., "message": ... }` for tooling.
impl Serialize for Diagnostic {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Diagnostic", 2)?;
        s.serialize_field("location", &self.location)?;
        s.serialize_field("message", &self.error.to_string())?;
        s.end()
    }
}
