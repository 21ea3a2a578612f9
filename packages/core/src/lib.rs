//! Service IR and semantic validation for declarative HTTP clients.
//!
//! A host front end describes an annotated service interface as a
//! [`ServiceDecl`]. This crate checks it against every structural and
//! cross-referential rule and lowers it to a [`ServiceDescription`], the
//! immutable IR that `restwire-runtime` executes.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`decl`] | Raw declarations, the validator's input |
//! | [`typing`] | [`TypeRef`] and the built-in type families |
//! | [`ir`] | The Service IR: [`Function`], [`Url`], [`Header`], [`Content`], [`ReturnShape`] |
//! | [`validation`] | Exhaustive checking via [`validate_service`] / [`analyze_service`] |
//! | [`url_template`] | Template classification, placeholders, traversal detection |
//! | [`http_syntax`] | Header-name, header-value and token grammar |
//! | [`render`] | Human-readable text rendering of the IR and diagnostics |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use restwire::{validate_service, ServiceDecl};
//!
//! let decl: ServiceDecl = serde_json::from_str(include_str!("users.json"))?;
//! match validate_service(&decl) {
//!     Ok(service) => println!("{}", restwire::render::render_service(&service)),
//!     Err(diagnostics) => eprint!("{}", restwire::render::render_diagnostics(&diagnostics)),
//! }
//! ```

pub mod decl;
pub mod http_syntax;
pub mod ir;
pub mod render;
pub mod typing;
pub mod url_template;
pub mod validation;

pub use decl::{
    DeclKind, FunctionAnnotation, FunctionDecl, ParamAnnotation, ParameterDecl, PropertyDecl,
    ServiceDecl, SourceLocation,
};
pub use ir::{
    BodyBinding, Content, FieldBinding, Function, Header, HttpMethod, MapType, Parameter,
    PartBinding, PathBinding, QueryBinding, ReturnShape, ServiceDescription, Url, UrlKind,
    ValueBinding, ValueMode,
};
pub use typing::TypeRef;
pub use validation::{analyze_service, validate_service, Analysis, Diagnostic, ValidationError};
