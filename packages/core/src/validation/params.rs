//! Parameter roles: one closed variant per role annotation, each validated
//! against the parameter's type and lowered to its IR binding.

use crate::decl::{ParamAnnotation, ParameterDecl};
use crate::http_syntax;
use crate::ir::{BodyBinding, Header, MapType, PartBinding, ValueBinding, ValueMode};
use crate::typing::{Builtin, TypeRef};

use super::types::{Position, TypeChecker};
use super::{Diagnostics, ValidationError};

pub(crate) const DEFAULT_BODY_TYPE: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain";

/// A parameter lowered to the binding its role annotation asks for.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Binding {
    /// `placeholder` is the template name the parameter binds.
    Path { placeholder: String },
    Url,
    Query(ValueBinding),
    Header(Header),
    Field(ValueBinding),
    Part(PartBinding),
    Body(BodyBinding),
}

impl Binding {
    pub fn label(&self) -> &'static str {
        match self {
            Binding::Path { .. } => "@Path",
            Binding::Url => "@Url",
            Binding::Query(b) if is_map(b.mode) => "@QueryMap",
            Binding::Query(_) => "@Query",
            Binding::Header(Header::Map { .. }) => "@HeaderMap",
            Binding::Header(_) => "@Header",
            Binding::Field(b) if is_map(b.mode) => "@FieldMap",
            Binding::Field(_) => "@Field",
            Binding::Part(p) if is_map(p.mode) => "@PartMap",
            Binding::Part(_) => "@Part",
            Binding::Body(_) => "@Body",
        }
    }
}

fn is_map(mode: ValueMode) -> bool {
    matches!(mode, ValueMode::Map(_))
}

/// Resolve the single role of `param` and lower it.
///
/// Returns `None` if the parameter has no usable role; every problem found
/// along the way has been reported.
pub(crate) fn bind(
    param: &ParameterDecl,
    types: &TypeChecker<'_>,
    diags: &mut Diagnostics,
) -> Option<Binding> {
    let loc = &param.location;
    let annotation = match param.annotations.as_slice() {
        [] => {
            diags.report(loc, ValidationError::MissingParameterRole(param.name.clone()));
            return None;
        }
        [one] => one,
        many => {
            let roles: Vec<&str> = many.iter().map(ParamAnnotation::label).collect();
            diags.report(
                loc,
                ValidationError::MultipleParameterRoles {
                    name: param.name.clone(),
                    roles: roles.join(", "),
                },
            );
            return None;
        }
    };

    let mark = diags.mark();
    let ty = &param.ty;
    let binding = match annotation {
        ParamAnnotation::Path { name } => {
            let placeholder = binding_name(annotation, name.as_deref(), param, diags);
            if ty.nullable {
                diags.report(loc, ValidationError::PathParameterNullable(param.name.clone()));
            }
            if ty.is_iterable() || ty.map_shape().is_some() || ty.is_byte_stream() {
                diags.report(
                    loc,
                    ValidationError::PathParameterNotScalar {
                        name: param.name.clone(),
                        found: ty.to_string(),
                    },
                );
            }
            types.check(ty, Position::Argument, diags);
            Binding::Path { placeholder }
        }

        ParamAnnotation::Url => {
            if !ty.is_string() || ty.nullable {
                diags.report(
                    loc,
                    ValidationError::UrlParameterType {
                        name: param.name.clone(),
                        found: ty.to_string(),
                    },
                );
            }
            Binding::Url
        }

        ParamAnnotation::Query { name } => {
            let name = binding_name(annotation, name.as_deref(), param, diags);
            types.check(ty, Position::Argument, diags);
            Binding::Query(ValueBinding {
                name: Some(name),
                parameter: param.name.clone(),
                mode: list_or_single(ty),
            })
        }

        ParamAnnotation::QueryMap => {
            let map_type = map_type(annotation, param, diags);
            types.check(ty, Position::Argument, diags);
            Binding::Query(ValueBinding {
                name: None,
                parameter: param.name.clone(),
                mode: ValueMode::Map(map_type.unwrap_or(MapType::Map)),
            })
        }

        ParamAnnotation::Header { name } => {
            check_header_name(name, loc, diags);
            types.check(ty, Position::Argument, diags);
            Binding::Header(Header::Single {
                name: name.clone(),
                parameter: param.name.clone(),
                iterable: ty.is_iterable(),
            })
        }

        ParamAnnotation::HeaderMap => {
            let map_type = map_type(annotation, param, diags);
            types.check(ty, Position::Argument, diags);
            Binding::Header(Header::Map {
                parameter: param.name.clone(),
                map_type: map_type.unwrap_or(MapType::Map),
            })
        }

        ParamAnnotation::Field { name } => {
            let name = binding_name(annotation, name.as_deref(), param, diags);
            types.check(ty, Position::Field, diags);
            Binding::Field(ValueBinding {
                name: Some(name),
                parameter: param.name.clone(),
                mode: list_or_single(ty),
            })
        }

        ParamAnnotation::FieldMap => {
            let map_type = map_type(annotation, param, diags);
            types.check(ty, Position::Field, diags);
            Binding::Field(ValueBinding {
                name: None,
                parameter: param.name.clone(),
                mode: ValueMode::Map(map_type.unwrap_or(MapType::Map)),
            })
        }

        ParamAnnotation::Part { name, content_type } => {
            let name = binding_name(annotation, name.as_deref(), param, diags);
            types.check(ty, Position::Part, diags);
            let element = ty.element().unwrap_or(ty);
            Binding::Part(PartBinding {
                name: Some(name),
                parameter: param.name.clone(),
                content_type: content_type_or_default(content_type.as_deref(), element, loc, diags),
                mode: list_or_single(ty),
                raw: ty.is_byte_stream(),
            })
        }

        ParamAnnotation::PartMap { content_type } => {
            let shape = map_type(annotation, param, diags);
            types.check(ty, Position::Part, diags);
            let value = ty
                .map_shape()
                .and_then(|s| s.value)
                .cloned()
                .unwrap_or_else(|| TypeRef::named("String"));
            Binding::Part(PartBinding {
                name: None,
                parameter: param.name.clone(),
                content_type: content_type_or_default(content_type.as_deref(), &value, loc, diags),
                mode: ValueMode::Map(shape.unwrap_or(MapType::Map)),
                raw: false,
            })
        }

        ParamAnnotation::Body { content_type } => {
            types.check(ty, Position::Body, diags);
            let content_type = content_type.as_deref().unwrap_or(DEFAULT_BODY_TYPE);
            check_content_type(content_type, loc, diags);
            Binding::Body(BodyBinding {
                parameter: param.name.clone(),
                content_type: content_type.to_string(),
                raw: ty.is_byte_stream(),
                nullable: ty.nullable,
            })
        }
    };

    (!diags.since(mark)).then_some(binding)
}

fn list_or_single(ty: &TypeRef) -> ValueMode {
    if ty.is_iterable() {
        ValueMode::Iterable
    } else {
        ValueMode::Single
    }
}

/// The explicit name, or the parameter's own name when omitted.
fn binding_name(
    annotation: &ParamAnnotation,
    explicit: Option<&str>,
    param: &ParameterDecl,
    diags: &mut Diagnostics,
) -> String {
    match explicit {
        Some("") => {
            diags.report(
                &param.location,
                ValidationError::EmptyBindingName {
                    annotation: annotation.label(),
                    parameter: param.name.clone(),
                },
            );
            String::new()
        }
        Some(name) => name.to_string(),
        None => param.name.clone(),
    }
}

fn map_type(
    annotation: &ParamAnnotation,
    param: &ParameterDecl,
    diags: &mut Diagnostics,
) -> Option<MapType> {
    let loc = &param.location;
    let Some(shape) = param.ty.map_shape() else {
        diags.report(
            loc,
            ValidationError::UnsupportedMapType {
                annotation: annotation.label(),
                parameter: param.name.clone(),
                found: param.ty.to_string(),
            },
        );
        return None;
    };
    if let Some(key) = shape.key {
        if !key.is_string() {
            diags.report(
                loc,
                ValidationError::MapKeyNotString {
                    annotation: annotation.label(),
                    parameter: param.name.clone(),
                    found: key.to_string(),
                },
            );
        } else if key.nullable {
            diags.report(
                loc,
                ValidationError::MapKeyNullable {
                    annotation: annotation.label(),
                    parameter: param.name.clone(),
                },
            );
        }
    }
    Some(shape.map_type)
}

pub(crate) fn check_header_name(
    name: &str,
    loc: &crate::decl::SourceLocation,
    diags: &mut Diagnostics,
) {
    if let Err(reason) = http_syntax::check_header_name(name) {
        diags.report(
            loc,
            ValidationError::InvalidHeaderName {
                name: name.to_string(),
                reason,
            },
        );
    } else if http_syntax::is_content_header(name) {
        diags.report(loc, ValidationError::ContentHeaderForbidden(name.to_string()));
    }
}

fn check_content_type(
    content_type: &str,
    loc: &crate::decl::SourceLocation,
    diags: &mut Diagnostics,
) {
    if let Err(reason) = http_syntax::check_media_type(content_type) {
        diags.report(
            loc,
            ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                reason,
            },
        );
    }
}

/// Parts default to octet-stream for raw bytes, text for scalars and JSON
/// for everything else.
fn content_type_or_default(
    explicit: Option<&str>,
    value: &TypeRef,
    loc: &crate::decl::SourceLocation,
    diags: &mut Diagnostics,
) -> String {
    match explicit {
        Some(ct) => {
            check_content_type(ct, loc, diags);
            ct.to_string()
        }
        None if value.is_byte_stream() => OCTET_STREAM.to_string(),
        None if value.builtin() == Some(Builtin::Scalar) => TEXT_PLAIN.to_string(),
        None => DEFAULT_BODY_TYPE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::SourceLocation;

    fn param(name: &str, ty: &str, annotations: Vec<ParamAnnotation>) -> ParameterDecl {
        ParameterDecl {
            name: name.into(),
            ty: ty.parse().unwrap(),
            annotations,
            location: SourceLocation::new("api.json", 1, 1),
        }
    }

    fn run(p: &ParameterDecl) -> (Option<Binding>, Vec<ValidationError>) {
        let serializable = vec!["User".to_string()];
        let location = SourceLocation::default();
        let checker = TypeChecker {
            serializable: &serializable,
            location: &location,
        };
        let mut diags = Diagnostics::default();
        let binding = bind(p, &checker, &mut diags);
        (binding, diags.into_vec().into_iter().map(|d| d.error).collect())
    }

    #[test]
    fn missing_and_multiple_roles() {
        let (b, errs) = run(&param("x", "Int", vec![]));
        assert!(b.is_none());
        assert_eq!(errs, [ValidationError::MissingParameterRole("x".into())]);

        let (b, errs) = run(&param(
            "x",
            "Int",
            vec![ParamAnnotation::Query { name: None }, ParamAnnotation::Url],
        ));
        assert!(b.is_none());
        assert_eq!(
            errs,
            [ValidationError::MultipleParameterRoles {
                name: "x".into(),
                roles: "@Query, @Url".into()
            }]
        );
    }

    #[test]
    fn query_defaults_to_parameter_name() {
        let (b, errs) = run(&param(
            "tags",
            "List<String>",
            vec![ParamAnnotation::Query { name: None }],
        ));
        assert!(errs.is_empty());
        assert_eq!(
            b,
            Some(Binding::Query(ValueBinding {
                name: Some("tags".into()),
                parameter: "tags".into(),
                mode: ValueMode::Iterable
            }))
        );
    }

    #[test]
    fn map_parameters_need_string_keys() {
        let (_, errs) = run(&param("m", "Map<Int, String>", vec![ParamAnnotation::QueryMap]));
        assert!(matches!(errs[0], ValidationError::MapKeyNotString { .. }));

        let (_, errs) = run(&param("m", "Map<String?, String>", vec![ParamAnnotation::FieldMap]));
        assert!(matches!(errs[0], ValidationError::MapKeyNullable { .. }));

        let (_, errs) = run(&param("m", "List<String>", vec![ParamAnnotation::HeaderMap]));
        assert!(matches!(errs[0], ValidationError::UnsupportedMapType { .. }));

        let (b, errs) = run(&param("m", "MultiValueMap", vec![ParamAnnotation::HeaderMap]));
        assert!(errs.is_empty());
        assert_eq!(b.unwrap().label(), "@HeaderMap");
    }

    #[test]
    fn content_headers_cannot_be_parameters() {
        let (_, errs) = run(&param(
            "ct",
            "String",
            vec![ParamAnnotation::Header {
                name: "Content-Type".into(),
            }],
        ));
        assert_eq!(
            errs,
            [ValidationError::ContentHeaderForbidden("Content-Type".into())]
        );
    }

    #[test]
    fn path_must_be_non_null_scalar() {
        let (_, errs) = run(&param("id", "List<Int>?", vec![ParamAnnotation::Path { name: None }]));
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn part_content_type_defaults() {
        let (b, _) = run(&param("file", "ByteStream", vec![ParamAnnotation::Part { name: None, content_type: None }]));
        let Some(Binding::Part(p)) = b else { panic!("expected part") };
        assert_eq!(p.content_type, "application/octet-stream");
        assert!(p.raw);

        let (b, _) = run(&param("who", "User", vec![ParamAnnotation::Part { name: Some("user".into()), content_type: None }]));
        let Some(Binding::Part(p)) = b else { panic!("expected part") };
        assert_eq!(p.content_type, "application/json");
        assert_eq!(p.name.as_deref(), Some("user"));
    }

    #[test]
    fn body_with_bad_content_type() {
        let (b, errs) = run(&param(
            "u",
            "User",
            vec![ParamAnnotation::Body {
                content_type: Some("application json".into()),
            }],
        ));
        assert!(b.is_none());
        assert!(matches!(errs[0], ValidationError::InvalidContentType { .. }));
    }
}
