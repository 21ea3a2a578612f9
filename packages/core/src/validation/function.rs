//! Function-level rules: method, URL source, headers and content, plus the
//! lowering of a valid declaration into an [`ir::Function`](crate::ir::Function).

use std::collections::HashSet;

use crate::decl::{FunctionAnnotation, FunctionDecl, ServiceDecl, SourceLocation};
use crate::http_syntax;
use crate::ir::{
    Content, FieldBinding, Function, Header, HttpMethod, Parameter, PartBinding, PathBinding,
    QueryBinding, Url, UrlKind,
};
use crate::url_template;

use super::params::{self, Binding};
use super::types::TypeChecker;
use super::{Diagnostics, ValidationError};

const DEFAULT_MULTIPART_SUBTYPE: &str = "form-data";

/// Validate one function. Returns its IR only if no diagnostic was reported
/// for it.
pub(crate) fn check_function(
    service: &ServiceDecl,
    decl: &FunctionDecl,
    diags: &mut Diagnostics,
) -> Option<Function> {
    let mark = diags.mark();
    let loc = &decl.location;

    // -- shape ---------------------------------------------------------------
    if !decl.is_suspend {
        diags.report(loc, ValidationError::NotSuspending(decl.name.clone()));
    }
    if decl.has_default_body {
        diags.report(loc, ValidationError::DefaultBody(decl.name.clone()));
    }
    if !decl.type_parameters.is_empty() {
        diags.report(loc, ValidationError::FunctionTypeParameters(decl.name.clone()));
    }

    // -- annotations ---------------------------------------------------------
    let markers = Markers::collect(decl, diags);
    let method = markers.method.clone().unwrap_or(HttpMethod::Get);
    let static_headers = static_headers(&markers.headers, loc, diags);

    // -- parameters ----------------------------------------------------------
    let mut bound: Vec<(usize, Binding)> = Vec::new();
    for (index, param) in decl.parameters.iter().enumerate() {
        let checker = TypeChecker {
            serializable: &service.serializable_types,
            location: &param.location,
        };
        if let Some(binding) = params::bind(param, &checker, diags) {
            bound.push((index, binding));
        }
    }

    // Without an HTTP annotation there is no path to check against.
    let url = if markers.has_http {
        check_url(decl, markers.path.as_deref(), &bound, diags)
    } else {
        None
    };
    let content = check_content(decl, &markers, &bound, diags);

    let returns = TypeChecker {
        serializable: &service.serializable_types,
        location: loc,
    }
    .check_return(&decl.return_type, &method, diags);

    if diags.since(mark) || markers.method.is_none() {
        return None;
    }

    let mut headers = static_headers;
    headers.extend(bound.iter().filter_map(|(_, b)| match b {
        Binding::Header(h) => Some(h.clone()),
        _ => None,
    }));

    Some(Function {
        name: decl.name.clone(),
        parameters: decl
            .parameters
            .iter()
            .map(|p| Parameter {
                name: p.name.clone(),
                ty: p.ty.clone(),
            })
            .collect(),
        method,
        url: url?,
        headers,
        content,
        returns,
    })
}

// ---------------------------------------------------------------------------
// Function annotations
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Markers {
    has_http: bool,
    method: Option<HttpMethod>,
    path: Option<String>,
    headers: Vec<String>,
    form: bool,
    multipart: Option<String>,
}

impl Markers {
    fn collect(decl: &FunctionDecl, diags: &mut Diagnostics) -> Self {
        let loc = &decl.location;
        let mut out = Markers::default();
        let mut http_count = 0;
        let mut seen_headers = false;

        for annotation in &decl.annotations {
            match annotation {
                FunctionAnnotation::Http {
                    method,
                    path,
                    has_body,
                } => {
                    http_count += 1;
                    if http_count > 1 {
                        continue;
                    }
                    out.method = parse_method(method, *has_body, loc, diags);
                    out.path = path.clone();
                }
                FunctionAnnotation::Headers { values } => {
                    if seen_headers {
                        diags.report(
                            loc,
                            ValidationError::DuplicateAnnotation {
                                annotation: annotation.label(),
                            },
                        );
                    }
                    seen_headers = true;
                    out.headers.extend(values.iter().cloned());
                }
                FunctionAnnotation::FormUrlEncoded => {
                    if out.form {
                        diags.report(
                            loc,
                            ValidationError::DuplicateAnnotation {
                                annotation: annotation.label(),
                            },
                        );
                    }
                    out.form = true;
                }
                FunctionAnnotation::Multipart { subtype } => {
                    if out.multipart.is_some() {
                        diags.report(
                            loc,
                            ValidationError::DuplicateAnnotation {
                                annotation: annotation.label(),
                            },
                        );
                        continue;
                    }
                    let subtype = subtype.as_deref().unwrap_or(DEFAULT_MULTIPART_SUBTYPE);
                    if let Err(reason) = http_syntax::check_token(subtype) {
                        diags.report(
                            loc,
                            ValidationError::InvalidMultipartSubtype {
                                subtype: subtype.to_string(),
                                reason,
                            },
                        );
                    }
                    out.multipart = Some(subtype.to_string());
                }
            }
        }

        out.has_http = http_count > 0;
        match http_count {
            0 => diags.report(loc, ValidationError::MissingHttpMethod(decl.name.clone())),
            1 => {}
            _ => diags.report(loc, ValidationError::MultipleHttpMethods(decl.name.clone())),
        }
        out
    }
}

fn parse_method(
    method: &str,
    has_body: Option<bool>,
    loc: &SourceLocation,
    diags: &mut Diagnostics,
) -> Option<HttpMethod> {
    if let Some(standard) = HttpMethod::standard(method) {
        return Some(standard);
    }
    match http_syntax::check_token(method) {
        Ok(()) => Some(HttpMethod::Custom {
            token: method.to_string(),
            has_body: has_body.unwrap_or(false),
        }),
        Err(reason) => {
            diags.report(
                loc,
                ValidationError::InvalidMethodToken {
                    method: method.to_string(),
                    reason,
                },
            );
            None
        }
    }
}

/// Split each `Name: value` entry and check both halves.
fn static_headers(values: &[String], loc: &SourceLocation, diags: &mut Diagnostics) -> Vec<Header> {
    let mut out = Vec::new();
    for entry in values {
        let Some((name, value)) = entry.split_once(':') else {
            diags.report(loc, ValidationError::MalformedStaticHeader(entry.clone()));
            continue;
        };
        let value = value.trim_matches(|c| c == ' ' || c == '\t');
        params::check_header_name(name, loc, diags);
        if let Err(reason) = http_syntax::check_header_value(value) {
            diags.report(
                loc,
                ValidationError::InvalidHeaderValue {
                    name: name.to_string(),
                    reason,
                },
            );
        }
        out.push(Header::Static {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    out
}

// ---------------------------------------------------------------------------
// URL source
// ---------------------------------------------------------------------------

fn check_url(
    decl: &FunctionDecl,
    path: Option<&str>,
    bound: &[(usize, Binding)],
    diags: &mut Diagnostics,
) -> Option<Url> {
    let loc = &decl.location;
    let param_loc = |index: usize| &decl.parameters[index].location;

    let url_params: Vec<usize> = bound
        .iter()
        .filter(|(_, b)| matches!(b, Binding::Url))
        .map(|(i, _)| *i)
        .collect();
    let path_params: Vec<(usize, &str)> = bound
        .iter()
        .filter_map(|(i, b)| match b {
            Binding::Path { placeholder } => Some((*i, placeholder.as_str())),
            _ => None,
        })
        .collect();
    let queries: Vec<QueryBinding> = bound
        .iter()
        .filter_map(|(_, b)| match b {
            Binding::Query(q) => Some(q.clone()),
            _ => None,
        })
        .collect();

    if url_params.len() > 1 {
        diags.report(loc, ValidationError::MultipleUrlParameters(decl.name.clone()));
    }

    match (path, url_params.first()) {
        (None, None) => {
            diags.report(loc, ValidationError::MissingUrl(decl.name.clone()));
            None
        }
        (Some(_), Some(_)) => {
            diags.report(loc, ValidationError::ConflictingUrl(decl.name.clone()));
            None
        }
        (None, Some(&index)) => {
            for (i, _) in &path_params {
                diags.report(
                    param_loc(*i),
                    ValidationError::PathWithDynamicUrl(decl.parameters[*i].name.clone()),
                );
            }
            Some(Url::Dynamic {
                parameter: decl.parameters[index].name.clone(),
                queries,
            })
        }
        (Some(template), None) => {
            let kind = url_template::classify(template);
            if kind == UrlKind::Full {
                let scheme = url_template::scheme(template).unwrap_or_default();
                if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
                    diags.report(loc, ValidationError::UnsupportedScheme(scheme.to_string()));
                }
            }

            let split = url_template::split(template);
            if let Some(segment) = url_template::traversal_segment(split.path) {
                diags.report(loc, ValidationError::TraversalInTemplate(segment.to_string()));
            }

            let scan = url_template::scan(split.path);
            for bad in &scan.malformed {
                diags.report(loc, ValidationError::MalformedPlaceholder(bad.clone()));
            }
            for tail in [split.query, split.fragment].into_iter().flatten() {
                for p in url_template::scan(tail).placeholders {
                    diags.report(loc, ValidationError::PlaceholderOutsidePath(p.name));
                }
            }

            let mut names: Vec<&str> = Vec::new();
            let mut repeated: Vec<&str> = Vec::new();
            for p in &scan.placeholders {
                if !names.contains(&p.name.as_str()) {
                    names.push(&p.name);
                } else if !repeated.contains(&p.name.as_str()) {
                    repeated.push(&p.name);
                    diags.report(loc, ValidationError::DuplicatePlaceholder(p.name.clone()));
                }
            }

            let bound_names: HashSet<&str> = path_params.iter().map(|(_, n)| *n).collect();
            for name in &names {
                if !bound_names.contains(name) {
                    diags.report(loc, ValidationError::PlaceholderWithoutParameter(name.to_string()));
                }
            }

            let mut seen = HashSet::new();
            let mut bindings = Vec::new();
            for (i, placeholder) in &path_params {
                if !names.contains(placeholder) {
                    diags.report(
                        param_loc(*i),
                        ValidationError::ParameterWithoutPlaceholder(
                            decl.parameters[*i].name.clone(),
                        ),
                    );
                } else if !seen.insert(*placeholder) {
                    diags.report(
                        param_loc(*i),
                        ValidationError::DuplicatePathBinding(placeholder.to_string()),
                    );
                }
                bindings.push(PathBinding {
                    placeholder: placeholder.to_string(),
                    parameter: decl.parameters[*i].name.clone(),
                });
            }

            Some(Url::Template {
                template: template.to_string(),
                kind,
                path_params: bindings,
                queries,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

fn check_content(
    decl: &FunctionDecl,
    markers: &Markers,
    bound: &[(usize, Binding)],
    diags: &mut Diagnostics,
) -> Option<Content> {
    let loc = &decl.location;
    let mut bodies = Vec::new();
    let mut fields: Vec<FieldBinding> = Vec::new();
    let mut parts: Vec<PartBinding> = Vec::new();

    for (index, binding) in bound {
        let param = &decl.parameters[*index];
        match binding {
            Binding::Body(body) => bodies.push(body.clone()),
            Binding::Field(field) => {
                if !markers.form {
                    diags.report(
                        &param.location,
                        ValidationError::FieldWithoutForm {
                            annotation: binding.label(),
                            parameter: param.name.clone(),
                        },
                    );
                }
                fields.push(field.clone());
            }
            Binding::Part(part) => {
                if markers.multipart.is_none() {
                    diags.report(
                        &param.location,
                        ValidationError::PartWithoutMultipart {
                            annotation: binding.label(),
                            parameter: param.name.clone(),
                        },
                    );
                }
                parts.push(part.clone());
            }
            _ => {}
        }
    }

    if bodies.len() > 1 {
        diags.report(loc, ValidationError::MultipleBodies(decl.name.clone()));
    }
    if markers.form && markers.multipart.is_some() {
        diags.report(loc, ValidationError::FormAndMultipart);
    }
    if !bodies.is_empty() {
        if markers.form {
            diags.report(loc, ValidationError::BodyWithForm("@FormUrlEncoded"));
        }
        if markers.multipart.is_some() {
            diags.report(loc, ValidationError::BodyWithForm("@Multipart"));
        }
    }
    if markers.form && fields.is_empty() {
        diags.report(loc, ValidationError::EmptyForm);
    }
    if markers.multipart.is_some() && parts.is_empty() {
        diags.report(loc, ValidationError::EmptyMultipart);
    }

    if let Some(method) = markers.method.as_ref().filter(|m| !m.permits_body()) {
        let mut forbid = |annotation: &'static str| {
            diags.report(
                loc,
                ValidationError::BodyNotAllowed {
                    annotation,
                    method: method.to_string(),
                },
            )
        };
        if !bodies.is_empty() {
            forbid("@Body");
        }
        if markers.form {
            forbid("@FormUrlEncoded");
        }
        if markers.multipart.is_some() {
            forbid("@Multipart");
        }
    }

    if let Some(body) = bodies.into_iter().next() {
        Some(Content::Body(body))
    } else if markers.form {
        Some(Content::FormUrlEncoded { fields })
    } else {
        markers.multipart.as_ref().map(|subtype| Content::Multipart {
            subtype: subtype.clone(),
            parts,
        })
    }
}
