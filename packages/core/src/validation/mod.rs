//! Semantic validation of raw service declarations.
//!
//! Validation is exhaustive: every rule is checked and every violation is
//! reported as its own [`Diagnostic`], so one pass surfaces every problem.
//! A function with any diagnostic never produces IR.
//!
//! | Entry point | Result |
//! |-------------|--------|
//! | [`validate_service`] | the full IR, or every diagnostic |
//! | [`analyze_service`] | the IR of every valid function, plus all diagnostics |

mod error;
mod function;
mod params;
mod service;
mod types;

pub use error::{Diagnostic, TypeContext, ValidationError};

use crate::decl::{ServiceDecl, SourceLocation};
use crate::ir::ServiceDescription;

/// Ordered collector of diagnostics for one service.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn report(&mut self, location: &SourceLocation, error: ValidationError) {
        self.items.push(Diagnostic::new(location.clone(), error));
    }

    pub fn mark(&self) -> usize {
        self.items.len()
    }

    /// `true` if anything was reported after `mark`.
    pub fn since(&self, mark: usize) -> bool {
        self.items.len() > mark
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

/// Lenient validation result.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// `None` only when a service-level rule failed. Otherwise holds every
    /// function that validated cleanly, possibly none.
    pub service: Option<ServiceDescription>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Validate `decl`, keeping whatever is valid.
pub fn analyze_service(decl: &ServiceDecl) -> Analysis {
    let mut diags = Diagnostics::default();
    let service_ok = service::check_service(decl, &mut diags);

    let functions: Vec<_> = decl
        .functions
        .iter()
        .filter_map(|f| function::check_function(decl, f, &mut diags))
        .collect();

    let service = service_ok.then(|| ServiceDescription {
        name: format!("{}Client", decl.name),
        implements: decl.name.clone(),
        functions,
    });

    Analysis {
        service,
        diagnostics: diags.into_vec(),
    }
}

/// Validate `decl` strictly.
///
/// Returns the IR only if there are no diagnostics at all; otherwise the
/// full, ordered list of every violation found.
pub fn validate_service(decl: &ServiceDecl) -> Result<ServiceDescription, Vec<Diagnostic>> {
    let analysis = analyze_service(decl);
    match analysis.service {
        Some(service) if analysis.diagnostics.is_empty() => Ok(service),
        _ => Err(analysis.diagnostics),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ir::{Content, Header, HttpMethod, MapType, ReturnShape, Url, UrlKind, ValueMode};

    fn service(functions: serde_json::Value) -> ServiceDecl {
        serde_json::from_value(json!({
            "name": "Api",
            "functions": functions,
            "serializable_types": ["User"],
            "location": { "file": "api.json", "line": 1, "column": 1 }
        }))
        .unwrap()
    }

    fn errors(decl: &ServiceDecl) -> Vec<ValidationError> {
        match validate_service(decl) {
            Ok(_) => vec![],
            Err(diags) => diags.into_iter().map(|d| d.error).collect(),
        }
    }

    fn http(method: &str, path: &str) -> serde_json::Value {
        json!({ "kind": "http", "method": method, "path": path })
    }

    #[test]
    fn valid_service_produces_ir() {
        let decl = service(json!([{
            "name": "getUser",
            "annotations": [http("GET", "users/{id}?verbose"), { "kind": "headers", "values": ["Accept: application/json"] }],
            "parameters": [
                { "name": "id", "type": "Long", "annotations": [{ "kind": "path" }] },
                { "name": "fields", "type": "List<String>", "annotations": [{ "kind": "query" }] },
                { "name": "token", "type": "String?", "annotations": [{ "kind": "header", "name": "Authorization" }] }
            ],
            "return_type": "Result<User>"
        }]));
        let ir = validate_service(&decl).unwrap();
        assert_eq!(ir.name, "ApiClient");
        assert_eq!(ir.implements, "Api");
        let f = ir.function("getUser").unwrap();
        assert_eq!(f.method, HttpMethod::Get);
        let Url::Template { kind, path_params, queries, .. } = &f.url else {
            panic!("expected template");
        };
        assert_eq!(*kind, UrlKind::Relative);
        assert_eq!(path_params[0].placeholder, "id");
        assert_eq!(queries[0].mode, ValueMode::Iterable);
        assert_eq!(f.headers.len(), 2);
        assert!(matches!(&f.headers[0], Header::Static { name, value } if name == "Accept" && value == "application/json"));
        assert_eq!(f.returns, ReturnShape::Wrapped("User".parse().unwrap()));
    }

    #[test]
    fn bijection_reports_every_missing_and_extra_name() {
        let decl = service(json!([{
            "name": "f",
            "annotations": [http("GET", "a/{x}/{y}/{x}")],
            "parameters": [
                { "name": "z", "type": "Int", "annotations": [{ "kind": "path" }] },
                { "name": "w", "type": "Int", "annotations": [{ "kind": "path" }] }
            ]
        }]));
        let errs = errors(&decl);
        assert!(errs.contains(&ValidationError::DuplicatePlaceholder("x".into())));
        assert!(errs.contains(&ValidationError::PlaceholderWithoutParameter("x".into())));
        assert!(errs.contains(&ValidationError::PlaceholderWithoutParameter("y".into())));
        assert!(errs.contains(&ValidationError::ParameterWithoutPlaceholder("z".into())));
        assert!(errs.contains(&ValidationError::ParameterWithoutPlaceholder("w".into())));
        assert_eq!(errs.len(), 5);
    }

    #[test]
    fn url_source_must_be_unique() {
        let decl = service(json!([
            { "name": "none", "annotations": [{ "kind": "http", "method": "GET" }] },
            {
                "name": "both",
                "annotations": [http("GET", "a")],
                "parameters": [{ "name": "u", "type": "String", "annotations": [{ "kind": "url" }] }]
            },
            {
                "name": "dyn",
                "annotations": [{ "kind": "http", "method": "GET" }],
                "parameters": [
                    { "name": "u", "type": "String", "annotations": [{ "kind": "url" }] },
                    { "name": "id", "type": "Int", "annotations": [{ "kind": "path" }] }
                ]
            }
        ]));
        let errs = errors(&decl);
        assert_eq!(
            errs,
            [
                ValidationError::MissingUrl("none".into()),
                ValidationError::ConflictingUrl("both".into()),
                ValidationError::PathWithDynamicUrl("id".into()),
            ]
        );
    }

    #[test]
    fn exhaustive_not_fail_fast() {
        let decl = service(json!([{
            "name": "f",
            "is_suspend": false,
            "has_default_body": true,
            "type_parameters": ["T"],
            "annotations": [http("GET", "ftp://host/../x")],
            "parameters": [
                { "name": "b", "type": "User", "annotations": [{ "kind": "body" }] }
            ],
            "return_type": "Result<*>"
        }]));
        let errs = errors(&decl);
        assert_eq!(
            errs,
            [
                ValidationError::NotSuspending("f".into()),
                ValidationError::DefaultBody("f".into()),
                ValidationError::FunctionTypeParameters("f".into()),
                ValidationError::UnsupportedScheme("ftp".into()),
                ValidationError::TraversalInTemplate("..".into()),
                ValidationError::BodyNotAllowed {
                    annotation: "@Body",
                    method: "GET".into()
                },
            ]
        );
    }

    #[test]
    fn form_and_multipart_rules() {
        let decl = service(json!([
            {
                "name": "both",
                "annotations": [http("POST", "a"), { "kind": "form_url_encoded" }, { "kind": "multipart" }],
                "parameters": [{ "name": "f", "type": "String", "annotations": [{ "kind": "field" }] }]
            },
            {
                "name": "stray",
                "annotations": [http("POST", "a")],
                "parameters": [{ "name": "p", "type": "String", "annotations": [{ "kind": "part" }] }]
            },
            {
                "name": "empty",
                "annotations": [http("POST", "a"), { "kind": "form_url_encoded" }]
            }
        ]));
        let errs = errors(&decl);
        assert_eq!(
            errs,
            [
                ValidationError::FormAndMultipart,
                ValidationError::EmptyMultipart,
                ValidationError::PartWithoutMultipart {
                    annotation: "@Part",
                    parameter: "p".into()
                },
                ValidationError::EmptyForm,
            ]
        );
    }

    #[test]
    fn custom_methods() {
        let decl = service(json!([
            {
                "name": "search",
                "annotations": [{ "kind": "http", "method": "QUERY", "path": "s", "has_body": true }],
                "parameters": [{ "name": "q", "type": "User", "annotations": [{ "kind": "body" }] }]
            },
            { "name": "bad", "annotations": [{ "kind": "http", "method": "BAD METHOD", "path": "s" }] }
        ]));
        let analysis = analyze_service(&decl);
        let ir = analysis.service.unwrap();
        assert_eq!(ir.functions.len(), 1);
        assert!(matches!(ir.functions[0].content, Some(Content::Body(_))));
        assert!(matches!(
            analysis.diagnostics[0].error,
            ValidationError::InvalidMethodToken { .. }
        ));
    }

    #[test]
    fn static_header_problems_report_position() {
        let decl = service(json!([{
            "name": "f",
            "annotations": [
                http("GET", "a"),
                { "kind": "headers", "values": ["NoColon", "Content-Length: 3", "X-Ok: a\u{7}b"] }
            ]
        }]));
        let errs = errors(&decl);
        assert_eq!(errs[0], ValidationError::MalformedStaticHeader("NoColon".into()));
        assert_eq!(errs[1], ValidationError::ContentHeaderForbidden("Content-Length".into()));
        assert_eq!(
            errs[2].to_string(),
            "value of header X-Ok is invalid: illegal character '\\u{7}' at position 1"
        );
    }

    #[test]
    fn lenient_analysis_keeps_valid_functions() {
        let decl = service(json!([
            { "name": "ok", "annotations": [http("HEAD", "ping")] },
            { "name": "broken", "annotations": [] }
        ]));
        let analysis = analyze_service(&decl);
        let ir = analysis.service.unwrap();
        assert_eq!(ir.functions.len(), 1);
        assert_eq!(ir.functions[0].name, "ok");
        assert_eq!(analysis.diagnostics.len(), 1);
        assert_eq!(
            analysis.diagnostics[0].to_string(),
            "<unknown>:0:0: function broken has no HTTP method annotation"
        );
    }

    #[test]
    fn zero_functions_still_compile() {
        let decl = service(json!([]));
        assert!(validate_service(&decl).unwrap().functions.is_empty());
    }

    #[test]
    fn service_level_failures_produce_no_ir() {
        let mut decl = service(json!([{ "name": "ok", "annotations": [http("GET", "a")] }]));
        decl.kind = crate::decl::DeclKind::Class;
        decl.supertypes = vec!["Base".into()];
        let analysis = analyze_service(&decl);
        assert!(analysis.service.is_none());
        assert_eq!(analysis.diagnostics.len(), 2);
        assert_eq!(analysis.diagnostics[0].location.file, "api.json");
    }

    #[test]
    fn multipart_parts_are_lowered() {
        let decl = service(json!([{
            "name": "upload",
            "annotations": [http("POST", "files"), { "kind": "multipart", "subtype": "mixed" }],
            "parameters": [
                { "name": "meta", "type": "User", "annotations": [{ "kind": "part" }] },
                { "name": "extra", "type": "List<Pair<String, String>>", "annotations": [{ "kind": "part_map" }] }
            ]
        }]));
        let ir = validate_service(&decl).unwrap();
        let Some(Content::Multipart { subtype, parts }) = &ir.functions[0].content else {
            panic!("expected multipart");
        };
        assert_eq!(subtype, "mixed");
        assert_eq!(parts[1].mode, ValueMode::Map(MapType::PairList));
        assert_eq!(parts[1].content_type, "text/plain");
    }
}
