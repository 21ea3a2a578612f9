//! Human-readable text rendering of [`ServiceDescription`]s and diagnostics.
//!
//! The output is stable plain text suitable for terminals and logs. It is
//! not a canonical format; only the JSON form of the IR is.

use crate::ir::{Content, Function, Header, ServiceDescription, Url, ValueBinding, ValueMode};
use crate::validation::Diagnostic;

/// Render a single [`Function`] as indented plain text.
///
/// ```text
/// getUser  GET users/{id}  (relative)
///   path     {id} <- id
///   query    fields[] <- fields
///   header   Accept: application/json
///   header   Authorization <- token
///   returns  Result<User>
/// ```
pub fn render_function(function: &Function) -> String {
    let mut out = String::new();

    // header line
    match &function.url {
        Url::Template { template, kind, .. } => out.push_str(&format!(
            "{}  {} {}  ({})\n",
            function.name, function.method, template, kind
        )),
        Url::Dynamic { parameter, .. } => out.push_str(&format!(
            "{}  {} <{}>  (dynamic)\n",
            function.name, function.method, parameter
        )),
    }

    if let Url::Template { path_params, .. } = &function.url {
        for p in path_params {
            out.push_str(&format!("  path     {{{}}} <- {}\n", p.placeholder, p.parameter));
        }
    }
    for q in function.url.queries() {
        out.push_str(&format!("  query    {}\n", render_value(q)));
    }

    for h in &function.headers {
        let line = match h {
            Header::Static { name, value } => format!("{}: {}", name, value),
            Header::Single {
                name,
                parameter,
                iterable,
            } => format!("{}{} <- {}", name, if *iterable { "[]" } else { "" }, parameter),
            Header::Map {
                parameter,
                map_type,
            } => format!("* <- {} ({:?})", parameter, map_type),
        };
        out.push_str(&format!("  header   {}\n", line));
    }

    match &function.content {
        Some(Content::Body(body)) => out.push_str(&format!(
            "  body     {} <- {}{}\n",
            body.content_type,
            body.parameter,
            if body.raw { " (raw)" } else { "" }
        )),
        Some(Content::FormUrlEncoded { fields }) => {
            out.push_str("  form\n");
            for f in fields {
                out.push_str(&format!("    field  {}\n", render_value(f)));
            }
        }
        Some(Content::Multipart { subtype, parts }) => {
            out.push_str(&format!("  multipart/{}\n", subtype));
            for p in parts {
                let name = p.name.as_deref().unwrap_or("*");
                out.push_str(&format!(
                    "    part   {} <- {} [{}]\n",
                    name, p.parameter, p.content_type
                ));
            }
        }
        None => {}
    }

    out.push_str(&format!("  returns  {}\n", function.returns));
    out
}

/// Render a whole service, one block per function.
///
/// ```text
/// ApiClient implements Api  2 functions
/// ─────────────────────────────────────
///
/// getUser  GET users/{id}  (relative)
///   ...
/// ```
pub fn render_service(service: &ServiceDescription) -> String {
    let total = service.functions.len();
    let header = format!(
        "{} implements {}  {} function{}",
        service.name,
        service.implements,
        total,
        if total == 1 { "" } else { "s" }
    );
    let rule = "─".repeat(header.chars().count());

    let mut out = format!("{}\n{}\n", header, rule);
    for f in &service.functions {
        out.push('\n');
        out.push_str(&render_function(f));
    }
    out
}

/// One `location: error: message` line per diagnostic.
pub fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("{}: error: {}\n", d.location, d.error))
        .collect()
}

fn render_value(binding: &ValueBinding) -> String {
    let name = binding.name.as_deref().unwrap_or("*");
    match binding.mode {
        ValueMode::Single => format!("{} <- {}", name, binding.parameter),
        ValueMode::Iterable => format!("{}[] <- {}", name, binding.parameter),
        ValueMode::Map(map_type) => format!("{} <- {} ({:?})", name, binding.parameter, map_type),
    }
}
