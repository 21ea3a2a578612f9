use crate::decl::{DeclKind, ServiceDecl};

use super::{Diagnostics, ValidationError};

/// Service-level rules. Returns `true` if the declaring type itself is
/// acceptable, independent of its functions.
pub(crate) fn check_service(decl: &ServiceDecl, diags: &mut Diagnostics) -> bool {
    let mark = diags.mark();
    let loc = &decl.location;

    if decl.kind != DeclKind::Interface {
        diags.report(
            loc,
            ValidationError::NotAnInterface {
                name: decl.name.clone(),
                found: decl.kind.to_string(),
            },
        );
    }
    if !decl.top_level {
        diags.report(loc, ValidationError::NotTopLevel(decl.name.clone()));
    }
    if !decl.supertypes.is_empty() {
        diags.report(
            loc,
            ValidationError::HasSupertypes {
                name: decl.name.clone(),
                supertypes: decl.supertypes.join(", "),
            },
        );
    }
    if !decl.type_parameters.is_empty() {
        diags.report(loc, ValidationError::ServiceTypeParameters(decl.name.clone()));
    }
    for property in &decl.properties {
        diags.report(
            &property.location,
            ValidationError::ServiceProperty(property.name.clone()),
        );
    }

    !diags.since(mark)
}
