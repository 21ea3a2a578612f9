//! Type-position rules: serializability, arity, and where the special
//! wrapper types (`ByteStream`, `Result`, `*`) may appear.

use crate::decl::SourceLocation;
use crate::ir::{HttpMethod, ReturnShape};
use crate::typing::{Builtin, TypeRef};

use super::{Diagnostics, TypeContext, ValidationError};

/// The top-level position a type is checked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    /// Path, query and header parameters: stringified, never serialised.
    Argument,
    Body,
    Part,
    Field,
    Return,
}

impl Position {
    fn context(self) -> Option<TypeContext> {
        match self {
            Position::Argument => None,
            Position::Body => Some(TypeContext::Body),
            Position::Part => Some(TypeContext::Part),
            Position::Field => Some(TypeContext::Field),
            Position::Return => Some(TypeContext::Return),
        }
    }

    fn allows_byte_stream(self) -> bool {
        matches!(self, Position::Body | Position::Part | Position::Return)
    }
}

pub(crate) struct TypeChecker<'a> {
    pub serializable: &'a [String],
    pub location: &'a SourceLocation,
}

impl TypeChecker<'_> {
    /// Check `ty` as used at `position`. Returns `true` if no violation was
    /// reported.
    pub fn check(&self, ty: &TypeRef, position: Position, diags: &mut Diagnostics) -> bool {
        let mark = diags.mark();
        self.walk(ty, ty, position, true, diags);
        !diags.since(mark)
    }

    /// Derive the return shape, reporting every violation on the way.
    pub fn check_return(
        &self,
        ty: &TypeRef,
        method: &HttpMethod,
        diags: &mut Diagnostics,
    ) -> ReturnShape {
        let shape = if ty.builtin() == Some(Builtin::Result) {
            match ty.arguments.as_slice() {
                [arg] if arg.is_star() => ReturnShape::WrappedWildcard,
                [arg] => {
                    self.walk(ty, arg, Position::Return, true, diags);
                    ReturnShape::Wrapped(arg.clone())
                }
                args => {
                    self.report(
                        diags,
                        ValidationError::TypeArity {
                            type_name: ty.name.clone(),
                            expected: 1,
                            found: args.len(),
                        },
                    );
                    ReturnShape::Plain(ty.clone())
                }
            }
        } else {
            self.walk(ty, ty, Position::Return, true, diags);
            ReturnShape::Plain(ty.clone())
        };

        if *method == HttpMethod::Head {
            let body_less = match &shape {
                ReturnShape::Plain(t) | ReturnShape::Wrapped(t) => t.is_unit(),
                ReturnShape::WrappedWildcard => true,
            };
            if !body_less {
                self.report(diags, ValidationError::HeadReturnType(ty.to_string()));
            }
        }
        shape
    }

    fn walk(
        &self,
        root: &TypeRef,
        ty: &TypeRef,
        position: Position,
        top: bool,
        diags: &mut Diagnostics,
    ) {
        if ty.is_star() {
            self.report(diags, ValidationError::WildcardNotAllowed(root.to_string()));
            return;
        }

        match ty.builtin() {
            Some(Builtin::Result) => {
                self.report(diags, ValidationError::ResultNotAllowed(root.to_string()));
                return;
            }
            Some(Builtin::ByteStream) if !(top && position.allows_byte_stream()) => {
                self.report(diags, ValidationError::ByteStreamNotAllowed(root.to_string()));
                return;
            }
            Some(builtin) if builtin.arity() != ty.arguments.len() => {
                self.report(
                    diags,
                    ValidationError::TypeArity {
                        type_name: ty.name.clone(),
                        expected: builtin.arity(),
                        found: ty.arguments.len(),
                    },
                );
            }
            Some(_) => {}
            None => {
                if let Some(context) = position.context() {
                    if !self.serializable.iter().any(|s| *s == ty.name) {
                        self.report(
                            diags,
                            ValidationError::NotSerializable {
                                type_name: ty.name.clone(),
                                context,
                            },
                        );
                    }
                }
            }
        }

        for arg in &ty.arguments {
            self.walk(root, arg, position, false, diags);
        }
    }

    fn report(&self, diags: &mut Diagnostics, error: ValidationError) {
        diags.report(self.location, error);
    }
}
