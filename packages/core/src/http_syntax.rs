//! Character-level checks for HTTP header and token syntax (RFC 9110 §5.1,
//! §5.5 and §5.6.2).
//!
//! Shared by the validator, which checks static headers at compile time, and
//! by the runtime, which applies the same rules to values supplied at call
//! time so a caller can never smuggle a CR/LF into the request head.

use thiserror::Error;

/// Why a header name, header value, or token was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("must not be empty")]
    Empty,

    /// `position` is the zero-based character index.
    #[error("illegal character {character:?} at position {position}")]
    IllegalCharacter { character: char, position: usize },
}

/// `tchar` from RFC 9110.
pub fn is_tchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

/// A header field name, which is a `token`.
pub fn check_header_name(name: &str) -> Result<(), SyntaxError> {
    check_token(name)
}

/// A non-empty run of `tchar`.
pub fn check_token(token: &str) -> Result<(), SyntaxError> {
    if token.is_empty() {
        return Err(SyntaxError::Empty);
    }
    first_illegal(token, is_tchar)
}

/// A header field value: visible ASCII, obs-text (0x80..=0xFF), SP and HTAB.
/// Empty values are legal.
pub fn check_header_value(value: &str) -> Result<(), SyntaxError> {
    first_illegal(value, |c| {
        c == ' ' || c == '\t' || c.is_ascii_graphic() || ('\u{80}'..='\u{ff}').contains(&c)
    })
}

/// `type "/" subtype`, optionally followed by `; parameters`. Only the type
/// and subtype are checked as tokens; parameters must be legal header-value
/// characters.
pub fn check_media_type(media_type: &str) -> Result<(), SyntaxError> {
    let (essence, params) = match media_type.find(';') {
        Some(i) => (&media_type[..i], Some((i, &media_type[i..]))),
        None => (media_type, None),
    };
    let Some(slash) = essence.find('/') else {
        return match essence.chars().position(|c| !is_tchar(c)) {
            Some(position) => Err(SyntaxError::IllegalCharacter {
                character: essence.chars().nth(position).unwrap_or('/'),
                position,
            }),
            None if essence.is_empty() => Err(SyntaxError::Empty),
            None => Err(SyntaxError::IllegalCharacter {
                character: '/',
                position: essence.chars().count(),
            }),
        };
    };
    let top = &essence[..slash];
    let sub = essence[slash + 1..].trim_end();
    check_token(top)?;
    check_token(sub).map_err(|e| offset(e, top.chars().count() + 1))?;
    if let Some((at, rest)) = params {
        check_header_value(rest).map_err(|e| offset(e, media_type[..at].chars().count()))?;
    }
    Ok(())
}

/// `true` for the two headers owned exclusively by request content.
pub fn is_content_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("content-type") || name.eq_ignore_ascii_case("content-length")
}

fn first_illegal(s: &str, allowed: impl Fn(char) -> bool) -> Result<(), SyntaxError> {
    match s.chars().enumerate().find(|(_, c)| !allowed(*c)) {
        Some((position, character)) => Err(SyntaxError::IllegalCharacter {
            character,
            position,
        }),
        None => Ok(()),
    }
}

fn offset(err: SyntaxError, by: usize) -> SyntaxError {
    match err {
        SyntaxError::IllegalCharacter {
            character,
            position,
        } => SyntaxError::IllegalCharacter {
            character,
            position: position + by,
        },
        other => other,
    }
}
