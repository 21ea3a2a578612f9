//! Type references as reported by the host front end, and the closed set of
//! built-in shapes the validator and the encoders understand.
//!
//! A [`TypeRef`] is written and read in a compact textual form:
//!
//! ```text
//! Map<String, List<Int?>>?
//! └─┬─┘ └──────┬───────┘ └ nullable
//!  name    arguments
//! ```
//!
//! `*` is the wildcard placeholder. It is only meaningful as the argument of
//! `Result` in a return position; the validator rejects it elsewhere.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::ir::MapType;

pub const STAR: &str = "*";
pub const UNIT: &str = "Unit";
pub const STRING: &str = "String";
pub const BYTE_STREAM: &str = "ByteStream";
pub const RESULT: &str = "Result";
pub const MULTI_VALUE_MAP: &str = "MultiValueMap";

const SCALARS: &[&str] = &[
    "Boolean", "Byte", "Short", "Int", "Long", "Float", "Double", "Char", "String", "UByte",
    "UShort", "UInt", "ULong",
];

const PRIMITIVE_ARRAYS: &[&str] = &[
    "ByteArray",
    "ShortArray",
    "IntArray",
    "LongArray",
    "FloatArray",
    "DoubleArray",
    "CharArray",
    "BooleanArray",
];

const COLLECTIONS: &[&str] = &["List", "Set", "Collection", "Iterable", "Array", "Sequence"];

/// A (possibly generic, possibly nullable) reference to a host type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Simple or qualified type name, or `*` for the wildcard.
    pub name: String,
    /// Whether the host declared the type as nullable (`T?`).
    pub nullable: bool,
    /// Type arguments in declaration order.
    pub arguments: Vec<TypeRef>,
}

/// The built-in type families. Anything else must be explicitly marked
/// serializable by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Unit,
    Scalar,
    PrimitiveArray,
    Collection,
    Map,
    Pair,
    Triple,
    ByteStream,
    MultiValueMap,
    Result,
}

impl Builtin {
    /// Number of type arguments the family takes.
    pub fn arity(self) -> usize {
        match self {
            Builtin::Unit
            | Builtin::Scalar
            | Builtin::PrimitiveArray
            | Builtin::ByteStream
            | Builtin::MultiValueMap => 0,
            Builtin::Collection | Builtin::Result => 1,
            Builtin::Map | Builtin::Pair => 2,
            Builtin::Triple => 3,
        }
    }
}

/// How a map-shaped type exposes its keys and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapShape<'a> {
    pub map_type: MapType,
    /// Declared key type. `None` for [`MapType::MultiValue`], whose keys are
    /// always strings.
    pub key: Option<&'a TypeRef>,
    /// Declared value type. `None` for [`MapType::MultiValue`].
    pub value: Option<&'a TypeRef>,
}

impl TypeRef {
    /// A non-nullable type without arguments.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
            arguments: Vec::new(),
        }
    }

    /// The `*` wildcard.
    pub fn star() -> Self {
        Self::named(STAR)
    }

    /// `Unit`, the body-less type.
    pub fn unit() -> Self {
        Self::named(UNIT)
    }

    /// Builder: replace the type arguments.
    pub fn with_args(mut self, arguments: Vec<TypeRef>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Builder: mark the type nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn is_star(&self) -> bool {
        self.name == STAR
    }

    pub fn is_unit(&self) -> bool {
        self.name == UNIT && self.arguments.is_empty()
    }

    /// `String`, nullable or not.
    pub fn is_string(&self) -> bool {
        self.name == STRING && self.arguments.is_empty()
    }

    pub fn is_byte_stream(&self) -> bool {
        self.name == BYTE_STREAM
    }

    /// Classify against the built-in families.
    pub fn builtin(&self) -> Option<Builtin> {
        let name = self.name.as_str();
        if name == UNIT {
            Some(Builtin::Unit)
        } else if SCALARS.contains(&name) {
            Some(Builtin::Scalar)
        } else if PRIMITIVE_ARRAYS.contains(&name) {
            Some(Builtin::PrimitiveArray)
        } else if COLLECTIONS.contains(&name) {
            Some(Builtin::Collection)
        } else {
            match name {
                "Map" => Some(Builtin::Map),
                "Pair" => Some(Builtin::Pair),
                "Triple" => Some(Builtin::Triple),
                BYTE_STREAM => Some(Builtin::ByteStream),
                MULTI_VALUE_MAP => Some(Builtin::MultiValueMap),
                RESULT => Some(Builtin::Result),
                _ => None,
            }
        }
    }

    /// `true` for the collection family (`List<T>`, `Set<T>`, …).
    pub fn is_iterable(&self) -> bool {
        self.builtin() == Some(Builtin::Collection)
    }

    /// Element type of a collection, if this is one.
    pub fn element(&self) -> Option<&TypeRef> {
        if self.is_iterable() {
            self.arguments.first()
        } else {
            None
        }
    }

    /// Recognise one of the accepted "many-valued" map shapes:
    /// `Map<K, V>`, an ordered `List<Pair<K, V>>`, or the opaque
    /// `MultiValueMap` container.
    pub fn map_shape(&self) -> Option<MapShape<'_>> {
        match self.builtin()? {
            Builtin::Map => Some(MapShape {
                map_type: MapType::Map,
                key: self.arguments.first(),
                value: self.arguments.get(1),
            }),
            Builtin::MultiValueMap => Some(MapShape {
                map_type: MapType::MultiValue,
                key: None,
                value: None,
            }),
            Builtin::Collection => {
                let pair = self.arguments.first()?;
                if pair.builtin() != Some(Builtin::Pair) {
                    return None;
                }
                Some(MapShape {
                    map_type: MapType::PairList,
                    key: pair.arguments.first(),
                    value: pair.arguments.get(1),
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        if self.nullable {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// Errors produced when parsing the textual form of a [`TypeRef`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("expected a type name at position {0}")]
    ExpectedName(usize),

    #[error("expected {expected} at position {position}")]
    Expected {
        expected: &'static str,
        position: usize,
    },

    #[error("unexpected trailing input at position {0}")]
    TrailingInput(usize),
}

impl FromStr for TypeRef {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { src: s, pos: 0 };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != s.len() {
            return Err(TypeParseError::TrailingInput(parser.pos));
        }
        Ok(ty)
    }
}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TypeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef, TypeParseError> {
        self.skip_ws();
        if self.eat('*') {
            return Ok(TypeRef::star());
        }

        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return Err(TypeParseError::ExpectedName(start)),
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name = self.src[start..self.pos].to_string();

        let mut arguments = Vec::new();
        self.skip_ws();
        if self.eat('<') {
            loop {
                arguments.push(self.parse_type()?);
                self.skip_ws();
                if self.eat(',') {
                    continue;
                }
                if self.eat('>') {
                    break;
                }
                return Err(TypeParseError::Expected {
                    expected: "',' or '>'",
                    position: self.pos,
                });
            }
            self.skip_ws();
        }

        let nullable = self.eat('?');
        Ok(TypeRef {
            name,
            nullable,
            arguments,
        })
    }
}
