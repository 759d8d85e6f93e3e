//! Declared field types.
//!
//! Fields declare their type as a textual annotation such as `Int`,
//! `Optional<DateTime>` or `Map<Str, List<Float>>`. Annotations are parsed
//! into a [`TypeTag`] once, when a schema is introspected.

use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use thiserror::Error;

/// The closed set of types a field may declare.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int,
    Float,
    Str,
    Bool,
    DateTime,
    Optional(Box<TypeTag>),
    List(Box<TypeTag>),
    Map(Box<TypeTag>, Box<TypeTag>),
}

/// An annotation that does not name a supported [`TypeTag`].
#[derive(Debug, Clone, Error)]
#[error("unsupported type `{annotation}`: {reason}")]
pub struct UnsupportedType {
    pub annotation: String,
    pub reason: String,
}

impl TypeTag {
    /// Shorthand for `Optional<inner>`.
    pub fn optional(inner: TypeTag) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Shorthand for `List<element>`.
    pub fn list(element: TypeTag) -> Self {
        Self::List(Box::new(element))
    }

    /// Shorthand for `Map<Str, value>`.
    pub fn map(value: TypeTag) -> Self {
        Self::Map(Box::new(TypeTag::Str), Box::new(value))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Int | Self::Float | Self::Str | Self::Bool | Self::DateTime
        )
    }

    /// Checks the nesting rules for containers.
    fn check(&self) -> Result<(), String> {
        match self {
            Self::Int | Self::Float | Self::Str | Self::Bool | Self::DateTime => Ok(()),
            Self::Optional(inner) => match inner.as_ref() {
                t if t.is_scalar() => Ok(()),
                Self::List(_) => inner.check(),
                other => Err(format!("Optional cannot wrap {other}")),
            },
            Self::List(element) => match element.as_ref() {
                t if t.is_scalar() => Ok(()),
                Self::List(_) => element.check(),
                other => Err(format!("List cannot hold {other}")),
            },
            Self::Map(key, value) => {
                if **key != Self::Str {
                    return Err(format!("Map keys must be Str, not {key}"));
                }
                match value.as_ref() {
                    t if t.is_scalar() => Ok(()),
                    Self::List(_) | Self::Optional(_) => value.check(),
                    other => Err(format!("Map cannot hold {other}")),
                }
            }
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("Int"),
            Self::Float => f.write_str("Float"),
            Self::Str => f.write_str("Str"),
            Self::Bool => f.write_str("Bool"),
            Self::DateTime => f.write_str("DateTime"),
            Self::Optional(inner) => write!(f, "Optional<{inner}>"),
            Self::List(element) => write!(f, "List<{element}>"),
            Self::Map(key, value) => write!(f, "Map<{key}, {value}>"),
        }
    }
}

impl FromStr for TypeTag {
    type Err = UnsupportedType;

    fn from_str(annotation: &str) -> Result<Self, Self::Err> {
        let unsupported = |reason: String| UnsupportedType {
            annotation: annotation.to_string(),
            reason,
        };

        let mut chars = annotation.chars().peekable();
        let tag = parse_tag(&mut chars).map_err(unsupported)?;
        skip_whitespace(&mut chars);
        if let Some(ch) = chars.next() {
            return Err(unsupported(format!("unexpected '{ch}' after type")));
        }
        tag.check().map_err(unsupported)?;
        Ok(tag)
    }
}

fn parse_tag(chars: &mut Peekable<Chars>) -> Result<TypeTag, String> {
    skip_whitespace(chars);
    let name = consume_ident(chars);
    if name.is_empty() {
        return Err(match chars.peek() {
            Some(ch) => format!("expected a type name, found '{ch}'"),
            None => "expected a type name".to_string(),
        });
    }

    skip_whitespace(chars);
    let args = if chars.peek() == Some(&'<') {
        chars.next();
        parse_args(chars)?
    } else {
        Vec::new()
    };

    let mut args = args.into_iter();
    let tag = match (name.as_str(), args.len()) {
        ("Int", 0) => TypeTag::Int,
        ("Float", 0) => TypeTag::Float,
        ("Str", 0) => TypeTag::Str,
        ("Bool", 0) => TypeTag::Bool,
        ("DateTime", 0) => TypeTag::DateTime,
        ("Optional", 1) => TypeTag::Optional(Box::new(next_arg(&mut args)?)),
        ("List", 1) => TypeTag::List(Box::new(next_arg(&mut args)?)),
        ("Map", 2) => {
            let key = next_arg(&mut args)?;
            let value = next_arg(&mut args)?;
            TypeTag::Map(Box::new(key), Box::new(value))
        }
        ("Int" | "Float" | "Str" | "Bool" | "DateTime", n) => {
            return Err(format!("{name} takes no type arguments, got {n}"))
        }
        ("Optional" | "List", n) => {
            return Err(format!("{name} takes 1 type argument, got {n}"))
        }
        ("Map", n) => return Err(format!("Map takes 2 type arguments, got {n}")),
        _ => return Err(format!("unknown type name '{name}'")),
    };
    Ok(tag)
}

/// Parses comma-separated type arguments up to and including the closing '>'.
fn parse_args(chars: &mut Peekable<Chars>) -> Result<Vec<TypeTag>, String> {
    let mut args = Vec::new();
    loop {
        args.push(parse_tag(chars)?);
        skip_whitespace(chars);
        match chars.next() {
            Some(',') => continue,
            Some('>') => return Ok(args),
            Some(ch) => return Err(format!("expected ',' or '>', found '{ch}'")),
            None => return Err("unclosed type arguments (missing '>')".to_string()),
        }
    }
}

fn next_arg(args: &mut impl Iterator<Item = TypeTag>) -> Result<TypeTag, String> {
    args.next().ok_or_else(|| "missing type argument".to_string())
}

fn consume_ident(chars: &mut Peekable<Chars>) -> String {
    let mut ident = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_alphanumeric() || ch == '_' {
            ident.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

fn skip_whitespace(chars: &mut Peekable<Chars>) {
    while chars.peek().is_some_and(|ch| ch.is_whitespace()) {
        chars.next();
    }
}
