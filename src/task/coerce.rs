//! String-to-value coercion driven by a field's [`TypeTag`].
//!
//! Overrides arrive as raw strings and are converted here. Defaults skip
//! coercion but still pass through [`check_default`], so a schema whose
//! default disagrees with its declared type is rejected even when no
//! override is present.

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::Value as Json;
use tracing::debug;

use super::tag::TypeTag;
use super::value::Value;
use super::TaskError;

/// Converts an override string into a value of type `tag`.
///
/// `field` is only used for error reporting.
pub fn coerce(tag: &TypeTag, raw: &str, field: &str) -> Result<Value, TaskError> {
    debug!(field, %tag, raw, "coercing override");
    match tag {
        TypeTag::Bool => parse_bool(raw, field).map(Value::Bool),
        TypeTag::Int => parse_int(raw, field).map(Value::Int),
        TypeTag::Float => parse_float(raw, field).map(Value::Float),
        TypeTag::Str => Ok(Value::Str(parse_str(raw))),
        TypeTag::DateTime => parse_datetime(raw, field).map(Value::DateTime),
        TypeTag::List(element) => parse_list(element, raw, field),
        TypeTag::Map(..) => parse_map(tag, raw, field),
        TypeTag::Optional(inner) => {
            if is_null_literal(raw) {
                Ok(Value::Null)
            } else {
                coerce(inner, raw, field)
            }
        }
    }
}

/// Checks that a declared default matches its declared type.
///
/// Scalars must have exactly the declared kind; lists and maps are checked
/// element by element. A non-datetime default for a `DateTime` field is an
/// [`TaskError::InvalidDefaultValue`]; every other mismatch is an
/// [`TaskError::InvalidType`].
pub fn check_default(tag: &TypeTag, value: Value, field: &str) -> Result<Value, TaskError> {
    check_value(tag, &value, field)?;
    Ok(value)
}

fn check_value(tag: &TypeTag, value: &Value, field: &str) -> Result<(), TaskError> {
    let matches = match (tag, value) {
        (TypeTag::Optional(_), Value::Null) => true,
        (TypeTag::Optional(inner), value) => return check_value(inner, value, field),
        (TypeTag::Int, Value::Int(_))
        | (TypeTag::Float, Value::Float(_))
        | (TypeTag::Str, Value::Str(_))
        | (TypeTag::Bool, Value::Bool(_))
        | (TypeTag::DateTime, Value::DateTime(_)) => true,
        (TypeTag::DateTime, other) => {
            return Err(TaskError::InvalidDefaultValue {
                field: field.to_string(),
                reason: format!("expected a datetime, found {}", other.kind()),
            })
        }
        (TypeTag::List(element), Value::List(items)) => {
            for item in items {
                check_value(element, item, field)?;
            }
            true
        }
        (TypeTag::Map(_, element), Value::Map(entries)) => {
            for item in entries.values() {
                check_value(element, item, field)?;
            }
            true
        }
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(TaskError::invalid_type(
            field,
            format!("default of kind {} does not match {tag}", value.kind()),
        ))
    }
}

fn is_null_literal(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("null")
}

fn parse_bool(raw: &str, field: &str) -> Result<bool, TaskError> {
    match raw {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        _ => Err(TaskError::InvalidBooleanFormat {
            field: field.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn parse_int(raw: &str, field: &str) -> Result<i64, TaskError> {
    raw.trim().parse().map_err(|e| TaskError::ParseInt {
        field: field.to_string(),
        value: raw.to_string(),
        source: e,
    })
}

fn parse_float(raw: &str, field: &str) -> Result<f64, TaskError> {
    raw.trim().parse().map_err(|e| TaskError::ParseFloat {
        field: field.to_string(),
        value: raw.to_string(),
        source: e,
    })
}

/// JSON strings are unquoted and other JSON scalars are rendered back to
/// text: integers keep their exact digits (`-0` becomes `0`), floats use
/// their shortest round-trip form, `true`/`false` become `True`/`False` and
/// `null` becomes `None`. Arrays, objects and non-JSON input are kept verbatim.
fn parse_str(raw: &str) -> String {
    match serde_json::from_str::<Json>(raw) {
        Ok(Json::String(s)) => s,
        Ok(Json::Number(n)) => integer_text(raw.trim()).unwrap_or_else(|| n.to_string()),
        Ok(Json::Bool(true)) => "True".to_string(),
        Ok(Json::Bool(false)) => "False".to_string(),
        Ok(Json::Null) => "None".to_string(),
        _ => raw.to_string(),
    }
}

/// Canonical text of a JSON integer literal, without going through a float.
fn integer_text(literal: &str) -> Option<String> {
    let digits = literal.strip_prefix('-').unwrap_or(literal);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if digits.chars().all(|c| c == '0') {
        return Some("0".to_string());
    }
    Some(literal.to_string())
}

/// Accepts `Y-M-D` or `Y-M-D h:m:s`, with ` `, `T` and `:` all treated as
/// separators. Exactly 3 or 6 integer components are allowed.
fn parse_datetime(raw: &str, field: &str) -> Result<NaiveDateTime, TaskError> {
    let invalid = || TaskError::InvalidDatetimeFormat {
        field: field.to_string(),
        value: raw.to_string(),
    };

    let value = strip_quotes(raw);
    let normalized = if value.contains(':') || value.contains('T') {
        value.replace([' ', 'T', ':'], "-")
    } else if value.split('-').count() == 3 {
        value.to_string()
    } else {
        return Err(invalid());
    };

    let parts = normalized
        .split('-')
        .map(|part| {
            part.trim().parse::<u32>().map_err(|e| TaskError::ParseInt {
                field: field.to_string(),
                value: raw.to_string(),
                source: e,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (date, time) = match parts.as_slice() {
        [y, m, d] => ((*y, *m, *d), (0, 0, 0)),
        [y, m, d, hh, mm, ss] => ((*y, *m, *d), (*hh, *mm, *ss)),
        _ => return Err(invalid()),
    };

    let year = i32::try_from(date.0).map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, date.1, date.2)
        .and_then(|d| d.and_hms_opt(time.0, time.1, time.2))
        .ok_or_else(invalid)
}

fn strip_quotes(raw: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    raw
}

fn parse_list(element: &TypeTag, raw: &str, field: &str) -> Result<Value, TaskError> {
    if let Some(inner) = raw.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        return match serde_json::from_str::<Json>(raw) {
            Ok(Json::Array(items)) => items
                .into_iter()
                .map(|item| from_json(element, item, field))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            // Bracketed but not JSON, e.g. `[True,False]`.
            _ => split_list(element, inner, field),
        };
    }

    if raw.contains(',') {
        return split_list(element, raw, field);
    }

    Err(TaskError::InvalidListFormat {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn split_list(element: &TypeTag, items: &str, field: &str) -> Result<Value, TaskError> {
    items
        .split(',')
        .map(|item| coerce(element, item, field))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

fn parse_map(tag: &TypeTag, raw: &str, field: &str) -> Result<Value, TaskError> {
    let json: Json = serde_json::from_str(raw).map_err(|e| {
        TaskError::invalid_type(field, format!("expected a JSON object: {e}"))
    })?;
    if !json.is_object() {
        return Err(TaskError::invalid_type(
            field,
            format!("expected a JSON object, found {}", json_kind(&json)),
        ));
    }
    from_json(tag, json, field)
}

/// Converts a parsed JSON value to `tag`.
///
/// Strings nested in structured input are coerced with the string rules,
/// so `["2012-12-12"]` is a valid `List<DateTime>`.
fn from_json(tag: &TypeTag, json: Json, field: &str) -> Result<Value, TaskError> {
    match (tag, json) {
        (TypeTag::Optional(_), Json::Null) => Ok(Value::Null),
        (TypeTag::Optional(inner), json) => from_json(inner, json, field),
        (TypeTag::Str, Json::String(s)) => Ok(Value::Str(s)),
        (TypeTag::Str, Json::Number(n)) => Ok(Value::Str(n.to_string())),
        (TypeTag::Str, Json::Bool(b)) => Ok(Value::Str(b.to_string())),
        (tag, Json::String(s)) => coerce(tag, &s, field),
        (TypeTag::Int, Json::Number(n)) => n.as_i64().map(Value::Int).ok_or_else(|| {
            TaskError::invalid_type(field, format!("expected an integer, found {n}"))
        }),
        (TypeTag::Float, Json::Number(n)) => n.as_f64().map(Value::Float).ok_or_else(|| {
            TaskError::invalid_type(field, format!("expected a float, found {n}"))
        }),
        (TypeTag::Bool, Json::Bool(b)) => Ok(Value::Bool(b)),
        (TypeTag::List(element), Json::Array(items)) => items
            .into_iter()
            .map(|item| from_json(element, item, field))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (TypeTag::Map(_, element), Json::Object(entries)) => entries
            .into_iter()
            .map(|(key, item)| from_json(element, item, field).map(|value| (key, value)))
            .collect::<Result<IndexMap<_, _>, _>>()
            .map(Value::Map),
        (tag, json) => Err(TaskError::invalid_type(
            field,
            format!("expected {tag}, found JSON {}", json_kind(&json)),
        )),
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(annotation: &str) -> TypeTag {
        annotation.parse().unwrap()
    }

    fn datetime(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> Value {
        Value::DateTime(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(hh, mm, ss)
                .unwrap(),
        )
    }

    #[test]
    fn test_bool() {
        assert_eq!(coerce(&TypeTag::Bool, "True", "f").unwrap(), Value::Bool(true));
        assert_eq!(coerce(&TypeTag::Bool, "true", "f").unwrap(), Value::Bool(true));
        assert_eq!(coerce(&TypeTag::Bool, "False", "f").unwrap(), Value::Bool(false));
        assert!(matches!(
            coerce(&TypeTag::Bool, "tru", "f"),
            Err(TaskError::InvalidBooleanFormat { .. })
        ));
        assert!(matches!(
            coerce(&TypeTag::Bool, "TRUE", "f"),
            Err(TaskError::InvalidBooleanFormat { .. })
        ));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(coerce(&TypeTag::Int, "420", "n").unwrap(), Value::Int(420));
        assert_eq!(coerce(&TypeTag::Float, "996", "f").unwrap(), Value::Float(996.0));
        assert!(matches!(
            coerce(&TypeTag::Int, "4.2", "n"),
            Err(TaskError::ParseInt { .. })
        ));
        assert!(matches!(
            coerce(&TypeTag::Float, "abc", "f"),
            Err(TaskError::ParseFloat { .. })
        ));
    }

    #[test]
    fn test_str() {
        assert_eq!(coerce(&TypeTag::Str, "42", "s").unwrap(), Value::from("42"));
        assert_eq!(coerce(&TypeTag::Str, "\"quoted\"", "s").unwrap(), Value::from("quoted"));
        assert_eq!(coerce(&TypeTag::Str, "true", "s").unwrap(), Value::from("True"));
        assert_eq!(coerce(&TypeTag::Str, "false", "s").unwrap(), Value::from("False"));
        assert_eq!(coerce(&TypeTag::Str, "null", "s").unwrap(), Value::from("None"));
        assert_eq!(coerce(&TypeTag::Str, "4.0", "s").unwrap(), Value::from("4.0"));
        assert_eq!(coerce(&TypeTag::Str, "plain text", "s").unwrap(), Value::from("plain text"));
        assert_eq!(coerce(&TypeTag::Str, "[1, 2]", "s").unwrap(), Value::from("[1, 2]"));
        assert_eq!(coerce(&TypeTag::Str, "007", "s").unwrap(), Value::from("007"));
    }

    #[test]
    fn test_datetime() {
        assert_eq!(
            coerce(&TypeTag::DateTime, "2012-12-12", "w").unwrap(),
            datetime(2012, 12, 12, 0, 0, 0)
        );
        assert_eq!(
            coerce(&TypeTag::DateTime, "2012-12-12T12:12:12", "w").unwrap(),
            datetime(2012, 12, 12, 12, 12, 12)
        );
        assert_eq!(
            coerce(&TypeTag::DateTime, "2012-12-12 12:12:12", "w").unwrap(),
            datetime(2012, 12, 12, 12, 12, 12)
        );
        assert_eq!(
            coerce(&TypeTag::DateTime, "\"2012-12-12 12:12:12\"", "w").unwrap(),
            datetime(2012, 12, 12, 12, 12, 12)
        );
    }

    #[test]
    fn test_str_keeps_long_integers_exact() {
        assert_eq!(
            coerce(&TypeTag::Str, "123456789012345678901234567890", "s").unwrap(),
            Value::from("123456789012345678901234567890")
        );
        assert_eq!(
            coerce(&TypeTag::Str, "99999999999999999999", "s").unwrap(),
            Value::from("99999999999999999999")
        );
        assert_eq!(
            coerce(&TypeTag::Str, "-18446744073709551617", "s").unwrap(),
            Value::from("-18446744073709551617")
        );
        assert_eq!(coerce(&TypeTag::Str, "-0", "s").unwrap(), Value::from("0"));
    }

    #[test]
    fn test_datetime_date_only_with_surrounding_whitespace() {
        assert_eq!(
            coerce(&TypeTag::DateTime, "2012-12-12 ", "w").unwrap(),
            datetime(2012, 12, 12, 0, 0, 0)
        );
        assert_eq!(
            coerce(&TypeTag::DateTime, " 2012-12-12", "w").unwrap(),
            datetime(2012, 12, 12, 0, 0, 0)
        );
        assert_eq!(
            coerce(&TypeTag::DateTime, "2012-12-12\n", "w").unwrap(),
            datetime(2012, 12, 12, 0, 0, 0)
        );
    }

    #[test]
    fn test_datetime_rejections() {
        assert!(matches!(
            coerce(&TypeTag::DateTime, "2022-02", "w"),
            Err(TaskError::InvalidDatetimeFormat { .. })
        ));
        assert!(matches!(
            coerce(&TypeTag::DateTime, "invalid datetime", "w"),
            Err(TaskError::InvalidDatetimeFormat { .. })
        ));
        assert!(matches!(
            coerce(&TypeTag::DateTime, "2012-12-12 12:12", "w"),
            Err(TaskError::InvalidDatetimeFormat { .. })
        ));
        assert!(matches!(
            coerce(&TypeTag::DateTime, "2012-13-12", "w"),
            Err(TaskError::InvalidDatetimeFormat { .. })
        ));
        assert!(matches!(
            coerce(&TypeTag::DateTime, "2012-12-12 12:12:12 invalid", "w"),
            Err(TaskError::ParseInt { .. })
        ));
    }

    #[test]
    fn test_list_comma_and_bracket_forms_agree() {
        let ints = tag("List<Int>");
        let split = coerce(&ints, "4,5,6", "l").unwrap();
        let bracketed = coerce(&ints, "[4,5,6]", "l").unwrap();
        assert_eq!(split, Value::from(vec![4, 5, 6]));
        assert_eq!(split, bracketed);
    }

    #[test]
    fn test_list_element_types() {
        assert_eq!(
            coerce(&tag("List<Str>"), "[4,5,6]", "l").unwrap(),
            Value::from(vec!["4", "5", "6"])
        );
        assert_eq!(
            coerce(&tag("List<Float>"), "4.0,5.0,6.0", "l").unwrap(),
            Value::from(vec![4.0, 5.0, 6.0])
        );
        assert_eq!(
            coerce(&tag("List<Bool>"), "True,False,true", "l").unwrap(),
            Value::from(vec![true, false, true])
        );
        assert_eq!(
            coerce(&tag("List<Bool>"), "[True,False,true]", "l").unwrap(),
            Value::from(vec![true, false, true])
        );
        assert_eq!(
            coerce(&tag("List<DateTime>"), "[\"2012-12-12\"]", "l").unwrap(),
            Value::List(vec![datetime(2012, 12, 12, 0, 0, 0)])
        );
    }

    #[test]
    fn test_nested_list() {
        assert_eq!(
            coerce(&tag("List<List<Int>>"), "[[1,2],[3]]", "l").unwrap(),
            Value::List(vec![Value::from(vec![1, 2]), Value::from(vec![3])])
        );
    }

    #[test]
    fn test_list_rejections() {
        assert!(matches!(
            coerce(&tag("List<Int>"), "5", "l"),
            Err(TaskError::InvalidListFormat { .. })
        ));
        assert!(matches!(
            coerce(&tag("List<Int>"), "[1.5]", "l"),
            Err(TaskError::InvalidType { .. })
        ));
        assert!(matches!(
            coerce(&tag("List<Int>"), "1,x", "l"),
            Err(TaskError::ParseInt { .. })
        ));
    }

    #[test]
    fn test_map() {
        let value = coerce(&tag("Map<Str, Int>"), r#"{"b": 2, "a": 1}"#, "m").unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map["a"], Value::Int(1));

        assert!(matches!(
            coerce(&tag("Map<Str, Int>"), "{not json", "m"),
            Err(TaskError::InvalidType { .. })
        ));
        assert!(matches!(
            coerce(&tag("Map<Str, Int>"), "[1, 2]", "m"),
            Err(TaskError::InvalidType { .. })
        ));
    }

    #[test]
    fn test_optional() {
        let opt = tag("Optional<Int>");
        for raw in ["None", "none", "null", "NULL", ""] {
            assert_eq!(coerce(&opt, raw, "o").unwrap(), Value::Null, "raw = {raw:?}");
        }
        assert_eq!(coerce(&opt, "5", "o").unwrap(), Value::Int(5));
        assert_eq!(
            coerce(&tag("Optional<List<Int>>"), "1,2", "o").unwrap(),
            Value::from(vec![1, 2])
        );
    }

    #[test]
    fn test_check_default_accepts_matching() {
        assert_eq!(
            check_default(&TypeTag::Float, Value::Float(69.69), "f").unwrap(),
            Value::Float(69.69)
        );
        assert!(check_default(&tag("Optional<Int>"), Value::Null, "o").is_ok());
        assert!(check_default(&tag("List<Int>"), Value::from(vec![1, 2]), "l").is_ok());
        assert!(check_default(&tag("Map<Str, Bool>"), Value::Map(IndexMap::new()), "m").is_ok());
    }

    #[test]
    fn test_check_default_mismatches() {
        assert!(matches!(
            check_default(&TypeTag::Float, Value::Int(1), "f"),
            Err(TaskError::InvalidType { .. })
        ));
        assert!(matches!(
            check_default(&tag("List<Int>"), Value::Int(1), "l"),
            Err(TaskError::InvalidType { .. })
        ));
        assert!(matches!(
            check_default(&tag("List<Int>"), Value::from(vec!["a"]), "l"),
            Err(TaskError::InvalidType { .. })
        ));
        assert!(matches!(
            check_default(&tag("Map<Str, Int>"), Value::from(vec![1]), "m"),
            Err(TaskError::InvalidType { .. })
        ));
        assert!(matches!(
            check_default(&TypeTag::DateTime, Value::Int(100500), "w"),
            Err(TaskError::InvalidDefaultValue { .. })
        ));
    }
}
