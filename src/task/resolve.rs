//! Per-field value resolution.
//!
//! An override found in the [`OverrideSource`] takes precedence over the
//! declared default. The two cases are kept apart because a default is
//! already typed while an override is a raw string that still needs coercion.

use tracing::debug;

use super::schema::{introspect, Declaration, SchemaFields};
use super::source::OverrideSource;
use super::value::Value;
use super::TaskError;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Override,
    Default,
}

/// The outcome of resolving one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Raw string taken from the override source.
    Override(String),
    /// Declared default, already typed.
    Default(Value),
}

impl Resolved {
    pub fn kind(&self) -> SourceKind {
        match self {
            Resolved::Override(_) => SourceKind::Override,
            Resolved::Default(_) => SourceKind::Default,
        }
    }
}

/// Resolves `name` against `source`, falling back to the declared default.
///
/// A hit removes the entry from `source`.
pub fn resolve<D, S>(decl: &D, name: &str, source: &mut S) -> Result<Resolved, TaskError>
where
    D: Declaration + ?Sized,
    S: OverrideSource + ?Sized,
{
    let fields = introspect(decl)?;
    resolve_field(&*fields, name, source)
}

pub(crate) fn resolve_field<S>(
    fields: &dyn SchemaFields,
    name: &str,
    source: &mut S,
) -> Result<Resolved, TaskError>
where
    S: OverrideSource + ?Sized,
{
    if let Some(raw) = source.take(name) {
        debug!(field = name, value = %raw, "resolved from override");
        return Ok(Resolved::Override(raw));
    }

    let default = fields.default_for(name)?;
    debug!(field = name, value = ?default, "resolved from default");
    Ok(Resolved::Default(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::schema::Schema;
    use crate::task::source::MapSource;

    #[test]
    fn test_override_wins_and_is_consumed() {
        let schema = Schema::dataclass("Task").field("lmao", "Str", "420");
        let mut source = MapSource::new().with("lmao", "42");

        let first = resolve(&schema, "lmao", &mut source).unwrap();
        assert_eq!(first, Resolved::Override("42".into()));
        assert_eq!(first.kind(), SourceKind::Override);

        let second = resolve(&schema, "lmao", &mut source).unwrap();
        assert_eq!(second, Resolved::Default(Value::from("420")));
        assert_eq!(second.kind(), SourceKind::Default);
    }

    #[test]
    fn test_model_default_factory() {
        let schema = Schema::model("Task").factory("tags", "List<Str>", || {
            Value::from(vec!["a", "b"])
        });
        let mut source = MapSource::new();

        let resolved = resolve(&schema, "tags", &mut source).unwrap();
        assert_eq!(resolved, Resolved::Default(Value::from(vec!["a", "b"])));
    }

    #[test]
    fn test_invalid_schema() {
        struct Bare;
        impl Declaration for Bare {
            fn name(&self) -> &str {
                "Bare"
            }
        }

        let result = resolve(&Bare, "x", &mut MapSource::new());
        assert!(matches!(result, Err(TaskError::InvalidSchema(name)) if name == "Bare"));
    }

    #[test]
    fn test_override_for_undeclared_name_is_returned() {
        let schema = Schema::dataclass("Task");
        let mut source = MapSource::new().with("extra", "1");

        let resolved = resolve(&schema, "extra", &mut source).unwrap();
        assert_eq!(resolved, Resolved::Override("1".into()));
        assert!(matches!(
            resolve(&schema, "extra", &mut source),
            Err(TaskError::FieldNotFound(_))
        ));
    }
}
