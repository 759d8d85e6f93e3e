use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::coerce::{check_default, coerce};
use super::env::EnvSource;
use super::resolve::{resolve_field, Resolved};
use super::schema::{introspect, Declaration, Schema};
use super::source::OverrideSource;
use super::value::Value;
use super::TaskError;

/// A hydrated task: every declared field with its resolved value.
///
/// Values are stored in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    schema: String,
    values: IndexMap<String, Value>,
}

impl Instance {
    /// Name of the schema this instance was built from.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overwrites fields with already-typed values.
    ///
    /// No coercion is applied. Keys are applied in order; the first key that
    /// does not name a field fails with [`TaskError::UnknownParameter`], and
    /// the keys applied before it stay applied.
    pub fn update<I, K>(&mut self, partial: I) -> Result<(), TaskError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (key, value) in partial {
            let key = key.into();
            match self.values.get_mut(&key) {
                Some(slot) => *slot = value,
                None => return Err(TaskError::UnknownParameter(key)),
            }
        }
        Ok(())
    }

    /// Deserializes the instance into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        let json = serde_json::to_value(&self.values).map_err(|e| self.construct_error(e))?;
        serde_json::from_value(json).map_err(|e| self.construct_error(e))
    }

    fn construct_error(&self, source: serde_json::Error) -> TaskError {
        TaskError::Construct {
            schema: self.schema.clone(),
            source,
        }
    }
}

impl<'a> IntoIterator for &'a Instance {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Builds an instance of `decl`, taking overrides from `source`.
///
/// Every field is resolved in declaration order. Overrides are coerced to
/// the field's declared type; defaults are only checked against it. The
/// first failing field aborts the build. Overrides read from `source` are
/// consumed, including those read before a failure.
///
/// ## Example
///
/// ```
/// use taskenv::{create, MapSource, Schema, Value};
///
/// let schema = Schema::dataclass("Job")
///     .field("retries", "Int", 3)
///     .field("verbose", "Bool", false);
///
/// let mut source = MapSource::new().with("retries", "5");
/// let job = create(&schema, &mut source)?;
///
/// assert_eq!(job.get("retries"), Some(&Value::Int(5)));
/// assert_eq!(job.get("verbose"), Some(&Value::Bool(false)));
/// # Ok::<(), taskenv::TaskError>(())
/// ```
pub fn create<D, S>(decl: &D, source: &mut S) -> Result<Instance, TaskError>
where
    D: Declaration + ?Sized,
    S: OverrideSource + ?Sized,
{
    let fields = introspect(decl)?;
    let mut values = IndexMap::new();

    for (name, tag) in fields.names_and_types()? {
        let value = match resolve_field(&*fields, &name, source)? {
            Resolved::Override(raw) => coerce(&tag, &raw, &name)?,
            Resolved::Default(default) => check_default(&tag, default, &name)?,
        };
        values.insert(name, value);
    }

    debug!(schema = decl.name(), fields = values.len(), "created instance");
    Ok(Instance {
        schema: decl.name().to_string(),
        values,
    })
}

/// Builds an instance of `decl` from the process environment.
pub fn create_from_env<D>(decl: &D) -> Result<Instance, TaskError>
where
    D: Declaration + ?Sized,
{
    create(decl, &mut EnvSource::new())
}

/// A typed task hydrated from overrides and declared defaults.
///
/// The struct's serde field names must match the schema's field names.
///
/// ## Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use taskenv::{MapSource, Schema, Task};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Job {
///     retries: i64,
///     name: Option<String>,
/// }
///
/// impl Task for Job {
///     fn schema() -> Schema {
///         Schema::model("Job")
///             .field("retries", "Int", 3)
///             .field("name", "Optional<Str>", None::<String>)
///     }
/// }
///
/// let mut source = MapSource::new().with("name", "nightly");
/// let job = Job::create_with(&mut source)?;
/// assert_eq!(job.retries, 3);
/// assert_eq!(job.name.as_deref(), Some("nightly"));
/// # Ok::<(), taskenv::TaskError>(())
/// ```
pub trait Task: Sized + Serialize + DeserializeOwned {
    fn schema() -> Schema;

    /// Builds the task from the process environment.
    fn create() -> Result<Self, TaskError> {
        Self::create_with(&mut EnvSource::new())
    }

    /// Builds the task from an explicit override source.
    fn create_with<S>(source: &mut S) -> Result<Self, TaskError>
    where
        S: OverrideSource + ?Sized,
    {
        create(&Self::schema(), source)?.deserialize()
    }

    /// Overwrites fields with already-typed values, in order.
    ///
    /// An unknown key fails with [`TaskError::UnknownParameter`]; keys
    /// applied before it remain applied.
    fn update<I, K>(&mut self, partial: I) -> Result<(), TaskError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let schema = Self::schema();
        let construct = |source: serde_json::Error| TaskError::Construct {
            schema: schema.name().to_string(),
            source,
        };

        let mut fields = match serde_json::to_value(&*self).map_err(construct)? {
            serde_json::Value::Object(fields) => fields,
            _ => {
                return Err(TaskError::InvalidSchema(schema.name().to_string()));
            }
        };

        let mut outcome = Ok(());
        for (key, value) in partial {
            let key = key.into();
            match fields.get_mut(&key) {
                Some(slot) => *slot = serde_json::to_value(&value).map_err(construct)?,
                None => {
                    outcome = Err(TaskError::UnknownParameter(key));
                    break;
                }
            }
        }

        *self = serde_json::from_value(serde_json::Value::Object(fields)).map_err(construct)?;
        outcome
    }
}
