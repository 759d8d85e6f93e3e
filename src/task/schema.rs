//! Schema declarations and field introspection.
//!
//! A schema describes the fields of a task: a name, a type annotation and a
//! default. Two declaration styles are supported:
//!
//! - **dataclass** fields carry a static default value;
//! - **model** fields carry either a static default or a factory that is
//!   called each time the default is needed.
//!
//! Both are read through the [`SchemaFields`] capability, so the resolver and
//! builder never need to know which style a schema uses.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::tag::{TypeTag, UnsupportedType};
use super::value::Value;
use super::TaskError;

/// A dataclass-style field: name, annotation and static default.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredField {
    pub name: String,
    pub annotation: String,
    pub default: Value,
}

impl DeclaredField {
    pub fn new(
        name: impl Into<String>,
        annotation: impl ToString,
        default: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            annotation: annotation.to_string(),
            default: default.into(),
        }
    }
}

/// How a model field produces its default.
#[derive(Clone)]
pub enum FieldDefault {
    Value(Value),
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl FieldDefault {
    /// Returns the default, calling the factory if there is one.
    pub fn get(&self) -> Value {
        match self {
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldDefault::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// A model-style field descriptor.
#[derive(Debug, Clone)]
pub struct ModelField {
    pub name: String,
    pub annotation: String,
    pub default: FieldDefault,
}

impl ModelField {
    pub fn new(
        name: impl Into<String>,
        annotation: impl ToString,
        default: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            annotation: annotation.to_string(),
            default: FieldDefault::Value(default.into()),
        }
    }

    pub fn with_factory<F>(name: impl Into<String>, annotation: impl ToString, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            annotation: annotation.to_string(),
            default: FieldDefault::Factory(Arc::new(factory)),
        }
    }
}

/// The field-enumeration protocols a schema may expose.
///
/// Implementors expose at most one of the two; when both are present the
/// dataclass fields win. A declaration exposing neither is rejected with
/// [`TaskError::InvalidSchema`].
pub trait Declaration {
    /// Name of the schema, used in error messages and logs.
    fn name(&self) -> &str;

    fn dataclass_fields(&self) -> Option<&IndexMap<String, DeclaredField>> {
        None
    }

    fn model_fields(&self) -> Option<&IndexMap<String, ModelField>> {
        None
    }
}

#[derive(Debug, Clone)]
enum Fields {
    Dataclass(IndexMap<String, DeclaredField>),
    Model(IndexMap<String, ModelField>),
}

/// A concrete schema built field by field.
///
/// Fields keep declaration order. Declaring a name twice replaces the
/// earlier field in place.
///
/// ## Example
///
/// ```
/// use taskenv::{Schema, TypeTag, Value};
///
/// let schema = Schema::model("Job")
///     .field("retries", TypeTag::Int, 3)
///     .factory("tags", "List<Str>", || Value::from(vec!["default"]));
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    fields: Fields,
}

impl Schema {
    /// Starts a schema whose fields have static defaults.
    pub fn dataclass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Fields::Dataclass(IndexMap::new()),
        }
    }

    /// Starts a schema whose fields may use default factories.
    pub fn model(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Fields::Model(IndexMap::new()),
        }
    }

    /// Declares a field with a static default.
    #[must_use]
    pub fn field(
        mut self,
        name: impl Into<String>,
        annotation: impl ToString,
        default: impl Into<Value>,
    ) -> Self {
        let name = name.into();
        match &mut self.fields {
            Fields::Dataclass(fields) => {
                fields.insert(name.clone(), DeclaredField::new(name, annotation, default));
            }
            Fields::Model(fields) => {
                fields.insert(name.clone(), ModelField::new(name, annotation, default));
            }
        }
        self
    }

    /// Declares a field whose default comes from `factory`.
    ///
    /// Dataclass schemas have no factories; there the factory is called once,
    /// now, and its result is stored as the static default.
    #[must_use]
    pub fn factory<F>(mut self, name: impl Into<String>, annotation: impl ToString, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        match &mut self.fields {
            Fields::Dataclass(fields) => {
                fields.insert(name.clone(), DeclaredField::new(name, annotation, factory()));
            }
            Fields::Model(fields) => {
                fields.insert(name.clone(), ModelField::with_factory(name, annotation, factory));
            }
        }
        self
    }
}

impl Declaration for Schema {
    fn name(&self) -> &str {
        &self.name
    }

    fn dataclass_fields(&self) -> Option<&IndexMap<String, DeclaredField>> {
        match &self.fields {
            Fields::Dataclass(fields) => Some(fields),
            Fields::Model(_) => None,
        }
    }

    fn model_fields(&self) -> Option<&IndexMap<String, ModelField>> {
        match &self.fields {
            Fields::Model(fields) => Some(fields),
            Fields::Dataclass(_) => None,
        }
    }
}

/// Uniform read access to a schema's fields, whatever its declaration style.
pub trait SchemaFields {
    /// Every field's name and parsed type, in declaration order.
    fn names_and_types(&self) -> Result<Vec<(String, TypeTag)>, TaskError>;

    /// The declared default for `name`, calling a default factory if needed.
    fn default_for(&self, name: &str) -> Result<Value, TaskError>;
}

/// Adapter over dataclass-style fields.
#[derive(Debug, Clone, Copy)]
pub struct DataclassFields<'a>(&'a IndexMap<String, DeclaredField>);

impl SchemaFields for DataclassFields<'_> {
    fn names_and_types(&self) -> Result<Vec<(String, TypeTag)>, TaskError> {
        self.0
            .values()
            .map(|field| {
                parse_annotation(&field.name, &field.annotation).map(|tag| (field.name.clone(), tag))
            })
            .collect()
    }

    fn default_for(&self, name: &str) -> Result<Value, TaskError> {
        self.0
            .get(name)
            .map(|field| field.default.clone())
            .ok_or_else(|| TaskError::FieldNotFound(name.to_string()))
    }
}

/// Adapter over model-style fields.
#[derive(Debug, Clone, Copy)]
pub struct ModelFields<'a>(&'a IndexMap<String, ModelField>);

impl SchemaFields for ModelFields<'_> {
    fn names_and_types(&self) -> Result<Vec<(String, TypeTag)>, TaskError> {
        self.0
            .values()
            .map(|field| {
                parse_annotation(&field.name, &field.annotation).map(|tag| (field.name.clone(), tag))
            })
            .collect()
    }

    fn default_for(&self, name: &str) -> Result<Value, TaskError> {
        self.0
            .get(name)
            .map(|field| field.default.get())
            .ok_or_else(|| TaskError::FieldNotFound(name.to_string()))
    }
}

/// Selects the field adapter for a declaration, dataclass fields first.
pub fn introspect<D>(decl: &D) -> Result<Box<dyn SchemaFields + '_>, TaskError>
where
    D: Declaration + ?Sized,
{
    if let Some(fields) = decl.dataclass_fields() {
        Ok(Box::new(DataclassFields(fields)))
    } else if let Some(fields) = decl.model_fields() {
        Ok(Box::new(ModelFields(fields)))
    } else {
        Err(TaskError::InvalidSchema(decl.name().to_string()))
    }
}

/// Lists the `(name, type)` pairs of a declaration in declaration order.
pub fn fields_of<D>(decl: &D) -> Result<Vec<(String, TypeTag)>, TaskError>
where
    D: Declaration + ?Sized,
{
    introspect(decl)?.names_and_types()
}

fn parse_annotation(field: &str, annotation: &str) -> Result<TypeTag, TaskError> {
    annotation
        .parse()
        .map_err(|e: UnsupportedType| TaskError::invalid_type(field, e.to_string()))
}
