//! Hydrating typed tasks from environment overrides and declared defaults.

mod builder;
mod coerce;
mod env;
mod error;
mod resolve;
mod schema;
mod source;
mod tag;
mod value;

pub use builder::{create, create_from_env, Instance, Task};
pub use coerce::{check_default, coerce};
pub use env::EnvSource;
pub use error::TaskError;
pub use resolve::{resolve, Resolved, SourceKind};
pub use schema::{
    fields_of, introspect, DataclassFields, DeclaredField, Declaration, FieldDefault, ModelField,
    ModelFields, Schema, SchemaFields,
};
pub use source::{MapSource, OverrideSource};
pub use tag::{TypeTag, UnsupportedType};
pub use value::Value;
