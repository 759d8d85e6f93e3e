use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    #[error("invalid schema: '{0}' exposes neither declared fields nor model fields")]
    InvalidSchema(String),

    #[error("invalid type for field '{field}': {reason}")]
    InvalidType { field: String, reason: String },

    #[error("invalid default value for field '{field}': {reason}")]
    InvalidDefaultValue { field: String, reason: String },

    #[error("invalid boolean format for field '{field}': {value:?}")]
    InvalidBooleanFormat { field: String, value: String },

    #[error("invalid datetime format for field '{field}': {value:?}")]
    InvalidDatetimeFormat { field: String, value: String },

    #[error("invalid list format for field '{field}': {value:?}")]
    InvalidListFormat { field: String, value: String },

    #[error("invalid integer for field '{field}' ({value:?}): {source}")]
    ParseInt {
        field: String,
        value: String,
        source: ParseIntError,
    },

    #[error("invalid float for field '{field}' ({value:?}): {source}")]
    ParseFloat {
        field: String,
        value: String,
        source: ParseFloatError,
    },

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("field not declared in schema: {0}")]
    FieldNotFound(String),

    #[error("failed to construct '{schema}': {source}")]
    Construct {
        schema: String,
        source: serde_json::Error,
    },
}

impl TaskError {
    pub(crate) fn invalid_type(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidType {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
