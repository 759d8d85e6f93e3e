pub mod task;

pub use task::{
    create, create_from_env, EnvSource, Instance, MapSource, OverrideSource, Schema, Task,
    TaskError, TypeTag, Value,
};
