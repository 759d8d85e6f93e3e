use tracing::trace;

use super::source::OverrideSource;

/// Override source backed by the process environment.
///
/// Keys are field names, optionally behind a prefix. By default a lookup
/// removes the variable it read, so repeated builds in the same process
/// only see an override once. The read and the removal are not atomic;
/// callers sharing the environment across threads must serialize access.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    consume: bool,
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvSource {
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            consume: true,
        }
    }

    /// Looks up `<prefix><field>` instead of the bare field name.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Leaves variables in place after reading them.
    pub fn retain_entries(mut self) -> Self {
        self.consume = false;
        self
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl OverrideSource for EnvSource {
    fn take(&mut self, key: &str) -> Option<String> {
        let name = self.var_name(key);
        // Non-UTF-8 values count as unset.
        let value = std::env::var(&name).ok()?;
        if self.consume {
            std::env::remove_var(&name);
            trace!(var = %name, "removed consumed environment variable");
        }
        Some(value)
    }
}
