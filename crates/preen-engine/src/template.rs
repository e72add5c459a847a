//! Template execution backed by minijinja

use std::sync::{Mutex, PoisonError};

use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;
use tracing::debug;

use crate::{Error, Result};

/// The template engine plus the data every render sees.
///
/// Holds one minijinja environment: files from the template library
/// directory are registered into it by name, and source entries carrying
/// the template attribute render against it one-off, so a source template
/// can include or import any library template. Undefined variables are
/// strict render errors, which keeps a typo in a template from silently
/// producing an empty value.
pub struct Templates {
    env: Mutex<Environment<'static>>,
    data: Value,
}

impl Templates {
    /// Create an engine rendering against `data`.
    pub fn new(data: Value) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        Self {
            env: Mutex::new(env),
            data,
        }
    }

    /// Register a library template under `name`.
    pub fn register(&self, name: &str, source: String) -> Result<()> {
        debug!(name, "registering template");
        let mut env = self.env.lock().unwrap_or_else(PoisonError::into_inner);
        env.add_template_owned(name.to_string(), source)
            .map_err(|e| Error::Template {
                name: name.to_string(),
                source: Box::new(e),
            })
    }

    /// Render a one-off template source, named `name` for error reporting.
    pub fn execute(&self, name: &str, source: &str) -> Result<String> {
        debug!(name, "rendering template");
        let env = self.env.lock().unwrap_or_else(PoisonError::into_inner);
        env.render_named_str(name, source, &self.data)
            .map_err(|e| Error::Template {
                name: name.to_string(),
                source: Box::new(e),
            })
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::new(Value::Object(serde_json::Map::new()))
    }
}
