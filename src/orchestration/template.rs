//! Instruction templating over the state map
//!
//! `{key}` is replaced by the state value (strings verbatim, other values as
//! JSON). A missing required key is an error; `{key?}` renders as empty.

use crate::session::StateMap;
use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;

const PLACEHOLDER: &str = r"\{([A-Za-z_][A-Za-z0-9_]*)(\?)?\}";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Context variable not found: '{0}'")]
    MissingKey(String),

    #[error("Invalid template pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Substitute state values into an instruction
pub fn render(template: &str, state: &StateMap) -> Result<String, TemplateError> {
    let pattern = Regex::new(PLACEHOLDER)?;

    let mut missing = None;
    let rendered = pattern.replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[1];
        let optional = caps.get(2).is_some();
        match state.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None if optional => String::new(),
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(key) => Err(TemplateError::MissingKey(key)),
        None => Ok(rendered.into_owned()),
    }
}
