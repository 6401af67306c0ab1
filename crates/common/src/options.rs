//! Option schemas and option sets
//!
//! A component kind declares its options once, in a static [`OptionSchema`].
//! Callers hand an [`OptionSet`] to the component, which validates it against
//! the schema before binding anything. Values are carried as JSON values and
//! are never coerced.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// Whether an option must be supplied or falls back to a default
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    Required,
    Defaulted(Value),
}

/// A single declared option
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    pub name: &'static str,
    pub requirement: Requirement,
}

impl OptionDecl {
    pub fn is_required(&self) -> bool {
        matches!(self.requirement, Requirement::Required)
    }
}

/// Ordered set of options a component kind accepts
#[derive(Debug, Clone)]
pub struct OptionSchema {
    kind: &'static str,
    options: Vec<OptionDecl>,
}

impl OptionSchema {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            options: Vec::new(),
        }
    }

    /// Declare a required option
    pub fn required(mut self, name: &'static str) -> Self {
        self.declare(name, Requirement::Required);
        self
    }

    /// Declare an option with a default value
    pub fn defaulted(mut self, name: &'static str, default: impl Into<Value>) -> Self {
        self.declare(name, Requirement::Defaulted(default.into()));
        self
    }

    fn declare(&mut self, name: &'static str, requirement: Requirement) {
        // Redeclaring replaces the earlier entry but keeps its position.
        match self.options.iter_mut().find(|o| o.name == name) {
            Some(existing) => existing.requirement = requirement,
            None => self.options.push(OptionDecl { name, requirement }),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn options(&self) -> &[OptionDecl] {
        &self.options
    }

    /// Declared option names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.options.iter().map(|o| o.name)
    }

    /// Check that every required option is present.
    ///
    /// The error names all missing options, not just the first one.
    pub fn validate(&self, supplied: &OptionSet) -> Result<()> {
        let missing: Vec<String> = self
            .options
            .iter()
            .filter(|o| o.is_required() && !supplied.contains(o.name))
            .map(|o| o.name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            debug!(kind = self.kind, ?missing, "option validation failed");
            Err(Error::MissingOptions {
                kind: self.kind,
                missing,
            })
        }
    }

    /// Validate, then fill in defaults for absent defaulted options
    pub fn resolve(&self, supplied: &OptionSet) -> Result<OptionSet> {
        self.validate(supplied)?;

        let mut resolved = supplied.clone();
        for decl in &self.options {
            if let Requirement::Defaulted(default) = &decl.requirement {
                if !resolved.contains(decl.name) {
                    resolved.insert(decl.name, default.clone());
                }
            }
        }
        Ok(resolved)
    }
}

/// Mapping of option name to value supplied at construction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet {
    values: Map<String, Value>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Read a string option, failing if it is absent or not a string
    pub fn get_str(&self, kind: &'static str, name: &str) -> Result<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidOption {
                kind,
                name: name.to_string(),
                expected: "a string",
            })
    }

    /// Read an optional unsigned integer option
    pub fn get_u64(&self, kind: &'static str, name: &str) -> Result<Option<u64>> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| Error::InvalidOption {
                kind,
                name: name.to_string(),
                expected: "an unsigned integer",
            }),
        }
    }

    /// Return a copy with `other`'s entries layered on top
    pub fn merged(&self, other: &OptionSet) -> OptionSet {
        let mut merged = self.clone();
        for (name, value) in other.iter() {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }

    /// Build from a JSON object
    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

impl<K, V> FromIterator<(K, V)> for OptionSet
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = OptionSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}
