//! Static circuit descriptions consumed by the instance builder.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{InstanceError, Result};

/// One element line of a template: positional arguments plus `key=value` pairs.
///
/// For concrete elements the positional arguments are the nets followed by
/// the value; for subcircuit references (`x...`) they are the bound nets
/// followed by the subcircuit name, and the named arguments are passed
/// parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTemplate {
    pub args: Vec<String>,
    #[serde(default)]
    pub named: IndexMap<String, String>,
}

impl ElementTemplate {
    /// Split a whitespace separated argument string; `key=value` tokens
    /// become named arguments.
    pub fn parse(spec: &str) -> Self {
        let mut tpl = Self::default();
        for token in spec.split_whitespace() {
            match token.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    tpl.named.insert(key.to_string(), value.to_string());
                }
                _ => tpl.args.push(token.to_string()),
            }
        }
        tpl
    }

    /// First named argument among `keys`.
    pub fn named_value(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|k| self.named.get(*k))
            .map(String::as_str)
    }
}

/// A circuit or subcircuit definition.
///
/// Nested definitions are owned by their enclosing template; a subcircuit
/// reference is resolved in the referencing template first and then in each
/// enclosing template outward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub ports: Vec<String>,
    /// Parameter name to expression. A parameter defined as its own name is
    /// a free symbol.
    #[serde(default)]
    pub params: IndexMap<String, String>,
    #[serde(default)]
    pub elements: IndexMap<String, ElementTemplate>,
    #[serde(default)]
    pub subcircuits: IndexMap<String, Template>,
}

impl Template {
    /// Create an empty template.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create an empty subcircuit template with the given ports.
    pub fn subcircuit(name: impl Into<String>, ports: &[&str]) -> Self {
        Self {
            name: name.into(),
            ports: ports.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Define (or redefine) a parameter default.
    pub fn param(&mut self, name: &str, expr: &str) -> &mut Self {
        self.params.insert(name.to_string(), expr.to_string());
        self
    }

    /// Declare parameters that are free symbols.
    pub fn symbols(&mut self, names: &[&str]) -> &mut Self {
        for name in names {
            self.param(name, name);
        }
        self
    }

    /// Add an element from an argument string such as `"in out 1k"`.
    pub fn element(&mut self, name: &str, spec: &str) -> Result<&mut Self> {
        self.add_element(name, ElementTemplate::parse(spec))
    }

    /// Add an element, rejecting duplicate names.
    pub fn add_element(&mut self, name: &str, element: ElementTemplate) -> Result<&mut Self> {
        if self.elements.contains_key(name) {
            return Err(InstanceError::DuplicateName {
                circuit: self.name.clone(),
                name: name.to_string(),
            });
        }
        self.elements.insert(name.to_string(), element);
        Ok(self)
    }

    /// Add a nested subcircuit definition, rejecting duplicate names.
    pub fn add_subcircuit(&mut self, subcircuit: Template) -> Result<&mut Self> {
        if self.subcircuits.contains_key(&subcircuit.name) {
            return Err(InstanceError::DuplicateName {
                circuit: self.name.clone(),
                name: subcircuit.name,
            });
        }
        self.subcircuits.insert(subcircuit.name.clone(), subcircuit);
        Ok(self)
    }
}
