use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kernel::constants::{DOCUMENT_FORMAT_VERSION, PROLOG_PREFIX};
use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;
use crate::storage::traits::PathMacroSubstitutor;

/// In-memory state of one component.
///
/// An empty state is the tombstone written for deprecated or cleared targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    #[serde(flatten)]
    values: BTreeMap<String, Value>,
}

impl StateData {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Get a value, deserialized into `T`
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Set a value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value =
            serde_json::to_value(value).map_err(|e| StorageSystemError::serialization("json", e))?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Builder-style [`set`](Self::set) for plain JSON values
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Copy of this state with every string value passed through
    /// `collapse_path` of the substitutor.
    pub fn collapse_paths(&self, substitutor: &dyn PathMacroSubstitutor) -> StateData {
        let values = self
            .values
            .iter()
            .map(|(key, value)| (key.clone(), collapse_value(value, substitutor)))
            .collect();
        StateData { values }
    }
}

fn collapse_value(value: &Value, substitutor: &dyn PathMacroSubstitutor) -> Value {
    match value {
        Value::String(s) => Value::String(substitutor.collapse_path(s)),
        Value::Array(items) => Value::Array(
            items.iter().map(|v| collapse_value(v, substitutor)).collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), collapse_value(v, substitutor)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Content of a file storage: the states of all components sharing the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageData {
    root: String,
    #[serde(default)]
    components: BTreeMap<String, StateData>,
}

impl StorageData {
    pub fn new(root_tag: impl Into<String>) -> Self {
        Self {
            root: root_tag.into(),
            components: BTreeMap::new(),
        }
    }

    pub fn root_tag(&self) -> &str {
        &self.root
    }

    pub fn state(&self, component_name: &str) -> Option<&StateData> {
        self.components.get(component_name)
    }

    /// Store the state of a component. An empty state removes the component.
    /// Returns whether the stored content changed.
    pub fn set_state(&mut self, component_name: &str, state: StateData) -> bool {
        if state.is_empty() {
            return self.components.remove(component_name).is_some();
        }
        match self.components.get(component_name) {
            Some(existing) if *existing == state => false,
            _ => {
                self.components.insert(component_name.to_string(), state);
                true
            }
        }
    }

    pub fn component_names(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Render the document written to disk, optionally preceded by the prolog line.
    pub fn to_document(&self, use_prolog: bool) -> Result<String> {
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| StorageSystemError::serialization("json", e))?;
        if use_prolog {
            Ok(format!("{} version={}\n{}", PROLOG_PREFIX, DOCUMENT_FORMAT_VERSION, body))
        } else {
            Ok(body)
        }
    }

    /// Parse a document produced by [`to_document`](Self::to_document).
    pub fn from_document(text: &str) -> Result<Self> {
        let body = match text.strip_prefix(PROLOG_PREFIX) {
            Some(rest) => rest.split_once('\n').map(|(_, body)| body).unwrap_or(""),
            None => text,
        };
        let data = serde_json::from_str(body)
            .map_err(|e| StorageSystemError::deserialization("json", e))?;
        Ok(data)
    }
}
