use crate::foundation::error::{StrataError, StrataResult};

/// Persisted stack script: the ordered list of opaque per-layer action
/// identifiers, bottom to top, sufficient to replay layer creation.
///
/// Per-layer adjustment parameters are owned by each adjustment's own
/// collaborator; the engine persists only the identifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StackScript {
    /// Action identifiers in stack order.
    pub actions: Vec<String>,
}

impl StackScript {
    /// Visit every action identifier in stack order.
    pub fn for_each_action(&self, mut f: impl FnMut(&str)) {
        for action in &self.actions {
            f(action);
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> StrataResult<String> {
        serde_json::to_string(self).map_err(|e| StrataError::serde(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> StrataResult<Self> {
        serde_json::from_str(json).map_err(|e| StrataError::serde(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/script.rs"]
mod tests;
