use serde::{Deserialize, Serialize};

/// Describes one network input, output or independent parameter.
/// Every field is optional text, so bare networks serialize compactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VariableInformation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub description: String,
}

/// Information for a group of variables, kept the same length as the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Variables {
    pub items: Vec<VariableInformation>,
}

impl Variables {
    pub fn new(size: usize) -> Variables {
        Variables { items: vec![VariableInformation::default(); size] }
    }

    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Variables {
        Variables {
            items: names
                .into_iter()
                .map(|name| VariableInformation { name: name.into(), ..Default::default() })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn remove(&mut self, index: usize) {
        if index < self.items.len() {
            self.items.remove(index);
        }
    }
}
