//! Item master data: display-name overrides keyed by item code

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Code -> display name mapping, independently maintained from the orders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMaster {
    names: HashMap<String, String>,
}

impl ItemMaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the display name for `code`
    pub fn upsert(&mut self, code: impl Into<String>, display_name: impl Into<String>) {
        self.names.insert(code.into(), display_name.into());
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    /// Override if present, else the code itself
    pub fn display<'a>(&'a self, code: &'a str) -> &'a str {
        self.get(code).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for ItemMaster {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}
