use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A raw filter parameter as extracted by the transport: one string or a
/// repeated parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    One(String),
    Many(Vec<String>),
}

impl RawValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            RawValue::One(s) => vec![s.as_str()],
            RawValue::Many(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::One(s.to_string())
    }
}

impl From<Vec<&str>> for RawValue {
    fn from(v: Vec<&str>) -> Self {
        RawValue::Many(v.into_iter().map(str::to_string).collect())
    }
}

/// Untrusted filter parameters. Ordered so that compilation is deterministic.
pub type RawFilters = BTreeMap<String, RawValue>;

/// One requested `(field, direction)` pair, unvalidated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default = "default_direction")]
    pub direction: String,
}

fn default_direction() -> String {
    "asc".to_string()
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: direction.into(),
        }
    }
}

/// Exactly one pagination strategy per request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PageRequest {
    Offset { page: u64, page_size: u64 },
    Cursor { token: Option<String>, limit: u64 },
}

impl PageRequest {
    pub fn offset(page: u64, page_size: u64) -> Self {
        PageRequest::Offset { page, page_size }
    }

    pub fn first(limit: u64) -> Self {
        PageRequest::Cursor { token: None, limit }
    }

    pub fn after(token: impl Into<String>, limit: u64) -> Self {
        PageRequest::Cursor {
            token: Some(token.into()),
            limit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub filters: RawFilters,
    #[serde(default)]
    pub sort: Vec<SortSpec>,
    pub page: PageRequest,
}

impl ListRequest {
    pub fn new(page: PageRequest) -> Self {
        Self {
            filters: RawFilters::new(),
            sort: Vec::new(),
            page,
        }
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort.push(SortSpec::new(field, direction));
        self
    }
}
