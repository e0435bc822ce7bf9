use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    pub value: String,
    pub count: u64,
}

/// Aggregate counts of matching records grouped by one field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCounts {
    pub field: String,
    pub values: Vec<FacetValue>,
}

impl FacetCounts {
    /// Orders by count descending, then value ascending.
    pub fn new(field: impl Into<String>, mut values: Vec<FacetValue>) -> Self {
        values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        Self {
            field: field.into(),
            values,
        }
    }

    pub fn total(&self) -> u64 {
        self.values.iter().map(|v| v.count).sum()
    }
}

/// Distinct values of one field that start with a prefix, ascending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    pub field: String,
    pub suggestions: Vec<String>,
}
