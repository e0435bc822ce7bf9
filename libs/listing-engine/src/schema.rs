//! Per-resource allow-lists: which filter parameters exist, what they compile
//! to, which fields may be sorted on, and the tie-breaker.

use std::collections::BTreeMap;

use listing_core::{FilterCondition, FilterOp, SortKey, Value};

/// Whitelisted field kind, used to parse raw strings into typed values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Bool,
    Uuid,
    DateTimeUtc,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::I64 => "integer",
            FieldKind::F64 => "number",
            FieldKind::Bool => "boolean",
            FieldKind::Uuid => "uuid",
            FieldKind::DateTimeUtc => "datetime",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BoundsPolicy {
    /// Out-of-range values are pulled to the nearest bound.
    Clamp,
    #[default]
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NumericBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub policy: BoundsPolicy,
}

impl NumericBounds {
    pub fn non_negative() -> Self {
        Self {
            min: Some(0.0),
            max: None,
            policy: BoundsPolicy::Reject,
        }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            policy: BoundsPolicy::Reject,
        }
    }

    pub fn clamping(mut self) -> Self {
        self.policy = BoundsPolicy::Clamp;
        self
    }
}

/// One accepted filter parameter and the condition it compiles to.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterSpec {
    pub field: String,
    pub op: FilterOp,
    pub kind: FieldKind,
    pub bounds: Option<NumericBounds>,
}

/// A free-text parameter matched against several text fields (`Or`).
#[derive(Clone, Debug, PartialEq)]
pub struct SearchSpec {
    pub param: String,
    pub fields: Vec<String>,
    pub op: FilterOp,
}

#[derive(Clone, Debug)]
pub struct ResourceSchema {
    name: String,
    filters: BTreeMap<String, FilterSpec>,
    search: Option<SearchSpec>,
    sortable: BTreeMap<String, FieldKind>,
    facetable: Vec<String>,
    suggestable: Vec<String>,
    base: Vec<FilterCondition>,
    tiebreaker: (String, FieldKind),
    default_sort: Vec<SortKey>,
}

impl ResourceSchema {
    /// `tiebreaker` must be unique and strictly monotonic across the resource
    /// (typically the primary id).
    pub fn new(
        name: impl Into<String>,
        tiebreaker: impl Into<String>,
        tiebreaker_kind: FieldKind,
    ) -> Self {
        Self {
            name: name.into(),
            filters: BTreeMap::new(),
            search: None,
            sortable: BTreeMap::new(),
            facetable: Vec::new(),
            suggestable: Vec::new(),
            base: Vec::new(),
            tiebreaker: (tiebreaker.into().to_lowercase(), tiebreaker_kind),
            default_sort: Vec::new(),
        }
    }

    /// Declare filter parameter `param` compiling to `field op <value>`.
    pub fn filter(
        mut self,
        param: impl Into<String>,
        field: impl Into<String>,
        op: FilterOp,
        kind: FieldKind,
    ) -> Self {
        self.filters.insert(
            param.into().to_lowercase(),
            FilterSpec {
                field: field.into(),
                op,
                kind,
                bounds: None,
            },
        );
        self
    }

    pub fn bounded_filter(
        mut self,
        param: impl Into<String>,
        field: impl Into<String>,
        op: FilterOp,
        kind: FieldKind,
        bounds: NumericBounds,
    ) -> Self {
        self.filters.insert(
            param.into().to_lowercase(),
            FilterSpec {
                field: field.into(),
                op,
                kind,
                bounds: Some(bounds),
            },
        );
        self
    }

    /// Declare a free-text search parameter over `fields`.
    pub fn search<I, S>(mut self, param: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search = Some(SearchSpec {
            param: param.into().to_lowercase(),
            fields: fields.into_iter().map(Into::into).collect(),
            op: FilterOp::Contains,
        });
        self
    }

    pub fn sortable(mut self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.sortable.insert(field.into().to_lowercase(), kind);
        self
    }

    pub fn facetable(mut self, field: impl Into<String>) -> Self {
        self.facetable.push(field.into().to_lowercase());
        self
    }

    /// Text field offered for prefix suggestions.
    pub fn suggestable(mut self, field: impl Into<String>) -> Self {
        self.suggestable.push(field.into().to_lowercase());
        self
    }

    /// Condition ANDed into every compiled filter, e.g. `active == true`.
    /// Callers cannot name or override it.
    pub fn base_filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.base.push(FilterCondition {
            field: field.into(),
            op,
            value,
            ignore_case: false,
        });
        self
    }

    /// Sort used when the caller asks for none. The tie-breaker is appended
    /// during resolution, so it does not belong here.
    pub fn default_sort(mut self, keys: Vec<SortKey>) -> Self {
        self.default_sort = keys;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter_spec(&self, param: &str) -> Option<&FilterSpec> {
        self.filters.get(&param.to_lowercase())
    }

    pub fn search_spec(&self) -> Option<&SearchSpec> {
        self.search.as_ref()
    }

    pub fn is_search_param(&self, param: &str) -> bool {
        self.search
            .as_ref()
            .is_some_and(|s| s.param.eq_ignore_ascii_case(param))
    }

    pub fn tiebreaker(&self) -> &str {
        &self.tiebreaker.0
    }

    pub fn default_sort_keys(&self) -> &[SortKey] {
        &self.default_sort
    }

    pub fn is_facetable(&self, field: &str) -> bool {
        let field = field.to_lowercase();
        self.facetable.iter().any(|f| *f == field)
    }

    pub fn is_suggestable(&self, field: &str) -> bool {
        let field = field.to_lowercase();
        self.suggestable.iter().any(|f| *f == field)
    }

    pub fn base_filters(&self) -> &[FilterCondition] {
        &self.base
    }

    /// Kind of a field usable in a sort sequence, the tie-breaker included.
    pub fn sort_kind(&self, field: &str) -> Option<FieldKind> {
        let field = field.to_lowercase();
        if field == self.tiebreaker.0 {
            return Some(self.tiebreaker.1);
        }
        self.sortable.get(&field).copied()
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable.contains_key(&field.to_lowercase())
    }
}
