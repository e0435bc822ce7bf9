use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    /// Parse a caller-supplied direction. Accepts `asc`/`desc` and the long
    /// forms, case-insensitively.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDir::Asc),
            "desc" | "descending" => Ok(SortDir::Desc),
            other => Err(ValidationError::InvalidSortDirection(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub dir: SortDir,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Desc,
        }
    }
}

/// Resolved sort sequence. After resolution the last key is always the
/// ascending tie-breaker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderBy(pub Vec<SortKey>);

impl OrderBy {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Render as `"-price,+id"`.
    pub fn to_signed_tokens(&self) -> String {
        self.0
            .iter()
            .map(|k| match k.dir {
                SortDir::Asc => format!("+{}", k.field),
                SortDir::Desc => format!("-{}", k.field),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse `"-price,+id"`. A bare field means ascending; empty segments are
    /// skipped; an empty result is an error.
    pub fn from_signed_tokens(signed: &str) -> Result<Self, ValidationError> {
        let mut out = Vec::new();
        for seg in signed.split(',') {
            let seg = seg.trim();
            if seg.is_empty() {
                continue;
            }
            let (dir, name) = match seg.as_bytes()[0] {
                b'+' => (SortDir::Asc, &seg[1..]),
                b'-' => (SortDir::Desc, &seg[1..]),
                _ => (SortDir::Asc, seg),
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(ValidationError::InvalidSortField(seg.to_string()));
            }
            out.push(SortKey {
                field: name.to_string(),
                dir,
            });
        }
        if out.is_empty() {
            return Err(ValidationError::InvalidSortField(String::new()));
        }
        Ok(OrderBy(out))
    }

    /// Whitespace-tolerant comparison with a signed-token string.
    pub fn equals_signed_tokens(&self, signed: &str) -> bool {
        match OrderBy::from_signed_tokens(signed) {
            Ok(other) => other == *self,
            Err(_) => false,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(none)");
        }
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", key.field, key.dir.as_str())?;
        }
        Ok(())
    }
}
