use listing_core::{OrderBy, SortDir, SortKey, SortSpec, ValidationError};

use crate::schema::ResourceSchema;

/// Validates requested sort fields against the resource allow-list and
/// appends the tie-breaker.
#[derive(Clone, Copy, Debug)]
pub struct SortResolver<'a> {
    schema: &'a ResourceSchema,
    max_fields: usize,
}

impl<'a> SortResolver<'a> {
    pub fn new(schema: &'a ResourceSchema, max_fields: usize) -> Self {
        Self { schema, max_fields }
    }

    /// Single-field form.
    pub fn resolve(&self, field: &str, direction: &str) -> Result<OrderBy, ValidationError> {
        self.resolve_many(&[SortSpec::new(field, direction)])
    }

    /// Resolve an ordered list of `(field, direction)` pairs. The result
    /// always ends with exactly one ascending tie-breaker key. An empty list
    /// falls back to the schema default sort.
    pub fn resolve_many(&self, specs: &[SortSpec]) -> Result<OrderBy, ValidationError> {
        if specs.len() > self.max_fields {
            return Err(ValidationError::InvalidSortField(format!(
                "at most {} sort fields are allowed",
                self.max_fields
            )));
        }

        let mut keys: Vec<SortKey> = Vec::with_capacity(specs.len() + 1);
        if specs.is_empty() {
            keys.extend(self.schema.default_sort_keys().iter().cloned());
        } else {
            for spec in specs {
                let field = spec.field.trim().to_lowercase();
                if !self.schema.is_sortable(&field) || field == self.schema.tiebreaker() {
                    return Err(ValidationError::InvalidSortField(spec.field.clone()));
                }
                if keys.iter().any(|k| k.field == field) {
                    return Err(ValidationError::InvalidSortField(spec.field.clone()));
                }
                keys.push(SortKey {
                    field,
                    dir: SortDir::parse(&spec.direction)?,
                });
            }
        }

        keys.retain(|k| k.field != self.schema.tiebreaker());
        keys.push(SortKey::asc(self.schema.tiebreaker()));
        Ok(OrderBy(keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("products", "id", FieldKind::I64)
            .sortable("name", FieldKind::String)
            .sortable("price", FieldKind::F64)
            .sortable("category", FieldKind::String)
            .default_sort(vec![SortKey::desc("price")])
    }

    #[test]
    fn appends_tiebreaker_ascending() {
        let schema = schema();
        let order = SortResolver::new(&schema, 5).resolve("price", "desc").unwrap();
        assert_eq!(order.to_signed_tokens(), "-price,+id");
    }

    #[test]
    fn multi_field_gets_one_tiebreaker() {
        let schema = schema();
        let order = SortResolver::new(&schema, 5)
            .resolve_many(&[
                SortSpec::new("category", "asc"),
                SortSpec::new("Price", "DESC"),
            ])
            .unwrap();
        assert_eq!(order.to_signed_tokens(), "+category,-price,+id");
    }

    #[test]
    fn empty_request_uses_default_sort() {
        let schema = schema();
        let order = SortResolver::new(&schema, 5).resolve_many(&[]).unwrap();
        assert_eq!(order.to_signed_tokens(), "-price,+id");

        let bare = ResourceSchema::new("t", "id", FieldKind::I64);
        let order = SortResolver::new(&bare, 5).resolve_many(&[]).unwrap();
        assert_eq!(order.to_signed_tokens(), "+id");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let schema = schema();
        let err = SortResolver::new(&schema, 5)
            .resolve("password", "asc")
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidSortField("password".into()));
    }

    #[test]
    fn tiebreaker_and_duplicates_are_rejected() {
        let schema = schema();
        let resolver = SortResolver::new(&schema, 5);
        assert!(matches!(
            resolver.resolve("id", "desc"),
            Err(ValidationError::InvalidSortField(_))
        ));
        assert!(matches!(
            resolver.resolve_many(&[SortSpec::new("name", "asc"), SortSpec::new("NAME", "desc")]),
            Err(ValidationError::InvalidSortField(_))
        ));
    }

    #[test]
    fn too_many_fields_is_rejected() {
        let schema = schema();
        let specs = vec![
            SortSpec::new("name", "asc"),
            SortSpec::new("price", "asc"),
        ];
        assert!(SortResolver::new(&schema, 1).resolve_many(&specs).is_err());
        assert!(SortResolver::new(&schema, 2).resolve_many(&specs).is_ok());
    }

    #[test]
    fn bad_direction_is_rejected() {
        let schema = schema();
        assert!(matches!(
            SortResolver::new(&schema, 5).resolve("price", "up"),
            Err(ValidationError::InvalidSortDirection(_))
        ));
    }
}
