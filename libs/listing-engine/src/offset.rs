use listing_core::ValidationError;

/// Validated fetch window for a page-numbered request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetWindow {
    pub skip: u64,
    pub limit: u64,
}

/// Window plus page metadata, computed once the total is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetPlan {
    pub skip: u64,
    pub limit: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct OffsetPaginator {
    max_page_size: u64,
}

impl OffsetPaginator {
    pub fn new(max_page_size: u64) -> Self {
        Self { max_page_size }
    }

    /// Bounds check, done before any store access.
    pub fn validate(&self, page: u64, page_size: u64) -> Result<OffsetWindow, ValidationError> {
        if page < 1 {
            return Err(ValidationError::out_of_range("page", "must be >= 1"));
        }
        if page_size < 1 || page_size > self.max_page_size {
            return Err(ValidationError::out_of_range(
                "page_size",
                format!("must be between 1 and {}", self.max_page_size),
            ));
        }
        let skip = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| ValidationError::out_of_range("page", "too large"))?;
        Ok(OffsetWindow {
            skip,
            limit: page_size,
        })
    }

    /// A page past the end is not an error: it plans an empty slice with
    /// `has_next = false`.
    pub fn plan(&self, page: u64, page_size: u64, total: u64) -> Result<OffsetPlan, ValidationError> {
        let window = self.validate(page, page_size)?;
        let total_pages = if total == 0 {
            1
        } else {
            total.div_ceil(page_size)
        };
        Ok(OffsetPlan {
            skip: window.skip,
            limit: window.limit,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_and_last_page_of_45() {
        let p = OffsetPaginator::new(100);

        let first = p.plan(1, 20, 45).unwrap();
        assert_eq!(first.skip, 0);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let last = p.plan(3, 20, 45).unwrap();
        assert_eq!(last.skip, 40);
        assert!(!last.has_next);
        assert!(last.has_prev);
    }

    #[test]
    fn empty_collection_has_one_page() {
        let plan = OffsetPaginator::new(100).plan(1, 20, 0).unwrap();
        assert_eq!(plan.total_pages, 1);
        assert!(!plan.has_next);
        assert!(!plan.has_prev);
    }

    #[test]
    fn page_past_end_is_tolerated() {
        let plan = OffsetPaginator::new(100).plan(9, 20, 45).unwrap();
        assert_eq!(plan.skip, 160);
        assert!(!plan.has_next);
        assert!(plan.has_prev);
    }

    #[test]
    fn exact_multiple() {
        let plan = OffsetPaginator::new(100).plan(2, 20, 40).unwrap();
        assert_eq!(plan.total_pages, 2);
        assert!(!plan.has_next);
    }

    #[test]
    fn bounds() {
        let p = OffsetPaginator::new(100);
        assert!(p.validate(1, 100).is_ok());
        for (page, size) in [(0, 20), (1, 0), (1, 101)] {
            let err = p.validate(page, size).unwrap_err();
            assert_eq!(err.code(), "OUT_OF_RANGE", "page={page} size={size}");
        }
        assert!(p.validate(u64::MAX, 100).is_err());
    }
}
