use listing_core::{CursorPage, OffsetPage};

use crate::offset::OffsetPlan;

/// Maps fetched records into the response envelopes, applying the list-view
/// projection.
pub struct ResultAssembler<F> {
    project: F,
}

impl<F> ResultAssembler<F> {
    pub fn new(project: F) -> Self {
        Self { project }
    }

    pub fn offset_page<R, T>(
        &mut self,
        records: Vec<R>,
        page: u64,
        page_size: u64,
        total: u64,
        plan: &OffsetPlan,
    ) -> OffsetPage<T>
    where
        F: FnMut(R) -> T,
    {
        OffsetPage {
            total,
            page,
            page_size,
            total_pages: plan.total_pages,
            has_next: plan.has_next,
            has_prev: plan.has_prev,
            items: records.into_iter().map(&mut self.project).collect(),
        }
    }

    pub fn cursor_page<R, T>(&mut self, page: CursorPage<R>) -> CursorPage<T>
    where
        F: FnMut(R) -> T,
    {
        page.map_items(&mut self.project)
    }
}

impl<R> ResultAssembler<fn(R) -> R> {
    /// Assembler that passes records through unchanged.
    pub fn identity() -> Self {
        Self::new(std::convert::identity::<R>)
    }
}
