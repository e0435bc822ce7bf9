use serde::{Deserialize, Serialize};

/// Page-numbered response envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OffsetPage<T> {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
    pub items: Vec<T>,
}

impl<T> OffsetPage<T> {
    /// Map items while preserving page metadata (record -> list view).
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> OffsetPage<U> {
        OffsetPage {
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Cursor response envelope. Never carries a total.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> CursorPage<T> {
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}

/// Either envelope; serializes as the bare inner shape.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListResult<T> {
    Offset(OffsetPage<T>),
    Cursor(CursorPage<T>),
}

impl<T> ListResult<T> {
    pub fn items(&self) -> &[T] {
        match self {
            ListResult::Offset(p) => &p.items,
            ListResult::Cursor(p) => &p.items,
        }
    }

    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> ListResult<U> {
        match self {
            ListResult::Offset(p) => ListResult::Offset(p.map_items(f)),
            ListResult::Cursor(p) => ListResult::Cursor(p.map_items(f)),
        }
    }

    pub fn into_offset(self) -> Option<OffsetPage<T>> {
        match self {
            ListResult::Offset(p) => Some(p),
            ListResult::Cursor(_) => None,
        }
    }

    pub fn into_cursor(self) -> Option<CursorPage<T>> {
        match self {
            ListResult::Cursor(p) => Some(p),
            ListResult::Offset(_) => None,
        }
    }
}
