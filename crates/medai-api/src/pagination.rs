use serde::Serialize;

/// Page envelope shared by the history listings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Paginated<T> {
    pub page: u32,
    pub limit: u32,
    pub total_records: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(page: u32, limit: u32, total_records: u64, data: Vec<T>) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total_records.div_ceil(u64::from(limit))
        };
        Self {
            page,
            limit,
            total_records,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
            data,
        }
    }

    /// Row offset of the first item on `page`.
    pub fn offset(page: u32, limit: u32) -> u64 {
        u64::from(page.saturating_sub(1)) * u64::from(limit)
    }
}
