/// Rows per listing page.
pub const PAGE_SIZE: i64 = 50;

/// A 1-indexed listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page(i64);

impl Page {
    pub fn new(number: i64) -> Self {
        Self(number.max(1))
    }

    /// Lenient parse of a `page` query parameter: anything that is not an
    /// integer falls back to the first page.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse::<i64>().ok())
            .map(Self::new)
            .unwrap_or_default()
    }

    pub fn number(&self) -> i64 {
        self.0
    }

    pub fn limit(&self) -> i64 {
        PAGE_SIZE
    }

    pub fn offset(&self) -> i64 {
        (self.0 - 1).saturating_mul(PAGE_SIZE)
    }

    pub fn previous(&self) -> Option<Page> {
        (self.0 > 1).then(|| Page(self.0 - 1))
    }

    pub fn next(&self, total_pages: i64) -> Option<Page> {
        (self.0 < total_pages).then(|| Page(self.0 + 1))
    }
}

impl Default for Page {
    fn default() -> Self {
        Self(1)
    }
}

/// `ceil(total / PAGE_SIZE)`; zero rows means zero pages.
pub fn total_pages(total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (total + PAGE_SIZE - 1) / PAGE_SIZE
}
