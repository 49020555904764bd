//! Windowing for batch reads.

use serde::Deserialize;

/// Default number of rows per batch
pub const DEFAULT_BATCH_SIZE: u64 = 20;

/// Default starting page number (1-indexed)
pub const DEFAULT_PAGE_NUMBER: u64 = 1;

/// `LIMIT`/`OFFSET` window applied to a batch read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    DEFAULT_BATCH_SIZE
}

impl Pagination {
    pub const fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Window for a 1-indexed page. Page 0 is treated as page 1.
    pub const fn page(page: u64, per_page: u64) -> Self {
        Self {
            limit: per_page,
            offset: page.saturating_sub(1).saturating_mul(per_page),
        }
    }

    /// The window following this one
    pub const fn next(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset.saturating_add(self.limit),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::page(DEFAULT_PAGE_NUMBER, DEFAULT_BATCH_SIZE)
    }
}
