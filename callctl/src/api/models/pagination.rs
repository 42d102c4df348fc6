//! Pagination over an in-memory call snapshot.
//!
//! The dashboard pages through the already-fetched result set with `skip`
//! and `limit` query parameters; nothing here touches the provider. The
//! default page size matches the dashboard table (10 rows), and `limit` is
//! clamped between 1 and 100 to prevent both zero-result queries and
//! oversized responses.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default number of rows per page (one dashboard table page).
pub const DEFAULT_LIMIT: i64 = 10;

/// Maximum number of rows that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

/// Standard pagination parameters for snapshot list endpoints.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Number of rows to skip (default: 0)
    #[param(default = 0, minimum = 0)]
    pub skip: Option<i64>,

    /// Maximum number of rows to return (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    pub limit: Option<i64>,
}

impl Pagination {
    /// Get the skip value, defaulting to 0 if not specified.
    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// Get the limit value, clamped between 1 and MAX_LIMIT.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// The `[start, end)` index window into a result set of `total` rows.
    pub fn window(&self, total: usize) -> (usize, usize) {
        let start = (self.skip() as usize).min(total);
        let end = start.saturating_add(self.limit() as usize).min(total);
        (start, end)
    }
}

/// Generic paginated response wrapper for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// The rows for the current page
    pub data: Vec<T>,
    /// Total number of rows in the snapshot (before pagination)
    pub total_count: i64,
    /// Number of rows skipped
    pub skip: i64,
    /// Maximum rows returned per page
    pub limit: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total_count: i64, pagination: &Pagination) -> Self {
        Self {
            data,
            total_count,
            skip: pagination.skip(),
            limit: pagination.limit(),
        }
    }
}
