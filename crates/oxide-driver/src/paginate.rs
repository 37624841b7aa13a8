//! Page-by-page access to a SELECT.

use oxide_query::Select;

use crate::connection::Row;
use crate::driver::Driver;
use crate::error::Result;
use crate::execute::ExecuteExt;

/// One page of results and where it sits among the others.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Row>,
    pub current: u64,
    pub prev: u64,
    pub next: u64,
    pub last: u64,
    pub total_pages: u64,
    pub total_items: u64,
    /// 1-based number of the first item on the page.
    pub first_item: u64,
    pub last_item: u64,
    pub limit: u64,
}

/// Splits a SELECT into pages of `limit` rows.
///
/// A count query (`COUNT(*) AS total_items`, without LIMIT and ORDER BY)
/// sizes the result, then the page window is fetched with LIMIT/OFFSET. In
/// reverse mode pages are counted from the end of the result and each
/// page's items come back in reverse order.
#[derive(Debug, Clone)]
pub struct Paginator {
    builder: Select,
    limit: u64,
    page: u64,
    reverse: bool,
}

impl Paginator {
    /// Paginates `builder` ten rows at a time, starting at page 1.
    #[must_use]
    pub const fn new(builder: Select) -> Self {
        Self {
            builder,
            limit: 10,
            page: 1,
            reverse: false,
        }
    }

    /// Rows per page; 0 puts everything on one page.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// 1-based page number to fetch.
    #[must_use]
    pub const fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub const fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn set_current_page(&mut self, page: u64) {
        self.page = page;
    }

    /// Runs the count and window queries.
    ///
    /// # Errors
    ///
    /// Returns compilation or execution errors of either query.
    pub fn paginate(&self, driver: &mut Driver) -> Result<Page> {
        let count = self
            .builder
            .clone()
            .columns(&["COUNT(*) AS total_items"])
            .clear_limit()
            .clear_order_by();
        let total_items: u64 = count
            .execute(driver)?
            .fetch_all()?
            .iter()
            .filter_map(|row| row.get_i64("total_items"))
            .map(|n| u64::try_from(n).unwrap_or(0))
            .sum();

        let last_page = if self.limit == 0 {
            1
        } else {
            total_items.div_ceil(self.limit)
        };
        let offset = self.page.saturating_sub(1) * self.limit;

        let mut items = Vec::new();
        if self.page <= last_page {
            let (mut query_limit, mut query_offset) = (self.limit, offset);
            if self.reverse && self.limit > 0 {
                // window counted from the end; the first page may be short
                match total_items.checked_sub(offset + self.limit) {
                    Some(from_end) => query_offset = from_end,
                    None => {
                        query_limit = total_items.saturating_sub(offset);
                        query_offset = 0;
                    }
                }
            }
            let window = self.builder.clone().limit(query_limit, query_offset);
            items = window.execute(driver)?.fetch_all()?;
            if self.reverse {
                items.reverse();
            }
        }

        let current = self.page.max(1);
        let item_count = items.len() as u64;
        Ok(Page {
            items,
            current,
            prev: current.saturating_sub(1).max(1),
            next: last_page.min(current + 1).max(1),
            last: last_page,
            total_pages: last_page,
            total_items,
            first_item: offset + 1,
            last_item: offset + item_count,
            limit: self.limit,
        })
    }
}
