//! Offset pagination with count-query short-circuiting
//!
//! A page is fetched with `LIMIT size OFFSET page * size`. The total normally
//! comes from a separate count query, except when the first page comes back
//! short: then no further rows can exist and the content length is the total.

use std::future::Future;

use serde::{Deserialize, Serialize};

use super::traits::{NullHandling, OrderDirection};
use crate::error::{QueryError, Result};

/// One sort term, addressed by entity property name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub property: String,
    pub direction: OrderDirection,
    pub null_handling: NullHandling,
}

impl Order {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: OrderDirection::Asc,
            null_handling: NullHandling::Native,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: OrderDirection::Desc,
            null_handling: NullHandling::Native,
        }
    }

    pub fn nulls_last(mut self) -> Self {
        self.null_handling = NullHandling::NullsLast;
        self
    }

    pub fn nulls_first(mut self) -> Self {
        self.null_handling = NullHandling::NullsFirst;
        self
    }
}

/// Ordered list of sort terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: orders.into_iter().collect(),
        }
    }

    pub fn and(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_sorted(&self) -> bool {
        !self.orders.is_empty()
    }
}

/// A zero-based page number and page size, or no paging at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: i64,
    size: Option<i64>,
    sort: Sort,
}

impl PageRequest {
    /// `page` is zero-based; `size` must be at least 1.
    pub fn of(page: i64, size: i64) -> Result<Self> {
        if page < 0 {
            return Err(QueryError::InvalidPage(format!(
                "page index must not be negative, got {}",
                page
            )));
        }
        if size < 1 {
            return Err(QueryError::InvalidPage(format!(
                "page size must be at least 1, got {}",
                size
            )));
        }
        if page.checked_mul(size).is_none() {
            return Err(QueryError::InvalidPage(format!(
                "offset of page {} with size {} is out of range",
                page, size
            )));
        }
        Ok(Self {
            page,
            size: Some(size),
            sort: Sort::unsorted(),
        })
    }

    /// Everything on one page, no offset or limit applied.
    pub fn unpaged() -> Self {
        Self {
            page: 0,
            size: None,
            sort: Sort::unsorted(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Clamp the page size to `max`.
    pub fn with_max_size(mut self, max: i64) -> Self {
        if let Some(size) = self.size {
            self.size = Some(size.min(max.max(1)));
        }
        self
    }

    pub fn page_number(&self) -> i64 {
        self.page
    }

    /// `None` when unpaged.
    pub fn page_size(&self) -> Option<i64> {
        self.size
    }

    pub fn offset(&self) -> i64 {
        self.size.map(|size| self.page * size).unwrap_or(0)
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn is_paged(&self) -> bool {
        self.size.is_some()
    }

    /// The following page; `None` when its offset would be out of range.
    pub fn next(&self) -> Option<Self> {
        let page = self.page.checked_add(1)?;
        if let Some(size) = self.size {
            page.checked_mul(size)?;
        }
        Some(Self {
            page,
            ..self.clone()
        })
    }
}

/// Total known from the content alone, without counting.
///
/// Only an unpaged request, or a first page that came back shorter than
/// the page size, proves there is nothing beyond what was returned.
pub fn short_circuit_total(request: &PageRequest, content_len: usize) -> Option<i64> {
    let content_len = content_len as i64;
    match request.page_size() {
        None => Some(content_len),
        Some(size) if request.offset() == 0 && content_len < size => Some(content_len),
        Some(_) => None,
    }
}

/// Synchronous form of the total decision; `count` runs only when needed.
pub fn resolve_total(
    request: &PageRequest,
    content_len: usize,
    count: impl FnOnce() -> i64,
) -> i64 {
    short_circuit_total(request, content_len).unwrap_or_else(count)
}

/// One page of results and the total across all pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    content: Vec<T>,
    request: PageRequest,
    total: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            content,
            request,
            total,
        }
    }

    /// Build a page, running `count` only when the total cannot be derived
    /// from `content`.
    pub async fn resolve<F, Fut>(content: Vec<T>, request: PageRequest, count: F) -> Result<Self>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<i64>>,
    {
        let total = match short_circuit_total(&request, content.len()) {
            Some(total) => {
                tracing::debug!(total, "Count query skipped");
                total
            }
            None => count().await?,
        };
        Ok(Self::new(content, request, total))
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn number(&self) -> i64 {
        self.request.page_number()
    }

    /// Requested page size (the content length when unpaged).
    pub fn size(&self) -> i64 {
        self.request
            .page_size()
            .unwrap_or(self.content.len() as i64)
    }

    pub fn total_pages(&self) -> i64 {
        match self.request.page_size() {
            Some(size) => self.total / size + i64::from(self.total % size != 0),
            None => 1,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number() < self.total_pages() - 1
    }

    pub fn has_previous(&self) -> bool {
        self.number() > 0
    }

    pub fn is_first(&self) -> bool {
        !self.has_previous()
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            request: self.request,
            total: self.total,
        }
    }
}
