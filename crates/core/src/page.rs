//! Offset pagination.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 1000;

/// `skip`/`limit` window for list calls.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub skip: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(skip: u64, limit: u64) -> DomainResult<Self> {
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
            )));
        }
        Ok(Self { skip, limit })
    }

    /// 1-based page number helper (`page=1` is the first page).
    pub fn page(number: u64, size: u64) -> DomainResult<Self> {
        let number = number.max(1);
        Self::new((number - 1).saturating_mul(size), size)
    }

    /// Same window with `limit` capped at `max`.
    pub fn capped(self, max: u64) -> Self {
        Self {
            skip: self.skip,
            limit: self.limit.min(max.max(1)),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results plus the total matching the same predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            skip: request.skip,
            limit: request.limit,
        }
    }

    /// `ceil(total / limit)`.
    pub fn pages(&self) -> u64 {
        if self.limit == 0 {
            0
        } else {
            self.total.div_ceil(self.limit)
        }
    }

    /// 1-based index of this page.
    pub fn page_number(&self) -> u64 {
        if self.limit == 0 {
            1
        } else {
            self.skip / self.limit + 1
        }
    }

    pub fn has_more(&self) -> bool {
        self.skip.saturating_add(self.items.len() as u64) < self.total
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        }
    }
}
