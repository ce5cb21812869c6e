//! Pagination envelopes.
//!
//! The API uses two list envelopes side by side: cursor style
//! `{count, next, previous, results}` and numbered `{count, page, limit,
//! total_pages, results}`. Which one applies is per endpoint, so both are kept as
//! separate types and converted into [`Page`] for uniform consumption.

use serde::{Deserialize, Serialize};

/// Uniform page of items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

fn pages_for(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    ((total + page_size as u64 - 1) / page_size as u64) as u32
}

/// `{count, next, previous, results}` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPage<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> CursorPage<T> {
    /// Convert using the page number and size the request was made with
    pub fn into_page(self, page: u32, page_size: u32) -> Page<T> {
        Page {
            total_pages: pages_for(self.count, page_size),
            total_count: self.count,
            items: self.results,
            page,
            page_size,
        }
    }
}

/// `{count, page, limit, total_pages, results}` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberedPage<T> {
    pub count: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub results: Vec<T>,
}

impl<T> NumberedPage<T> {
    pub fn into_page(self) -> Page<T> {
        Page {
            items: self.results,
            page: self.page,
            page_size: self.limit,
            total_count: self.count,
            total_pages: self.total_pages,
        }
    }
}

/// Nested `pagination` object used by comment listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
}
