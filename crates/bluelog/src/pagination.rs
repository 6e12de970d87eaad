//! Page arithmetic shared by every paginated listing.

use serde::Serialize;

use crate::{AppError, AppResult};

const LEFT_EDGE: u32 = 2;
const LEFT_CURRENT: u32 = 2;
const RIGHT_CURRENT: u32 = 5;
const RIGHT_EDGE: u32 = 2;

/// One page of `items` out of `total` rows.
#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub pages: u32,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_num: Option<u32>,
    pub next_num: Option<u32>,
    /// Page numbers for the navigation bar, `None` marks an elided range.
    pub iter_pages: Vec<Option<u32>>,
}

impl<T> Page<T> {
    /// Builds the page. Page `0`, or an empty page past the first, does not exist.
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: i64) -> AppResult<Self> {
        if page == 0 || (items.is_empty() && page > 1) {
            return Err(AppError::NotFound);
        }
        let pages = page_count(total, per_page);
        let has_prev = page > 1;
        let has_next = page < pages;
        Ok(Self {
            items,
            page,
            per_page,
            total,
            pages,
            has_prev,
            has_next,
            prev_num: has_prev.then(|| page - 1),
            next_num: has_next.then(|| page + 1),
            iter_pages: iter_pages(page, pages),
        })
    }
}

/// Row offset of the first item on `page`.
#[must_use]
pub fn offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(per_page)
}

fn page_count(total: i64, per_page: u32) -> u32 {
    if per_page == 0 || total <= 0 {
        return 0;
    }
    let per_page = i64::from(per_page);
    u32::try_from((total + per_page - 1) / per_page).unwrap_or(u32::MAX)
}

fn iter_pages(page: u32, pages: u32) -> Vec<Option<u32>> {
    let mut out = Vec::new();
    let mut last = 0;
    for num in 1..=pages {
        let near_left = num <= LEFT_EDGE;
        let near_current = num + LEFT_CURRENT + 1 > page && num < page + RIGHT_CURRENT;
        let near_right = num + RIGHT_EDGE > pages;
        if near_left || near_current || near_right {
            if last + 1 != num {
                out.push(None);
            }
            out.push(Some(num));
            last = num;
        }
    }
    out
}
