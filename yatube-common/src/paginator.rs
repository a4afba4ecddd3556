//! Page-number pagination over ordered result sets.
//!
//! Page lookup is forgiving: a missing or non-numeric page number resolves to
//! the first page and anything out of range resolves to the last page. An
//! empty result set still has one, empty, page.

use serde::Serialize;
use std::num::NonZeroUsize;

pub const DEFAULT_PAGE_SIZE: NonZeroUsize = NonZeroUsize::new(10).unwrap();

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Paginator {
    per_page: NonZeroUsize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    #[must_use]
    pub fn new(per_page: NonZeroUsize) -> Self {
        Self { per_page }
    }

    #[must_use]
    pub fn per_page(self) -> usize {
        self.per_page.get()
    }

    #[must_use]
    pub fn num_pages(self, count: usize) -> usize {
        count.div_ceil(self.per_page()).max(1)
    }

    /// Resolves the raw `page` query value against `count` matching items.
    #[must_use]
    pub fn window(self, requested: Option<&str>, count: usize) -> PageWindow {
        let num_pages = self.num_pages(count);
        let number = match requested.map(|raw| raw.trim().parse::<i64>()) {
            None | Some(Err(_)) => 1,
            Some(Ok(number)) => usize::try_from(number)
                .ok()
                .filter(|&number| (1..=num_pages).contains(&number))
                .unwrap_or(num_pages),
        };

        PageWindow {
            number,
            num_pages,
            count,
            offset: (number - 1) * self.per_page(),
            limit: self.per_page(),
        }
    }

    /// Paginates an already materialized, ordered list.
    #[must_use]
    pub fn paginate<T>(self, items: Vec<T>, requested: Option<&str>) -> Page<T> {
        let window = self.window(requested, items.len());
        let page_items = items
            .into_iter()
            .skip(window.offset)
            .take(window.limit)
            .collect();

        window.into_page(page_items)
    }
}

/// The slice of a result set one page covers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageWindow {
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    #[must_use]
    pub fn into_page<T>(self, object_list: Vec<T>) -> Page<T> {
        Page {
            object_list,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_previous: self.number > 1,
            has_next: self.number < self.num_pages,
            previous_page_number: (self.number > 1).then(|| self.number - 1),
            next_page_number: (self.number < self.num_pages).then(|| self.number + 1),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<usize>,
    pub next_page_number: Option<usize>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.object_list.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.object_list.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.object_list.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.object_list.iter()
    }
}

impl<'a, T> IntoIterator for &'a Page<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
