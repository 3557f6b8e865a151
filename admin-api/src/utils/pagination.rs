use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw `?page=&limit=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn resolve(&self) -> Page {
        Page {
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// A normalized page: `page >= 1`, `1 <= limit <= MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: Page) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            let limit = i64::from(page.limit);
            u32::try_from((total + limit - 1) / limit).unwrap_or(u32::MAX)
        };

        Self {
            items,
            total,
            page: page.page,
            limit: page.limit,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(PageParams::default().resolve(), Page { page: 1, limit: DEFAULT_PAGE_SIZE });

        let params = PageParams { page: Some(0), limit: Some(0) };
        assert_eq!(params.resolve(), Page { page: 1, limit: 1 });

        let params = PageParams { page: Some(3), limit: Some(500) };
        assert_eq!(params.resolve(), Page { page: 3, limit: MAX_PAGE_SIZE });
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(Page { page: 1, limit: 20 }.offset(), 0);
        assert_eq!(Page { page: 4, limit: 25 }.offset(), 75);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Page { page: 1, limit: 20 };
        assert_eq!(Paginated::<()>::new(vec![], 0, page).total_pages, 0);
        assert_eq!(Paginated::<()>::new(vec![], 20, page).total_pages, 1);
        assert_eq!(Paginated::<()>::new(vec![], 21, page).total_pages, 2);
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Page { page: 2, limit: 2 };
        let mapped = Paginated::new(vec![1, 2], 5, page).map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total_pages, 3);
        assert_eq!(mapped.page, 2);
    }
}
