use serde::Serialize;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_ITEMS: usize = 25;

/// Requested page window. Both values are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub items: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: DEFAULT_PAGE,
            items: DEFAULT_ITEMS,
        }
    }
}

impl PageRequest {
    /// Lenient parse of the `page` / `items` query values: anything missing,
    /// non-numeric or zero falls back to the default.
    pub fn parse(page: Option<&str>, items: Option<&str>) -> Self {
        fn positive(raw: Option<&str>, default: usize) -> usize {
            raw.and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|v| *v >= 1)
                .unwrap_or(default)
        }

        PageRequest {
            page: positive(page, DEFAULT_PAGE),
            items: positive(items, DEFAULT_ITEMS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingState {
    pub page: usize,
    pub items: usize,
    pub total: usize,
    pub max_page: usize,
}

/// Paging block as rendered in listing responses.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct PagingBlock {
    pub page: usize,
    pub items: usize,
    pub total: usize,
    pub max_page: usize,
    pub current: String,
    pub previous: Option<String>,
    pub next: Option<String>,
}

impl PagingState {
    /// Renders the paging block with links relative to `path`.
    pub fn block(&self, path: &str) -> PagingBlock {
        let link = |page: usize| format!("{}?page={}&items={}", path, page, self.items);

        PagingBlock {
            page: self.page,
            items: self.items,
            total: self.total,
            max_page: self.max_page,
            current: link(self.page),
            previous: (self.page > 1).then(|| link((self.page - 1).min(self.max_page))),
            next: (self.page < self.max_page).then(|| link(self.page + 1)),
        }
    }
}

/// Slices `children` to the requested page.
///
/// Pages past the end produce an empty slice; this never fails.
pub fn paginate<T>(children: Vec<T>, request: PageRequest) -> (Vec<T>, PagingState) {
    let total = children.len();
    let items = request.items.max(1);
    let page = request.page.max(1);
    let max_page = total.div_ceil(items).max(1);

    let start = (page - 1).saturating_mul(items);
    let slice = if start >= total {
        Vec::new()
    } else {
        children.into_iter().skip(start).take(items).collect()
    };

    (
        slice,
        PagingState {
            page,
            items,
            total,
            max_page,
        },
    )
}
