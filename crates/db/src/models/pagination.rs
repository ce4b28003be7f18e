use schemars::JsonSchema;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, FromQueryResult, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u64 = 15;
pub const MAX_PER_PAGE: u64 = 100;

/// A 1-based page request, already clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub per_page: u64,
}

impl Page {
    pub fn new(page: Option<u64>, per_page: Option<u64>, default_per_page: u64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).clamp(1, MAX_PER_PAGE),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None, DEFAULT_PER_PAGE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

impl<T> Paginated<T> {
    pub fn empty(page: Page) -> Self {
        Self {
            data: Vec::new(),
            current_page: page.page,
            per_page: page.per_page,
            total: 0,
            last_page: 1,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

pub(crate) async fn fetch_page<'db, C, E>(
    db: &'db C,
    select: Select<E>,
    page: Page,
) -> Result<Paginated<E::Model>, DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: FromQueryResult + Sized + Send + Sync + 'db,
{
    let paginator = select.paginate(db, page.per_page);
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(page.page - 1).await?;
    Ok(Paginated {
        data,
        current_page: page.page,
        per_page: page.per_page,
        total,
        last_page: total.div_ceil(page.per_page).max(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_are_clamped() {
        let page = Page::new(Some(0), Some(0), DEFAULT_PER_PAGE);
        assert_eq!(page, Page { page: 1, per_page: 1 });

        let page = Page::new(None, Some(10_000), DEFAULT_PER_PAGE);
        assert_eq!(page.per_page, MAX_PER_PAGE);

        let page = Page::new(Some(3), None, 20);
        assert_eq!(page, Page { page: 3, per_page: 20 });
    }
}
