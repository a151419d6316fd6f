use std::collections::HashSet;

use futures::try_join;
use tracing::debug;

use crate::application::context::ServiceContext;
use crate::application::error::{AppError, operation_failed};
use crate::application::repos::{Direction, Filter, Query, decode_all};
use crate::domain::entities::{Item, search_key};

/// Upper sentinel appended to a name prefix to close the range.
const PREFIX_END: char = '\u{ffff}';

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub name: Option<String>,
    pub category: Option<String>,
}

impl SearchFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            category: None,
        }
    }

    pub fn by_category(category: impl Into<String>) -> Self {
        Self {
            name: None,
            category: Some(category.into()),
        }
    }

    fn needle(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(search_key)
    }

    fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty())
    }
}

/// Half-open `[start, end)` range matching every key that starts with `needle`.
pub fn name_prefix_range(needle: &str) -> (String, String) {
    let mut end = String::with_capacity(needle.len() + PREFIX_END.len_utf8());
    end.push_str(needle);
    end.push(PREFIX_END);
    (needle.to_string(), end)
}

#[derive(Clone)]
pub struct SearchService {
    ctx: ServiceContext,
}

impl SearchService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Items matching the name prefix or the category; both filters are
    /// unioned by id. Without a usable filter nothing is queried.
    pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<Item>, AppError> {
        let needle = filter.needle();
        let category = filter.category();

        let items = match (needle.as_deref(), category) {
            (None, None) => return Ok(Vec::new()),
            (Some(needle), None) => self.run(self.name_query(needle)).await?,
            (None, Some(category)) => self.run(self.category_query(category)).await?,
            (Some(needle), Some(category)) => {
                let (by_name, by_category) = try_join!(
                    self.run(self.name_query(needle)),
                    self.run(self.category_query(category)),
                )?;
                union_by_id(by_name, by_category)
            }
        };

        debug!(
            target = "bidhall::search",
            name = needle.as_deref().unwrap_or(""),
            category = category.unwrap_or(""),
            results = items.len(),
            "search finished"
        );

        self.ctx.state.items().merge(
            items
                .iter()
                .map(|item| (item.id.clone(), item.clone())),
        );
        Ok(items)
    }

    fn name_query(&self, needle: &str) -> Query {
        let (start, end) = name_prefix_range(needle);
        Query::collection(&self.ctx.collections.items)
            .filter(Filter::Gte {
                field: "nameLowerCase".to_string(),
                value: start.into(),
            })
            .filter(Filter::Lt {
                field: "nameLowerCase".to_string(),
                value: end.into(),
            })
            .order_by("nameLowerCase", Direction::Ascending)
    }

    fn category_query(&self, category: &str) -> Query {
        Query::collection(&self.ctx.collections.items).filter(Filter::ArrayContains {
            field: "categories".to_string(),
            value: category.into(),
        })
    }

    async fn run(&self, query: Query) -> Result<Vec<Item>, AppError> {
        let documents = self
            .ctx
            .documents
            .query(&query)
            .await
            .map_err(operation_failed("search"))?;
        decode_all(&documents, &query.collection).map_err(operation_failed("search"))
    }
}

fn union_by_id(first: Vec<Item>, second: Vec<Item>) -> Vec<Item> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}
