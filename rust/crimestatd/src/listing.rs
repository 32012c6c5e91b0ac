//! Column sorting and paging for admin list views.
//!
//! Sorting is only applied when both a known column and a direction are supplied;
//! anything else falls back to the table's default order. Tie-break columns are
//! always ascending, whatever the primary direction.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Some(SortDirection::Ascending),
            "descending" | "desc" => Some(SortDirection::Descending),
            _ => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// A sortable column: the `sortBy` name, its SQL expression, and ascending tie-breakers.
pub struct SortKey {
    pub name: &'static str,
    pub expr: &'static str,
    pub then: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub sort_by: Option<String>,
    pub sort_direction: Option<SortDirection>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            sort_by: None,
            sort_direction: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListQuery {
    pub fn from_params(params: &serde_json::Value) -> Result<Self, String> {
        let sort_by = params
            .get("sortBy")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let sort_direction = params
            .get("sortDirection")
            .and_then(|v| v.as_str())
            .and_then(SortDirection::parse);

        let page = match params.get("page") {
            None | Some(serde_json::Value::Null) => 1,
            Some(v) => match v.as_u64() {
                Some(n) if n >= 1 => n.min(u32::MAX as u64) as u32,
                _ => return Err("page must be a positive integer".into()),
            },
        };
        let page_size = match params.get("pageSize") {
            None | Some(serde_json::Value::Null) => DEFAULT_PAGE_SIZE,
            Some(v) => match v.as_u64() {
                Some(n) if n >= 1 => n.min(MAX_PAGE_SIZE as u64) as u32,
                _ => return Err("pageSize must be a positive integer".into()),
            },
        };

        Ok(Self {
            sort_by,
            sort_direction,
            page,
            page_size,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.page_size as i64
    }

    pub fn order_by(&self, keys: &[SortKey], default: &str) -> String {
        let (Some(sort_by), Some(dir)) = (self.sort_by.as_deref(), self.sort_direction) else {
            return format!("ORDER BY {default}");
        };
        let Some(key) = keys.iter().find(|k| k.name == sort_by) else {
            return format!("ORDER BY {default}");
        };
        let mut parts = vec![format!("{} {}", key.expr, dir.sql())];
        parts.extend(key.then.iter().map(|t| format!("{t} ASC")));
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub page_count: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, query: &ListQuery) -> Self {
        let size = query.page_size.max(1) as i64;
        Self {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
            page_count: (total + size - 1) / size,
        }
    }
}
