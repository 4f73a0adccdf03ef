use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> PageRequest {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub current_page: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Page<T> {
        Page {
            data,
            total,
            current_page: request.page,
            total_pages: total.div_ceil(u64::from(request.limit)),
        }
    }
}

/// WHERE-clause builder; every condition is AND-ed and every value is bound.
#[derive(Default)]
pub struct Filter {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Filter {
    pub fn new() -> Filter {
        Filter::default()
    }

    pub fn eq(&mut self, column: &str, value: &str) -> &mut Self {
        self.values.push(Value::Text(value.to_string()));
        self.clauses.push(format!("{} = ?{}", column, self.values.len()));
        self
    }

    pub fn contains(&mut self, column: &str, needle: &str) -> &mut Self {
        self.values.push(Value::Text(needle.to_string()));
        self.clauses
            .push(format!("instr({}, ?{}) > 0", column, self.values.len()));
        self
    }

    pub fn at_least(&mut self, column: &str, value: f64) -> &mut Self {
        self.values.push(Value::Real(value));
        self.clauses.push(format!("{} >= ?{}", column, self.values.len()));
        self
    }

    pub fn at_most(&mut self, column: &str, value: f64) -> &mut Self {
        self.values.push(Value::Real(value));
        self.clauses.push(format!("{} <= ?{}", column, self.values.len()));
        self
    }

    fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Counts and fetches one page in two round trips.
pub fn fetch_page<T, F>(
    conn: &Connection,
    table: &str,
    filter: &Filter,
    order_by: &str,
    request: PageRequest,
    map: F,
) -> rusqlite::Result<Page<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let where_clause = filter.where_clause();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}{}", table, where_clause),
        params_from_iter(filter.values.iter()),
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
        table,
        where_clause,
        order_by,
        request.limit,
        request.offset()
    ))?;
    let data = stmt
        .query_map(params_from_iter(filter.values.iter()), map)?
        .collect::<rusqlite::Result<Vec<T>>>()?;

    Ok(Page::new(data, total.max(0) as u64, request))
}
