// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SQLite-flavoured compatibility surface over the table operations.
//
// Only a tiny vocabulary is understood:
//
// ```text
// SELECT ... FROM <table> [WHERE <field> = ? [AND ...]]
//     [ORDER BY <field> [ASC|DESC]] [LIMIT <n>] [OFFSET <n>]
// INSERT INTO <table> (...) VALUES (...)
// ```
//
// WHERE filtering is restricted to a fixed set of fields per call style:
// `get` honors `id` then `username`, `all` honors `category_id`, `shop_id`
// then `user_id`. Any other WHERE clause is ignored and the statement
// behaves as if it had none. Fields are matched as whole identifiers, so
// `user_id = ?` never counts as `id = ?`.

use serde_json::Value;
use tracing::{debug, info};

use crate::backend::StorageBackend;
use crate::condition::Condition;
use crate::document::Record;
use crate::store::Store;
use crate::value::compare_values;

const GET_FILTER_FIELDS: [&str; 2] = ["id", "username"];
const ALL_FILTER_FIELDS: [&str; 3] = ["category_id", "shop_id", "user_id"];

/// Statement category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Other,
}

/// Sort direction of an `ORDER BY` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// `ORDER BY <field> [ASC|DESC]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub order: SortOrder,
}

/// One `field = ?` term of a WHERE clause, with the index of its placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityFilter {
    pub field: String,
    pub placeholder: usize,
}

/// Structured form of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub kind: QueryKind,
    pub table: Option<String>,
    /// Whether a WHERE keyword was present at all.
    pub has_where: bool,
    pub filters: Vec<EqualityFilter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Whether an `INSERT` carried a `VALUES (...)` list.
    pub has_values: bool,
}

impl ParsedQuery {
    /// Parse `sql`. Unrecognised text parses as [`QueryKind::Other`].
    pub fn parse(sql: &str) -> Self {
        let tokens = tokenize(sql);
        let mut query = ParsedQuery {
            kind: QueryKind::Other,
            table: None,
            has_where: false,
            filters: Vec::new(),
            order_by: None,
            limit: None,
            offset: None,
            has_values: false,
        };

        match tokens.first() {
            Some(t) if t.eq_ignore_ascii_case("SELECT") => query.parse_select(&tokens),
            Some(t) if t.eq_ignore_ascii_case("INSERT") => query.parse_insert(&tokens),
            _ => {}
        }
        query
    }

    fn parse_select(&mut self, tokens: &[String]) {
        let Some(from) = position(tokens, 0, "FROM") else {
            return;
        };
        let Some(table) = tokens.get(from + 1).filter(|t| is_identifier(t)) else {
            return;
        };
        self.kind = QueryKind::Select;
        self.table = Some(table.clone());

        // Placeholders are numbered across the whole statement.
        let mut placeholder = tokens[..from].iter().filter(|t| *t == "?").count();
        let mut i = from + 2;
        while i < tokens.len() {
            let token = &tokens[i];
            if token.eq_ignore_ascii_case("WHERE") {
                self.has_where = true;
                i += 1;
            } else if token.eq_ignore_ascii_case("ORDER")
                && tokens.get(i + 1).is_some_and(|t| t.eq_ignore_ascii_case("BY"))
            {
                if let Some(field) = tokens.get(i + 2).filter(|t| is_identifier(t)) {
                    let order = match tokens.get(i + 3) {
                        Some(t) if t.eq_ignore_ascii_case("DESC") => SortOrder::Desc,
                        _ => SortOrder::Asc,
                    };
                    self.order_by = Some(OrderBy {
                        field: field.clone(),
                        order,
                    });
                }
                i += 3;
            } else if token.eq_ignore_ascii_case("LIMIT") {
                self.limit = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            } else if token.eq_ignore_ascii_case("OFFSET") {
                self.offset = tokens.get(i + 1).and_then(|t| t.parse().ok());
                i += 2;
            } else if self.has_where
                && is_identifier(token)
                && tokens.get(i + 1).is_some_and(|t| t == "=")
                && tokens.get(i + 2).is_some_and(|t| t == "?")
            {
                self.filters.push(EqualityFilter {
                    field: token.clone(),
                    placeholder,
                });
                placeholder += 1;
                i += 3;
            } else {
                if token == "?" {
                    placeholder += 1;
                }
                i += 1;
            }
        }
    }

    fn parse_insert(&mut self, tokens: &[String]) {
        if !tokens.get(1).is_some_and(|t| t.eq_ignore_ascii_case("INTO")) {
            return;
        }
        let Some(table) = tokens.get(2).filter(|t| is_identifier(t)) else {
            return;
        };
        self.kind = QueryKind::Insert;
        self.table = Some(table.clone());
        self.has_values = position(tokens, 3, "VALUES")
            .is_some_and(|at| tokens.get(at + 1).is_some_and(|t| t == "("));
    }

    /// The first allow-listed filter (in allow-list order) and the parameter
    /// bound to it.
    fn filter_condition(&self, allowed: &[&str], params: &[Value]) -> Option<Condition> {
        if !self.has_where || params.is_empty() {
            return None;
        }
        allowed.iter().find_map(|field| {
            let filter = self.filters.iter().find(|f| f.field == *field)?;
            let value = params.get(filter.placeholder)?;
            Some(Condition::field(*field, value.clone()))
        })
    }
}

/// Outcome of [`Statement::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunResult {
    /// The id reserved by an `INSERT`, or `None` for anything else.
    pub last_insert_rowid: Option<u64>,
}

/// A parsed statement bound to a store.
pub struct Statement<'a, B: StorageBackend> {
    store: &'a Store<B>,
    query: ParsedQuery,
}

impl<'a, B: StorageBackend + 'static> Statement<'a, B> {
    /// The parsed form of this statement.
    pub fn query(&self) -> &ParsedQuery {
        &self.query
    }

    /// First matching record of a `SELECT`, or `None`.
    pub async fn get(&self, params: &[Value]) -> Option<Record> {
        let table = self.select_table()?;
        let condition = self.query.filter_condition(&GET_FILTER_FIELDS, params);
        self.store.get(table, condition.as_ref()).await
    }

    /// All matching records of a `SELECT`, sorted and paginated as written.
    pub async fn all(&self, params: &[Value]) -> Vec<Record> {
        let Some(table) = self.select_table() else {
            return Vec::new();
        };
        let condition = self.query.filter_condition(&ALL_FILTER_FIELDS, params);
        let mut records = self.store.all(table, condition.as_ref()).await;

        if let Some(order_by) = &self.query.order_by {
            records.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order_by.field), b.get(&order_by.field));
                match order_by.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        paginate(records, self.query.offset, self.query.limit)
    }

    /// Execute a write statement.
    ///
    /// An `INSERT ... VALUES (...)` only reserves the next id of its table;
    /// no record is stored. Everything else is a no-op.
    pub async fn run(&self, params: &[Value]) -> RunResult {
        match (&self.query.kind, &self.query.table) {
            (QueryKind::Insert, Some(table)) if self.query.has_values => {
                let id = self.store.next_id(table).await;
                debug!(table = %table, id, params = params.len(), "Reserved id for INSERT");
                RunResult {
                    last_insert_rowid: Some(id),
                }
            }
            _ => RunResult::default(),
        }
    }

    fn select_table(&self) -> Option<&str> {
        match self.query.kind {
            QueryKind::Select => self.query.table.as_deref(),
            _ => None,
        }
    }
}

impl<B: StorageBackend + 'static> Store<B> {
    /// Parse `sql` into a [`Statement`] bound to this store.
    pub fn prepare(&self, sql: &str) -> Statement<'_, B> {
        Statement {
            store: self,
            query: ParsedQuery::parse(sql),
        }
    }

    /// Accept schema statements; tables already exist in the document.
    pub fn exec(&self, sql: &str) -> bool {
        let tokens = tokenize(sql);
        if tokens
            .windows(2)
            .any(|w| w[0].eq_ignore_ascii_case("CREATE") && w[1].eq_ignore_ascii_case("TABLE"))
        {
            info!("Table schema already present in document");
        }
        true
    }

    /// Accept and ignore a pragma.
    pub fn pragma(&self, setting: &str) -> bool {
        debug!(setting, "Ignoring pragma");
        true
    }
}

fn paginate(records: Vec<Record>, offset: Option<usize>, limit: Option<usize>) -> Vec<Record> {
    match (offset, limit) {
        (Some(offset), limit) => {
            let limit = limit.unwrap_or(records.len());
            records.into_iter().skip(offset).take(limit).collect()
        }
        (None, Some(limit)) => records.into_iter().take(limit).collect(),
        (None, None) => records,
    }
}

fn tokenize(sql: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in sql.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                quote = Some(c);
                current.push(c);
            }
            '=' | ',' | '(' | ')' | '?' | ';' | '*' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn position(tokens: &[String], start: usize, keyword: &str) -> Option<usize> {
    tokens
        .iter()
        .skip(start)
        .position(|t| t.eq_ignore_ascii_case(keyword))
        .map(|at| at + start)
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
