use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, warn};

use crate::guard::validate_read_only_sql;
use crate::models::rows::{Cell, Row, encode_rows};

pub const SAMPLE_ROWS_PER_TABLE: usize = 3;
pub const DEFAULT_ROW_CAP: usize = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(Vec<Row>),
    /// Always starts with `Error:`.
    Failed(String),
}

impl QueryOutcome {
    #[must_use]
    pub fn into_tool_content(self) -> String {
        match self {
            Self::Rows(rows) => encode_rows(&rows),
            Self::Failed(message) => message,
        }
    }
}

/// SQL engine consumed by the agent. `run_no_throw` reports failures as
/// `Error:` text instead of returning `Err`.
pub trait SqlDatabase: Send + Sync {
    fn list_tables(&self) -> Result<Vec<String>>;

    /// DDL plus a few sample rows for each named table.
    fn table_info(&self, tables: &[String]) -> Result<String>;

    fn run_no_throw(&self, query: &str) -> QueryOutcome;
}

pub struct SqliteDatabase {
    connection: Mutex<Connection>,
    row_cap: usize,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("row_cap", &self.row_cap)
            .finish_non_exhaustive()
    }
}

impl SqliteDatabase {
    pub fn open_read_only(path: &Path, row_cap: usize) -> Result<Self> {
        if !path.is_file() {
            bail!("sqlite database not found: {}", path.display());
        }
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open sqlite database: {}", path.display()))?;
        Ok(Self::from_connection(connection, row_cap))
    }

    #[must_use]
    pub fn from_connection(connection: Connection, row_cap: usize) -> Self {
        Self {
            connection: Mutex::new(connection),
            row_cap: row_cap.max(1),
        }
    }

    fn with_connection<T>(&self, action: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock was poisoned"))?;
        action(&connection)
    }

    fn execute(&self, query: &str) -> Result<Vec<Row>> {
        let row_cap = self.row_cap;
        self.with_connection(|connection| {
            let mut statement = connection.prepare(query)?;
            let column_count = statement.column_count();
            let mut rows = statement.query([])?;
            let mut result_rows = Vec::new();
            while let Some(row) = rows.next()? {
                if result_rows.len() >= row_cap {
                    debug!(row_cap, "sqlite: result truncated at row cap");
                    break;
                }
                let mut record = Vec::with_capacity(column_count);
                for index in 0..column_count {
                    record.push(cell_from_sql(row.get::<usize, SqlValue>(index)?));
                }
                result_rows.push(record);
            }
            Ok(result_rows)
        })
    }
}

impl SqlDatabase for SqliteDatabase {
    fn list_tables(&self) -> Result<Vec<String>> {
        self.with_connection(|connection| {
            let mut statement = connection
                .prepare(
                    "SELECT name FROM sqlite_schema
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                     ORDER BY name ASC",
                )
                .context("failed to prepare table listing query")?;
            let names = statement
                .query_map([], |row| row.get::<usize, String>(0))
                .context("failed to list sqlite tables")?;
            names
                .map(|name| name.context("failed to decode sqlite table name"))
                .collect()
        })
    }

    fn table_info(&self, tables: &[String]) -> Result<String> {
        self.with_connection(|connection| {
            let mut sections = Vec::with_capacity(tables.len());
            for table in tables {
                let ddl = connection
                    .query_row(
                        "SELECT sql FROM sqlite_schema WHERE type = 'table' AND name = ?1",
                        params![table],
                        |row| row.get::<usize, String>(0),
                    )
                    .with_context(|| format!("table `{table}` not found in sqlite_schema"))?;
                let samples = sample_rows(connection, table)?;
                sections.push(format!("{}\n\n{samples}", ddl.trim()));
            }
            Ok(sections.join("\n\n"))
        })
    }

    fn run_no_throw(&self, query: &str) -> QueryOutcome {
        if let Err(violation) = validate_read_only_sql(query) {
            warn!(%violation, "sqlite: refused query");
            return QueryOutcome::Failed(format!("Error: {violation}"));
        }
        match self.execute(query) {
            Ok(rows) => QueryOutcome::Rows(rows),
            Err(error) => QueryOutcome::Failed(format!("Error: {error:#}")),
        }
    }
}

/// Rows that answer `SELECT name FROM users`, for the guide message.
#[must_use]
pub fn list_known_names(database: &dyn SqlDatabase, limit: usize) -> Vec<String> {
    match database.run_no_throw("SELECT name FROM users LIMIT 20") {
        QueryOutcome::Rows(rows) => rows
            .into_iter()
            .filter_map(|row| match row.into_iter().next() {
                Some(Cell::Text(name)) => Some(name),
                _ => None,
            })
            .take(limit)
            .collect(),
        QueryOutcome::Failed(_) => Vec::new(),
    }
}

fn sample_rows(connection: &Connection, table: &str) -> Result<String> {
    let query = format!(
        "SELECT * FROM {} LIMIT {SAMPLE_ROWS_PER_TABLE}",
        sqlite_double_quoted(table)
    );
    let mut statement = connection
        .prepare(&query)
        .with_context(|| format!("failed to prepare sample rows for `{table}`"))?;
    let column_names = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    let mut rows = statement
        .query([])
        .with_context(|| format!("failed to read sample rows for `{table}`"))?;

    let mut rendered = format!(
        "/*\n{SAMPLE_ROWS_PER_TABLE} rows from {table} table:\n{}",
        column_names.join("\t")
    );
    while let Some(row) = rows
        .next()
        .with_context(|| format!("failed to fetch sample row for `{table}`"))?
    {
        let mut cells = Vec::with_capacity(column_names.len());
        for index in 0..column_names.len() {
            let value = row
                .get::<usize, SqlValue>(index)
                .with_context(|| format!("failed to decode sample column for `{table}`"))?;
            cells.push(cell_from_sql(value).to_string());
        }
        rendered.push('\n');
        rendered.push_str(&cells.join("\t"));
    }
    rendered.push_str("\n*/");
    Ok(rendered)
}

fn cell_from_sql(value: SqlValue) -> Cell {
    match value {
        SqlValue::Null => Cell::Null,
        SqlValue::Integer(value) => Cell::Integer(value),
        SqlValue::Real(value) => Cell::Real(value),
        SqlValue::Text(value) => Cell::Text(value),
        SqlValue::Blob(value) => Cell::Text(encode_blob_hex(&value)),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[usize::from(byte >> 4)] as char);
        output.push(HEX[usize::from(byte & 0x0f)] as char);
    }
    output
}

fn sqlite_double_quoted(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
