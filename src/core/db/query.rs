/// Query Execution Module
///
/// Prefix rewriting, statement execution and materialisation of result rows into
/// string-keyed maps.

use super::connection::Database;
use crate::core::{DbError, Result};
use rusqlite::{ffi, types::ValueRef, Connection, Params, Rows};
use std::collections::HashMap;
use tracing::{debug, error};

/// One result row: column name to the column value rendered as text.
pub type Row = HashMap<String, String>;

/// Text a SQL NULL is rendered as.
pub const NULL_TEXT: &str = "NULL";

/// Summary of a statement run through [`Database::exec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: u64,
    last_insert_id: Option<i64>,
}

impl ExecResult {
    /// Number of rows the statement changed
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Row id generated by the statement.
    ///
    /// # Errors
    ///
    /// Returns `DbError::InsertId` when the statement produced no rowid of its own.
    pub fn last_insert_id(&self) -> Result<i64> {
        self.last_insert_id
            .ok_or_else(|| DbError::InsertId("statement did not insert a row".to_string()))
    }
}

/// Rows fetched by one query, plus the first declared column of the first row.
///
/// Duplicate column names collapse in a `Row` (the last one wins), so the first
/// column's value is kept separately.
#[derive(Debug, Default)]
struct Fetched {
    rows: Vec<Row>,
    first_value: Option<String>,
}

impl Database {
    /// Executes a query and returns every row, in the order the store produced them.
    ///
    /// `#__` in `sql` is replaced with the table prefix; `params` bind positionally.
    ///
    /// # Errors
    ///
    /// - `DbError::Query` if the statement cannot be prepared or executed
    /// - `DbError::Columns` if the statement yields no columns
    /// - `DbError::Scan` if a column value cannot be read as text
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Row>> {
        let result = self.fetch(sql, params).map(|fetched| fetched.rows);
        self.policy().enforce(result)
    }

    /// First row of the query, or an empty row when there is none.
    pub fn row<P: Params>(&self, sql: &str, params: P) -> Result<Row> {
        let result = self
            .fetch(sql, params)
            .map(|fetched| fetched.rows.into_iter().next().unwrap_or_default());
        self.policy().enforce(result)
    }

    /// Value of the first declared column of the first row, or `""` when there are no rows.
    ///
    /// Meant for single-column queries such as `SELECT count(*) ...`.
    pub fn result<P: Params>(&self, sql: &str, params: P) -> Result<String> {
        let result = self
            .fetch(sql, params)
            .map(|fetched| fetched.first_value.unwrap_or_default());
        self.policy().enforce(result)
    }

    /// Executes a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Query` if the statement fails or returns rows.
    pub fn exec<P: Params>(&self, sql: &str, params: P) -> Result<ExecResult> {
        let result = self.run(sql, params);
        self.policy().enforce(result)
    }

    /// Executes an insert and returns the id of the row it created.
    ///
    /// # Errors
    ///
    /// `DbError::Query` if execution fails, `DbError::InsertId` if the statement created
    /// no rowid (not an insert, nothing inserted, or a `WITHOUT ROWID` table).
    pub fn exec_id<P: Params>(&self, sql: &str, params: P) -> Result<i64> {
        let result = self.run(sql, params).and_then(|summary| summary.last_insert_id());
        self.policy().enforce(result)
    }

    fn fetch<P: Params>(&self, sql: &str, params: P) -> Result<Fetched> {
        let sql = self.rewrite(sql);
        debug!("query: {}", sql);

        let result = query_on(&self.lock(), &sql, params);
        if let Err(e) = &result {
            error!("Query {:?} failed: {}", sql, e);
        }
        result
    }

    fn run<P: Params>(&self, sql: &str, params: P) -> Result<ExecResult> {
        let sql = self.rewrite(sql);
        debug!("exec: {}", sql);

        let result = execute_on(&self.lock(), &sql, params);
        if let Err(e) = &result {
            error!("Statement {:?} failed: {}", sql, e);
        }
        result
    }
}

fn query_on<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Fetched> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| DbError::Query(format!("Failed to prepare statement: {}", e)))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt
        .query(params)
        .map_err(|e| DbError::Query(format!("Query execution failed: {}", e)))?;
    fetch_rows(columns, rows)
}

/// Runs a statement with the connection's last-insert rowid cleared first, so a
/// non-zero rowid afterwards can only come from this statement. Inserts made by
/// triggers do not leak out: SQLite restores the value when a trigger finishes.
fn execute_on<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<ExecResult> {
    // SAFETY: the handle belongs to `conn`, which the caller holds locked for the
    // whole call, and the function only writes the connection's rowid slot.
    unsafe { ffi::sqlite3_set_last_insert_rowid(conn.handle(), 0) };

    let changed = conn
        .execute(sql, params)
        .map_err(|e| DbError::Query(format!("Statement execution failed: {}", e)))?;
    let rowid = conn.last_insert_rowid();
    Ok(ExecResult {
        rows_affected: changed as u64,
        last_insert_id: (rowid != 0).then_some(rowid),
    })
}

/// Drains an open cursor into rows. The cursor is dropped, and its statement reset,
/// on every return path.
fn fetch_rows(columns: Vec<String>, mut rows: Rows<'_>) -> Result<Fetched> {
    if columns.is_empty() {
        return Err(DbError::Columns("statement returned no columns".to_string()));
    }

    let mut fetched = Fetched::default();

    while let Some(row) = rows
        .next()
        .map_err(|e| DbError::Query(format!("Failed to read next row: {}", e)))?
    {
        let mut record = Row::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            let value = row
                .get_ref(idx)
                .map_err(|e| DbError::Scan(format!("column \"{}\": {}", name, e)))?;
            let text = render_value(name, value)?;
            if idx == 0 && fetched.rows.is_empty() {
                fetched.first_value = Some(text.clone());
            }
            record.insert(name.clone(), text);
        }
        fetched.rows.push(record);
    }

    Ok(fetched)
}

/// Renders a column value as text, matching what SQLite itself produces for
/// integers, reals and text.
///
/// Blobs that are valid UTF-8 come out as that text, any other blob as lowercase
/// hex. The two forms are not distinguishable: `X'6666'` (the text "ff") and `X'FF'`
/// both render as `"ff"`.
fn render_value(column: &str, value: ValueRef<'_>) -> Result<String> {
    match value {
        ValueRef::Null => Ok(NULL_TEXT.to_string()),
        ValueRef::Integer(i) => Ok(i.to_string()),
        ValueRef::Real(f) => Ok(format_real(f)),
        ValueRef::Text(t) => std::str::from_utf8(t)
            .map(str::to_owned)
            .map_err(|e| DbError::Scan(format!("column \"{}\" is not valid UTF-8: {}", column, e))),
        ValueRef::Blob(b) => Ok(match std::str::from_utf8(b) {
            Ok(s) => s.to_owned(),
            Err(_) => b.iter().map(|byte| format!("{:02x}", byte)).collect(),
        }),
    }
}

/// Formats a real the way SQLite casts it to text (`%!.15g`): 15 significant digits,
/// integral values keep a `.0`, exponent form outside `1e-4 <= |f| < 1e15`.
fn format_real(f: f64) -> String {
    if f.is_infinite() {
        return if f > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }

    // "d.dddddddddddddde<exp>", already rounded to 15 significant digits
    let sci = format!("{:.14e}", f);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return f.to_string();
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return f.to_string();
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.trim_end_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };

    if (-4..15).contains(&exp) {
        let (int_part, frac_part) = if exp >= 0 {
            let point = exp as usize + 1;
            let padded = format!("{:0<width$}", digits, width = point);
            let (int_part, frac_part) = padded.split_at(point);
            (int_part.to_string(), frac_part.to_string())
        } else {
            let zeros = "0".repeat((-exp - 1) as usize);
            ("0".to_string(), format!("{}{}", zeros, digits))
        };
        let frac_part = if frac_part.is_empty() { "0" } else { frac_part.as_str() };
        format!("{}{}.{}", sign, int_part, frac_part)
    } else {
        let (lead, rest) = digits.split_at(1);
        let rest = if rest.is_empty() { "0" } else { rest };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{}{}.{}e{}{:02}", sign, lead, rest, exp_sign, exp.abs())
    }
}
