//! Data source abstraction layer for chartsql
//!
//! Chart queries are only constructed by chartsql; executing them is the job
//! of a [`Reader`]. Any engine that runs SQL text and returns a Polars
//! DataFrame can back a render.
//!
//! # Example
//!
//! ```rust,ignore
//! use chartsql::reader::{CachedReader, DuckDBReader, Reader};
//!
//! let reader = CachedReader::new(DuckDBReader::from_connection_string("duckdb://memory")?);
//! let df = reader.execute("SELECT * FROM sales")?;
//! // after loading new data
//! reader.invalidate();
//! ```

use crate::sql::{Expr, Select};
use crate::{ChartsqlError, DataFrame, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::debug;

#[cfg(feature = "duckdb")]
pub mod duckdb;

pub mod connection;

#[cfg(feature = "duckdb")]
pub use duckdb::DuckDBReader;

/// Trait for data source readers
pub trait Reader {
    /// Execute a SQL query and return the result as a DataFrame
    ///
    /// Statements without a result set (`CREATE`, `INSERT`, ...) return an
    /// empty frame.
    ///
    /// # Errors
    ///
    /// Returns `ChartsqlError::ReaderError` if the SQL is invalid, the
    /// connection fails or a referenced table or column does not exist.
    fn execute(&self, sql: &str) -> Result<DataFrame>;

    /// Check that `columns` exist in `table`
    ///
    /// Runs [`schema_probe`] and compares the returned column names.
    fn validate_columns(&self, table: &str, columns: &[String]) -> Result<()> {
        let df = self.execute(&schema_probe(table))?;
        let available: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        for col in columns {
            if !available.contains(col) {
                return Err(ChartsqlError::ValidationError(format!(
                    "Column '{}' not found in table '{}'. Available columns: {}",
                    col,
                    table,
                    available.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Zero-row query exposing the schema of a table
pub fn schema_probe(table: &str) -> String {
    let mut select = Select::from_table(table).select(Expr::Star);
    select.filter = Some(Expr::boolean(false));
    select.into_query().to_string()
}

/// Whether `sql` is a statement that produces no result set
pub(crate) fn is_statement(sql: &str) -> bool {
    let upper = sql.trim_start().to_uppercase();
    [
        "CREATE ", "DROP ", "INSERT ", "UPDATE ", "DELETE ", "ALTER ", "COPY ",
    ]
    .iter()
    .any(|keyword| upper.starts_with(keyword))
}

// =============================================================================
// Caching
// =============================================================================

/// Reader memoizing query results by exact SQL text.
///
/// Results stay cached until [`CachedReader::invalidate`] is called, so the
/// caller must invalidate after mutating the underlying data. Statements are
/// passed through uncached.
pub struct CachedReader<R> {
    inner: R,
    cache: RefCell<HashMap<String, DataFrame>>,
}

impl<R: Reader> CachedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Drop every cached result
    pub fn invalidate(&self) {
        let dropped = self.cache.borrow().len();
        self.cache.borrow_mut().clear();
        debug!("Invalidated {} cached result(s)", dropped);
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }
}

impl<R: Reader> Reader for CachedReader<R> {
    fn execute(&self, sql: &str) -> Result<DataFrame> {
        if is_statement(sql) {
            return self.inner.execute(sql);
        }
        if let Some(df) = self.cache.borrow().get(sql) {
            debug!("Cache hit ({} rows)", df.height());
            return Ok(df.clone());
        }
        let df = self.inner.execute(sql)?;
        self.cache.borrow_mut().insert(sql.to_string(), df.clone());
        Ok(df)
    }
}

impl<R: Reader + ?Sized> Reader for &R {
    fn execute(&self, sql: &str) -> Result<DataFrame> {
        (**self).execute(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use std::cell::Cell;

    /// Counts executions and returns a one-column frame
    struct CountingReader {
        calls: Cell<usize>,
    }

    impl Reader for CountingReader {
        fn execute(&self, _sql: &str) -> Result<DataFrame> {
            self.calls.set(self.calls.get() + 1);
            let series = Series::new("n".into(), vec![self.calls.get() as i64]);
            DataFrame::new(vec![series.into_column()])
                .map_err(|e| ChartsqlError::ReaderError(e.to_string()))
        }
    }

    fn counting() -> CachedReader<CountingReader> {
        CachedReader::new(CountingReader {
            calls: Cell::new(0),
        })
    }

    #[test]
    fn test_cache_hit_returns_same_frame() {
        let reader = counting();
        let first = reader.execute("SELECT 1").unwrap();
        let second = reader.execute("SELECT 1").unwrap();
        assert_eq!(first, second);
        assert_eq!(reader.inner().calls.get(), 1);
        assert_eq!(reader.len(), 1);
    }

    #[test]
    fn test_cache_keyed_by_exact_text() {
        let reader = counting();
        reader.execute("SELECT 1").unwrap();
        reader.execute("SELECT  1").unwrap();
        assert_eq!(reader.inner().calls.get(), 2);
    }

    #[test]
    fn test_invalidate() {
        let reader = counting();
        reader.execute("SELECT 1").unwrap();
        reader.invalidate();
        assert!(reader.is_empty());
        reader.execute("SELECT 1").unwrap();
        assert_eq!(reader.inner().calls.get(), 2);
    }

    #[test]
    fn test_statements_bypass_cache() {
        let reader = counting();
        reader.execute("CREATE TABLE t(x INT)").unwrap();
        reader.execute("CREATE TABLE t(x INT)").unwrap();
        assert_eq!(reader.inner().calls.get(), 2);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_schema_probe() {
        assert_eq!(
            schema_probe("my table"),
            "SELECT\n    *\nFROM \"my table\"\nWHERE FALSE"
        );
    }

    #[test]
    fn test_is_statement() {
        assert!(is_statement("  create table t(x int)"));
        assert!(is_statement("INSERT INTO t VALUES (1)"));
        assert!(!is_statement("SELECT 1"));
        assert!(!is_statement("WITH a AS (SELECT 1) SELECT * FROM a"));
    }
}
