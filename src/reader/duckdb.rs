//! DuckDB reader
//!
//! Runs generated chart queries against an in-memory or file-backed DuckDB
//! database and converts the result into a Polars DataFrame.

use crate::reader::{connection::ConnectionInfo, is_statement, Reader};
use crate::sql::{quote_ident, quote_literal};
use crate::{ChartsqlError, DataFrame, Result};
use duckdb::types::{Type, ValueRef};
use duckdb::{params, Connection};
use polars::prelude::{DataType, IntoColumn, NamedFrom, Series};
use std::path::Path;
use tracing::{debug, info, warn};

/// DuckDB database reader
///
/// # Examples
///
/// ```rust,ignore
/// use chartsql::reader::{Reader, DuckDBReader};
///
/// let reader = DuckDBReader::from_connection_string("duckdb://memory")?;
/// let table = reader.load_file("sales.csv")?;
/// let df = reader.execute(&format!("SELECT count(*) FROM \"{}\"", table))?;
/// ```
pub struct DuckDBReader {
    conn: Connection,
}

impl DuckDBReader {
    /// Open a database from a `duckdb://` connection string
    pub fn from_connection_string(uri: &str) -> Result<Self> {
        let conn = match super::connection::parse_connection_string(uri)? {
            ConnectionInfo::DuckDBMemory => Connection::open_in_memory().map_err(|e| {
                ChartsqlError::ReaderError(format!("Failed to open in-memory DuckDB: {}", e))
            })?,
            ConnectionInfo::DuckDBFile(path) => Connection::open(&path).map_err(|e| {
                ChartsqlError::ReaderError(format!("Failed to open DuckDB file '{}': {}", path, e))
            })?,
        };
        Ok(Self { conn })
    }

    /// Underlying connection, for setup statements
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create (or replace) a table from a CSV, Parquet or JSON file.
    ///
    /// The table is named after the file stem with dashes and spaces replaced
    /// by underscores. Returns the table name.
    pub fn load_file(&self, file_path: &str) -> Result<String> {
        let path = Path::new(file_path);
        if !path.exists() {
            return Err(ChartsqlError::ReaderError(format!(
                "File not found: {}",
                file_path
            )));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let scan = match extension.as_str() {
            "csv" | "tsv" => "read_csv_auto",
            "parquet" => "read_parquet",
            "json" | "jsonl" | "ndjson" => "read_json_auto",
            other => {
                return Err(ChartsqlError::ReaderError(format!(
                    "Unsupported file type '{}' for {}. Supported: csv, tsv, parquet, json",
                    other, file_path
                )))
            }
        };

        let table_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("data")
            .replace(['-', ' '], "_");

        info!("Loading {} into table '{}'", file_path, table_name);
        let sql = format!(
            "CREATE OR REPLACE TABLE {} AS SELECT * FROM {}({})",
            quote_ident(&table_name),
            scan,
            quote_literal(file_path)
        );
        self.conn.execute(&sql, params![]).map_err(|e| {
            ChartsqlError::ReaderError(format!("Failed to load {}: {}", file_path, e))
        })?;

        Ok(table_name)
    }
}

// =============================================================================
// Column conversion
// =============================================================================

/// Values of one result column, widened to the Polars types chartsql uses
enum ColumnValues {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
    /// Days since the epoch
    Date(Vec<Option<i32>>),
    /// Microseconds since the epoch
    Timestamp(Vec<Option<i64>>),
    /// Nanoseconds since midnight
    Time(Vec<Option<i64>>),
}

fn time_scale(unit: duckdb::types::TimeUnit, value: i64, to_nanos: bool) -> i64 {
    use duckdb::types::TimeUnit;
    let micros = match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    };
    if to_nanos {
        match unit {
            TimeUnit::Nanosecond => value,
            _ => micros.saturating_mul(1_000),
        }
    } else {
        micros
    }
}

impl ColumnValues {
    fn for_type(column_type: &Type) -> Self {
        match column_type {
            Type::TinyInt
            | Type::SmallInt
            | Type::Int
            | Type::BigInt
            | Type::UTinyInt
            | Type::USmallInt
            | Type::UInt => ColumnValues::Int(Vec::new()),
            // May not fit an i64
            Type::UBigInt | Type::HugeInt => ColumnValues::Float(Vec::new()),
            Type::Float | Type::Double | Type::Decimal => ColumnValues::Float(Vec::new()),
            Type::Boolean => ColumnValues::Boolean(Vec::new()),
            Type::Date32 => ColumnValues::Date(Vec::new()),
            Type::Timestamp => ColumnValues::Timestamp(Vec::new()),
            Type::Time64 => ColumnValues::Time(Vec::new()),
            _ => ColumnValues::Text(Vec::new()),
        }
    }

    fn push(&mut self, row: &duckdb::Row, idx: usize) {
        let value = row.get_ref(idx).unwrap_or(ValueRef::Null);
        match self {
            ColumnValues::Int(values) => values.push(match value {
                ValueRef::TinyInt(i) => Some(i as i64),
                ValueRef::SmallInt(i) => Some(i as i64),
                ValueRef::Int(i) => Some(i as i64),
                ValueRef::BigInt(i) => Some(i),
                ValueRef::UTinyInt(i) => Some(i as i64),
                ValueRef::USmallInt(i) => Some(i as i64),
                ValueRef::UInt(i) => Some(i as i64),
                _ => None,
            }),
            ColumnValues::Float(values) => values.push(match value {
                ValueRef::Float(f) => Some(f as f64),
                ValueRef::Double(f) => Some(f),
                ValueRef::Decimal(d) => d.to_string().parse::<f64>().ok(),
                ValueRef::HugeInt(i) => Some(i as f64),
                ValueRef::UBigInt(i) => Some(i as f64),
                ValueRef::BigInt(i) => Some(i as f64),
                ValueRef::Int(i) => Some(i as f64),
                _ => None,
            }),
            ColumnValues::Boolean(values) => values.push(match value {
                ValueRef::Boolean(b) => Some(b),
                _ => None,
            }),
            ColumnValues::Date(values) => values.push(match value {
                ValueRef::Date32(d) => Some(d),
                _ => None,
            }),
            ColumnValues::Timestamp(values) => values.push(match value {
                ValueRef::Timestamp(unit, v) => Some(time_scale(unit, v, false)),
                _ => None,
            }),
            ColumnValues::Time(values) => values.push(match value {
                ValueRef::Time64(unit, v) => Some(time_scale(unit, v, true)),
                _ => None,
            }),
            ColumnValues::Text(values) => values.push(match value {
                ValueRef::Null => None,
                ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => row.get::<_, String>(idx).ok(),
            }),
        }
    }

    fn into_series(self, name: &str) -> Result<Series> {
        let cast = |series: Series, dtype: DataType| {
            series.cast(&dtype).map_err(|e| {
                ChartsqlError::ReaderError(format!("Cast of column '{}' failed: {}", name, e))
            })
        };
        Ok(match self {
            ColumnValues::Int(values) => Series::new(name.into(), values),
            ColumnValues::Float(values) => Series::new(name.into(), values),
            ColumnValues::Boolean(values) => Series::new(name.into(), values),
            ColumnValues::Text(values) => Series::new(name.into(), values),
            ColumnValues::Date(values) => cast(Series::new(name.into(), values), DataType::Date)?,
            ColumnValues::Timestamp(values) => cast(
                Series::new(name.into(), values),
                DataType::Datetime(polars::prelude::TimeUnit::Microseconds, None),
            )?,
            ColumnValues::Time(values) => cast(Series::new(name.into(), values), DataType::Time)?,
        })
    }
}

impl Reader for DuckDBReader {
    fn execute(&self, sql: &str) -> Result<DataFrame> {
        if is_statement(sql) {
            self.conn.execute_batch(sql).map_err(|e| {
                ChartsqlError::ReaderError(format!("Failed to execute statement: {}", e))
            })?;
            return Ok(DataFrame::empty());
        }

        debug!("Executing query:\n{}", sql);

        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| ChartsqlError::ReaderError(format!("Failed to prepare SQL: {}", e)))?;

        // Schema is only available once the statement ran
        stmt.execute(params![])
            .map_err(|e| ChartsqlError::ReaderError(format!("Failed to execute SQL: {}", e)))?;

        let column_count = stmt.column_count();
        let mut names = Vec::with_capacity(column_count);
        let mut columns = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let name = stmt
                .column_name(i)
                .map_err(|e| ChartsqlError::ReaderError(format!("Failed to get column name: {}", e)))?
                .to_string();
            let column_type = Type::from(&stmt.column_type(i));
            if matches!(
                column_type,
                Type::Blob | Type::Interval | Type::List(_) | Type::Struct(_) | Type::Map(_, _)
            ) {
                warn!(
                    "Column '{}' has type {:?}, converting to text",
                    name, column_type
                );
            }
            names.push(name);
            columns.push(ColumnValues::for_type(&column_type));
        }

        let mut rows = stmt
            .query(params![])
            .map_err(|e| ChartsqlError::ReaderError(format!("Failed to iterate rows: {}", e)))?;
        while let Some(row) = rows
            .next()
            .map_err(|e| ChartsqlError::ReaderError(format!("Failed to read row: {}", e)))?
        {
            for (idx, column) in columns.iter_mut().enumerate() {
                column.push(row, idx);
            }
        }

        let columns = columns
            .into_iter()
            .zip(names.iter())
            .map(|(values, name)| values.into_series(name).map(|s| s.into_column()))
            .collect::<Result<Vec<_>>>()?;

        DataFrame::new(columns)
            .map_err(|e| ChartsqlError::ReaderError(format!("Failed to create DataFrame: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> DuckDBReader {
        DuckDBReader::from_connection_string("duckdb://memory").unwrap()
    }

    #[test]
    fn test_simple_query() {
        let df = memory().execute("SELECT 1 AS x, 'a' AS y").unwrap();
        assert_eq!(df.shape(), (1, 2));
        assert_eq!(df.get_column_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_types_are_widened() {
        let df = memory()
            .execute(
                "SELECT 1::TINYINT AS i, 2.5::DECIMAL(4,1) AS d, 10::HUGEINT AS h, \
                 true AS b, DATE '2023-01-02' AS dt",
            )
            .unwrap();
        assert_eq!(df.column("i").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("d").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("h").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("b").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(df.column("dt").unwrap().dtype(), &DataType::Date);
        let d = df
            .column("d")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .get(0);
        assert_eq!(d, Some(2.5));
    }

    #[test]
    fn test_empty_result_keeps_columns() {
        let reader = memory();
        reader.execute("CREATE TABLE t(x INT, y VARCHAR)").unwrap();
        let df = reader.execute("SELECT * FROM t").unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.get_column_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_statements_return_empty_frame() {
        let reader = memory();
        let df = reader.execute("CREATE TABLE t AS SELECT 1 AS x").unwrap();
        assert_eq!(df.width(), 0);
        let df = reader.execute("INSERT INTO t VALUES (2)").unwrap();
        assert_eq!(df.width(), 0);
        assert_eq!(reader.execute("SELECT * FROM t").unwrap().height(), 2);
    }

    #[test]
    fn test_nulls_survive() {
        let df = memory()
            .execute("SELECT * FROM (VALUES (1, 'a'), (NULL, NULL)) t(x, y)")
            .unwrap();
        assert_eq!(df.column("x").unwrap().null_count(), 1);
        assert_eq!(df.column("y").unwrap().null_count(), 1);
    }

    #[test]
    fn test_invalid_sql() {
        assert!(memory().execute("INVALID SQL SYNTAX").is_err());
    }

    #[test]
    fn test_validate_columns() {
        let reader = memory();
        reader.execute("CREATE TABLE sales(region TEXT, revenue REAL)").unwrap();
        assert!(reader
            .validate_columns("sales", &["region".to_string()])
            .is_ok());
        let err = reader
            .validate_columns("sales", &["revenue".to_string(), "profit".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("Column 'profit' not found"));
    }

    #[test]
    fn test_load_csv_file() {
        let dir = std::env::temp_dir().join(format!("chartsql-load-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("daily-prices.csv");
        std::fs::write(&file, "Category,Price\nFOOD,1.5\nDRINK,2\n").unwrap();

        let reader = memory();
        let table = reader.load_file(file.to_str().unwrap()).unwrap();
        assert_eq!(table, "daily_prices");

        let df = reader
            .execute("SELECT count(*) AS n FROM \"daily_prices\"")
            .unwrap();
        assert_eq!(
            df.column("n").unwrap().as_materialized_series().i64().unwrap().get(0),
            Some(2)
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_or_unsupported_file() {
        let reader = memory();
        assert!(reader.load_file("/nonexistent/file.csv").is_err());
        let err = reader.load_file("Cargo.toml").unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
    }
}
