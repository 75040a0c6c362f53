//! Connection string parsing for the analytic engine
//!
//! chartsql only talks to DuckDB; the URI selects between an in-memory
//! database and a database file.

use crate::{ChartsqlError, Result};

/// Where the engine keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionInfo {
    /// Transient in-memory database
    DuckDBMemory,
    /// Database file, created on first use
    DuckDBFile(String),
}

impl std::fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionInfo::DuckDBMemory => write!(f, "duckdb://memory"),
            ConnectionInfo::DuckDBFile(path) => write!(f, "duckdb://{}", path),
        }
    }
}

/// Parse a connection string
///
/// # Supported Formats
///
/// - `duckdb://memory` or `duckdb://:memory:` - in-memory database
/// - `duckdb:///absolute/path/file.db` - database file (absolute path)
/// - `duckdb://relative/file.db` - database file
///
/// # Examples
///
/// ```
/// use chartsql::reader::connection::{parse_connection_string, ConnectionInfo};
///
/// let info = parse_connection_string("duckdb://memory").unwrap();
/// assert_eq!(info, ConnectionInfo::DuckDBMemory);
///
/// let info = parse_connection_string("duckdb://sales.db").unwrap();
/// assert_eq!(info, ConnectionInfo::DuckDBFile("sales.db".to_string()));
/// ```
pub fn parse_connection_string(uri: &str) -> Result<ConnectionInfo> {
    let Some(path) = uri.trim().strip_prefix("duckdb://") else {
        return Err(ChartsqlError::ReaderError(format!(
            "Unsupported connection string: {}. Expected duckdb://memory or duckdb://<path>",
            uri
        )));
    };

    match path {
        "memory" | ":memory:" => Ok(ConnectionInfo::DuckDBMemory),
        _ => {
            if path.trim_start_matches('/').is_empty() {
                return Err(ChartsqlError::ReaderError(
                    "DuckDB file path cannot be empty".to_string(),
                ));
            }
            Ok(ConnectionInfo::DuckDBFile(path.to_string()))
        }
    }
}
