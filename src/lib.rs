/*!
# chartsql - Categorical Aggregation & Flow Layout

chartsql turns a declarative chart configuration into an aggregation query for an
analytic engine (DuckDB) and, for flow diagrams, into a fully computed node/link
layout that a Sankey-capable charting library can draw directly.

## Example

```rust,ignore
use chartsql::api;
use chartsql::config::{AggregationMethod, ChartConfiguration, LayoutOptions, PlotType};
use chartsql::reader::DuckDBReader;

let reader = DuckDBReader::from_connection_string("duckdb://memory")?;
let config = ChartConfiguration::new(
    PlotType::Sankey,
    AggregationMethod::Sum,
    "revenue",
    vec!["region".to_string(), "product".to_string()],
    "sales",
);

let rendered = api::prepare(&config)?.execute(&reader, &LayoutOptions::default())?;
println!("{}", rendered.sql());
println!("{}", rendered.to_json()?);
```

## Architecture

- **Configuration** → validated [`config::ChartConfiguration`]
- **Query construction** → structured [`sql::Query`] built per plot type, rendered
  to SQL text as the last step
- **Execution** → pluggable [`reader::Reader`] implementations (DuckDB)
- **Output** → a tabular frame with category-order hints, or a [`chart::FlowGraph`]

## Core Components

- [`order`] - Total ordering of category values (numbers, calendar names, text)
- [`aggregate`] - Aggregate expression, null filter and grouping per method
- [`chart`] - Plot type dispatch, tabular queries, Sankey cube query and layout
- [`reader`] - Data source abstraction layer
- [`api`] - Two-stage `prepare()` → `execute()` entry point
*/

pub mod aggregate;
pub mod api;
pub mod chart;
pub mod config;
pub mod naming;
pub mod order;
pub mod reader;
pub mod sql;

// Re-export key types for convenience
pub use api::{prepare, Prepared, RenderedChart};
pub use chart::{CategoryOrder, ChartOutput, FlowGraph};
pub use config::{AggregationMethod, ChartConfiguration, LayoutOptions, Orientation, PlotType};

// DataFrame abstraction (wraps Polars)
pub use polars::prelude::DataFrame;

/// Main library error type
#[derive(thiserror::Error, Debug)]
pub enum ChartsqlError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Data source error: {0}")]
    ReaderError(String),

    #[error("Query failed: {message}\n\nSQL:\n{sql}")]
    QueryError { sql: String, message: String },

    #[error("Output generation error: {0}")]
    OutputError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, ChartsqlError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
