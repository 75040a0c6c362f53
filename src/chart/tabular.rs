//! Queries of single-stage charts (bar, line, heatmap, scatter).
//!
//! Category columns are ordered by synthetic sort-key columns selected next
//! to them (see [`crate::order::order_keys`]); those columns are dropped from
//! the frame before it is handed out.

use crate::aggregate::AggregationSpec;
use crate::config::AggregationMethod;
use crate::naming;
use crate::order::order_keys;
use crate::sql::{Cte, Expr, OrderItem, Query, Select, TableRef};
use crate::{ChartsqlError, DataFrame, Result};
use polars::prelude::PlSmallStr;

/// Table alias of the x values when filling heatmap gaps
const X_ALIAS: &str = "xv";
/// Table alias of the y values when filling heatmap gaps
const Y_ALIAS: &str = "yv";
/// Table alias of the existing cells when filling heatmap gaps
const EXISTING_ALIAS: &str = "e";

#[derive(Debug, Clone)]
pub struct TabularChart {
    table: String,
    aggregation: AggregationSpec,
    metric: String,
    metric_alias: String,
    dims: Vec<String>,
    color: Option<String>,
}

/// Output name of the metric.
///
/// The metric keeps its own name unless a category column of the same chart
/// already uses it, in which case the method is prefixed (`count Region`).
pub fn metric_alias(metric: &str, method: AggregationMethod, categories: &[&str]) -> String {
    if categories.contains(&metric) {
        format!("{} {}", method, metric)
    } else {
        metric.to_string()
    }
}

impl TabularChart {
    pub fn new(
        table: &str,
        metric: &str,
        method: AggregationMethod,
        dims: Vec<String>,
        color: Option<String>,
    ) -> Self {
        let categories: Vec<&str> = dims
            .iter()
            .map(String::as_str)
            .chain(color.as_deref())
            .collect();
        let metric_alias = metric_alias(metric, method, &categories);
        Self {
            table: table.to_string(),
            aggregation: AggregationSpec::new(metric, method),
            metric: metric.to_string(),
            metric_alias,
            dims,
            color,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn color_column(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn metric_alias(&self) -> &str {
        &self.metric_alias
    }

    /// Distinct category columns: dimensions first, then color
    pub fn category_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for column in self.dims.iter().chain(self.color.iter()) {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        columns
    }

    /// Every column read from the source table
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns = vec![self.metric.clone()];
        for column in self.category_columns() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }

    /// Metric, category columns and the sort keys of each category column
    fn base_select(&self, categories: &[String]) -> (Select, Vec<OrderItem>) {
        let mut select = Select::from_table(&self.table)
            .select_as(self.aggregation.aggregate.clone(), &self.metric_alias);
        for column in categories {
            select = select.select(Expr::column(column));
        }

        let mut order_by = Vec::new();
        for (offset, column) in categories.iter().enumerate() {
            for (key_idx, key) in order_keys(column).into_iter().enumerate() {
                let name = naming::order_column(offset + 1, key_idx);
                select = select.select_as(key, &name);
                order_by.push(OrderItem::asc(Expr::column(name)));
            }
        }

        let select = select
            .filter(self.aggregation.filter.clone())
            .group_by(self.aggregation.group_by.clone());
        (select, order_by)
    }

    /// Bar and line: one dimension, optional color, ordered dimension first
    pub fn ordered_query(&self) -> Query {
        let (mut select, order_by) = self.base_select(&self.category_columns());
        select.order_by = order_by;
        select.into_query()
    }

    /// Scatter: two dimensions and optional color, no ordering
    pub fn scatter_query(&self) -> Query {
        let mut select = Select::from_table(&self.table)
            .select_as(self.aggregation.aggregate.clone(), &self.metric_alias);
        for column in self.category_columns() {
            select = select.select(Expr::column(column));
        }
        select
            .filter(self.aggregation.filter.clone())
            .group_by(self.aggregation.group_by.clone())
            .into_query()
    }

    /// Heatmap: every (x, y) combination, missing cells filled with 0,
    /// ordered by y then x so pivoting gives a stable matrix
    pub fn heatmap_query(&self) -> Query {
        let (x, y) = (&self.dims[0], &self.dims[1]);

        let existing = Select::from_table(&self.table)
            .select_as(self.aggregation.aggregate.clone(), &self.metric_alias)
            .select(Expr::column(x))
            .select(Expr::column(y))
            .filter(self.aggregation.filter.clone())
            .group_by(self.aggregation.group_by.clone())
            .into_query();

        let distinct_values = |column: &str| {
            Select::from_table(&self.table)
                .distinct()
                .select(Expr::column(column))
                .filter(self.aggregation.filter.clone())
                .filter(Expr::column(column).is_not_null())
                .into_query()
        };

        let kept = Select::from_table(naming::EXISTING_CTE)
            .select(Expr::column(&self.metric_alias))
            .select(Expr::column(x))
            .select(Expr::column(y))
            .into_query();

        let cell_exists = Select::from_ref(TableRef::aliased(naming::EXISTING_CTE, EXISTING_ALIAS))
            .select(Expr::int(1))
            .filter(Expr::qualified(EXISTING_ALIAS, x).eq(Expr::qualified(X_ALIAS, x)))
            .filter(Expr::qualified(EXISTING_ALIAS, y).eq(Expr::qualified(Y_ALIAS, y)))
            .into_query();
        let gaps = Select::from_ref(TableRef::aliased(naming::X_VALUES_CTE, X_ALIAS))
            .join(TableRef::aliased(naming::Y_VALUES_CTE, Y_ALIAS))
            .select_as(Expr::int(0), &self.metric_alias)
            .select_as(Expr::qualified(X_ALIAS, x), x)
            .select_as(Expr::qualified(Y_ALIAS, y), y)
            .filter(Expr::not_exists(cell_exists))
            .into_query();

        let filled = TableRef::Subquery {
            query: Box::new(Query::union_all(vec![kept, gaps])),
            alias: naming::FILLED_ALIAS.to_string(),
        };

        let mut body = Select::from_ref(filled)
            .select(Expr::column(&self.metric_alias))
            .select(Expr::column(x))
            .select(Expr::column(y));
        // y is the second selected category, x the first
        for (position, column) in [(2, y), (1, x)] {
            for (key_idx, key) in order_keys(column).into_iter().enumerate() {
                let name = naming::order_column(position, key_idx);
                body = body
                    .select_as(key, &name)
                    .order_by(OrderItem::asc(Expr::column(name)));
            }
        }

        Query::with(
            vec![
                Cte {
                    name: naming::EXISTING_CTE.to_string(),
                    query: existing,
                },
                Cte {
                    name: naming::X_VALUES_CTE.to_string(),
                    query: distinct_values(x),
                },
                Cte {
                    name: naming::Y_VALUES_CTE.to_string(),
                    query: distinct_values(y),
                },
            ],
            body.into_query(),
        )
    }
}

/// Remove sort-key and other synthetic columns from a result frame
pub fn drop_synthetic_columns(df: DataFrame) -> Result<DataFrame> {
    let keep: Vec<PlSmallStr> = df
        .get_column_names()
        .into_iter()
        .filter(|name| !naming::is_synthetic_column(name.as_str()))
        .cloned()
        .collect();
    if keep.len() == df.width() {
        return Ok(df);
    }
    df.select(keep)
        .map_err(|e| ChartsqlError::OutputError(format!("Failed to drop sort columns: {}", e)))
}
