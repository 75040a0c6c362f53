//! Aggregate expression, null filter and grouping of a metric.
//!
//! Numeric methods convert the metric with a non-failing cast and filter out
//! rows where the conversion yields NULL, so dirty values degrade the
//! aggregate instead of failing the chart.

use crate::config::AggregationMethod;
use crate::sql::{Expr, GroupBy, SqlType};

/// Aggregate, filter and grouping derived from a metric and a method
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSpec {
    pub method: AggregationMethod,
    /// Expression selected as the metric
    pub aggregate: Expr,
    /// Predicate excluding rows the aggregate must not see
    pub filter: Expr,
    pub group_by: GroupBy,
}

/// `TRY_CAST(CAST(metric AS VARCHAR) AS DOUBLE)`
///
/// Going through VARCHAR makes the cast valid for any source type.
pub fn numeric_cast(metric: &str) -> Expr {
    Expr::column(metric)
        .cast(SqlType::Varchar)
        .try_cast(SqlType::Double)
}

impl AggregationSpec {
    pub fn new(metric: &str, method: AggregationMethod) -> Self {
        let raw = Expr::column(metric);
        match method.sql_function() {
            None => Self {
                method,
                aggregate: raw.clone(),
                filter: raw.is_not_null(),
                group_by: GroupBy::None,
            },
            Some(function) if !method.is_numeric() => Self {
                method,
                aggregate: Expr::function(function, vec![raw.clone()]),
                filter: raw.is_not_null(),
                group_by: GroupBy::All,
            },
            Some(function) => {
                let cast = numeric_cast(metric);
                Self {
                    method,
                    aggregate: Expr::function(
                        "round",
                        vec![Expr::function(function, vec![cast.clone()]), Expr::int(2)],
                    ),
                    filter: cast.is_not_null(),
                    group_by: GroupBy::All,
                }
            }
        }
    }

    /// Whether rows keep their own granularity
    pub fn is_passthrough(&self) -> bool {
        matches!(self.group_by, GroupBy::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count() {
        let spec = AggregationSpec::new("id", AggregationMethod::Count);
        assert_eq!(spec.aggregate.to_string(), "count(\"id\")");
        assert_eq!(spec.filter.to_string(), "\"id\" IS NOT NULL");
        assert_eq!(spec.group_by, GroupBy::All);
    }

    #[test]
    fn test_none_is_passthrough() {
        let spec = AggregationSpec::new("price", AggregationMethod::None);
        assert_eq!(spec.aggregate.to_string(), "\"price\"");
        assert_eq!(spec.filter.to_string(), "\"price\" IS NOT NULL");
        assert!(spec.is_passthrough());
        assert!(!spec.aggregate.is_aggregate());
    }

    #[test]
    fn test_numeric_methods_round_cast_value() {
        for (method, function) in [
            (AggregationMethod::Sum, "sum"),
            (AggregationMethod::Avg, "avg"),
            (AggregationMethod::Min, "min"),
            (AggregationMethod::Max, "max"),
        ] {
            let spec = AggregationSpec::new("Price Now", method);
            assert_eq!(
                spec.aggregate.to_string(),
                format!(
                    "round({}(TRY_CAST(CAST(\"Price Now\" AS VARCHAR) AS DOUBLE)), 2)",
                    function
                )
            );
            assert_eq!(
                spec.filter.to_string(),
                "TRY_CAST(CAST(\"Price Now\" AS VARCHAR) AS DOUBLE) IS NOT NULL"
            );
            assert_eq!(spec.group_by, GroupBy::All);
        }
    }

    #[cfg(feature = "duckdb")]
    #[test]
    fn test_numeric_aggregates_ignore_non_numeric_values() {
        use crate::reader::{DuckDBReader, Reader};
        use crate::sql::Select;

        let reader = DuckDBReader::from_connection_string("duckdb://memory").unwrap();
        reader
            .execute(
                "CREATE TABLE dirty AS SELECT * FROM (VALUES \
                 ('1.5'), ('abc'), ('2'), (NULL), ('n/a'), ('4.25')) t(m)",
            )
            .unwrap();

        // numeric-like subset: 1.5, 2, 4.25
        for (method, expected) in [
            (AggregationMethod::Sum, 7.75),
            (AggregationMethod::Avg, 2.58),
            (AggregationMethod::Min, 1.5),
            (AggregationMethod::Max, 4.25),
        ] {
            let spec = AggregationSpec::new("m", method);
            let sql = Select::from_table("dirty")
                .select_as(spec.aggregate, "m")
                .filter(spec.filter)
                .group_by(spec.group_by)
                .into_query()
                .to_string();
            let df = reader.execute(&sql).unwrap();
            let value = df
                .column("m")
                .unwrap()
                .as_materialized_series()
                .f64()
                .unwrap()
                .get(0)
                .unwrap();
            assert_eq!(value, expected, "{}", method);
        }
    }
}
