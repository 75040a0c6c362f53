//! Multi-stage flow query.
//!
//! All adjacent stage pairs are aggregated in a single pass with
//! `GROUP BY GROUPING SETS ((s0, s1), (s1, s2), ...)`. Each pair is then
//! selected as an edge set with stage-namespaced endpoints, and the edge
//! sets are stacked with `UNION ALL`.

use crate::aggregate::AggregationSpec;
use crate::chart::layout::FlowEdge;
use crate::chart::{column_f64, column_i64, column_strings};
use crate::config::AggregationMethod;
use crate::naming;
use crate::sql::{Cte, Expr, GroupBy, Query, Select, SqlType};
use crate::{ChartsqlError, DataFrame, Result};
use std::collections::HashMap;

/// Most stages whose grouping ids still fit an `i64`
pub const MAX_STAGES: usize = 62;

/// Value of `GROUPING_ID(s0, .., sN-1)` for the grouping set `(s_pair, s_pair+1)`.
///
/// The first argument maps to the most significant bit and a bit is set when
/// its column is not part of the grouping set. Ids grow with `pair`.
pub fn grouping_id(stage_count: usize, pair: usize) -> i64 {
    (0..stage_count)
        .filter(|j| *j != pair && *j != pair + 1)
        .map(|j| 1i64 << (stage_count - 1 - j))
        .sum()
}

/// Namespaced node value: `'<stage><separator>' || CAST(col AS VARCHAR)`
fn namespaced(stage: &str) -> Expr {
    Expr::function(
        "concat",
        vec![
            Expr::string(naming::stage_prefix(stage)),
            Expr::column(stage).cast(SqlType::Varchar),
        ],
    )
}

#[derive(Debug, Clone)]
pub struct SankeyChart {
    table: String,
    metric: String,
    stages: Vec<String>,
    aggregation: AggregationSpec,
}

impl SankeyChart {
    /// Build a flow chart over `stages`, in flow order.
    ///
    /// Pass-through aggregation is replaced by `sum`.
    pub fn new(
        table: &str,
        metric: &str,
        method: AggregationMethod,
        stages: Vec<String>,
    ) -> Result<Self> {
        if stages.len() < 2 {
            return Err(ChartsqlError::ConfigError(format!(
                "Sankey charts need at least 2 dimension columns, got {}",
                stages.len()
            )));
        }
        if stages.len() > MAX_STAGES {
            return Err(ChartsqlError::ConfigError(format!(
                "Sankey charts support at most {} dimension columns, got {}",
                MAX_STAGES,
                stages.len()
            )));
        }

        let method = match method {
            AggregationMethod::None => AggregationMethod::Sum,
            other => other,
        };
        Ok(Self {
            table: table.to_string(),
            metric: metric.to_string(),
            stages,
            aggregation: AggregationSpec::new(metric, method),
        })
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn method(&self) -> AggregationMethod {
        self.aggregation.method
    }

    /// Every column read from the source table
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns = vec![self.metric.clone()];
        for stage in &self.stages {
            if !columns.contains(stage) {
                columns.push(stage.clone());
            }
        }
        columns
    }

    fn cube(&self) -> Query {
        let stage_columns: Vec<Expr> = self.stages.iter().map(Expr::column).collect();
        let pairs = self
            .stages
            .windows(2)
            .map(|pair| vec![Expr::column(&pair[0]), Expr::column(&pair[1])])
            .collect();

        let mut select = Select::from_table(&self.table)
            .select_as(self.aggregation.aggregate.clone(), naming::CUBE_VALUE_COLUMN);
        for column in &stage_columns {
            select = select.select(column.clone());
        }
        select
            .select_as(
                Expr::function("GROUPING_ID", stage_columns),
                naming::CUBE_GROUPING_COLUMN,
            )
            .filter(self.aggregation.filter.clone())
            .group_by(GroupBy::GroupingSets(pairs))
            .into_query()
    }

    fn pair_edges(&self, source: &str, target: &str) -> Query {
        let value = Expr::column(naming::CUBE_VALUE_COLUMN);
        Select::from_table(naming::CUBE_CTE)
            .select_as(namespaced(source), naming::SOURCE_COLUMN)
            .select_as(namespaced(target), naming::TARGET_COLUMN)
            .select_as(value.clone().cast(SqlType::Double), naming::VALUE_COLUMN)
            .select_as(
                Expr::column(naming::CUBE_GROUPING_COLUMN),
                naming::GROUPING_SET_COLUMN,
            )
            .filter(Expr::column(source).is_not_null())
            .filter(Expr::column(target).is_not_null())
            .filter(value.gt(Expr::int(0)))
            .into_query()
    }

    /// Edge query: one row per (source, target) pair with a positive value
    pub fn query(&self) -> Query {
        let edges = self
            .stages
            .windows(2)
            .map(|pair| self.pair_edges(&pair[0], &pair[1]))
            .collect();
        Query::with(
            vec![Cte {
                name: naming::CUBE_CTE.to_string(),
                query: self.cube(),
            }],
            Query::union_all(edges),
        )
    }

    /// Edges of the query result, with namespaces stripped
    pub fn edges(&self, df: &DataFrame) -> Result<Vec<FlowEdge>> {
        let pair_of: HashMap<i64, usize> = (0..self.stages.len() - 1)
            .map(|pair| (grouping_id(self.stages.len(), pair), pair))
            .collect();

        let sources = column_strings(df, naming::SOURCE_COLUMN)?;
        let targets = column_strings(df, naming::TARGET_COLUMN)?;
        let values = column_f64(df, naming::VALUE_COLUMN)?;
        let sets = column_i64(df, naming::GROUPING_SET_COLUMN)?;

        let mut edges = Vec::with_capacity(df.height());
        for (((source, target), value), set) in sources
            .into_iter()
            .zip(targets)
            .zip(values)
            .zip(sets)
        {
            let (Some(source), Some(target), Some(value), Some(set)) = (source, target, value, set)
            else {
                continue;
            };
            let pair = *pair_of.get(&set).ok_or_else(|| {
                ChartsqlError::InternalError(format!("Unexpected grouping set id {}", set))
            })?;
            let strip = |label: &str, stage: &str| {
                naming::strip_stage(label, stage)
                    .map(String::from)
                    .ok_or_else(|| {
                        ChartsqlError::InternalError(format!(
                            "Node '{}' is not in stage '{}'",
                            label, stage
                        ))
                    })
            };
            edges.push(FlowEdge {
                pair,
                source: strip(&source, &self.stages[pair])?,
                target: strip(&target, &self.stages[pair + 1])?,
                value,
            });
        }
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn chart(stages: &[&str]) -> SankeyChart {
        SankeyChart::new(
            "t",
            "v",
            AggregationMethod::Sum,
            stages.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_grouping_ids() {
        assert_eq!(grouping_id(2, 0), 0);
        assert_eq!(grouping_id(3, 0), 1);
        assert_eq!(grouping_id(3, 1), 4);
        assert_eq!(grouping_id(4, 0), 3);
        assert_eq!(grouping_id(4, 1), 9);
        assert_eq!(grouping_id(4, 2), 12);
    }

    #[test]
    fn test_grouping_ids_increase_with_pair() {
        for n in 2..=MAX_STAGES {
            let ids: Vec<i64> = (0..n - 1).map(|p| grouping_id(n, p)).collect();
            assert!(ids.windows(2).all(|w| w[0] < w[1]), "n = {}", n);
            assert!(ids.iter().all(|id| *id >= 0));
        }
    }

    #[test]
    fn test_stage_count_limits() {
        let stages = |n: usize| (0..n).map(|i| format!("s{}", i)).collect::<Vec<_>>();
        for n in [0, 1, MAX_STAGES + 1] {
            let err = SankeyChart::new("t", "v", AggregationMethod::Sum, stages(n)).unwrap_err();
            assert!(matches!(err, ChartsqlError::ConfigError(_)), "n = {}", n);
        }
        assert!(SankeyChart::new("t", "v", AggregationMethod::Sum, stages(MAX_STAGES)).is_ok());
    }

    #[test]
    fn test_none_falls_back_to_sum() {
        let chart = SankeyChart::new(
            "t",
            "v",
            AggregationMethod::None,
            vec!["a".into(), "b".into()],
        )
        .unwrap();
        assert_eq!(chart.method(), AggregationMethod::Sum);
    }

    #[test]
    fn test_query_shape() {
        let sql = chart(&["a", "b", "c"]).query().to_string();
        assert!(sql.starts_with("WITH \"__chartsql_cube__\" AS ("));
        assert!(sql.contains("GROUPING_ID(\"a\", \"b\", \"c\") AS \"__chartsql_grouping_set__\""));
        assert!(sql.contains("GROUP BY GROUPING SETS ((\"a\", \"b\"), (\"b\", \"c\"))"));
        assert!(sql.contains("concat('a__chartsql_stage__', CAST(\"a\" AS VARCHAR)) AS \"source\""));
        assert!(sql.contains("\"__chartsql_value__\" > 0"));
        assert_eq!(sql.matches("UNION ALL").count(), 1);
    }

    #[test]
    fn test_edges_strip_namespaces() {
        let chart = chart(&["a", "b", "c"]);
        let df = DataFrame::new(vec![
            Series::new(
                "source".into(),
                vec!["a__chartsql_stage__x", "b__chartsql_stage__y"],
            )
            .into_column(),
            Series::new(
                "target".into(),
                vec!["b__chartsql_stage__y", "c__chartsql_stage__z"],
            )
            .into_column(),
            Series::new("value".into(), vec![1.5f64, 2.0]).into_column(),
            Series::new("grouping_set".into(), vec![1i64, 4]).into_column(),
        ])
        .unwrap();

        let edges = chart.edges(&df).unwrap();
        assert_eq!(
            edges,
            vec![
                FlowEdge {
                    pair: 0,
                    source: "x".into(),
                    target: "y".into(),
                    value: 1.5
                },
                FlowEdge {
                    pair: 1,
                    source: "y".into(),
                    target: "z".into(),
                    value: 2.0
                },
            ]
        );
    }

    #[test]
    fn test_edges_reject_unknown_grouping_set() {
        let chart = chart(&["a", "b"]);
        let df = DataFrame::new(vec![
            Series::new("source".into(), vec!["a__chartsql_stage__x"]).into_column(),
            Series::new("target".into(), vec!["b__chartsql_stage__y"]).into_column(),
            Series::new("value".into(), vec![1.0f64]).into_column(),
            Series::new("grouping_set".into(), vec![7i64]).into_column(),
        ])
        .unwrap();
        assert!(matches!(
            chart.edges(&df),
            Err(ChartsqlError::InternalError(_))
        ));
    }

    #[cfg(feature = "duckdb")]
    #[test]
    fn test_engine_grouping_ids_match() {
        use crate::reader::{DuckDBReader, Reader};

        let reader = DuckDBReader::from_connection_string("duckdb://memory").unwrap();
        reader
            .execute(
                "CREATE TABLE t AS SELECT * FROM (VALUES \
                 ('x1', 'y1', 'z1', 2), ('x1', 'y2', 'z1', 3), \
                 ('x2', 'y1', NULL, 4), ('x2', 'y1', 'z2', -10)) v(a, b, c, v)",
            )
            .unwrap();

        let chart = chart(&["a", "b", "c"]);
        let df = reader.execute(&chart.query().to_string()).unwrap();
        let mut edges = chart.edges(&df).unwrap();
        edges.sort_by(|l, r| {
            (l.pair, &l.source, &l.target).cmp(&(r.pair, &r.source, &r.target))
        });

        let summary: Vec<(usize, &str, &str, f64)> = edges
            .iter()
            .map(|e| (e.pair, e.source.as_str(), e.target.as_str(), e.value))
            .collect();
        // x2 -> y1 nets to -6 and y1 -> z2 to -10: both dropped
        assert_eq!(
            summary,
            vec![
                (0, "x1", "y1", 2.0),
                (0, "x1", "y2", 3.0),
                (1, "y1", "z1", 2.0),
                (1, "y2", "z1", 3.0),
            ]
        );
    }
}
