//! Discrete palette validation.
//!
//! A custom palette only applies when it has at least as many colors as the
//! color column has distinct values. Otherwise the palette is disabled and
//! the renderer falls back to its default colors; the render itself goes on.

use crate::chart::column_i64;
use crate::naming;
use crate::sql::{Expr, Query, Select, SqlType};
use crate::{DataFrame, Result};
use serde::Serialize;
use tracing::warn;

/// Outcome of the palette check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PaletteDecision {
    /// No custom palette requested, or nothing to check against
    Default,
    /// The custom palette covers every distinct value
    Accepted,
    /// More distinct values than colors; the custom palette is dropped
    Disabled { distinct: usize, available: usize },
}

impl PaletteDecision {
    pub fn is_disabled(&self) -> bool {
        matches!(self, PaletteDecision::Disabled { .. })
    }
}

/// Distinct-count check of a color column against a palette size
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteCheck {
    table: String,
    column: String,
    available: usize,
    /// Only count values that are not numeric (continuous coloring otherwise)
    non_numeric_only: bool,
}

impl PaletteCheck {
    pub fn new(table: &str, column: &str, available: usize, non_numeric_only: bool) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            available,
            non_numeric_only,
        }
    }

    pub fn available(&self) -> usize {
        self.available
    }

    /// Exact distinct count of the color column
    pub fn query(&self) -> Query {
        let column = Expr::column(&self.column);
        let mut select = Select::from_table(&self.table)
            .select_as(Expr::count_distinct(column.clone()), naming::DISTINCT_COUNT_COLUMN);
        if self.non_numeric_only {
            select = select.filter(
                column
                    .cast(SqlType::Varchar)
                    .try_cast(SqlType::Double)
                    .is_null(),
            );
        }
        select.into_query()
    }

    pub fn decide(&self, df: &DataFrame) -> Result<PaletteDecision> {
        let distinct = column_i64(df, naming::DISTINCT_COUNT_COLUMN)?
            .first()
            .copied()
            .flatten()
            .unwrap_or(0)
            .max(0) as usize;

        if distinct > self.available {
            warn!(
                "Color column '{}' has {} distinct values but the palette only has {} colors, using default colors",
                self.column, distinct, self.available
            );
            Ok(PaletteDecision::Disabled {
                distinct,
                available: self.available,
            })
        } else {
            Ok(PaletteDecision::Accepted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn count_frame(n: i64) -> DataFrame {
        DataFrame::new(vec![
            Series::new(naming::DISTINCT_COUNT_COLUMN.into(), vec![n]).into_column(),
        ])
        .unwrap()
    }

    #[test]
    fn test_query() {
        let check = PaletteCheck::new("t", "c", 5, false);
        assert_eq!(
            check.query().to_string(),
            "SELECT\n    count(DISTINCT \"c\") AS \"__chartsql_distinct__\"\nFROM \"t\""
        );
        let check = PaletteCheck::new("t", "c", 5, true);
        assert!(check
            .query()
            .to_string()
            .ends_with("WHERE TRY_CAST(CAST(\"c\" AS VARCHAR) AS DOUBLE) IS NULL"));
    }

    #[test]
    fn test_decision_is_deterministic() {
        let check = PaletteCheck::new("t", "c", 5, false);
        for _ in 0..3 {
            assert_eq!(
                check.decide(&count_frame(8)).unwrap(),
                PaletteDecision::Disabled {
                    distinct: 8,
                    available: 5
                }
            );
        }
        assert_eq!(
            check.decide(&count_frame(5)).unwrap(),
            PaletteDecision::Accepted
        );
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_value(PaletteDecision::Disabled {
            distinct: 8,
            available: 5,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "disabled", "distinct": 8, "available": 5})
        );
        assert!(!PaletteDecision::Accepted.is_disabled());
    }
}
