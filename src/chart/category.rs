//! Calendar category order hints.
//!
//! A column holding weekday or month names gets the canonical calendar list
//! as an axis ordering hint. Values that cast to a number or a date are not
//! names and never trigger a hint.

use crate::chart::column_bool;
use crate::naming;
use crate::order::{MONTHS, WEEKDAYS};
use crate::sql::{Expr, Query, Select, SqlType};
use crate::{DataFrame, Result};
use std::collections::BTreeMap;

/// Column name → canonical ordered values
pub type CategoryOrder = BTreeMap<String, Vec<String>>;

fn any_member(text: &Expr, names: &[&str]) -> Expr {
    let list = names.iter().map(|n| Expr::string(*n)).collect();
    Expr::function(
        "coalesce",
        vec![
            Expr::function("bool_or", vec![text.clone().in_list(list)]),
            Expr::boolean(false),
        ],
    )
}

/// One-row query flagging whether `column` holds weekday and/or month names
pub fn probe_query(table: &str, column: &str) -> Query {
    let text = Expr::column(column).cast(SqlType::Varchar);
    Select::from_table(table)
        .select_as(any_member(&text, &WEEKDAYS), naming::HAS_WEEKDAY_COLUMN)
        .select_as(any_member(&text, &MONTHS), naming::HAS_MONTH_COLUMN)
        .filter(text.clone().try_cast(SqlType::Double).is_null())
        .filter(text.try_cast(SqlType::Date).is_null())
        .into_query()
}

/// Canonical order hint from a probe result, `None` when no calendar names were found
pub fn hint_from_probe(df: &DataFrame) -> Result<Option<Vec<String>>> {
    let flag = |name: &str| -> Result<bool> {
        Ok(column_bool(df, name)?
            .first()
            .copied()
            .flatten()
            .unwrap_or(false))
    };
    let has_weekday = flag(naming::HAS_WEEKDAY_COLUMN)?;
    let has_month = flag(naming::HAS_MONTH_COLUMN)?;

    let mut hint: Vec<String> = Vec::new();
    if has_weekday {
        hint.extend(WEEKDAYS.iter().map(|d| d.to_string()));
    }
    if has_month {
        hint.extend(MONTHS.iter().map(|m| m.to_string()));
    }
    Ok(if hint.is_empty() { None } else { Some(hint) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn probe_frame(weekday: bool, month: bool) -> DataFrame {
        DataFrame::new(vec![
            Series::new(naming::HAS_WEEKDAY_COLUMN.into(), vec![weekday]).into_column(),
            Series::new(naming::HAS_MONTH_COLUMN.into(), vec![month]).into_column(),
        ])
        .unwrap()
    }

    #[test]
    fn test_probe_query() {
        let sql = probe_query("sales", "Day Name").to_string();
        assert!(sql.contains(
            "coalesce(bool_or(CAST(\"Day Name\" AS VARCHAR) IN ('Monday', 'Tuesday'"
        ));
        assert!(sql.contains("'December')), FALSE) AS \"__chartsql_has_month__\""));
        assert!(sql.contains(
            "WHERE TRY_CAST(CAST(\"Day Name\" AS VARCHAR) AS DOUBLE) IS NULL AND TRY_CAST(CAST(\"Day Name\" AS VARCHAR) AS DATE) IS NULL"
        ));
    }

    #[test]
    fn test_hints() {
        assert_eq!(hint_from_probe(&probe_frame(false, false)).unwrap(), None);
        assert_eq!(
            hint_from_probe(&probe_frame(true, false)).unwrap().map(|h| h.len()),
            Some(7)
        );
        let both = hint_from_probe(&probe_frame(true, true)).unwrap().unwrap();
        assert_eq!(both.len(), 19);
        assert_eq!(both[0], "Monday");
        assert_eq!(both[7], "January");
    }

    #[cfg(feature = "duckdb")]
    #[test]
    fn test_probe_against_engine() {
        use crate::reader::{DuckDBReader, Reader};

        let reader = DuckDBReader::from_connection_string("duckdb://memory").unwrap();
        reader
            .execute(
                "CREATE TABLE t AS SELECT * FROM (VALUES \
                 ('March', 'x', '1'), ('2023-01-01', 'y', '2'), (NULL, 'z', 'Monday')) \
                 v(a, b, c)",
            )
            .unwrap();

        let hint = |column: &str| {
            let df = reader
                .execute(&probe_query("t", column).to_string())
                .unwrap();
            hint_from_probe(&df).unwrap()
        };
        assert_eq!(hint("a").map(|h| h[0].clone()), Some("January".to_string()));
        assert_eq!(hint("b"), None);
        assert_eq!(hint("c").map(|h| h.len()), Some(7));
    }
}
