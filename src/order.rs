//! Ordering of category values.
//!
//! Numbers sort numerically, weekday and month names sort in calendar order,
//! any other text sorts lexicographically and nulls sort last. The same order
//! is expressed twice: as SQL sort keys for queries ([`order_keys`]) and as a
//! Rust value for rows that were already fetched ([`OrderKey`]), so axis
//! ordering in the engine and label ordering in the flow layout agree.

use crate::sql::{Expr, SqlType};
use std::cmp::Ordering;

pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Rank of the first weekday; months continue after Sunday
const CALENDAR_BASE_RANK: u8 = 100;

/// Calendar rank of a weekday (100..=106) or month name (107..=118).
///
/// Matching is exact and case-sensitive.
pub fn calendar_rank(value: &str) -> Option<u8> {
    WEEKDAYS
        .iter()
        .chain(MONTHS.iter())
        .position(|name| *name == value)
        .map(|pos| CALENDAR_BASE_RANK + pos as u8)
}

/// SQL sort keys of a column, to be applied in order with `NULLS LAST`
pub fn order_keys(column: &str) -> Vec<Expr> {
    order_keys_of(Expr::column(column))
}

/// SQL sort keys of an arbitrary expression.
///
/// 1. numeric value when the text form is numeric-castable
/// 2. calendar rank when the text form is a weekday or month name
/// 3. the text form itself
pub fn order_keys_of(expr: Expr) -> Vec<Expr> {
    let text = expr.cast(SqlType::Varchar);

    let numeric = text.clone().try_cast(SqlType::Double);

    let branches = WEEKDAYS
        .iter()
        .chain(MONTHS.iter())
        .map(|name| {
            let rank = calendar_rank(name).unwrap_or(CALENDAR_BASE_RANK);
            (Expr::string(*name), Expr::int(rank as i64))
        })
        .collect();
    let calendar = Expr::Case {
        operand: Some(Box::new(text.clone())),
        branches,
        otherwise: None,
    };

    vec![numeric, calendar, text]
}

/// Sort key of a single fetched value
#[derive(Debug, Clone)]
pub enum OrderKey {
    Number(f64),
    Calendar(u8),
    Text(String),
    Null,
}

impl OrderKey {
    pub fn of(value: Option<&str>) -> Self {
        match value {
            None => OrderKey::Null,
            Some(v) => {
                if let Ok(number) = v.trim().parse::<f64>() {
                    OrderKey::Number(number)
                } else if let Some(rank) = calendar_rank(v) {
                    OrderKey::Calendar(rank)
                } else {
                    OrderKey::Text(v.to_string())
                }
            }
        }
    }

    fn class(&self) -> u8 {
        match self {
            OrderKey::Number(_) => 0,
            OrderKey::Calendar(_) => 1,
            OrderKey::Text(_) => 2,
            OrderKey::Null => 3,
        }
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (OrderKey::Number(a), OrderKey::Number(b)) => a.total_cmp(b),
            (OrderKey::Calendar(a), OrderKey::Calendar(b)) => a.cmp(b),
            (OrderKey::Text(a), OrderKey::Text(b)) => a.cmp(b),
            _ => self.class().cmp(&other.class()),
        }
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OrderKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderKey {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(values: &[Option<&str>]) -> Vec<Option<String>> {
        let mut values: Vec<Option<&str>> = values.to_vec();
        values.sort_by_key(|v| OrderKey::of(*v));
        values.into_iter().map(|v| v.map(String::from)).collect()
    }

    #[test]
    fn test_calendar_ranks() {
        assert_eq!(calendar_rank("Monday"), Some(100));
        assert_eq!(calendar_rank("Sunday"), Some(106));
        assert_eq!(calendar_rank("January"), Some(107));
        assert_eq!(calendar_rank("December"), Some(118));
        assert_eq!(calendar_rank("monday"), None);
        assert_eq!(calendar_rank("Mon"), None);
    }

    #[test]
    fn test_calendar_permutations_sort_canonically() {
        let canonical: Vec<&str> = WEEKDAYS.iter().chain(MONTHS.iter()).copied().collect();

        for shift in 0..canonical.len() {
            let mut permuted = canonical.clone();
            permuted.rotate_left(shift);
            if shift % 2 == 1 {
                permuted.reverse();
            }
            permuted.sort_by_key(|v| OrderKey::of(Some(*v)));
            assert_eq!(permuted, canonical, "shift {}", shift);
        }
    }

    #[test]
    fn test_mixed_classes() {
        let result = sorted(&[
            None,
            Some("banana"),
            Some("March"),
            Some("10"),
            Some("Monday"),
            Some("2.5"),
            Some("apple"),
        ]);
        let expected: Vec<Option<String>> = vec![
            Some("2.5".into()),
            Some("10".into()),
            Some("Monday".into()),
            Some("March".into()),
            Some("apple".into()),
            Some("banana".into()),
            None,
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn test_numbers_sort_numerically_not_lexically() {
        let result = sorted(&[Some("100"), Some("9"), Some("-1")]);
        assert_eq!(
            result,
            vec![Some("-1".into()), Some("9".into()), Some("100".into())]
        );
    }

    #[test]
    fn test_order_keys_sql() {
        let keys = order_keys("Day Name");
        assert_eq!(keys.len(), 3);
        assert_eq!(
            keys[0].to_string(),
            "TRY_CAST(CAST(\"Day Name\" AS VARCHAR) AS DOUBLE)"
        );
        let calendar = keys[1].to_string();
        assert!(calendar.starts_with("CASE CAST(\"Day Name\" AS VARCHAR) WHEN 'Monday' THEN 100"));
        assert!(calendar.ends_with("WHEN 'December' THEN 118 END"));
        assert_eq!(keys[2].to_string(), "CAST(\"Day Name\" AS VARCHAR)");
    }

    #[cfg(feature = "duckdb")]
    #[test]
    fn test_engine_order_matches_rust_order() {
        use crate::reader::{DuckDBReader, Reader};
        use crate::sql::{OrderItem, Select};

        let reader = DuckDBReader::from_connection_string("duckdb://memory").unwrap();
        reader
            .execute(
                "CREATE TABLE vals AS SELECT * FROM (VALUES \
                 ('May'), ('x'), (NULL), ('10'), ('Friday'), ('2'), ('January'), ('Monday')) t(v)",
            )
            .unwrap();

        let mut select = Select::from_table("vals").select(Expr::column("v"));
        for key in order_keys("v") {
            select = select.order_by(OrderItem::asc(key));
        }
        let df = reader.execute(&select.into_query().to_string()).unwrap();
        let engine: Vec<Option<String>> = df
            .column("v")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(String::from))
            .collect();

        let rust = sorted(&[
            Some("May"),
            Some("x"),
            None,
            Some("10"),
            Some("Friday"),
            Some("2"),
            Some("January"),
            Some("Monday"),
        ]);
        assert_eq!(engine, rust);
    }
}
