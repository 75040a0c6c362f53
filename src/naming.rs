//! Centralized naming conventions for chartsql-generated identifiers.
//!
//! All synthetic column names and CTE names use a double-underscore
//! prefix/suffix pattern to avoid collision with user-defined names.
//!
//! # Categories
//!
//! - **Order columns**: Sort keys selected next to a category column (`__chartsql_order_<col>_<key>__`)
//! - **CTE tables**: Intermediate relations of generated queries (`__chartsql_<name>__`)
//! - **Flow columns**: Columns of the Sankey edge query (`source`, `target`, `value`, `grouping_set`)
//! - **Stage namespace**: Separator between a stage name and a node value

use const_format::concatcp;

// ============================================================================
// Base Building Blocks
// ============================================================================

/// Base prefix for all chartsql SQL-level identifiers
const CHARTSQL_PREFIX: &str = "__chartsql_";

/// Suffix for all chartsql identifiers (double underscore)
const CHARTSQL_SUFFIX: &str = "__";

/// Full prefix for order key columns: `__chartsql_order_`
const ORDER_PREFIX: &str = concatcp!(CHARTSQL_PREFIX, "order_");

// ============================================================================
// Constants
// ============================================================================

/// CTE holding the multi-grouping-set aggregation of a flow chart
pub const CUBE_CTE: &str = concatcp!(CHARTSQL_PREFIX, "cube", CHARTSQL_SUFFIX);

/// CTE holding the aggregated cells of a heatmap before gap filling
pub const EXISTING_CTE: &str = concatcp!(CHARTSQL_PREFIX, "existing", CHARTSQL_SUFFIX);

/// CTE holding the distinct x-axis values of a heatmap
pub const X_VALUES_CTE: &str = concatcp!(CHARTSQL_PREFIX, "x_values", CHARTSQL_SUFFIX);

/// CTE holding the distinct y-axis values of a heatmap
pub const Y_VALUES_CTE: &str = concatcp!(CHARTSQL_PREFIX, "y_values", CHARTSQL_SUFFIX);

/// Alias of the gap-filled heatmap subquery
pub const FILLED_ALIAS: &str = concatcp!(CHARTSQL_PREFIX, "filled", CHARTSQL_SUFFIX);

/// Aggregated metric inside the flow cube (avoids clashing with stage columns)
pub const CUBE_VALUE_COLUMN: &str = concatcp!(CHARTSQL_PREFIX, "value", CHARTSQL_SUFFIX);

/// Grouping set id inside the flow cube
pub const CUBE_GROUPING_COLUMN: &str = concatcp!(CHARTSQL_PREFIX, "grouping_set", CHARTSQL_SUFFIX);

/// Separator placed between a stage name and a node value.
///
/// `Month Name__chartsql_stage__May` and `Start__chartsql_stage__May` are two nodes.
pub const STAGE_SEPARATOR: &str = concatcp!(CHARTSQL_PREFIX, "stage", CHARTSQL_SUFFIX);

/// Probe column: the column holds at least one weekday name
pub const HAS_WEEKDAY_COLUMN: &str = concatcp!(CHARTSQL_PREFIX, "has_weekday", CHARTSQL_SUFFIX);

/// Probe column: the column holds at least one month name
pub const HAS_MONTH_COLUMN: &str = concatcp!(CHARTSQL_PREFIX, "has_month", CHARTSQL_SUFFIX);

/// Probe column: number of distinct color values
pub const DISTINCT_COUNT_COLUMN: &str = concatcp!(CHARTSQL_PREFIX, "distinct", CHARTSQL_SUFFIX);

/// Flow edge query: namespaced source node
pub const SOURCE_COLUMN: &str = "source";

/// Flow edge query: namespaced target node
pub const TARGET_COLUMN: &str = "target";

/// Flow edge query: aggregated flow value
pub const VALUE_COLUMN: &str = "value";

/// Flow edge query: grouping set id of the stage pair
pub const GROUPING_SET_COLUMN: &str = "grouping_set";

// ============================================================================
// Constructor Functions
// ============================================================================

/// Generate the name of an order key column.
///
/// `position` is the position of the ordered column in the select list and
/// `key` the index of the sort key (see [`crate::order::order_keys`]).
///
/// # Example
/// ```
/// use chartsql::naming;
/// assert_eq!(naming::order_column(0, 2), "__chartsql_order_0_2__");
/// ```
pub fn order_column(position: usize, key: usize) -> String {
    format!("{}{}_{}{}", ORDER_PREFIX, position, key, CHARTSQL_SUFFIX)
}

/// Prefix of every node of a stage: `<stage><separator>`
pub fn stage_prefix(stage: &str) -> String {
    format!("{}{}", stage, STAGE_SEPARATOR)
}

/// Strip the stage namespace from a node label.
///
/// Returns `None` when the label does not belong to `stage`.
///
/// # Example
/// ```
/// use chartsql::naming;
/// let node = format!("{}{}", naming::stage_prefix("Month"), "May");
/// assert_eq!(naming::strip_stage(&node, "Month"), Some("May"));
/// assert_eq!(naming::strip_stage(&node, "Day"), None);
/// ```
pub fn strip_stage<'a>(label: &'a str, stage: &str) -> Option<&'a str> {
    label
        .strip_prefix(stage)
        .and_then(|rest| rest.strip_prefix(STAGE_SEPARATOR))
}

// ============================================================================
// Detection Functions
// ============================================================================

/// Check if a column name is a synthetic chartsql column.
///
/// # Example
/// ```
/// use chartsql::naming;
/// assert!(naming::is_synthetic_column("__chartsql_order_0_0__"));
/// assert!(!naming::is_synthetic_column("revenue"));
/// ```
pub fn is_synthetic_column(name: &str) -> bool {
    name.starts_with(CHARTSQL_PREFIX) && name.ends_with(CHARTSQL_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(CUBE_CTE, "__chartsql_cube__");
        assert_eq!(CUBE_VALUE_COLUMN, "__chartsql_value__");
        assert_eq!(STAGE_SEPARATOR, "__chartsql_stage__");
    }

    #[test]
    fn test_order_columns_are_synthetic() {
        for position in 0..3 {
            for key in 0..3 {
                assert!(is_synthetic_column(&order_column(position, key)));
            }
        }
    }

    #[test]
    fn test_strip_stage_with_separator_in_value() {
        let label = format!("{}a{}b", stage_prefix("s"), STAGE_SEPARATOR);
        let expected = format!("a{}b", STAGE_SEPARATOR);
        assert_eq!(strip_stage(&label, "s"), Some(expected.as_str()));
    }

    #[test]
    fn test_strip_stage_shared_prefix() {
        // "Day" is a prefix of "Day Name" but not a stage namespace of it
        let label = format!("{}Monday", stage_prefix("Day Name"));
        assert_eq!(strip_stage(&label, "Day"), None);
        assert_eq!(strip_stage(&label, "Day Name"), Some("Monday"));
    }

    #[test]
    fn test_user_columns_not_synthetic() {
        assert!(!is_synthetic_column("__chartsql_partial"));
        assert!(!is_synthetic_column("Month Name"));
    }
}
