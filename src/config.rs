//! Chart configuration value objects.
//!
//! A [`ChartConfiguration`] is built once per render and never mutated after
//! [`ChartConfiguration::validate`] has accepted it. Presentation attributes
//! (title, labels, size, palette) travel alongside but never change the
//! generated query.

use crate::{ChartsqlError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// Enumerations
// =============================================================================

/// Visual type of a chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotType {
    Bar,
    Line,
    Heatmap,
    Scatter,
    Sankey,
}

impl std::fmt::Display for PlotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlotType::Bar => "bar",
            PlotType::Line => "line",
            PlotType::Heatmap => "heatmap",
            PlotType::Scatter => "scatter",
            PlotType::Sankey => "sankey",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PlotType {
    type Err = ChartsqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bar" => Ok(PlotType::Bar),
            "line" => Ok(PlotType::Line),
            "heatmap" => Ok(PlotType::Heatmap),
            "scatter" => Ok(PlotType::Scatter),
            "sankey" => Ok(PlotType::Sankey),
            other => Err(ChartsqlError::ConfigError(format!(
                "Unknown plot type '{}'",
                other
            ))),
        }
    }
}

/// How the metric column is aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    /// Row-level pass-through, no aggregation
    None,
}

impl AggregationMethod {
    /// Name of the SQL aggregate function, `None` for pass-through
    pub fn sql_function(&self) -> Option<&'static str> {
        match self {
            AggregationMethod::Count => Some("count"),
            AggregationMethod::Sum => Some("sum"),
            AggregationMethod::Avg => Some("avg"),
            AggregationMethod::Min => Some("min"),
            AggregationMethod::Max => Some("max"),
            AggregationMethod::None => None,
        }
    }

    /// Whether the metric is converted to a number before aggregating
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AggregationMethod::Sum
                | AggregationMethod::Avg
                | AggregationMethod::Min
                | AggregationMethod::Max
        )
    }
}

impl std::fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AggregationMethod::Count => "count",
            AggregationMethod::Sum => "sum",
            AggregationMethod::Avg => "avg",
            AggregationMethod::Min => "min",
            AggregationMethod::Max => "max",
            AggregationMethod::None => "none",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AggregationMethod {
    type Err = ChartsqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "count" => Ok(AggregationMethod::Count),
            "sum" => Ok(AggregationMethod::Sum),
            "avg" | "mean" => Ok(AggregationMethod::Avg),
            "min" => Ok(AggregationMethod::Min),
            "max" => Ok(AggregationMethod::Max),
            "none" => Ok(AggregationMethod::None),
            other => Err(ChartsqlError::ConfigError(format!(
                "Unknown aggregation method '{}'",
                other
            ))),
        }
    }
}

/// Bar orientation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Horizontal bars: categories on the y axis
    H,
    /// Vertical bars: categories on the x axis
    #[default]
    V,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::H => write!(f, "h"),
            Orientation::V => write!(f, "v"),
        }
    }
}

impl FromStr for Orientation {
    type Err = ChartsqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "h" | "horizontal" => Ok(Orientation::H),
            "v" | "vertical" => Ok(Orientation::V),
            other => Err(ChartsqlError::ConfigError(format!(
                "Unknown orientation '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Chart configuration
// =============================================================================

/// Declarative description of one chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfiguration {
    pub plot_type: PlotType,
    pub aggregation_method: AggregationMethod,
    /// The value being aggregated
    pub metric_column: String,
    /// Dimension columns; order is significant for Sankey stages
    pub dim_columns: Vec<String>,
    #[serde(default)]
    pub color_column: Option<String>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    /// Source relation
    pub table_name: String,

    // Presentation only
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub color_scheme: Option<Vec<String>>,
}

impl ChartConfiguration {
    pub fn new(
        plot_type: PlotType,
        aggregation_method: AggregationMethod,
        metric_column: impl Into<String>,
        dim_columns: Vec<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            plot_type,
            aggregation_method,
            metric_column: metric_column.into(),
            dim_columns,
            color_column: None,
            orientation: None,
            table_name: table_name.into(),
            title: None,
            x_label: None,
            y_label: None,
            height: None,
            width: None,
            color_scheme: None,
        }
    }

    pub fn with_color_column(mut self, column: impl Into<String>) -> Self {
        self.color_column = Some(column.into());
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn with_color_scheme<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.color_scheme = Some(colors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_axis_labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = Some(x.into());
        self.y_label = Some(y.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Effective bar orientation (vertical unless set)
    pub fn orientation(&self) -> Orientation {
        self.orientation.unwrap_or_default()
    }

    /// Check that the columns match what the plot type requires.
    ///
    /// Orientation is only meaningful for bar charts and is ignored elsewhere.
    pub fn validate(&self) -> Result<()> {
        if self.metric_column.trim().is_empty() {
            return Err(ChartsqlError::ConfigError(
                "A metric column is required".to_string(),
            ));
        }
        if self.table_name.trim().is_empty() {
            return Err(ChartsqlError::ConfigError(
                "A table name is required".to_string(),
            ));
        }
        if let Some(color) = &self.color_column {
            if color.trim().is_empty() {
                return Err(ChartsqlError::ConfigError(
                    "Color column must not be empty".to_string(),
                ));
            }
        }
        if self.dim_columns.iter().any(|d| d.trim().is_empty()) {
            return Err(ChartsqlError::ConfigError(
                "Dimension columns must not be empty".to_string(),
            ));
        }

        match self.plot_type {
            PlotType::Bar | PlotType::Line => self.require_dims(1),
            PlotType::Scatter => self.require_dims(2),
            PlotType::Heatmap => {
                self.require_dims(2)?;
                self.reject_color()?;
                let (x, y) = (&self.dim_columns[0], &self.dim_columns[1]);
                if x == y || x == &self.metric_column || y == &self.metric_column {
                    return Err(ChartsqlError::ConfigError(format!(
                        "Heatmap axes '{}', '{}' and metric '{}' must be different columns",
                        x, y, self.metric_column
                    )));
                }
                Ok(())
            }
            PlotType::Sankey => {
                if self.dim_columns.len() < 2 {
                    return Err(ChartsqlError::ConfigError(format!(
                        "Sankey charts need at least 2 dimension columns, got {}",
                        self.dim_columns.len()
                    )));
                }
                let mut seen = std::collections::HashSet::new();
                if let Some(dup) = self.dim_columns.iter().find(|d| !seen.insert(*d)) {
                    return Err(ChartsqlError::ConfigError(format!(
                        "Sankey stage '{}' appears more than once",
                        dup
                    )));
                }
                self.reject_color()
            }
        }
    }

    fn require_dims(&self, expected: usize) -> Result<()> {
        if self.dim_columns.len() != expected {
            return Err(ChartsqlError::ConfigError(format!(
                "{} charts need exactly {} dimension column{}, got {}",
                self.plot_type,
                expected,
                if expected == 1 { "" } else { "s" },
                self.dim_columns.len()
            )));
        }
        Ok(())
    }

    fn reject_color(&self) -> Result<()> {
        if self.color_column.is_some() {
            return Err(ChartsqlError::ConfigError(format!(
                "{} charts do not support a color column",
                self.plot_type
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Layout options
// =============================================================================

/// Tuning of the flow layout's vertical placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Vertical band nodes are spread across
    pub band: (f64, f64),
    /// Stages with at most this many nodes use `compact_band`; 0 disables
    pub compact_max_nodes: usize,
    pub compact_band: (f64, f64),
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            band: (0.001, 0.999),
            compact_max_nodes: 0,
            compact_band: (0.3, 0.7),
        }
    }
}

impl LayoutOptions {
    /// Band used for a stage holding `nodes` nodes
    pub fn band_for(&self, nodes: usize) -> (f64, f64) {
        if self.compact_max_nodes > 0 && nodes <= self.compact_max_nodes {
            self.compact_band
        } else {
            self.band
        }
    }
}
