//! Plot type dispatch.
//!
//! A validated [`ChartConfiguration`] becomes one [`Chart`] variant per plot
//! type. Every variant knows how to build its query and how to turn the
//! query result into a [`ChartOutput`].

pub mod category;
pub mod layout;
pub mod palette;
pub mod sankey;
pub mod tabular;

pub use category::CategoryOrder;
pub use layout::{FlowEdge, FlowGraph, FlowLayout};
pub use palette::{PaletteCheck, PaletteDecision};
pub use sankey::SankeyChart;
pub use tabular::TabularChart;

use crate::config::{ChartConfiguration, LayoutOptions, Orientation, PlotType};
use crate::sql::Query;
use crate::{ChartsqlError, DataFrame, Result};
use polars::prelude::DataType;
use serde::Serialize;

/// Which result column feeds which visual channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Encoding {
    pub x: String,
    pub y: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Result of a render
#[derive(Debug, Clone)]
pub enum ChartOutput {
    /// Bar, line, heatmap and scatter charts
    Tabular {
        data: DataFrame,
        category_orders: CategoryOrder,
        encoding: Encoding,
    },
    /// Sankey charts
    Flow(FlowGraph),
}

/// A chart ready to build its query
#[derive(Debug, Clone)]
pub enum Chart {
    Bar {
        chart: TabularChart,
        orientation: Orientation,
    },
    Line(TabularChart),
    Heatmap(TabularChart),
    Scatter(TabularChart),
    Sankey(SankeyChart),
}

impl Chart {
    /// Validate the configuration and select the chart variant
    pub fn from_config(config: &ChartConfiguration) -> Result<Self> {
        config.validate()?;

        let tabular = || {
            TabularChart::new(
                &config.table_name,
                &config.metric_column,
                config.aggregation_method,
                config.dim_columns.clone(),
                config.color_column.clone(),
            )
        };

        Ok(match config.plot_type {
            PlotType::Bar => Chart::Bar {
                chart: tabular(),
                orientation: config.orientation(),
            },
            PlotType::Line => Chart::Line(tabular()),
            PlotType::Heatmap => Chart::Heatmap(tabular()),
            PlotType::Scatter => Chart::Scatter(tabular()),
            PlotType::Sankey => Chart::Sankey(SankeyChart::new(
                &config.table_name,
                &config.metric_column,
                config.aggregation_method,
                config.dim_columns.clone(),
            )?),
        })
    }

    pub fn plot_type(&self) -> PlotType {
        match self {
            Chart::Bar { .. } => PlotType::Bar,
            Chart::Line(_) => PlotType::Line,
            Chart::Heatmap(_) => PlotType::Heatmap,
            Chart::Scatter(_) => PlotType::Scatter,
            Chart::Sankey(_) => PlotType::Sankey,
        }
    }

    pub fn build_query(&self) -> Query {
        match self {
            Chart::Bar { chart, .. } | Chart::Line(chart) => chart.ordered_query(),
            Chart::Heatmap(chart) => chart.heatmap_query(),
            Chart::Scatter(chart) => chart.scatter_query(),
            Chart::Sankey(chart) => chart.query(),
        }
    }

    /// Columns whose values need to exist in the source table
    pub fn source_columns(&self) -> Vec<String> {
        match self {
            Chart::Bar { chart, .. }
            | Chart::Line(chart)
            | Chart::Heatmap(chart)
            | Chart::Scatter(chart) => chart.source_columns(),
            Chart::Sankey(chart) => chart.source_columns(),
        }
    }

    /// Category columns that receive an ordering hint
    pub fn category_columns(&self) -> Vec<String> {
        match self {
            Chart::Bar { chart, .. }
            | Chart::Line(chart)
            | Chart::Heatmap(chart)
            | Chart::Scatter(chart) => chart.category_columns(),
            Chart::Sankey(_) => Vec::new(),
        }
    }

    /// Distinct-count check to run before applying a discrete palette
    pub fn palette_check(&self, scheme: Option<&[String]>) -> Option<PaletteCheck> {
        let scheme = scheme?;
        match self {
            Chart::Bar { chart, .. } | Chart::Line(chart) => chart
                .color_column()
                .map(|c| PaletteCheck::new(chart.table(), c, scheme.len(), false)),
            Chart::Scatter(chart) => chart
                .color_column()
                .map(|c| PaletteCheck::new(chart.table(), c, scheme.len(), true)),
            // Continuous scale and node/link colors
            Chart::Heatmap(_) | Chart::Sankey(_) => None,
        }
    }

    /// Visual channels of a tabular chart's result
    pub fn encoding(&self) -> Option<Encoding> {
        match self {
            Chart::Bar { chart, orientation } => {
                let (dim, metric) = (chart.dims()[0].clone(), chart.metric_alias().to_string());
                let (x, y) = match orientation {
                    Orientation::V => (dim, metric),
                    Orientation::H => (metric, dim),
                };
                Some(Encoding {
                    x,
                    y,
                    color: chart.color_column().map(String::from),
                    size: None,
                })
            }
            Chart::Line(chart) => Some(Encoding {
                x: chart.dims()[0].clone(),
                y: chart.metric_alias().to_string(),
                color: chart.color_column().map(String::from),
                size: None,
            }),
            Chart::Heatmap(chart) => Some(Encoding {
                x: chart.dims()[0].clone(),
                y: chart.dims()[1].clone(),
                color: Some(chart.metric_alias().to_string()),
                size: None,
            }),
            Chart::Scatter(chart) => Some(Encoding {
                x: chart.dims()[0].clone(),
                y: chart.dims()[1].clone(),
                color: chart.color_column().map(String::from),
                size: Some(chart.metric_alias().to_string()),
            }),
            Chart::Sankey(_) => None,
        }
    }

    /// Turn the query result into the chart output
    pub fn build_output(
        &self,
        frame: DataFrame,
        category_orders: CategoryOrder,
        options: &LayoutOptions,
    ) -> Result<ChartOutput> {
        match (self, self.encoding()) {
            (Chart::Sankey(chart), _) => {
                let edges = chart.edges(&frame)?;
                let graph = FlowLayout::compute(chart.stages(), &edges, options)?.into_graph();
                Ok(ChartOutput::Flow(graph))
            }
            (_, Some(encoding)) => Ok(ChartOutput::Tabular {
                data: tabular::drop_synthetic_columns(frame)?,
                category_orders,
                encoding,
            }),
            (_, None) => Err(ChartsqlError::InternalError(format!(
                "No encoding for {} chart",
                self.plot_type()
            ))),
        }
    }
}

// =============================================================================
// Frame helpers
// =============================================================================

fn frame_error(column: &str, e: impl std::fmt::Display) -> ChartsqlError {
    ChartsqlError::OutputError(format!("Column '{}': {}", column, e))
}

/// Text values of a column
pub(crate) fn column_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .map_err(|e| frame_error(name, e))?
        .as_materialized_series()
        .cast(&DataType::String)
        .map_err(|e| frame_error(name, e))?;
    Ok(series
        .str()
        .map_err(|e| frame_error(name, e))?
        .into_iter()
        .map(|v| v.map(String::from))
        .collect())
}

/// Numeric values of a column, as floats
pub(crate) fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|e| frame_error(name, e))?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| frame_error(name, e))?;
    Ok(series
        .f64()
        .map_err(|e| frame_error(name, e))?
        .into_iter()
        .collect())
}

/// Integer values of a column
pub(crate) fn column_i64(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = df
        .column(name)
        .map_err(|e| frame_error(name, e))?
        .as_materialized_series()
        .cast(&DataType::Int64)
        .map_err(|e| frame_error(name, e))?;
    Ok(series
        .i64()
        .map_err(|e| frame_error(name, e))?
        .into_iter()
        .collect())
}

/// Boolean values of a column
pub(crate) fn column_bool(df: &DataFrame, name: &str) -> Result<Vec<Option<bool>>> {
    let series = df
        .column(name)
        .map_err(|e| frame_error(name, e))?
        .as_materialized_series()
        .cast(&DataType::Boolean)
        .map_err(|e| frame_error(name, e))?;
    Ok(series
        .bool()
        .map_err(|e| frame_error(name, e))?
        .into_iter()
        .collect())
}

/// Row-oriented JSON records of a frame.
///
/// Integers and floats stay numbers, booleans stay booleans, every other
/// type (dates, times, text) is rendered as text.
pub fn frame_to_records(df: &DataFrame) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    use serde_json::Value;

    let mut records = vec![serde_json::Map::new(); df.height()];
    for column in df.get_columns() {
        let name = column.name().to_string();
        let dtype = column.dtype();
        let values: Vec<Value> = if dtype.is_integer() {
            column_i64(df, &name)?
                .into_iter()
                .map(|v| v.map(Value::from).unwrap_or(Value::Null))
                .collect()
        } else if dtype.is_float() {
            column_f64(df, &name)?
                .into_iter()
                .map(|v| v.map(Value::from).unwrap_or(Value::Null))
                .collect()
        } else if dtype == &DataType::Boolean {
            column_bool(df, &name)?
                .into_iter()
                .map(|v| v.map(Value::from).unwrap_or(Value::Null))
                .collect()
        } else {
            column_strings(df, &name)?
                .into_iter()
                .map(|v| v.map(Value::from).unwrap_or(Value::Null))
                .collect()
        };
        for (record, value) in records.iter_mut().zip(values) {
            record.insert(name.clone(), value);
        }
    }
    Ok(records)
}
