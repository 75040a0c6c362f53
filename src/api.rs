//! High-level chartsql API.
//!
//! Two-stage API: `prepare()` → `execute()`. Preparing validates the
//! configuration and builds the chart query without touching any data;
//! executing runs it against a [`Reader`] and assembles the output.

use crate::chart::{
    category, frame_to_records, CategoryOrder, Chart, ChartOutput, PaletteDecision,
};
use crate::config::{ChartConfiguration, LayoutOptions, PlotType};
use crate::reader::{schema_probe, Reader};
use crate::{ChartsqlError, Result};
use std::time::Instant;
use tracing::{debug, info};

// ============================================================================
// Core Types
// ============================================================================

/// Result of `prepare()`, ready for execution.
#[derive(Debug, Clone)]
pub struct Prepared {
    config: ChartConfiguration,
    chart: Chart,
    /// The chart query
    sql: String,
}

impl Prepared {
    /// The validated configuration.
    pub fn config(&self) -> &ChartConfiguration {
        &self.config
    }

    /// The resolved chart variant.
    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    /// The chart query, as sent to the reader.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Run the chart against `reader`.
    ///
    /// Columns are checked first, then the palette, the chart query and the
    /// category order probes. Any engine failure is reported with the SQL
    /// that caused it.
    pub fn execute(&self, reader: &dyn Reader, options: &LayoutOptions) -> Result<RenderedChart> {
        let start = Instant::now();
        let table = &self.config.table_name;

        reader
            .validate_columns(table, &self.chart.source_columns())
            .map_err(|e| with_sql(e, schema_probe(table)))?;

        let palette = match self
            .chart
            .palette_check(self.config.color_scheme.as_deref())
        {
            Some(check) => {
                let sql = check.query().to_string();
                let df = reader.execute(&sql).map_err(|e| with_sql(e, sql))?;
                check.decide(&df)?
            }
            None => PaletteDecision::Default,
        };

        let frame = reader
            .execute(&self.sql)
            .map_err(|e| with_sql(e, self.sql.clone()))?;
        debug!("Chart query returned {} rows", frame.height());

        let mut category_orders = CategoryOrder::new();
        for column in self.chart.category_columns() {
            let sql = category::probe_query(table, &column).to_string();
            let df = reader.execute(&sql).map_err(|e| with_sql(e, sql))?;
            if let Some(hint) = category::hint_from_probe(&df)? {
                category_orders.insert(column, hint);
            }
        }

        let output = self.chart.build_output(frame, category_orders, options)?;
        info!(
            "Rendered {} chart from '{}' in {:?}",
            self.chart.plot_type(),
            table,
            start.elapsed()
        );

        Ok(RenderedChart {
            config: self.config.clone(),
            sql: self.sql.clone(),
            palette,
            output,
        })
    }
}

/// Attach the failing SQL to a reader error
fn with_sql(error: ChartsqlError, sql: String) -> ChartsqlError {
    match error {
        ChartsqlError::ReaderError(message) | ChartsqlError::ValidationError(message) => {
            ChartsqlError::QueryError { sql, message }
        }
        other => other,
    }
}

/// Result of `execute()`.
#[derive(Debug, Clone)]
pub struct RenderedChart {
    config: ChartConfiguration,
    sql: String,
    palette: PaletteDecision,
    output: ChartOutput,
}

impl RenderedChart {
    /// The chart query that produced this output.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn output(&self) -> &ChartOutput {
        &self.output
    }

    pub fn plot_type(&self) -> PlotType {
        self.config.plot_type
    }

    pub fn config(&self) -> &ChartConfiguration {
        &self.config
    }

    pub fn palette_decision(&self) -> PaletteDecision {
        self.palette
    }

    /// Custom palette to draw with, `None` for the renderer's default colors.
    pub fn color_scheme(&self) -> Option<&[String]> {
        if self.palette.is_disabled() {
            return None;
        }
        self.config.color_scheme.as_deref()
    }

    /// Node and link colors of a flow chart, from a two-color palette.
    pub fn flow_colors(&self) -> Option<(&str, &str)> {
        match (&self.output, self.color_scheme()) {
            (ChartOutput::Flow(_), Some([node, link])) => Some((node.as_str(), link.as_str())),
            _ => None,
        }
    }

    /// JSON document for a charting front end.
    pub fn to_json(&self) -> Result<String> {
        use serde_json::{json, Value};

        let mut doc = json!({
            "plot_type": self.config.plot_type,
            "sql": self.sql,
            "title": self.config.title,
            "x_label": self.config.x_label,
            "y_label": self.config.y_label,
            "width": self.config.width,
            "height": self.config.height,
            "color_scheme": self.color_scheme(),
            "palette": self.palette,
        });

        let body = match &self.output {
            ChartOutput::Tabular {
                data,
                category_orders,
                encoding,
            } => json!({
                "data": frame_to_records(data)?,
                "category_orders": category_orders,
                "encoding": encoding,
            }),
            ChartOutput::Flow(graph) => {
                let (node_color, link_color) = self.flow_colors().unzip();
                json!({
                    "flow": graph,
                    "node_color": node_color,
                    "link_color": link_color,
                })
            }
        };
        if let (Value::Object(doc), Value::Object(body)) = (&mut doc, body) {
            doc.extend(body);
        }

        serde_json::to_string_pretty(&doc)
            .map_err(|e| ChartsqlError::OutputError(format!("Failed to serialize chart: {}", e)))
    }
}

// ============================================================================
// High-Level API Functions
// ============================================================================

/// Validate a configuration and build its chart query.
pub fn prepare(config: &ChartConfiguration) -> Result<Prepared> {
    let start = Instant::now();
    let chart = Chart::from_config(config)?;
    let sql = chart.build_query().to_string();
    debug!(
        "Prepared {} chart query in {:?}:\n{}",
        chart.plot_type(),
        start.elapsed(),
        sql
    );

    Ok(Prepared {
        config: config.clone(),
        chart,
        sql,
    })
}

/// `prepare()` and `execute()` in one call.
pub fn render(
    config: &ChartConfiguration,
    reader: &dyn Reader,
    options: &LayoutOptions,
) -> Result<RenderedChart> {
    prepare(config)?.execute(reader, options)
}
