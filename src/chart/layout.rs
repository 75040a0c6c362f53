//! Node placement of flow (Sankey) diagrams.
//!
//! Input is the aggregated edge set of adjacent stage pairs; output is a
//! [`FlowGraph`] of parallel arrays a Sankey trace can draw directly.
//!
//! # Placement
//!
//! - A node belongs to the first stage pair it appears in as a source. Nodes
//!   that only ever appear as targets form a terminal stage after every other.
//! - Stages are ranked in pair order; `x = round(rank / N, 3)` for N stages.
//! - Inside a stage nodes follow [`OrderKey`] order. A lone node is centered
//!   at 0.499, the first node sits at the band start and every other node at
//!   the band start plus its share of the stage weight accumulated before it.
//! - Every coordinate is clamped to `[0.001, 0.999]`.
//!
//! The result depends only on the edge set, never on edge order.

use crate::config::LayoutOptions;
use crate::order::OrderKey;
use crate::{ChartsqlError, DataFrame, Result};
use polars::prelude::{IntoColumn, NamedFrom, Series};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Lowest coordinate a node may take
pub const MIN_POSITION: f64 = 0.001;
/// Highest coordinate a node may take
pub const MAX_POSITION: f64 = 0.999;
/// y of the only node of a stage
pub const SINGLE_NODE_Y: f64 = 0.499;

/// Stage id of nodes that never appear as a source
const TERMINAL_STAGE: usize = usize::MAX;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn clamp_position(value: f64) -> f64 {
    value.clamp(MIN_POSITION, MAX_POSITION)
}

/// Aggregated flow between two adjacent stages
#[derive(Debug, Clone, PartialEq)]
pub struct FlowEdge {
    /// Index of the source stage; the target belongs to `pair + 1`
    pub pair: usize,
    pub source: String,
    pub target: String,
    pub value: f64,
}

/// A placed node
#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    pub label: String,
    /// Stage the value comes from
    pub namespace: usize,
    pub value: String,
    /// Sum of incident edge values
    pub weight: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug)]
struct NodeAcc<'a> {
    namespace: usize,
    value: &'a str,
    stage: usize,
    weight: f64,
}

fn node_index<'a>(
    index: &mut HashMap<(usize, &'a str), usize>,
    accs: &mut Vec<NodeAcc<'a>>,
    namespace: usize,
    value: &'a str,
) -> usize {
    *index.entry((namespace, value)).or_insert_with(|| {
        accs.push(NodeAcc {
            namespace,
            value,
            stage: TERMINAL_STAGE,
            weight: 0.0,
        });
        accs.len() - 1
    })
}

/// Make every label unique.
///
/// A raw value can collide with another node's qualified label, e.g. a value
/// `x (b)` next to `x` of stage `b`. The first node keeps a contested label;
/// later ones get a ` #n` suffix that no other label uses.
fn dedupe_labels(nodes: &mut [FlowNode]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for node in nodes.iter() {
        *counts.entry(node.label.clone()).or_default() += 1;
    }
    if counts.values().all(|count| *count == 1) {
        return;
    }

    let mut taken: HashSet<String> = counts.keys().cloned().collect();
    let mut seen: HashSet<String> = HashSet::new();
    for node in nodes.iter_mut() {
        if counts[&node.label] == 1 || seen.insert(node.label.clone()) {
            continue;
        }
        let mut suffix = 2;
        let label = loop {
            let candidate = format!("{} #{}", node.label, suffix);
            if !taken.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        taken.insert(label.clone());
        node.label = label;
    }
}

/// Computed flow layout
#[derive(Debug, Clone, PartialEq)]
pub struct FlowLayout {
    nodes: Vec<FlowNode>,
    /// (source node, target node, value)
    links: Vec<(usize, usize, f64)>,
}

impl FlowLayout {
    pub fn compute(stages: &[String], edges: &[FlowEdge], options: &LayoutOptions) -> Result<Self> {
        if stages.len() < 2 {
            return Err(ChartsqlError::ConfigError(format!(
                "A flow layout needs at least 2 stages, got {}",
                stages.len()
            )));
        }
        if let Some(edge) = edges.iter().find(|e| e.pair + 1 >= stages.len()) {
            return Err(ChartsqlError::InternalError(format!(
                "Edge of stage pair {} outside {} stages",
                edge.pair,
                stages.len()
            )));
        }

        // Weights are summed in a fixed edge order so float rounding never
        // depends on the order rows came back from the engine
        let mut edges: Vec<&FlowEdge> = edges.iter().collect();
        edges.sort_by(|a, b| {
            (a.pair, &a.source, &a.target)
                .cmp(&(b.pair, &b.source, &b.target))
                .then(a.value.total_cmp(&b.value))
        });

        // Label and stage assignment
        let mut index: HashMap<(usize, &str), usize> = HashMap::new();
        let mut accs: Vec<NodeAcc> = Vec::new();
        let mut edge_nodes = Vec::with_capacity(edges.len());
        for &edge in &edges {
            let source = node_index(&mut index, &mut accs, edge.pair, &edge.source);
            let target = node_index(&mut index, &mut accs, edge.pair + 1, &edge.target);
            accs[source].stage = accs[source].stage.min(edge.pair);
            accs[source].weight += edge.value;
            accs[target].weight += edge.value;
            edge_nodes.push((source, target));
        }

        // Stage ranks give x
        let stage_ids: BTreeSet<usize> = accs.iter().map(|n| n.stage).collect();
        let rank: HashMap<usize, usize> = stage_ids
            .iter()
            .enumerate()
            .map(|(rank, stage)| (*stage, rank))
            .collect();

        let mut by_stage: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, node) in accs.iter().enumerate() {
            by_stage.entry(node.stage).or_default().push(idx);
        }

        // Collisions of the same value across stages get qualified labels
        let mut value_counts: HashMap<&str, usize> = HashMap::new();
        for node in &accs {
            *value_counts.entry(node.value).or_default() += 1;
        }

        let stage_count = stages.len() as f64;
        let mut nodes = Vec::with_capacity(accs.len());
        let mut final_index = vec![0usize; accs.len()];
        for (stage, mut members) in by_stage {
            members.sort_by(|a, b| {
                let (a, b) = (&accs[*a], &accs[*b]);
                OrderKey::of(Some(a.value))
                    .cmp(&OrderKey::of(Some(b.value)))
                    .then(a.namespace.cmp(&b.namespace))
                    .then(a.value.cmp(b.value))
            });

            let x = clamp_position(round3(rank[&stage] as f64 / stage_count));
            let band = options.band_for(members.len());
            let total: f64 = members.iter().map(|m| accs[*m].weight).sum();

            let mut running = 0.0;
            for (position, member) in members.iter().enumerate() {
                let acc = &accs[*member];
                let y = if members.len() == 1 {
                    SINGLE_NODE_Y
                } else if position == 0 {
                    band.0
                } else if total > 0.0 {
                    band.0 + (running / total) * (band.1 - band.0)
                } else {
                    band.0
                };
                running += acc.weight;

                let label = if value_counts[acc.value] > 1 {
                    format!("{} ({})", acc.value, stages[acc.namespace])
                } else {
                    acc.value.to_string()
                };

                final_index[*member] = nodes.len();
                nodes.push(FlowNode {
                    label,
                    namespace: acc.namespace,
                    value: acc.value.to_string(),
                    weight: acc.weight,
                    x,
                    y: clamp_position(round3(y)),
                });
            }
        }

        dedupe_labels(&mut nodes);

        let mut ordered: Vec<(usize, usize, usize, f64)> = edges
            .iter()
            .zip(edge_nodes)
            .map(|(edge, (s, t))| (edge.pair, final_index[s], final_index[t], edge.value))
            .collect();
        ordered.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
        let links = ordered.into_iter().map(|(_, s, t, v)| (s, t, v)).collect();

        Ok(Self { nodes, links })
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[(usize, usize, f64)] {
        &self.links
    }

    pub fn into_graph(self) -> FlowGraph {
        let mut graph = FlowGraph::default();
        for node in self.nodes {
            graph.labels.push(node.label);
            graph.x.push(node.x);
            graph.y.push(node.y);
        }
        for (source, target, value) in self.links {
            graph.source.push(source);
            graph.target.push(target);
            graph.value.push(value);
        }
        graph
    }
}

/// Flow diagram as parallel arrays.
///
/// `labels`, `x` and `y` are aligned per node; `source`, `target` and
/// `value` per edge, with endpoints as zero-based indices into `labels`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowGraph {
    pub labels: Vec<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub source: Vec<usize>,
    pub target: Vec<usize>,
    pub value: Vec<f64>,
}

impl FlowGraph {
    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    pub fn edge_count(&self) -> usize {
        self.source.len()
    }

    /// The graph as a single row of six list columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let list = |name: &str, inner: Series| Series::new(name.into(), [inner]).into_column();
        let indices = |v: &[usize]| v.iter().map(|i| *i as i64).collect::<Vec<i64>>();

        DataFrame::new(vec![
            list("label", Series::new("".into(), self.labels.clone())),
            list("x", Series::new("".into(), self.x.clone())),
            list("y", Series::new("".into(), self.y.clone())),
            list("source", Series::new("".into(), indices(&self.source))),
            list("target", Series::new("".into(), indices(&self.target))),
            list("value", Series::new("".into(), self.value.clone())),
        ])
        .map_err(|e| ChartsqlError::OutputError(format!("Failed to build flow frame: {}", e)))
    }
}
