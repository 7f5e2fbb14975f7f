use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use num::ToPrimitive;

use crate::config::READ_BUFFER_SIZE;
use crate::error::GraphError;

/// Dense node id in `[0, node_count)`.
pub type NodeId = usize;

/// Read-only view of a graph, consumed once while the merge engine sets up.
///
/// Every undirected connection must be listed exactly once; listing it in
/// both directions doubles its weight. Self-loops are allowed and skipped.
pub trait GraphView {
    type Weight: Copy + ToPrimitive;

    fn node_count(&self) -> usize;

    fn connection_count(&self) -> usize;

    /// The `index`-th connection as `(from, to, weight)`.
    fn connection(&self, index: usize) -> (NodeId, NodeId, Self::Weight);

    fn connections(&self) -> impl Iterator<Item = (NodeId, NodeId, Self::Weight)> + '_ {
        (0..self.connection_count()).map(move |index| self.connection(index))
    }
}

/// A fixed-width per-node or per-connection feature column.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureColumn {
    I32(Vec<i32>),
    F32(Vec<f32>),
    U8(Vec<u8>),
}

impl FeatureColumn {
    pub fn len(&self) -> usize {
        match self {
            FeatureColumn::I32(column) => column.len(),
            FeatureColumn::F32(column) => column.len(),
            FeatureColumn::U8(column) => column.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column-oriented graph: parallel `from`/`to`/`value` arrays plus optional
/// named node feature columns.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeListGraph<W> {
    node_count: usize,
    from: Vec<NodeId>,
    to: Vec<NodeId>,
    values: Vec<W>,
    node_features: BTreeMap<String, FeatureColumn>,
}

impl<W: Copy + ToPrimitive> EdgeListGraph<W> {
    /// Create a graph with `node_count` isolated nodes.
    pub fn new(node_count: usize) -> Self {
        EdgeListGraph {
            node_count,
            from: vec![],
            to: vec![],
            values: vec![],
            node_features: BTreeMap::new(),
        }
    }

    pub fn from_edges(
        node_count: usize,
        edges: impl IntoIterator<Item = (NodeId, NodeId, W)>,
    ) -> Result<Self, GraphError> {
        let mut graph = EdgeListGraph::new(node_count);
        for (from, to, weight) in edges {
            graph.insert_edge(from, to, weight)?;
        }
        Ok(graph)
    }

    /// Build a graph from already materialized connection columns.
    pub fn from_columns(
        node_count: usize,
        from: Vec<NodeId>,
        to: Vec<NodeId>,
        values: Vec<W>,
    ) -> Result<Self, GraphError> {
        if from.len() != to.len() || from.len() != values.len() {
            return Err(GraphError::ColumnLength {
                from: from.len(),
                to: to.len(),
                values: values.len(),
            });
        }
        for node in from.iter().chain(to.iter()) {
            check_node(*node as i64, node_count)?;
        }
        Ok(EdgeListGraph {
            node_count,
            from,
            to,
            values,
            node_features: BTreeMap::new(),
        })
    }

    pub fn insert_edge(&mut self, from: NodeId, to: NodeId, weight: W) -> Result<(), GraphError> {
        check_node(from as i64, self.node_count)?;
        check_node(to as i64, self.node_count)?;
        self.from.push(from);
        self.to.push(to);
        self.values.push(weight);
        Ok(())
    }

    pub fn insert_node_feature(&mut self, name: impl Into<String>, column: FeatureColumn) {
        self.node_features.insert(name.into(), column);
    }

    pub fn node_feature(&self, name: &str) -> Option<&FeatureColumn> {
        self.node_features.get(name)
    }

    pub fn node_feature_names(&self) -> impl Iterator<Item = &str> {
        self.node_features.keys().map(|name| name.as_str())
    }

    pub fn describe(&self) -> String {
        format!(
            "EdgeListGraph(with {} nodes, {} connections and {} node features)",
            self.node_count,
            self.from.len(),
            self.node_features.len()
        )
    }
}

impl EdgeListGraph<f64> {
    /// Load an edge list text file: one `from to [weight]` per line, `#`
    /// starts a comment, a missing weight counts as 1. Without an explicit
    /// `node_count` the graph spans `0..=max id`.
    pub fn from_txt_file(file_path: impl AsRef<Path>, node_count: Option<usize>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let graph_file = File::open(file_path)
            .with_context(|| format!("failed to open edge list {}", file_path.display()))?;
        let graph_reader = BufReader::with_capacity(READ_BUFFER_SIZE, graph_file);

        let mut edges = vec![];
        let mut max_id: Option<NodeId> = None;
        for (line_idx, line) in graph_reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read {}", file_path.display()))?;
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            let (from, to, weight) = parse_edge_line(content, line_idx + 1)?;
            max_id = Some(max_id.map_or(from.max(to), |m| m.max(from).max(to)));
            edges.push((from, to, weight));
        }

        let inferred = max_id.map_or(0, |m| m + 1);
        let node_count = node_count.unwrap_or(inferred);
        let graph = EdgeListGraph::from_edges(node_count, edges)
            .with_context(|| format!("invalid edge list {}", file_path.display()))?;
        log::info!("Loaded {} from {}", graph.describe(), file_path.display());
        Ok(graph)
    }
}

impl<W: Copy + ToPrimitive> GraphView for EdgeListGraph<W> {
    type Weight = W;

    fn node_count(&self) -> usize {
        self.node_count
    }

    fn connection_count(&self) -> usize {
        self.from.len()
    }

    fn connection(&self, index: usize) -> (NodeId, NodeId, W) {
        (self.from[index], self.to[index], self.values[index])
    }
}

pub(crate) fn check_node(node: i64, node_count: usize) -> Result<NodeId, GraphError> {
    if node < 0 || node as u64 >= node_count as u64 {
        return Err(GraphError::NodeOutOfRange { node, node_count });
    }
    Ok(node as NodeId)
}

fn parse_edge_line(content: &str, line: usize) -> Result<(NodeId, NodeId, f64), GraphError> {
    let tokens: Vec<&str> = content.split_whitespace().collect();
    if tokens.len() < 2 || tokens.len() > 3 {
        return Err(GraphError::Parse {
            line,
            message: format!("expected 'from to [weight]', got '{}'", content),
        });
    }
    let parse_id = |token: &str| {
        token.parse::<NodeId>().map_err(|_| GraphError::Parse {
            line,
            message: format!("invalid node id '{}'", token),
        })
    };
    let from = parse_id(tokens[0])?;
    let to = parse_id(tokens[1])?;
    let weight = match tokens.get(2) {
        Some(token) => token.parse::<f64>().map_err(|_| GraphError::Parse {
            line,
            message: format!("invalid weight '{}'", token),
        })?,
        None => 1.0,
    };
    Ok((from, to, weight))
}
