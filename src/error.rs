use std::path::PathBuf;

use thiserror::Error;

use crate::graph::NodeId;

/// Errors raised by the composite key heap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    /// Peek or pop on a heap without entries.
    #[error("heap is empty")]
    EmptyHeap,
    /// Update or remove on a key which is not resident.
    #[error("key {key} not found in heap")]
    NotFound { key: String },
}

/// Errors raised while building an in-memory graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {node} out of range, graph has {node_count} nodes")]
    NodeOutOfRange { node: i64, node_count: usize },
    #[error("connection columns differ in length: from {from}, to {to}, values {values}")]
    ColumnLength { from: usize, to: usize, values: usize },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Errors raised by the merge engine.
///
/// The merge loop never fails on its expected exits (negative gain, cutoff,
/// no candidates); these only surface broken bookkeeping or bad options.
#[derive(Debug, Error)]
pub enum CnmError {
    #[error("heap bookkeeping broken: {0}")]
    Heap(#[from] HeapError),
    #[error("community {0} is already absorbed")]
    DeadCommunity(NodeId),
    #[error("no gain stored between communities {row} and {column}")]
    MissingGain { row: NodeId, column: NodeId },
    #[error("value {0} cannot be represented by the gain type")]
    NumericConversion(f64),
}

/// Errors raised by the binary dataset loader.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid descriptor {path}: {source}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("column '{column}' must hold integer node ids")]
    ColumnType { column: String },
    #[error("file name template '{0}' has no ${{FILE_ID}} placeholder")]
    Template(String),
    #[error("{path} holds {bytes} bytes, not a multiple of the {width}-byte element width")]
    Misaligned { path: PathBuf, bytes: u64, width: usize },
    #[error("column '{column}' expects {expected} elements, files hold {found}")]
    SizeMismatch { column: String, expected: usize, found: usize },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors raised when scoring a partition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("node {0} appears in more than one community")]
    Duplicate(NodeId),
    #[error("node {0} is not assigned to any community")]
    Missing(NodeId),
    #[error("node {node} out of range, graph has {node_count} nodes")]
    OutOfRange { node: NodeId, node_count: usize },
    #[error("weight of connection {from} - {to} is not representable as f64")]
    Weight { from: NodeId, to: NodeId },
}
