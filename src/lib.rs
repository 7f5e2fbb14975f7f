//! Hierarchical community detection by greedy modularity maximisation
//! (Clauset, Newman and Moore), with the loaders and report helpers around it.

pub mod cnm;
pub mod community;
pub mod config;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod heap;
pub mod logger;
pub mod report;

pub use cnm::{greedy_modularity_communities, partition, CnmOutcome, MergeStep, ModularityMergeEngine, Step, StopReason};
pub use community::{modularity, Communities};
pub use config::CnmOptions;
pub use dataset::{DatasetLayout, DatasetLoader};
pub use graph::{EdgeListGraph, GraphView, NodeId};
pub use heap::CompositeKeyMaxHeap;
pub use report::display_communities;
