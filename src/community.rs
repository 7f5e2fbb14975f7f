use fixedbitset::FixedBitSet;
use num::ToPrimitive;

use crate::error::PartitionError;
use crate::graph::{GraphView, NodeId};

/// A partition of the node set, one member list per community.
pub type Communities = Vec<Vec<NodeId>>;

/// Map every node to the index of its community.
///
/// The communities must cover `[0, node_count)` exactly once.
pub fn community_of(communities: &[Vec<NodeId>], node_count: usize) -> Result<Vec<usize>, PartitionError> {
    let mut seen = FixedBitSet::with_capacity(node_count);
    let mut membership = vec![0usize; node_count];
    for (index, community) in communities.iter().enumerate() {
        for &node in community {
            if node >= node_count {
                return Err(PartitionError::OutOfRange { node, node_count });
            }
            if seen.put(node) {
                return Err(PartitionError::Duplicate(node));
            }
            membership[node] = index;
        }
    }
    if let Some(missing) = (0..node_count).find(|node| !seen.contains(*node)) {
        return Err(PartitionError::Missing(missing));
    }
    Ok(membership)
}

/// Newman modularity of a partition,
/// `Q = sum_c [ L_c / m - resolution * (d_c / 2m)^2 ]`,
/// where `L_c` is the weight inside `c` and `d_c` the weighted degree of `c`.
/// Self-loops are ignored, the same way the merge engine ignores them. A
/// weight without an `f64` representation is an error, as in the engine.
pub fn modularity<G: GraphView>(
    graph: &G,
    communities: &[Vec<NodeId>],
    resolution: f64,
) -> Result<f64, PartitionError> {
    let membership = community_of(communities, graph.node_count())?;
    let mut internal: Vec<f64> = vec![0.0; communities.len()];
    let mut degrees: Vec<f64> = vec![0.0; communities.len()];
    let mut total_weight = 0.0f64;

    for (from, to, weight) in graph.connections() {
        if from == to {
            continue;
        }
        let weight = weight.to_f64().ok_or(PartitionError::Weight { from, to })?;
        let (com_from, com_to) = (membership[from], membership[to]);
        total_weight += weight;
        degrees[com_from] += weight;
        degrees[com_to] += weight;
        if com_from == com_to {
            internal[com_from] += weight;
        }
    }
    if total_weight == 0.0 {
        return Ok(0.0);
    }

    let mut res = 0.0f64;
    for i in 0..communities.len() {
        res += internal[i] / total_weight - resolution * (degrees[i] / (2.0 * total_weight)).powi(2);
    }
    Ok(res)
}
