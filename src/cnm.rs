//! Greedy modularity maximisation after Clauset, Newman and Moore.
//!
//! Every node starts as its own community. The engine keeps, for each live
//! community, a sparse row of merge gains towards its neighbours together
//! with a max-heap over that row, and one global heap that holds the best
//! candidate of every non-empty row. Each step pops the global maximum and
//! merges the two communities, patching rows, row heaps and the global heap
//! in place.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Display};

use log::{debug, info};
use num::{Float, NumCast, ToPrimitive};
use serde::Serialize;

use crate::config::{CnmOptions, HISTOGRAM_THRESHOLD, PRINT_FREQUENCY_DQ, PRINT_FREQUENCY_DQH};
use crate::error::CnmError;
use crate::graph::{GraphView, NodeId};
use crate::heap::CompositeKeyMaxHeap;
use crate::report::display_communities;

/// Floating point type the gains are computed in.
pub trait Gain: Float + Debug + Display + Serialize {}

impl<T: Float + Debug + Display + Serialize> Gain for T {}

type GainRow<Q> = BTreeMap<NodeId, Q>;
type RowHeap<Q> = CompositeKeyMaxHeap<NodeId, Q>;
type CandidateHeap<Q> = CompositeKeyMaxHeap<(NodeId, NodeId), Q>;

/// One performed merge: `absorbed` was folded into `survivor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MergeStep<Q> {
    pub absorbed: NodeId,
    pub survivor: NodeId,
    pub gain: Q,
}

/// Why the merge loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum StopReason<Q> {
    /// The number of communities dropped to the cutoff.
    CutoffReached,
    /// The best remaining merge would lower modularity.
    NegativeGain(Q),
    /// No merge candidate left, carries the sentinel.
    NoCandidates(Q),
    /// The graph has no weight outside self-loops, every node is a singleton.
    DegenerateGraph,
}

/// Result of a single `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step<Q> {
    Merged(MergeStep<Q>),
    /// The best candidate has a negative gain; nothing was changed.
    Rejected(Q),
    /// Fewer than two candidates are left; carries the sentinel.
    Exhausted(Q),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CnmOutcome<Q> {
    /// Non-empty communities in ascending order of their surviving slot.
    pub communities: Vec<Vec<NodeId>>,
    /// Performed merges, oldest first.
    pub merges: Vec<MergeStep<Q>>,
    pub stop: StopReason<Q>,
}

pub struct ModularityMergeEngine<Q> {
    resolution: Q,
    cutoff: usize,
    verbose: bool,
    sentinel: Q,
    // Normalized degrees, a[i] = degree(i) / 2m.
    degrees: Vec<Q>,
    // Sparse gain matrix, `None` marks an absorbed community.
    gains: Vec<Option<GainRow<Q>>>,
    row_heaps: Vec<Option<RowHeap<Q>>>,
    // Best candidate of every non-empty row, keyed by (row, neighbour).
    candidates: CandidateHeap<Q>,
    communities: Vec<Vec<NodeId>>,
    live: usize,
    merges: Vec<MergeStep<Q>>,
    degenerate: bool,
}

fn cast<Q: Gain, T: ToPrimitive + Copy>(value: T) -> Result<Q, CnmError> {
    <Q as NumCast>::from(value)
        .ok_or_else(|| CnmError::NumericConversion(value.to_f64().unwrap_or(f64::NAN)))
}

impl<Q: Gain> ModularityMergeEngine<Q> {
    /// Build the gain matrix and all heaps for `graph`.
    ///
    /// Node ids must lie in `[0, node_count)` and weights must be
    /// non-negative; each undirected connection is listed once.
    pub fn new<G: GraphView>(graph: &G, options: &CnmOptions) -> Result<Self, CnmError> {
        let node_count = graph.node_count();
        let (degrees, total_weight) = Self::weighted_degrees(graph)?;

        let mut engine = ModularityMergeEngine {
            resolution: cast(options.resolution)?,
            cutoff: options.cutoff,
            verbose: options.verbose,
            sentinel: cast(options.sentinel)?,
            degrees,
            gains: (0..node_count).map(|_| Some(GainRow::new())).collect(),
            row_heaps: (0..node_count).map(|_| Some(RowHeap::new())).collect(),
            candidates: CandidateHeap::with_capacity(node_count),
            communities: (0..node_count).map(|node| vec![node]).collect(),
            live: node_count,
            merges: vec![],
            degenerate: false,
        };

        if total_weight == Q::zero() {
            // Gains are undefined without any weight.
            info!("Graph with {} nodes has no weighted connections, keeping singletons", node_count);
            engine.degenerate = true;
            return Ok(engine);
        }

        let two_m = total_weight + total_weight;
        for degree in engine.degrees.iter_mut() {
            *degree = *degree / two_m;
        }
        engine.build_gain_matrix(graph, total_weight)?;
        engine.build_heaps()?;
        info!(
            "Prepared {} communities with {} merge candidates",
            node_count,
            engine.candidates.size()
        );
        Ok(engine)
    }

    fn weighted_degrees<G: GraphView>(graph: &G) -> Result<(Vec<Q>, Q), CnmError> {
        let mut degrees = vec![Q::zero(); graph.node_count()];
        let mut total_weight = Q::zero();
        for (from, to, weight) in graph.connections() {
            if from == to {
                continue;
            }
            let weight: Q = cast(weight)?;
            degrees[from] = degrees[from] + weight;
            degrees[to] = degrees[to] + weight;
            total_weight = total_weight + weight;
        }
        Ok((degrees, total_weight))
    }

    fn build_gain_matrix<G: GraphView>(&mut self, graph: &G, total_weight: Q) -> Result<(), CnmError> {
        let node_count = graph.node_count();
        let connection_count = graph.connection_count();
        let mut rows: Vec<GainRow<Q>> = vec![GainRow::new(); node_count];

        // Parallel connections add up.
        for (index, (from, to, weight)) in graph.connections().enumerate() {
            if self.verbose && (index % PRINT_FREQUENCY_DQ == 0 || index + 1 == connection_count) {
                info!("create_delta_q {:.2}%", index as f64 * 100.0 / connection_count as f64);
            }
            if from == to {
                continue;
            }
            let weight: Q = cast(weight)?;
            let entry = rows[from].entry(to).or_insert_with(Q::zero);
            *entry = *entry + weight;
            let entry = rows[to].entry(from).or_insert_with(Q::zero);
            *entry = *entry + weight;
        }

        // Each pair is converted once so that both directions hold the same bits.
        let reverse_m = Q::one() / total_weight;
        let two = Q::one() + Q::one();
        for row in 0..node_count {
            let a_row = self.degrees[row];
            let converted: Vec<(NodeId, Q)> = rows[row]
                .range(row + 1..)
                .map(|(&column, &weight)| {
                    let gain = reverse_m * weight - self.resolution * two * a_row * self.degrees[column];
                    (column, gain)
                })
                .collect();
            for (column, gain) in converted {
                rows[row].insert(column, gain);
                rows[column].insert(row, gain);
            }
        }

        self.gains = rows.into_iter().map(Some).collect();
        Ok(())
    }

    fn build_heaps(&mut self) -> Result<(), CnmError> {
        let node_count = self.gains.len();
        for community in 0..node_count {
            if self.verbose && (community % PRINT_FREQUENCY_DQH == 0 || community + 1 == node_count) {
                info!("create_heaps {:.2}%", community as f64 * 100.0 / node_count as f64);
            }
            let row = self.row(community)?;
            let mut heap = RowHeap::with_capacity(row.len());
            for (&neighbor, &gain) in row {
                heap.push(neighbor, gain);
            }
            if let Some((neighbor, gain)) = heap.peek() {
                self.candidates.push((community, neighbor), gain);
            }
            self.row_heaps[community] = Some(heap);
        }
        Ok(())
    }

    /// Merge until the cutoff is reached, the best gain turns negative or no
    /// candidate is left.
    pub fn run(mut self) -> Result<CnmOutcome<Q>, CnmError> {
        let stop = if self.degenerate {
            StopReason::DegenerateGraph
        } else {
            self.merge_until_stop()?
        };
        info!(
            "Finished after {} merges with {} communities ({:?})",
            self.merges.len(),
            self.live,
            stop
        );
        Ok(self.into_outcome(stop))
    }

    fn merge_until_stop(&mut self) -> Result<StopReason<Q>, CnmError> {
        while self.live > self.cutoff {
            let step = self.step()?;
            if self.verbose {
                self.report_progress();
            }
            match step {
                Step::Merged(_) => {}
                Step::Rejected(gain) => return Ok(StopReason::NegativeGain(gain)),
                Step::Exhausted(sentinel) => return Ok(StopReason::NoCandidates(sentinel)),
            }
        }
        Ok(StopReason::CutoffReached)
    }

    /// Perform the single best merge, if it does not lower modularity.
    pub fn step(&mut self) -> Result<Step<Q>, CnmError> {
        if self.candidates.size() <= 1 {
            return Ok(Step::Exhausted(self.sentinel));
        }
        let ((absorbed, survivor), gain) = self.candidates.pop()?;
        if gain < Q::zero() {
            // Put it back so the engine stays consistent for later inspection.
            self.candidates.push((absorbed, survivor), gain);
            return Ok(Step::Rejected(gain));
        }

        self.merge(absorbed, survivor)?;
        let merge = MergeStep { absorbed, survivor, gain };
        self.merges.push(merge);
        debug!(
            "Merged community {} into {} (gain {}), {} communities left",
            absorbed, survivor, gain, self.live
        );
        Ok(Step::Merged(merge))
    }

    fn merge(&mut self, u: NodeId, v: NodeId) -> Result<(), CnmError> {
        self.detach_pair(u, v)?;
        self.absorb_members(u, v);
        let u_neighbors: Vec<NodeId> = self.row(u)?.keys().copied().collect();
        self.recompute_affected(u, v, &u_neighbors)?;
        self.drop_absorbed_edges(u, v, &u_neighbors)?;
        self.retire(u, v);
        Ok(())
    }

    /// Take the u/v entries out of both row heaps and refresh their candidates.
    fn detach_pair(&mut self, u: NodeId, v: NodeId) -> Result<(), CnmError> {
        // The global entry (u, v) is gone already, v is the top of u's row.
        let (top, _) = self.heap_mut(u)?.pop()?;
        debug_assert_eq!(top, v);
        self.promote_top(u)?;

        if self.heap(v)?.top_key()? == u {
            self.candidates.remove(&(v, u))?;
            self.heap_mut(v)?.remove(&u)?;
            self.promote_top(v)?;
        } else {
            self.heap_mut(v)?.remove(&u)?;
        }
        Ok(())
    }

    fn absorb_members(&mut self, u: NodeId, v: NodeId) {
        let absorbed = std::mem::take(&mut self.communities[u]);
        self.communities[v].extend(absorbed);
        self.live -= 1;
    }

    /// New gains between v and every neighbour of u or v.
    fn recompute_affected(&mut self, u: NodeId, v: NodeId, u_neighbors: &[NodeId]) -> Result<(), CnmError> {
        let u_set: BTreeSet<NodeId> = u_neighbors.iter().copied().collect();
        let v_set: BTreeSet<NodeId> = self.row(v)?.keys().copied().collect();
        let two = Q::one() + Q::one();

        for &w in u_set.union(&v_set) {
            if w == u || w == v {
                continue;
            }
            let in_u = u_set.contains(&w);
            let in_v = v_set.contains(&w);
            let gain = match (in_u, in_v) {
                (true, true) => self.gain(v, w)? + self.gain(u, w)?,
                (false, true) => self.gain(v, w)? - self.resolution * two * self.degrees[u] * self.degrees[w],
                _ => self.gain(u, w)? - self.resolution * two * self.degrees[v] * self.degrees[w],
            };
            self.write_gain(v, w, gain, in_v)?;
            self.write_gain(w, v, gain, in_v)?;
        }
        Ok(())
    }

    /// Store `gain` at (row, column) and keep the row's candidate current.
    fn write_gain(&mut self, row: NodeId, column: NodeId, gain: Q, resident: bool) -> Result<(), CnmError> {
        self.row_mut(row)?.insert(column, gain);
        let old_top = self.heap(row)?.peek();

        let heap = self.heap_mut(row)?;
        if resident {
            heap.update_value(&column, gain)?;
        } else {
            heap.push(column, gain);
        }
        let new_top = heap.top()?;

        match old_top {
            Some(old_top) if old_top != new_top => {
                self.candidates.remove(&(row, old_top.0))?;
                self.candidates.push((row, new_top.0), new_top.1);
            }
            Some(_) => {}
            None => self.candidates.push((row, new_top.0), new_top.1),
        }
        Ok(())
    }

    fn drop_absorbed_edges(&mut self, u: NodeId, v: NodeId, u_neighbors: &[NodeId]) -> Result<(), CnmError> {
        for &w in u_neighbors {
            self.row_mut(w)?.remove(&u);
            if w == v {
                continue;
            }
            self.evict(u, w)?;
            self.evict(w, u)?;
        }
        Ok(())
    }

    /// Remove `column` from the heap of `row`, refreshing the candidate if it was the top.
    fn evict(&mut self, row: NodeId, column: NodeId) -> Result<(), CnmError> {
        let heap = self.heap_mut(row)?;
        if heap.top_key()? == column {
            heap.pop()?;
            self.candidates.remove(&(row, column))?;
            self.promote_top(row)?;
        } else {
            heap.remove(&column)?;
        }
        Ok(())
    }

    fn promote_top(&mut self, community: NodeId) -> Result<(), CnmError> {
        if let Some((neighbor, gain)) = self.heap(community)?.peek() {
            self.candidates.push((community, neighbor), gain);
        }
        Ok(())
    }

    fn retire(&mut self, u: NodeId, v: NodeId) {
        debug_assert!(self.row_heaps[u].as_ref().map_or(false, |heap| heap.is_empty()));
        self.gains[u] = None;
        self.row_heaps[u] = None;
        self.degrees[v] = self.degrees[v] + self.degrees[u];
        self.degrees[u] = Q::zero();
    }

    fn report_progress(&self) {
        let show_size = self.communities.len() > HISTOGRAM_THRESHOLD;
        info!("{}", display_communities(&self.communities, show_size));
    }

    fn into_outcome(self, stop: StopReason<Q>) -> CnmOutcome<Q> {
        let communities = self
            .communities
            .into_iter()
            .filter(|community| !community.is_empty())
            .collect();
        CnmOutcome {
            communities,
            merges: self.merges,
            stop,
        }
    }

    fn row(&self, community: NodeId) -> Result<&GainRow<Q>, CnmError> {
        self.gains
            .get(community)
            .and_then(|row| row.as_ref())
            .ok_or(CnmError::DeadCommunity(community))
    }

    fn row_mut(&mut self, community: NodeId) -> Result<&mut GainRow<Q>, CnmError> {
        self.gains
            .get_mut(community)
            .and_then(|row| row.as_mut())
            .ok_or(CnmError::DeadCommunity(community))
    }

    fn heap(&self, community: NodeId) -> Result<&RowHeap<Q>, CnmError> {
        self.row_heaps
            .get(community)
            .and_then(|heap| heap.as_ref())
            .ok_or(CnmError::DeadCommunity(community))
    }

    fn heap_mut(&mut self, community: NodeId) -> Result<&mut RowHeap<Q>, CnmError> {
        self.row_heaps
            .get_mut(community)
            .and_then(|heap| heap.as_mut())
            .ok_or(CnmError::DeadCommunity(community))
    }

    fn gain(&self, row: NodeId, column: NodeId) -> Result<Q, CnmError> {
        self.row(row)?
            .get(&column)
            .copied()
            .ok_or(CnmError::MissingGain { row, column })
    }

    /// Number of non-empty communities.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Member lists by slot; absorbed slots are empty.
    pub fn communities(&self) -> &[Vec<NodeId>] {
        &self.communities
    }

    pub fn normalized_degrees(&self) -> &[Q] {
        &self.degrees
    }

    pub fn merges(&self) -> &[MergeStep<Q>] {
        &self.merges
    }

    /// Current gain of merging `row` and `column`, if they are neighbours.
    pub fn gain_between(&self, row: NodeId, column: NodeId) -> Option<Q> {
        self.gains.get(row)?.as_ref()?.get(&column).copied()
    }

    /// Cross-check the gain matrix, the row heaps and the candidate heap.
    pub fn is_consistent(&self) -> bool {
        if !self.candidates.is_consistent() {
            return false;
        }
        let mut expected_candidates = 0;
        for community in 0..self.gains.len() {
            let (row, heap) = match (&self.gains[community], &self.row_heaps[community]) {
                (Some(row), Some(heap)) => (row, heap),
                (None, None) => {
                    if !self.communities[community].is_empty() {
                        return false;
                    }
                    continue;
                }
                _ => return false,
            };
            if !heap.is_consistent() || heap.size() != row.len() {
                return false;
            }
            for (neighbor, gain) in row {
                // Symmetric and mirrored in the row heap.
                if self.gain_between(*neighbor, community) != Some(*gain) || heap.get(neighbor) != Some(*gain) {
                    return false;
                }
            }
            if let Some((neighbor, gain)) = heap.peek() {
                expected_candidates += 1;
                if self.candidates.get(&(community, neighbor)) != Some(gain) {
                    return false;
                }
            }
        }
        expected_candidates == self.candidates.size()
    }
}

/// Run the merge loop with the given options and gain type.
pub fn greedy_modularity_communities<Q: Gain, G: GraphView>(
    graph: &G,
    options: &CnmOptions,
) -> Result<CnmOutcome<Q>, CnmError> {
    ModularityMergeEngine::<Q>::new(graph, options)?.run()
}

/// Partition `graph` into communities, computing gains in `f64`.
pub fn partition<G: GraphView>(
    graph: &G,
    resolution: f64,
    cutoff: usize,
    verbose: bool,
) -> Result<Vec<Vec<NodeId>>, CnmError> {
    let options = CnmOptions::default()
        .with_resolution(resolution)
        .with_cutoff(cutoff)
        .with_verbose(verbose);
    Ok(greedy_modularity_communities::<f64, G>(graph, &options)?.communities)
}
