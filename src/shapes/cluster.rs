//! Greedy clustering of shapes.
//!
//! Shapes are visited shallowest first. A shape joins the first cluster whose
//! members all share its base function, are within the cluster distance and
//! are neither its ancestors nor its descendants; otherwise it starts a new
//! cluster. Clusters are then packed into groups that never contain an
//! ancestor and a descendant cluster together, so a group can be drawn at once.

use super::metric::ShapeMetric;
use super::{FunctionId, PatternId};
use crate::timeline::{Pattern, Program, Representation, Thread};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Shapes with the same base function that are close and unrelated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// First member to join; the id of relabeled patterns
    pub representative: PatternId,
    pub base_function: FunctionId,
    /// Deepest member depth
    pub depth: u32,
    pub shape_ids: BTreeSet<PatternId>,
    pub descendant_shape_ids: BTreeSet<PatternId>,

    #[serde(skip)]
    members: Vec<usize>,
    #[serde(skip)]
    descendants: BTreeSet<usize>,
}

impl Cluster {
    fn seed(metric: &ShapeMetric, index: usize) -> Self {
        let shape = metric.forest().shape(index);
        let mut cluster = Self {
            representative: shape.id,
            base_function: shape.base_function,
            depth: shape.depth,
            shape_ids: BTreeSet::new(),
            descendant_shape_ids: BTreeSet::new(),
            members: Vec::new(),
            descendants: BTreeSet::new(),
        };
        cluster.merge(metric, index);
        cluster
    }

    fn merge(&mut self, metric: &ShapeMetric, index: usize) {
        let forest = metric.forest();
        let shape = forest.shape(index);
        self.depth = self.depth.max(shape.depth);
        self.shape_ids.insert(shape.id);
        self.members.push(index);
        for &descendant in forest.descendants(index) {
            if self.descendants.insert(descendant) {
                self.descendant_shape_ids.insert(forest.shape(descendant).id);
            }
        }
    }

    fn accepts(&self, metric: &ShapeMetric, index: usize, threshold: f64) -> bool {
        let forest = metric.forest();
        if forest.shape(index).base_function != self.base_function {
            return false;
        }
        if self.descendants.contains(&index) {
            return false;
        }
        let descendants = forest.descendants(index);
        self.members.iter().all(|&member| {
            metric.distance_by_index(member, index) <= threshold && !descendants.contains(&member)
        })
    }

    /// True when a member of one cluster descends from a member of the other
    fn overlaps(&self, other: &Cluster) -> bool {
        self.members.iter().any(|m| other.descendants.contains(m))
            || other.members.iter().any(|m| self.descendants.contains(m))
    }
}

/// Clusters that can be shown together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGroup {
    /// Indices into `ShapeClusterer::clusters`, deepest first
    pub clusters: Vec<usize>,
}

/// Clustering result over one shape metric
#[derive(Debug, Clone)]
pub struct ShapeClusterer {
    clusters: Vec<Cluster>,
    groups: Vec<ClusterGroup>,
    cluster_by_shape: HashMap<PatternId, usize>,
}

impl ShapeClusterer {
    /// Cluster every non-null shape of `metric`
    pub fn new(metric: &ShapeMetric, threshold: f64) -> Self {
        let forest = metric.forest();
        let mut clusters: Vec<Cluster> = Vec::new();
        let mut cluster_by_shape = HashMap::new();

        // Forest indices are already in ascending depth order
        for index in forest.non_null_indices() {
            let id = forest.shape(index).id;
            let position = match clusters
                .iter()
                .position(|cluster| cluster.accepts(metric, index, threshold))
            {
                Some(position) => {
                    clusters[position].merge(metric, index);
                    position
                }
                None => {
                    clusters.push(Cluster::seed(metric, index));
                    clusters.len() - 1
                }
            };
            cluster_by_shape.insert(id, position);
        }

        let groups = group_clusters(&clusters);
        info!(
            "Clustered {} shapes into {} clusters and {} groups",
            cluster_by_shape.len(),
            clusters.len(),
            groups.len()
        );

        Self {
            clusters,
            groups,
            cluster_by_shape,
        }
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn groups(&self) -> &[ClusterGroup] {
        &self.groups
    }

    /// Index of the cluster holding `id`
    pub fn cluster_of(&self, id: PatternId) -> Option<usize> {
        self.cluster_by_shape.get(&id).copied()
    }

    /// Shape id standing for cluster `index`
    pub fn representative(&self, index: usize) -> Option<PatternId> {
        self.clusters.get(index).map(|cluster| cluster.representative)
    }

    /// Relabel every shape pattern with its cluster
    ///
    /// Patterns of one thread that fall in the same cluster and lane are
    /// merged into a single pattern whose intervals are sorted by start time.
    /// Patterns without a cluster are kept as they are.
    pub fn relabel(&self, program: &Program) -> Program {
        let threads = program
            .threads
            .iter()
            .map(|thread| Thread {
                id: thread.id.clone(),
                patterns: self.relabel_patterns(&thread.patterns),
            })
            .collect();

        Program {
            absolute_start_time: program.absolute_start_time.clone(),
            duration: program.duration,
            threads,
        }
    }

    fn relabel_patterns(&self, patterns: &[Pattern]) -> Vec<Pattern> {
        let mut relabeled: Vec<Pattern> = Vec::with_capacity(patterns.len());
        let mut slot_by_lane: HashMap<(usize, u32), usize> = HashMap::new();

        for pattern in patterns {
            let lane = pattern.depth();
            let cluster_index = match &pattern.representation {
                Representation::Shape(shape) => self.cluster_of(shape.id),
                Representation::Cluster { .. } => None,
            };
            let Some(cluster_index) = cluster_index else {
                relabeled.push(pattern.clone());
                continue;
            };

            match slot_by_lane.get(&(cluster_index, lane)) {
                Some(&slot) => {
                    relabeled[slot]
                        .intervals
                        .extend(pattern.intervals.iter().copied());
                }
                None => {
                    let cluster = &self.clusters[cluster_index];
                    slot_by_lane.insert((cluster_index, lane), relabeled.len());
                    relabeled.push(Pattern {
                        id: cluster.representative,
                        representation: Representation::Cluster {
                            cluster_id: cluster_index,
                            base_function: cluster.base_function,
                            depth: lane,
                            shape_ids: cluster.shape_ids.iter().copied().collect(),
                        },
                        intervals: pattern.intervals.clone(),
                    });
                }
            }
        }

        for pattern in &mut relabeled {
            pattern.intervals.sort_by_key(|interval| interval.start);
        }
        debug!(
            "Relabeled {} patterns into {}",
            patterns.len(),
            relabeled.len()
        );
        relabeled
    }
}

/// Pack clusters, deepest first, into groups without ancestor/descendant pairs
fn group_clusters(clusters: &[Cluster]) -> Vec<ClusterGroup> {
    let mut order: Vec<usize> = (0..clusters.len()).collect();
    order.sort_by(|&a, &b| clusters[b].depth.cmp(&clusters[a].depth).then(a.cmp(&b)));

    let mut groups: Vec<ClusterGroup> = Vec::new();
    for index in order {
        let candidate = &clusters[index];
        match groups.iter_mut().find(|group| {
            group
                .clusters
                .iter()
                .all(|&member| !clusters[member].overlaps(candidate))
        }) {
            Some(group) => group.clusters.push(index),
            None => groups.push(ClusterGroup {
                clusters: vec![index],
            }),
        }
    }
    groups
}
