//! Graph reduction by projection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::item::{Dependency, Item, ItemPool};
use crate::projection::Projection;
use crate::rule_set::RuleSet;

/// The abstracted graph produced by [`GraphReducer::reduce`].
#[derive(Debug, Default)]
pub struct ReducedGraph {
    /// Reduced dependencies, in order of first appearance.
    pub dependencies: Vec<Dependency>,
    /// Items produced by inner projections.
    pub inner_items: HashSet<Item>,
    /// Number of input dependencies that were dropped.
    pub dropped: usize,
}

impl ReducedGraph {
    /// Sum of the occurrence counts of all reduced dependencies.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.dependencies.iter().map(Dependency::count).sum()
    }
}

/// Applies an ordered list of projections to a dependency graph.
#[derive(Debug, Clone)]
pub struct GraphReducer {
    projections: Vec<Arc<Projection>>,
}

impl GraphReducer {
    /// Creates a reducer. The first projection that maps an item wins.
    #[must_use]
    pub fn new(projections: Vec<Arc<Projection>>) -> Self {
        Self { projections }
    }

    /// Creates a reducer over the projections of `rule_set` and its
    /// includes, local ones first.
    #[must_use]
    pub fn from_rule_set(rule_set: &RuleSet) -> Self {
        Self::new(rule_set.ordered_projections())
    }

    /// Returns the projections in evaluation order.
    #[must_use]
    pub fn projections(&self) -> &[Arc<Projection>] {
        &self.projections
    }

    /// The projected item and the index of the projection that mapped it.
    fn project(&self, item: &Item) -> Option<(Item, usize)> {
        self.projections
            .iter()
            .enumerate()
            .find_map(|(index, p)| p.project(item).map(|projected| (projected, index)))
    }

    /// Maps both ends of every dependency and merges edges that end up
    /// between the same pair of items.
    ///
    /// Dependencies with an unmapped end are dropped, as are those with an
    /// end whose values are all empty.
    #[must_use]
    pub fn reduce(&self, dependencies: &[Dependency]) -> ReducedGraph {
        let mut graph = ReducedGraph::default();
        let mut pool = ItemPool::new();
        let mut edges: HashMap<(Item, Item), usize> = HashMap::new();
        let mut mapped: HashMap<Item, Option<(Item, usize)>> = HashMap::new();

        for dependency in dependencies {
            let using = self.map_item(dependency.using(), &mut mapped, &mut pool, &mut graph);
            let used = self.map_item(dependency.used(), &mut mapped, &mut pool, &mut graph);
            let (Some(using), Some(used)) = (using, used) else {
                graph.dropped += 1;
                continue;
            };
            if using.is_empty() || used.is_empty() {
                graph.dropped += 1;
                continue;
            }

            match edges.get(&(using.clone(), used.clone())) {
                Some(&index) => graph.dependencies[index].absorb(dependency),
                None => {
                    edges.insert((using.clone(), used.clone()), graph.dependencies.len());
                    graph.dependencies.push(dependency.reattached(using, used));
                }
            }
        }

        debug!(
            "reduced {} dependencies to {} ({} dropped, {} distinct items)",
            dependencies.len(),
            graph.dependencies.len(),
            graph.dropped,
            pool.len()
        );
        graph
    }

    /// Maps one item, remembering the answer so a miss is logged once.
    ///
    /// A remembered hit still counts as a match of its projection.
    fn map_item(
        &self,
        item: &Item,
        mapped: &mut HashMap<Item, Option<(Item, usize)>>,
        pool: &mut ItemPool,
        graph: &mut ReducedGraph,
    ) -> Option<Item> {
        if let Some(known) = mapped.get(item) {
            return known.as_ref().map(|(projected, index)| {
                self.projections[*index].record_match();
                projected.clone()
            });
        }
        let result = match self.project(item) {
            Some((projected, index)) => {
                let projected = pool.intern(projected);
                if self.projections[index].is_inner() {
                    graph.inner_items.insert(projected.clone());
                }
                Some((projected, index))
            }
            None => {
                info!("no projection maps {item}, dropping its dependencies");
                None
            }
        };
        mapped.insert(item.clone(), result.clone());
        result.map(|(projected, _)| projected)
    }
}
