//! # Dependency Resolution
//!
//! Depth-first topological sort with cycle detection over the subgraph of
//! features taking part in one batch.
//!
//! Ordering and availability are separate concerns: the sort ignores edges
//! that leave the batch, and whether those dependencies are actually `Active`
//! is decided later, per feature, by the manager's dependency check.

use kernel_types::{FeatureId, KernelError};
use std::collections::{HashMap, HashSet};

/// Order `nodes` so every node comes after all of its in-set dependencies.
///
/// `edges` maps a node to the ids it depends on; nodes missing from `edges`
/// have no dependencies. Nodes are visited in the order given, so the result
/// is deterministic for a given input order.
///
/// # Errors
///
/// `KernelError::CircularDependency` naming the node at which a cycle closed
/// (re-entered while still on the DFS stack). Self-loops are cycles.
pub fn topological_order(
    nodes: &[FeatureId],
    edges: &HashMap<FeatureId, Vec<FeatureId>>,
) -> Result<Vec<FeatureId>, KernelError> {
    let in_set: HashSet<&str> = nodes.iter().map(String::as_str).collect();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut visiting: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(nodes.len());

    fn visit<'a>(
        id: &'a str,
        edges: &'a HashMap<FeatureId, Vec<FeatureId>>,
        in_set: &HashSet<&str>,
        visited: &mut HashSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
        order: &mut Vec<FeatureId>,
    ) -> Result<(), KernelError> {
        if visited.contains(id) {
            return Ok(());
        }
        if !visiting.insert(id) {
            return Err(KernelError::CircularDependency {
                feature_id: id.to_string(),
            });
        }

        if let Some(deps) = edges.get(id) {
            for dep in deps.iter().filter(|d| in_set.contains(d.as_str())) {
                visit(dep, edges, in_set, visited, visiting, order)?;
            }
        }

        visiting.remove(id);
        visited.insert(id);
        order.push(id.to_string());
        Ok(())
    }

    for id in nodes {
        visit(id, edges, &in_set, &mut visited, &mut visiting, &mut order)?;
    }

    Ok(order)
}
