//! Dependency scheduling for helpers
//!
//! Fragments are ordered topologically by `depends_on`, with ties broken by registration order
//! so identical registrations always produce identical builds. Builders are ordered by
//! `(priority desc, key asc, registration asc)`.

use crate::error::PipelineError;
use crate::helper::{BuilderHelper, FragmentHelper, HelperMode};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Result of scheduling the fragment phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSchedule {
    /// Registration indices in execution order
    pub order: Vec<usize>,
    /// Extend registrations replaced by an override for the same key
    pub superseded: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Compute the fragment execution order.
///
/// Fails on dependency cycles and on dependencies naming a key nobody registered. Nothing is
/// executed here, so a failing schedule never runs any fragment.
pub fn schedule_fragments(fragments: &[FragmentHelper]) -> Result<FragmentSchedule, PipelineError> {
    let overridden: HashSet<&str> = fragments
        .iter()
        .filter(|f| f.mode == HelperMode::Override)
        .map(|f| f.key.as_str())
        .collect();

    let mut active = Vec::with_capacity(fragments.len());
    let mut superseded = Vec::new();
    for (index, fragment) in fragments.iter().enumerate() {
        if overridden.contains(fragment.key.as_str()) && fragment.mode == HelperMode::Extend {
            superseded.push(index);
        } else {
            active.push(index);
        }
    }

    // Instances per key, and keys in first-registration order
    let mut by_key: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut keys: Vec<&str> = Vec::new();
    for &index in &active {
        let key = fragments[index].key.as_str();
        let entry = by_key.entry(key).or_default();
        if entry.is_empty() {
            keys.push(key);
        }
        entry.push(index);
    }

    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for &index in &active {
        let fragment = &fragments[index];
        for dependency in &fragment.depends_on {
            if !by_key.contains_key(dependency.as_str()) {
                return Err(PipelineError::UnknownDependency {
                    key: fragment.key.clone(),
                    dependency: dependency.clone(),
                });
            }
            let targets = edges.entry(fragment.key.as_str()).or_default();
            if !targets.contains(&dependency.as_str()) {
                targets.push(dependency.as_str());
            }
        }
    }

    if let Some(cycle) = find_cycle(&keys, &edges) {
        return Err(PipelineError::DependencyCycle { keys: cycle });
    }

    // Stable Kahn: the ready set is ordered by registration index
    let mut in_degree: HashMap<usize, usize> = HashMap::with_capacity(active.len());
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
    for &index in &active {
        let fragment = &fragments[index];
        let mut degree = 0;
        let mut seen = HashSet::new();
        for dependency in &fragment.depends_on {
            if !seen.insert(dependency.as_str()) {
                continue;
            }
            for &upstream in &by_key[dependency.as_str()] {
                degree += 1;
                dependents.entry(upstream).or_default().push(index);
            }
        }
        in_degree.insert(index, degree);
    }

    let mut ready: BTreeSet<usize> = active
        .iter()
        .copied()
        .filter(|index| in_degree[index] == 0)
        .collect();
    let mut order = Vec::with_capacity(active.len());
    while let Some(index) = ready.pop_first() {
        order.push(index);
        if let Some(downstream) = dependents.get(&index) {
            for &next in downstream {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(next);
                    }
                }
            }
        }
    }

    Ok(FragmentSchedule { order, superseded })
}

/// Iterative three-colour DFS over the key graph; returns the keys forming the first cycle found
fn find_cycle(keys: &[&str], edges: &HashMap<&str, Vec<&str>>) -> Option<Vec<String>> {
    let mut color: HashMap<&str, Color> = keys.iter().map(|key| (*key, Color::White)).collect();

    for &root in keys {
        if color.get(root) != Some(&Color::White) {
            continue;
        }
        color.insert(root, Color::Gray);
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let children = edges.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if next < children.len() {
                frame.1 += 1;
                let child = children[next];
                match color.get(child).copied().unwrap_or(Color::Black) {
                    Color::White => {
                        color.insert(child, Color::Gray);
                        stack.push((child, 0));
                    }
                    Color::Gray => {
                        let start = stack
                            .iter()
                            .position(|(key, _)| *key == child)
                            .unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[start..].iter().map(|(key, _)| key.to_string()).collect();
                        cycle.push(child.to_string());
                        return Some(cycle);
                    }
                    Color::Black => {}
                }
            } else {
                color.insert(node, Color::Black);
                stack.pop();
            }
        }
    }

    None
}

/// Compute the builder execution order as registration indices
pub fn schedule_builders(builders: &[BuilderHelper]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..builders.len()).collect();
    order.sort_by(|&a, &b| {
        let left = &builders[a];
        let right = &builders[b];
        (Reverse(left.priority), left.key.as_str(), a).cmp(&(
            Reverse(right.priority),
            right.key.as_str(),
            b,
        ))
    });
    order
}
