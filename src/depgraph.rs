// src/depgraph.rs

//! Dependency graph construction and traversal
//!
//! `generate_graph` builds, from a snapshot list of distributions:
//! - adjacency: distribution -> (provider, requirement label) edges
//! - reverse adjacency: distribution -> its dependents
//! - missing: distribution -> requirement strings nothing could satisfy
//!
//! Matching is first-match-wins in the order distributions were supplied.
//! That is a deliberate policy, not an approximation of "best version":
//! callers control priority by ordering the input list, e.g. installed
//! distributions first, then the new candidate. The graph is built fresh
//! per resolution call and never mutated incrementally.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::dist::Distribution;
use crate::version::{self, Version, VersionPredicate};

/// An edge: the requirement `label` of one distribution, satisfied by
/// the distribution at `provider`
#[derive(Debug, Clone)]
struct Edge {
    provider: usize,
    label: String,
}

/// Dependency relationships over a snapshot of distributions
///
/// Every distribution registered in the graph has entries in all three
/// maps, even when they are empty.
pub struct DependencyGraph {
    dists: Vec<Distribution>,
    index: HashMap<(String, String), usize>,
    adjacency: Vec<Vec<Edge>>,
    reverse: Vec<Vec<usize>>,
    missing: Vec<Vec<String>>,
}

impl DependencyGraph {
    fn new() -> Self {
        Self {
            dists: Vec::new(),
            index: HashMap::new(),
            adjacency: Vec::new(),
            reverse: Vec::new(),
            missing: Vec::new(),
        }
    }

    /// Register a distribution, merging duplicates by (name, version)
    fn add_dist(&mut self, dist: &Distribution) -> usize {
        let key = dist.key();
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.dists.len();
        self.dists.push(dist.clone());
        self.index.insert(key, idx);
        self.adjacency.push(Vec::new());
        self.reverse.push(Vec::new());
        self.missing.push(Vec::new());
        idx
    }

    fn add_edge(&mut self, from: usize, to: usize, label: String) {
        self.adjacency[from].push(Edge {
            provider: to,
            label,
        });
        self.reverse[to].push(from);
    }

    fn find(&self, dist: &Distribution) -> Option<usize> {
        self.index.get(&dist.key()).copied()
    }

    /// All registered distributions, in input order (duplicates merged)
    pub fn distributions(&self) -> &[Distribution] {
        &self.dists
    }

    /// Outgoing edges of a distribution: (provider, requirement label)
    pub fn edges_of(&self, dist: &Distribution) -> Vec<(&Distribution, &str)> {
        match self.find(dist) {
            Some(idx) => self.adjacency[idx]
                .iter()
                .map(|e| (&self.dists[e.provider], e.label.as_str()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Immediate dependents of a distribution
    pub fn dependents_of(&self, dist: &Distribution) -> Vec<&Distribution> {
        match self.find(dist) {
            Some(idx) => self.reverse[idx]
                .iter()
                .map(|&i| &self.dists[i])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Requirement strings of a distribution that nothing satisfied
    pub fn missing_of(&self, dist: &Distribution) -> &[String] {
        match self.find(dist) {
            Some(idx) => &self.missing[idx],
            None => &[],
        }
    }

    /// All transitive dependents of a distribution, excluding itself
    ///
    /// Breadth-first over reverse edges; a node already visited is never
    /// re-queued, so diamonds and cycles terminate.
    pub fn transitive_dependents(&self, dist: &Distribution) -> Vec<&Distribution> {
        let Some(start) = self.find(dist) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        visited.insert(start);

        let mut queue: VecDeque<usize> = self.reverse[start].iter().copied().collect();
        let mut result = Vec::new();
        while let Some(idx) = queue.pop_front() {
            if !visited.insert(idx) {
                continue;
            }
            result.push(&self.dists[idx]);
            queue.extend(self.reverse[idx].iter().copied());
        }
        result
    }
}

/// Build the dependency graph for a snapshot of distributions
pub fn generate_graph(dists: &[Distribution]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    // Provided-names table, in input order: name -> [(version, provider)]
    let mut provided: HashMap<String, Vec<(Option<Version>, usize)>> = HashMap::new();
    for dist in dists {
        let before = graph.dists.len();
        let idx = graph.add_dist(dist);
        if graph.dists.len() == before {
            // Duplicate identity: merged, provides already registered
            continue;
        }

        // Implicit self-provide, then declared extras
        provided
            .entry(dist.name().to_ascii_lowercase())
            .or_default()
            .push((Some(dist.version().clone()), idx));
        for provide in dist.provides() {
            provided
                .entry(provide.name.to_ascii_lowercase())
                .or_default()
                .push((provide.version.clone(), idx));
        }
    }

    for idx in 0..graph.dists.len() {
        let requires = graph.dists[idx].requires().to_vec();
        for requirement in requires {
            let predicate = match VersionPredicate::parse(&requirement) {
                Ok(p) => p,
                // A malformed requirement degrades to name-only matching
                // instead of failing the whole build
                Err(_) => match version::project_name(&requirement) {
                    Some(name) => {
                        debug!(
                            "treating malformed requirement '{}' as bare name '{}'",
                            requirement, name
                        );
                        VersionPredicate {
                            name,
                            clauses: Vec::new(),
                        }
                    }
                    None => {
                        graph.missing[idx].push(requirement);
                        continue;
                    }
                },
            };

            let candidates = provided.get(&predicate.name.to_ascii_lowercase());
            let matched = candidates.and_then(|candidates| {
                candidates
                    .iter()
                    .find(|(version, _)| match version {
                        Some(v) => predicate.matches(v),
                        // A versionless provide satisfies only
                        // unconstrained predicates
                        None => predicate.clauses.is_empty(),
                    })
                    .map(|&(_, provider)| provider)
            });

            match matched {
                Some(provider) => graph.add_edge(idx, provider, requirement),
                None => graph.missing[idx].push(requirement),
            }
        }
    }

    graph
}

/// All transitive dependents of `target` within `dists`, excluding
/// `target` itself
pub fn dependent_dists(dists: &[Distribution], target: &Distribution) -> Vec<Distribution> {
    let graph = generate_graph(dists);
    graph
        .transitive_dependents(target)
        .into_iter()
        .cloned()
        .collect()
}
