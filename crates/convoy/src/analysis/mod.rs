//! Impact analysis over the dependency graph.
//!
//! This module answers the questions a coordinated change starts with:
//!
//! - Who is affected if this repository changes? (BFS over the reverse graph)
//! - Are there circular dependencies? (DFS with a recursion stack)
//! - How does A reach B? (all simple paths over the forward graph)
//! - Which repositories matter most? (degree-weighted PageRank-style scoring)
//!
//! ## Traversal semantics
//!
//! Transitive impact uses a global first-path-wins BFS: a repository
//! reachable over several paths keeps the impact of the first path that
//! discovered it, even if a later path is more severe. Cycle detection
//! reports the first cycle found from each DFS root rather than enumerating
//! all cycles. Both behaviors are deliberate and covered by tests as-is.

use crate::domain::{
    ChangeType, DependencyType, ImpactAnalysis, ImpactEntry, ImpactLevel, RepoName,
    RiskAssessment, RiskLevel,
};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// Damping factor for importance propagation.
const DAMPING: f64 = 0.85;

/// Number of importance propagation iterations.
const IMPORTANCE_ITERATIONS: usize = 10;

/// Risk score thresholds.
const HIGH_RISK_THRESHOLD: u32 = 70;
const MEDIUM_RISK_THRESHOLD: u32 = 40;

/// Read-only analyzer over a loaded dependency graph.
pub struct ImpactAnalyzer<'g> {
    graph: &'g DependencyGraph,
}

impl<'g> ImpactAnalyzer<'g> {
    /// Create an analyzer borrowing the graph for the session.
    #[must_use]
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self { graph }
    }

    /// Analyze the impact of changing `repo`.
    ///
    /// Direct impact is one entry per incoming edge at distance 1, with the
    /// impact taken from the edge itself. Transitive impact walks the
    /// reverse graph breadth-first from the direct dependents, combining
    /// impact levels by ordinal max along each path.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownRepository` if `repo` appears nowhere in the
    /// graph.
    pub fn analyze_change_impact(
        &self,
        repo: &RepoName,
        change_type: ChangeType,
    ) -> Result<ImpactAnalysis> {
        if !self.graph.contains(repo) {
            return Err(Error::UnknownRepository(repo.clone()));
        }

        tracing::debug!(repo = %repo, change_type = %change_type, "analyzing change impact");

        // Direct impact: every incoming edge, distance 1.
        let mut direct_impact = Vec::new();
        for edge in self.graph.dependents_of(repo) {
            direct_impact.push(ImpactEntry {
                repository: edge.source.clone(),
                dependency_type: edge.dependency_type,
                impact_level: edge.impact_level,
                path: vec![repo.clone(), edge.source.clone()],
                distance: 1,
            });
        }

        // Transitive impact: BFS outward over the reverse graph. Each
        // repository is visited at most once globally; the first layer to
        // reach it wins.
        let mut visited: HashSet<RepoName> = HashSet::new();
        visited.insert(repo.clone());
        for entry in &direct_impact {
            visited.insert(entry.repository.clone());
        }

        let mut queue: VecDeque<(RepoName, ImpactLevel, Vec<RepoName>)> = direct_impact
            .iter()
            .map(|e| (e.repository.clone(), e.impact_level, e.path.clone()))
            .collect();

        let mut transitive_impact = Vec::new();
        while let Some((current, accumulated, path)) = queue.pop_front() {
            for edge in self.graph.dependents_of(&current) {
                let dependent = edge.source.clone();
                if !visited.insert(dependent.clone()) {
                    continue;
                }

                let combined = accumulated.combine(edge.impact_level);
                let mut next_path = path.clone();
                next_path.push(dependent.clone());
                let distance = next_path.len() - 1;

                transitive_impact.push(ImpactEntry {
                    repository: dependent.clone(),
                    dependency_type: edge.dependency_type,
                    impact_level: combined,
                    path: next_path.clone(),
                    distance,
                });
                queue.push_back((dependent, combined, next_path));
            }
        }

        let affected_repositories: BTreeSet<RepoName> = direct_impact
            .iter()
            .chain(transitive_impact.iter())
            .map(|e| e.repository.clone())
            .collect();

        let impact_paths = direct_impact
            .iter()
            .chain(transitive_impact.iter())
            .map(|e| e.path.clone())
            .collect();

        let risk = assess_risk(&direct_impact, affected_repositories.len());
        let recommendations = build_recommendations(
            change_type,
            &direct_impact,
            affected_repositories.len(),
            risk.level,
        );

        Ok(ImpactAnalysis {
            changed_repository: repo.clone(),
            change_type,
            direct_impact,
            transitive_impact,
            affected_repositories,
            impact_paths,
            risk,
            recommendations,
        })
    }

    /// Find circular dependencies in the forward graph.
    ///
    /// Every repository is used as a DFS root, including ones that only
    /// appear as edge targets. Each cycle is an ordered repo list with the
    /// first repo repeated at the end to close the loop. At most one cycle
    /// is reported per DFS root.
    #[must_use]
    pub fn find_circular_dependencies(&self) -> Vec<Vec<RepoName>> {
        let mut visited: HashSet<RepoName> = HashSet::new();
        let mut cycles = Vec::new();

        for root in self.graph.repositories() {
            if visited.contains(&root) {
                continue;
            }
            let mut stack = Vec::new();
            let mut on_stack = HashSet::new();
            if let Some(cycle) = self.dfs_cycle(&root, &mut visited, &mut stack, &mut on_stack) {
                cycles.push(cycle);
            }
        }

        cycles
    }

    fn dfs_cycle(
        &self,
        current: &RepoName,
        visited: &mut HashSet<RepoName>,
        stack: &mut Vec<RepoName>,
        on_stack: &mut HashSet<RepoName>,
    ) -> Option<Vec<RepoName>> {
        visited.insert(current.clone());
        stack.push(current.clone());
        on_stack.insert(current.clone());

        for edge in self.graph.dependencies_of(current) {
            let next = &edge.target;
            if on_stack.contains(next) {
                // Cycle starts at the re-encountered repo and closes on it.
                let start = stack.iter().position(|r| r == next).unwrap_or(0);
                let mut cycle: Vec<RepoName> = stack[start..].to_vec();
                cycle.push(next.clone());
                return Some(cycle);
            }
            if !visited.contains(next) {
                if let Some(cycle) = self.dfs_cycle(next, visited, stack, on_stack) {
                    return Some(cycle);
                }
            }
        }

        stack.pop();
        on_stack.remove(current);
        None
    }

    /// All simple paths from `source` to `target` over the forward graph.
    ///
    /// Paths may share prefixes but never revisit a repository within
    /// themselves. Returns an empty list when `target` is unreachable.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownRepository` if either endpoint is not in the
    /// graph.
    pub fn get_dependency_chain(
        &self,
        source: &RepoName,
        target: &RepoName,
    ) -> Result<Vec<Vec<RepoName>>> {
        for repo in [source, target] {
            if !self.graph.contains(repo) {
                return Err(Error::UnknownRepository(repo.clone()));
            }
        }

        let mut paths = Vec::new();
        let mut current_path = vec![source.clone()];
        let mut in_path: HashSet<RepoName> = HashSet::from([source.clone()]);
        self.dfs_paths(source, target, &mut current_path, &mut in_path, &mut paths);
        Ok(paths)
    }

    fn dfs_paths(
        &self,
        current: &RepoName,
        target: &RepoName,
        path: &mut Vec<RepoName>,
        in_path: &mut HashSet<RepoName>,
        paths: &mut Vec<Vec<RepoName>>,
    ) {
        if current == target {
            paths.push(path.clone());
            return;
        }

        for edge in self.graph.dependencies_of(current) {
            let next = edge.target.clone();
            if in_path.contains(&next) {
                continue;
            }
            path.push(next.clone());
            in_path.insert(next.clone());
            self.dfs_paths(&next, target, path, in_path, paths);
            path.pop();
            in_path.remove(&next);
        }
    }

    /// Importance score per repository, normalized to [0, 100].
    ///
    /// Base score is degree-weighted (10 per dependent, plus 5 per
    /// critical and 3 per high incoming edge), refined by a fixed number
    /// of PageRank-style propagation iterations and normalized by the
    /// maximum.
    #[must_use]
    pub fn calculate_repository_importance(&self) -> BTreeMap<RepoName, f64> {
        let repos = self.graph.repositories();
        let mut scores: HashMap<RepoName, f64> = repos
            .iter()
            .map(|r| (r.clone(), f64::from(self.base_importance(r))))
            .collect();

        for _ in 0..IMPORTANCE_ITERATIONS {
            let mut next: HashMap<RepoName, f64> = HashMap::with_capacity(scores.len());
            for repo in &repos {
                let inbound: f64 = self
                    .graph
                    .dependents_of(repo)
                    .iter()
                    .map(|e| {
                        let share = self.graph.out_degree_clamped(&e.source) as f64;
                        scores.get(&e.source).copied().unwrap_or(0.0) / share
                    })
                    .sum();
                next.insert(repo.clone(), (1.0 - DAMPING) + DAMPING * inbound);
            }
            scores = next;
        }

        let max = scores.values().copied().fold(0.0_f64, f64::max);
        repos
            .into_iter()
            .map(|repo| {
                let raw = scores.get(&repo).copied().unwrap_or(0.0);
                let normalized = if max > 0.0 { raw / max * 100.0 } else { 0.0 };
                (repo, normalized)
            })
            .collect()
    }

    /// Degree-weighted base importance before propagation.
    pub(crate) fn base_importance(&self, repo: &RepoName) -> u32 {
        let incoming = self.graph.dependents_of(repo);
        let mut score = 10 * incoming.len() as u32;
        for edge in incoming {
            score += match edge.impact_level {
                ImpactLevel::Critical => 5,
                ImpactLevel::High => 3,
                _ => 0,
            };
        }
        score
    }
}

/// Additive risk scoring over the direct impact set.
///
/// Count tiers are exclusive: only the highest matching tier contributes.
fn assess_risk(direct: &[ImpactEntry], affected_count: usize) -> RiskAssessment {
    let mut score = 0;
    let mut factors = Vec::new();

    if affected_count > 10 {
        score += 30;
        factors.push(format!("{affected_count} affected repositories (+30)"));
    } else if affected_count > 5 {
        score += 20;
        factors.push(format!("{affected_count} affected repositories (+20)"));
    } else if affected_count > 0 {
        score += 10;
        factors.push(format!("{affected_count} affected repositories (+10)"));
    }

    if direct
        .iter()
        .any(|e| e.impact_level == ImpactLevel::Critical)
    {
        score += 40;
        factors.push("critical direct dependency (+40)".to_string());
    }
    if direct
        .iter()
        .any(|e| e.dependency_type == DependencyType::Docker)
    {
        score += 15;
        factors.push("docker dependents present (+15)".to_string());
    }
    if direct
        .iter()
        .any(|e| e.dependency_type == DependencyType::Api)
    {
        score += 20;
        factors.push("api dependents present (+20)".to_string());
    }

    let level = if score >= HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if score >= MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskAssessment {
        score,
        level,
        factors,
        mitigation_priority: mitigation_priority(level),
    }
}

/// Fixed mitigation checklist per risk level.
fn mitigation_priority(level: RiskLevel) -> Vec<String> {
    let items: &[&str] = match level {
        RiskLevel::High => &[
            "Notify owners of every affected repository",
            "Freeze deployments for affected repositories",
            "Prepare and verify rollback commands",
            "Execute the change in dependency order",
            "Monitor dependents after each phase",
        ],
        RiskLevel::Medium => &[
            "Notify owners of directly affected repositories",
            "Run dependent test suites before merging",
            "Monitor dependents after rollout",
        ],
        RiskLevel::Low => &[
            "Run dependent test suites before merging",
            "Announce the change in the usual channel",
        ],
    };
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Deterministic recommendation rules, applied in enumeration order.
fn build_recommendations(
    change_type: ChangeType,
    direct: &[ImpactEntry],
    affected_count: usize,
    risk_level: RiskLevel,
) -> Vec<String> {
    let mut recs = Vec::new();

    if change_type == ChangeType::Breaking {
        recs.push(
            "Breaking change: update all dependent repositories before releasing".to_string(),
        );
    }
    if affected_count > 5 {
        recs.push("Large blast radius: stage the rollout and verify each phase".to_string());
    }
    if direct
        .iter()
        .any(|e| e.dependency_type == DependencyType::Api)
    {
        recs.push(
            "API dependents detected: publish updated interface documentation and confirm client compatibility"
                .to_string(),
        );
    }
    if direct
        .iter()
        .any(|e| e.dependency_type == DependencyType::Docker)
    {
        recs.push(
            "Docker dependents detected: rebuild and republish dependent container images"
                .to_string(),
        );
    }
    if risk_level == RiskLevel::High {
        recs.push(
            "High risk: schedule a coordination window and notify owning teams".to_string(),
        );
    }

    recs
}
