//! Coordination plan generation.
//!
//! Turns an analyzed change into a phased plan of shell commands. Phase 1
//! is always the primary repository alone; phase 2 is every affected
//! repository with a direct edge to the primary; phase 3 is everything
//! else. Steps per repository are templated: branch, dependency update,
//! tests, commit, PR. The rollback plan is derived here, once, at plan
//! time, so executing a rollback never depends on re-running the planner.

use crate::domain::{Action, CoordinationPlan, Phase, RepoName, Step, StepKind};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::id;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed duration estimate per phase.
const PHASE_DURATION: Duration = Duration::from_secs(15 * 60);

/// Package manager detected from the manifest files in a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackageManager {
    Npm,
    Cargo,
    Pip,
    Go,
}

impl PackageManager {
    /// Detect by manifest file, checked in a fixed order.
    fn detect(repo_dir: &Path) -> Option<Self> {
        if repo_dir.join("package.json").exists() {
            Some(Self::Npm)
        } else if repo_dir.join("Cargo.toml").exists() {
            Some(Self::Cargo)
        } else if repo_dir.join("requirements.txt").exists() {
            Some(Self::Pip)
        } else if repo_dir.join("go.mod").exists() {
            Some(Self::Go)
        } else {
            None
        }
    }

    fn update_command(self) -> &'static str {
        match self {
            Self::Npm => "npm update",
            Self::Cargo => "cargo update",
            Self::Pip => "pip install --upgrade -r requirements.txt",
            Self::Go => "go get -u ./...",
        }
    }

    fn test_command(self) -> &'static str {
        match self {
            Self::Npm => "npm test",
            Self::Cargo => "cargo test",
            Self::Pip => "python -m pytest",
            Self::Go => "go test ./...",
        }
    }

    /// Lockfile to restore when undoing a dependency update, if the
    /// package manager keeps one.
    fn lockfile(self) -> Option<&'static str> {
        match self {
            Self::Npm => Some("package-lock.json"),
            Self::Cargo => Some("Cargo.lock"),
            Self::Pip => None,
            Self::Go => Some("go.sum"),
        }
    }
}

/// Builds coordination plans from the dependency graph.
pub struct Planner<'g> {
    graph: &'g DependencyGraph,
    repos_root: PathBuf,
}

impl<'g> Planner<'g> {
    /// Create a planner. `repos_root` is the directory holding one
    /// checkout per repository, used for manifest detection.
    #[must_use]
    pub fn new(graph: &'g DependencyGraph, repos_root: impl Into<PathBuf>) -> Self {
        Self {
            graph,
            repos_root: repos_root.into(),
        }
    }

    /// Build a phased plan for changing `primary` with the given affected
    /// repositories.
    ///
    /// The affected list usually comes from an impact analysis but may be
    /// supplied directly. Repositories the graph has never seen are placed
    /// in the final phase.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownRepository` if `primary` is not in the graph.
    pub fn plan_coordinated_change(
        &self,
        primary: &RepoName,
        description: &str,
        affected: &[RepoName],
    ) -> Result<CoordinationPlan> {
        if !self.graph.contains(primary) {
            return Err(Error::UnknownRepository(primary.clone()));
        }

        let mut affected_repos: Vec<RepoName> = Vec::new();
        for repo in affected {
            if repo != primary && !affected_repos.contains(repo) {
                affected_repos.push(repo.clone());
            }
        }

        let branch = branch_name(description);

        // Phase 2 holds the direct dependents of the primary; everything
        // else waits for phase 3.
        let (direct, indirect): (Vec<RepoName>, Vec<RepoName>) = affected_repos
            .iter()
            .cloned()
            .partition(|repo| self.graph.depends_on(repo, primary));

        let mut execution_phases = Vec::new();
        let mut next_number = 1;
        for repos in [vec![primary.clone()], direct, indirect] {
            if repos.is_empty() {
                continue;
            }
            execution_phases.push(self.build_phase(next_number, repos, description, &branch));
            next_number += 1;
        }

        let rollback_plan = derive_rollback(&execution_phases);
        let estimated_duration = PHASE_DURATION * execution_phases.len() as u32;

        let plan = CoordinationPlan {
            id: id::generate("plan", &format!("{primary}:{description}")),
            primary_repository: primary.clone(),
            change_description: description.to_string(),
            affected_repositories: affected_repos,
            execution_phases,
            rollback_plan,
            estimated_duration,
            created_at: Utc::now(),
        };

        tracing::info!(
            plan_id = %plan.id,
            primary = %primary,
            phases = plan.execution_phases.len(),
            "generated coordination plan"
        );

        Ok(plan)
    }

    fn build_phase(
        &self,
        phase_number: usize,
        repos: Vec<RepoName>,
        description: &str,
        branch: &str,
    ) -> Phase {
        let actions: Vec<Action> = repos
            .iter()
            .map(|repo| Action {
                repository: repo.clone(),
                steps: self.build_steps(repo, description, branch),
            })
            .collect();

        Phase {
            phase_number,
            is_parallel: repos.len() > 1,
            repositories: repos,
            actions,
        }
    }

    /// Templated steps for one repository. Dependency and test steps are
    /// only emitted when a known manifest is present in the checkout.
    fn build_steps(&self, repo: &RepoName, description: &str, branch: &str) -> Vec<Step> {
        let manager = PackageManager::detect(&self.repos_root.join(repo.as_str()));

        let mut steps = vec![Step {
            name: "create-branch".to_string(),
            command: format!("git checkout -b {branch}"),
            kind: StepKind::Branch,
            rollback_command: Some(format!("git checkout - && git branch -D {branch}")),
        }];

        if let Some(manager) = manager {
            steps.push(Step {
                name: "update-dependencies".to_string(),
                command: manager.update_command().to_string(),
                kind: StepKind::Dependencies,
                rollback_command: manager
                    .lockfile()
                    .map(|lockfile| format!("git checkout -- {lockfile}")),
            });
            steps.push(Step {
                name: "run-tests".to_string(),
                command: manager.test_command().to_string(),
                kind: StepKind::Test,
                rollback_command: None,
            });
        }

        steps.push(Step {
            name: "commit-changes".to_string(),
            command: format!("git add -A && git commit -m \"chore: {description}\""),
            kind: StepKind::Commit,
            rollback_command: Some("git reset --hard HEAD~1".to_string()),
        });
        steps.push(Step {
            name: "open-pr".to_string(),
            command: format!("gh pr create --fill --title \"{description}\""),
            kind: StepKind::Review,
            rollback_command: Some(format!("gh pr close {branch}")),
        });

        steps
    }
}

/// Dated feature branch name derived from the change description.
fn branch_name(description: &str) -> String {
    format!("convoy/{}-{}", Utc::now().format("%Y%m%d"), slug(description))
}

/// Lowercased, dash-separated, truncated slug for branch names.
fn slug(text: &str) -> String {
    let mut out = String::new();
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
        if out.len() >= 24 {
            break;
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Derive the rollback plan from the execution phases.
///
/// Phases are walked in reverse, steps in reverse within each action, and
/// only steps declaring a rollback command survive. Rollback phases keep
/// the phase_number of the execution phase they undo so the executor can
/// truncate rollback to the phases actually reached.
fn derive_rollback(phases: &[Phase]) -> Vec<Phase> {
    phases
        .iter()
        .rev()
        .filter_map(|phase| {
            let actions: Vec<Action> = phase
                .actions
                .iter()
                .filter_map(|action| {
                    let steps: Vec<Step> = action
                        .steps
                        .iter()
                        .rev()
                        .filter_map(|step| {
                            step.rollback_command.as_ref().map(|command| Step {
                                name: format!("rollback-{}", step.name),
                                command: command.clone(),
                                kind: step.kind,
                                rollback_command: None,
                            })
                        })
                        .collect();
                    if steps.is_empty() {
                        None
                    } else {
                        Some(Action {
                            repository: action.repository.clone(),
                            steps,
                        })
                    }
                })
                .collect();

            if actions.is_empty() {
                return None;
            }
            Some(Phase {
                phase_number: phase.phase_number,
                repositories: actions.iter().map(|a| a.repository.clone()).collect(),
                is_parallel: actions.len() > 1,
                actions,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DependencyEdge, DependencyType, ImpactLevel};
    use tempfile::TempDir;

    fn edge(id: &str, source: &str, target: &str) -> DependencyEdge {
        DependencyEdge {
            id: id.to_string(),
            source: RepoName::new(source),
            target: RepoName::new(target),
            dependency_type: DependencyType::Code,
            version: None,
            impact_level: ImpactLevel::Medium,
            metadata: serde_json::Map::new(),
        }
    }

    fn names(repos: &[RepoName]) -> Vec<&str> {
        repos.iter().map(RepoName::as_str).collect()
    }

    #[test]
    fn two_phase_plan_with_parallel_second_phase() {
        // svcB and svcC both depend directly on svcA.
        let graph = DependencyGraph::from_edges(vec![
            edge("e1", "svcB", "svcA"),
            edge("e2", "svcC", "svcA"),
        ]);
        let temp = TempDir::new().unwrap();
        let planner = Planner::new(&graph, temp.path());

        let plan = planner
            .plan_coordinated_change(
                &RepoName::new("svcA"),
                "bump shared client",
                &[RepoName::new("svcB"), RepoName::new("svcC")],
            )
            .unwrap();

        assert_eq!(plan.execution_phases.len(), 2);

        let first = &plan.execution_phases[0];
        assert_eq!(first.phase_number, 1);
        assert_eq!(names(&first.repositories), vec!["svcA"]);
        assert!(!first.is_parallel);

        let second = &plan.execution_phases[1];
        assert_eq!(second.phase_number, 2);
        assert_eq!(names(&second.repositories), vec!["svcB", "svcC"]);
        assert!(second.is_parallel);

        assert_eq!(plan.estimated_duration, PHASE_DURATION * 2);
        assert!(plan.id.starts_with("plan-"));
    }

    #[test]
    fn indirect_dependents_land_in_a_third_phase() {
        // svcB depends on svcA; svcC depends only on svcB.
        let graph = DependencyGraph::from_edges(vec![
            edge("e1", "svcB", "svcA"),
            edge("e2", "svcC", "svcB"),
        ]);
        let temp = TempDir::new().unwrap();
        let planner = Planner::new(&graph, temp.path());

        let plan = planner
            .plan_coordinated_change(
                &RepoName::new("svcA"),
                "schema change",
                &[RepoName::new("svcB"), RepoName::new("svcC")],
            )
            .unwrap();

        assert_eq!(plan.execution_phases.len(), 3);
        assert_eq!(names(&plan.execution_phases[1].repositories), vec!["svcB"]);
        assert_eq!(names(&plan.execution_phases[2].repositories), vec!["svcC"]);
        assert!(!plan.execution_phases[2].is_parallel);
    }

    #[test]
    fn primary_is_excluded_from_affected_and_deduplicated() {
        let graph = DependencyGraph::from_edges(vec![edge("e1", "b", "a")]);
        let temp = TempDir::new().unwrap();
        let planner = Planner::new(&graph, temp.path());

        let plan = planner
            .plan_coordinated_change(
                &RepoName::new("a"),
                "fix",
                &[RepoName::new("a"), RepoName::new("b"), RepoName::new("b")],
            )
            .unwrap();

        assert_eq!(names(&plan.affected_repositories), vec!["b"]);
    }

    #[test]
    fn unknown_primary_is_rejected() {
        let graph = DependencyGraph::from_edges(vec![edge("e1", "a", "b")]);
        let temp = TempDir::new().unwrap();
        let planner = Planner::new(&graph, temp.path());

        let err = planner
            .plan_coordinated_change(&RepoName::new("ghost"), "x", &[])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownRepository(_)));
    }

    #[test]
    fn manifest_detection_picks_package_manager_commands() {
        let graph = DependencyGraph::from_edges(vec![edge("e1", "b", "a")]);
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("a")).unwrap();
        std::fs::write(temp.path().join("a").join("Cargo.toml"), "[package]").unwrap();
        std::fs::create_dir(temp.path().join("b")).unwrap();
        std::fs::write(temp.path().join("b").join("package.json"), "{}").unwrap();

        let planner = Planner::new(&graph, temp.path());
        let plan = planner
            .plan_coordinated_change(
                &RepoName::new("a"),
                "dep bump",
                &[RepoName::new("b")],
            )
            .unwrap();

        let a_steps = &plan.execution_phases[0].actions[0].steps;
        assert!(a_steps.iter().any(|s| s.command == "cargo update"));
        assert!(a_steps.iter().any(|s| s.command == "cargo test"));

        let b_steps = &plan.execution_phases[1].actions[0].steps;
        assert!(b_steps.iter().any(|s| s.command == "npm update"));
        assert!(b_steps.iter().any(|s| s.command == "npm test"));
    }

    #[test]
    fn repos_without_manifest_skip_dependency_and_test_steps() {
        let graph = DependencyGraph::from_edges(vec![edge("e1", "b", "a")]);
        let temp = TempDir::new().unwrap();

        let planner = Planner::new(&graph, temp.path());
        let plan = planner
            .plan_coordinated_change(&RepoName::new("a"), "fix", &[])
            .unwrap();

        let kinds: Vec<StepKind> = plan.execution_phases[0].actions[0]
            .steps
            .iter()
            .map(|s| s.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![StepKind::Branch, StepKind::Commit, StepKind::Review]
        );
    }

    #[test]
    fn rollback_plan_mirrors_execution_in_reverse() {
        let graph = DependencyGraph::from_edges(vec![
            edge("e1", "svcB", "svcA"),
            edge("e2", "svcC", "svcB"),
        ]);
        let temp = TempDir::new().unwrap();
        let planner = Planner::new(&graph, temp.path());

        let plan = planner
            .plan_coordinated_change(
                &RepoName::new("svcA"),
                "upgrade",
                &[RepoName::new("svcB"), RepoName::new("svcC")],
            )
            .unwrap();

        assert!(plan.rollback_plan.len() <= plan.execution_phases.len());

        // Rollback phases come in strictly decreasing execution order.
        let numbers: Vec<usize> = plan.rollback_plan.iter().map(|p| p.phase_number).collect();
        let mut sorted = numbers.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(numbers, sorted);

        for rollback_phase in &plan.rollback_plan {
            let execution_phase = plan
                .execution_phases
                .iter()
                .find(|p| p.phase_number == rollback_phase.phase_number)
                .unwrap();

            for rollback_action in &rollback_phase.actions {
                let forward_action = execution_phase
                    .actions
                    .iter()
                    .find(|a| a.repository == rollback_action.repository)
                    .unwrap();

                // One rollback step per forward step declaring an undo,
                // in reverse order.
                let expected: Vec<String> = forward_action
                    .steps
                    .iter()
                    .rev()
                    .filter_map(|s| s.rollback_command.clone())
                    .collect();
                let actual: Vec<String> = rollback_action
                    .steps
                    .iter()
                    .map(|s| s.command.clone())
                    .collect();
                assert_eq!(actual, expected);

                for step in &rollback_action.steps {
                    assert!(step.rollback_command.is_none());
                    assert!(step.name.starts_with("rollback-"));
                }
            }
        }
    }

    #[test]
    fn slug_normalizes_description() {
        assert_eq!(slug("Upgrade Auth Library!"), "upgrade-auth-library");
        assert_eq!(slug("a  b"), "a-b");
        assert!(slug("a very long description that keeps going").len() <= 24);
    }
}
