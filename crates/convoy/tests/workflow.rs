//! Integration tests for the full convoy workflow: initialize a workspace,
//! persist dependency records, load them into the graph, analyze, plan,
//! and execute coordination runs with the real shell runner.

use convoy::app::App;
use convoy::commands::init::init_workspace;
use convoy::domain::{
    Action, ChangeType, DependencyEdge, DependencyType, ImpactLevel, Phase, RepoName, RiskLevel,
    RunStatus, Step, StepKind,
};
use convoy::executor::Executor;
use convoy::storage::save_edges;
use tempfile::TempDir;

fn edge(
    id: &str,
    source: &str,
    target: &str,
    dep_type: DependencyType,
    level: ImpactLevel,
) -> DependencyEdge {
    DependencyEdge {
        id: id.to_string(),
        source: RepoName::new(source),
        target: RepoName::new(target),
        dependency_type: dep_type,
        version: None,
        impact_level: level,
        metadata: serde_json::Map::new(),
    }
}

/// Workspace with repoA -> repoB (high, code) and repoB -> repoC
/// (critical, api) persisted in the data file.
async fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    let init = init_workspace(temp.path()).await.unwrap();
    save_edges(
        &[
            edge("e1", "repoA", "repoB", DependencyType::Code, ImpactLevel::High),
            edge("e2", "repoB", "repoC", DependencyType::Api, ImpactLevel::Critical),
        ],
        &init.dependencies_file,
    )
    .await
    .unwrap();
    temp
}

mod analysis_flow {
    use super::*;

    #[tokio::test]
    async fn analyze_change_to_the_bottom_of_a_chain() {
        let workspace = workspace().await;
        let app = App::from_directory(workspace.path()).await.unwrap();

        let analysis = app
            .analyzer()
            .analyze_change_impact(&RepoName::new("repoC"), ChangeType::Breaking)
            .unwrap();

        assert_eq!(analysis.affected_count(), 2);
        assert_eq!(analysis.direct_impact.len(), 1);
        assert_eq!(analysis.direct_impact[0].repository, RepoName::new("repoB"));
        assert_eq!(analysis.transitive_impact.len(), 1);
        assert_eq!(
            analysis.transitive_impact[0].repository,
            RepoName::new("repoA")
        );
        // critical along the path dominates the high edge into repoA
        assert_eq!(
            analysis.transitive_impact[0].impact_level,
            ImpactLevel::Critical
        );

        // 2 affected (+10), critical direct (+40), api direct (+20) = 70
        assert_eq!(analysis.risk.score, 70);
        assert_eq!(analysis.risk.level, RiskLevel::High);
    }

    #[tokio::test]
    async fn plan_derives_phases_from_the_graph() {
        let workspace = workspace().await;
        let app = App::from_directory(workspace.path()).await.unwrap();

        let analysis = app
            .analyzer()
            .analyze_change_impact(&RepoName::new("repoC"), ChangeType::Feature)
            .unwrap();
        let affected: Vec<RepoName> = analysis.affected_repositories.into_iter().collect();

        let plan = app
            .planner()
            .plan_coordinated_change(&RepoName::new("repoC"), "rotate signing keys", &affected)
            .unwrap();

        // repoB depends directly on repoC; repoA only through repoB.
        assert_eq!(plan.execution_phases.len(), 3);
        assert_eq!(
            plan.execution_phases[0].repositories,
            vec![RepoName::new("repoC")]
        );
        assert_eq!(
            plan.execution_phases[1].repositories,
            vec![RepoName::new("repoB")]
        );
        assert_eq!(
            plan.execution_phases[2].repositories,
            vec![RepoName::new("repoA")]
        );
        assert!(!plan.rollback_plan.is_empty());
    }
}

mod execution_flow {
    use super::*;

    fn step(name: &str, command: &str, rollback: Option<&str>) -> Step {
        Step {
            name: name.to_string(),
            command: command.to_string(),
            kind: StepKind::Test,
            rollback_command: rollback.map(str::to_string),
        }
    }

    fn single_step_phase(number: usize, repo: &str, command: &str, rollback: Option<&str>) -> Phase {
        Phase {
            phase_number: number,
            repositories: vec![RepoName::new(repo)],
            is_parallel: false,
            actions: vec![Action {
                repository: RepoName::new(repo),
                steps: vec![step("work", command, rollback)],
            }],
        }
    }

    /// Two-phase plan writing marker files through real shell commands.
    fn shell_plan(fail_second_phase: bool) -> convoy::domain::CoordinationPlan {
        let second_command = if fail_second_phase {
            "echo beta > beta.txt && false"
        } else {
            "echo beta > beta.txt"
        };

        convoy::domain::CoordinationPlan {
            id: "plan-shell001".to_string(),
            primary_repository: RepoName::new("alpha"),
            change_description: "marker files".to_string(),
            affected_repositories: vec![RepoName::new("beta")],
            execution_phases: vec![
                single_step_phase(1, "alpha", "echo alpha > alpha.txt", Some("rm -f alpha.txt")),
                single_step_phase(2, "beta", second_command, Some("rm -f beta.txt")),
            ],
            rollback_plan: vec![
                single_step_phase(2, "beta", "rm -f beta.txt", None),
                single_step_phase(1, "alpha", "rm -f alpha.txt", None),
            ],
            estimated_duration: std::time::Duration::from_secs(1800),
            created_at: chrono::Utc::now(),
        }
    }

    fn repos_root() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("alpha")).unwrap();
        std::fs::create_dir(temp.path().join("beta")).unwrap();
        temp
    }

    #[tokio::test]
    async fn successful_run_leaves_both_markers() {
        let root = repos_root();
        let executor = Executor::with_shell_runner(root.path());

        let run = executor.execute_coordination(&shell_plan(false)).await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.completed_phases, vec![1, 2]);
        assert!(root.path().join("alpha/alpha.txt").exists());
        assert!(root.path().join("beta/beta.txt").exists());
    }

    #[tokio::test]
    async fn failed_run_rolls_back_marker_files() {
        let root = repos_root();
        let executor = Executor::with_shell_runner(root.path());

        let run = executor.execute_coordination(&shell_plan(true)).await;

        assert_eq!(run.status, RunStatus::RolledBack);
        assert_eq!(run.completed_phases, vec![1]);
        assert_eq!(run.failed_steps.len(), 1);
        assert_eq!(run.failed_steps[0].repository, RepoName::new("beta"));

        // Rollback removed the markers both phases had written.
        assert!(!root.path().join("alpha/alpha.txt").exists());
        assert!(!root.path().join("beta/beta.txt").exists());
    }

    #[tokio::test]
    async fn command_output_is_captured_per_step() {
        let root = repos_root();
        let executor = Executor::with_shell_runner(root.path());

        let result = executor
            .execute_action(&Action {
                repository: RepoName::new("alpha"),
                steps: vec![
                    step("greet", "echo hello", None),
                    step("complain", "echo oops >&2 && exit 3", None),
                ],
            })
            .await;

        assert!(!result.success);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[0].stdout.trim(), "hello");
        assert_eq!(result.steps[1].exit_code, Some(3));
        assert_eq!(result.steps[1].stderr.trim(), "oops");
    }
}
