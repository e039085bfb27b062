//! Domain types for dependency analysis and coordinated change.
//!
//! Everything that crosses a component boundary is a concrete struct or
//! enum here; plans, actions and steps are never passed around as untyped
//! maps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Name of a repository participating in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoName(pub String);

impl RepoName {
    /// Create a new repository name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RepoName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of relationship a dependency edge represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// Source imports or links code from the target
    Code,

    /// Source consumes a container image built from the target
    Docker,

    /// Source calls a network API served by the target
    Api,

    /// Source reads configuration owned by the target
    Config,

    /// Source depends on a data schema defined by the target
    Schema,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Code => "code",
            Self::Docker => "docker",
            Self::Api => "api",
            Self::Config => "config",
            Self::Schema => "schema",
        };
        write!(f, "{s}")
    }
}

/// Ordinal severity attached to a dependency edge.
///
/// The derived `Ord` gives the total order low < medium < high < critical,
/// which is what impact combination relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    /// Cosmetic or isolated
    Low,

    /// Noticeable but contained
    Medium,

    /// Likely to break dependents
    High,

    /// Breaks dependents unless coordinated
    Critical,
}

impl ImpactLevel {
    /// Combine two impact levels along a path: the higher ordinal wins.
    ///
    /// Commutative and idempotent; `combine(x, x) == x`.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        self.max(other)
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A directed dependency between two repositories.
///
/// Direction reads "source depends on target". Edges are immutable once
/// loaded; the graph store owns them for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Unique identifier of the edge record
    pub id: String,

    /// The dependent repository
    pub source: RepoName,

    /// The repository being depended on
    pub target: RepoName,

    /// Kind of dependency
    pub dependency_type: DependencyType,

    /// Version constraint, if the dependency is pinned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// How severe a change to the target is for the source
    pub impact_level: ImpactLevel,

    /// Opaque extra attributes carried through from the store
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Category of change being analyzed or coordinated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Incompatible change to an interface or contract
    Breaking,

    /// New functionality, backwards compatible
    Feature,

    /// Bug fix
    Fix,

    /// Maintenance with no behavior change
    Chore,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Breaking => "breaking",
            Self::Feature => "feature",
            Self::Fix => "fix",
            Self::Chore => "chore",
        };
        write!(f, "{s}")
    }
}

/// One repository affected by a change, with how the impact reaches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactEntry {
    /// The affected repository
    pub repository: RepoName,

    /// Type of the edge the impact arrived through
    pub dependency_type: DependencyType,

    /// Severity accumulated along the path (ordinal max)
    pub impact_level: ImpactLevel,

    /// Repositories from the changed repo to this one, inclusive
    pub path: Vec<RepoName>,

    /// Number of edges between the changed repo and this one
    pub distance: usize,
}

/// Overall risk classification for a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Score below 40
    Low,

    /// Score 40 to 69
    Medium,

    /// Score 70 or above
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        };
        write!(f, "{s}")
    }
}

/// Risk scoring result for an analyzed change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Additive score, 0-100 range in practice
    pub score: u32,

    /// Classification derived from the score
    pub level: RiskLevel,

    /// Human-readable reasons the score accumulated
    pub factors: Vec<String>,

    /// Fixed mitigation checklist for this risk level
    pub mitigation_priority: Vec<String>,
}

/// Result of an impact analysis query. Ephemeral, owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    /// The repository being changed
    pub changed_repository: RepoName,

    /// Category of the change
    pub change_type: ChangeType,

    /// Repositories with an edge pointing directly at the changed repo
    pub direct_impact: Vec<ImpactEntry>,

    /// Repositories reached through intermediate dependents
    pub transitive_impact: Vec<ImpactEntry>,

    /// Every affected repository, direct and transitive
    pub affected_repositories: BTreeSet<RepoName>,

    /// One path per impact entry, changed repo first
    pub impact_paths: Vec<Vec<RepoName>>,

    /// Risk scoring for the change
    pub risk: RiskAssessment,

    /// Deterministic, rule-derived recommendations
    pub recommendations: Vec<String>,
}

impl ImpactAnalysis {
    /// Total number of affected repositories (direct + transitive).
    #[must_use]
    pub fn affected_count(&self) -> usize {
        self.affected_repositories.len()
    }
}

/// Category of a plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Branch creation or manipulation
    Branch,

    /// Dependency manifest/lockfile update
    Dependencies,

    /// Test suite invocation
    Test,

    /// Committing the change
    Commit,

    /// Opening a pull request
    Review,
}

/// One shell command to run in a repository, with its optional undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Short step name (e.g., "create-branch")
    pub name: String,

    /// Shell command to execute
    pub command: String,

    /// What kind of work the step does
    pub kind: StepKind,

    /// Command that undoes this step, if it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_command: Option<String>,
}

/// The ordered steps to run in a single repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// The repository the steps run in
    pub repository: RepoName,

    /// Steps in execution order
    pub steps: Vec<Step>,
}

/// A unit of the coordination plan executed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// 1-based phase number. Rollback phases keep the number of the
    /// execution phase they undo.
    pub phase_number: usize,

    /// Repositories touched by this phase
    pub repositories: Vec<RepoName>,

    /// Whether actions run concurrently (true iff more than one repo)
    pub is_parallel: bool,

    /// One action per repository
    pub actions: Vec<Action>,
}

/// A phased plan for a coordinated multi-repository change.
///
/// Immutable during execution. The rollback plan is derived once at plan
/// creation (reverse phase order, reverse step order within each action,
/// rollback-bearing steps only) and never recomputed, so rolling back
/// always reflects the plan as originally generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationPlan {
    /// Unique plan identifier
    pub id: String,

    /// The repository the change originates in
    pub primary_repository: RepoName,

    /// Free-text description, referenced by commit messages
    pub change_description: String,

    /// The affected repositories the plan was built for (primary excluded)
    pub affected_repositories: Vec<RepoName>,

    /// Phases in execution order
    pub execution_phases: Vec<Phase>,

    /// Reverse-ordered, filtered mirror of the execution phases
    pub rollback_plan: Vec<Phase>,

    /// Rough placeholder: fixed default per phase
    pub estimated_duration: Duration,

    /// When the plan was generated
    pub created_at: DateTime<Utc>,
}

/// Status of a coordination run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Plan built, execution not started
    Planning,

    /// Phases are executing
    InProgress,

    /// Every phase succeeded
    Completed,

    /// A phase failed or an internal error occurred
    Failed,

    /// Rollback ran after a failure
    RolledBack,

    /// Run was cancelled before finishing
    Cancelled,
}

impl RunStatus {
    /// Whether this status ends the run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::RolledBack | Self::Cancelled
        )
    }
}

/// A step that failed during execution, kept on the run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedStep {
    /// Repository the step ran in
    pub repository: RepoName,

    /// Name of the failed step
    pub step_name: String,

    /// Exit code or launch error description
    pub error: String,
}

/// Mutable record of one coordination execution.
///
/// Created when execution starts and finalized (terminal status plus
/// finish timestamp, exactly once) on every path out of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationRun {
    /// Unique run identifier
    pub id: String,

    /// The plan this run executes
    pub plan_id: String,

    /// Current status
    pub status: RunStatus,

    /// Phase numbers that completed successfully, in order
    pub completed_phases: Vec<usize>,

    /// Steps that failed, with their errors
    pub failed_steps: Vec<FailedStep>,

    /// Chronological event log
    pub log: Vec<String>,

    /// Error text if the run failed for an internal reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Captured result of one executed step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Name of the step
    pub step_name: String,

    /// The command that ran
    pub command: String,

    /// Exit code, if the process launched
    pub exit_code: Option<i32>,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Whether the step succeeded (exit code zero)
    pub success: bool,
}

/// Result of executing all steps of an action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// Repository the action ran in
    pub repository: RepoName,

    /// Results for the steps that ran (stops at the first failure)
    pub steps: Vec<StepResult>,

    /// Whether every step succeeded
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn impact_level_total_order() {
        assert!(ImpactLevel::Low < ImpactLevel::Medium);
        assert!(ImpactLevel::Medium < ImpactLevel::High);
        assert!(ImpactLevel::High < ImpactLevel::Critical);
    }

    #[test]
    fn combine_returns_higher_ordinal() {
        assert_eq!(
            ImpactLevel::Low.combine(ImpactLevel::Critical),
            ImpactLevel::Critical
        );
        assert_eq!(
            ImpactLevel::High.combine(ImpactLevel::Medium),
            ImpactLevel::High
        );
    }

    #[test]
    fn edge_deserializes_with_optional_fields_missing() {
        let json = r#"{
            "id": "e1",
            "source": "svc-a",
            "target": "svc-b",
            "dependency_type": "api",
            "impact_level": "high"
        }"#;
        let edge: DependencyEdge = serde_json::from_str(json).unwrap();
        assert_eq!(edge.source, RepoName::new("svc-a"));
        assert_eq!(edge.dependency_type, DependencyType::Api);
        assert_eq!(edge.impact_level, ImpactLevel::High);
        assert!(edge.version.is_none());
        assert!(edge.metadata.is_empty());
    }

    #[test]
    fn run_status_terminality() {
        assert!(!RunStatus::Planning.is_terminal());
        assert!(!RunStatus::InProgress.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::RolledBack.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn risk_level_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::High).unwrap(),
            "\"HIGH\""
        );
    }

    fn impact_level_strategy() -> impl Strategy<Value = ImpactLevel> {
        prop_oneof![
            Just(ImpactLevel::Low),
            Just(ImpactLevel::Medium),
            Just(ImpactLevel::High),
            Just(ImpactLevel::Critical),
        ]
    }

    proptest! {
        #[test]
        fn combine_is_commutative(a in impact_level_strategy(), b in impact_level_strategy()) {
            prop_assert_eq!(a.combine(b), b.combine(a));
        }

        #[test]
        fn combine_is_idempotent(a in impact_level_strategy()) {
            prop_assert_eq!(a.combine(a), a);
        }

        #[test]
        fn combine_never_lowers_severity(a in impact_level_strategy(), b in impact_level_strategy()) {
            let combined = a.combine(b);
            prop_assert!(combined >= a);
            prop_assert!(combined >= b);
        }
    }
}
