//! `convoy plan` command implementation.

use crate::cli::display::print_list;
use colored::Colorize;
use convoy::app::App;
use convoy::domain::{ChangeType, CoordinationPlan, RepoName};
use std::path::Path;

/// Run the plan command.
pub async fn run(
    workspace: &Path,
    primary: &str,
    description: &str,
    affected: &[String],
    change_type: ChangeType,
    json: bool,
) -> Result<(), convoy::Error> {
    let app = App::from_directory(workspace).await?;
    let plan = build_plan(&app, primary, description, affected, change_type)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    print_plan(&plan);
    Ok(())
}

/// Build a plan, deriving the affected set from an impact analysis when
/// none is given explicitly.
pub fn build_plan(
    app: &App,
    primary: &str,
    description: &str,
    affected: &[String],
    change_type: ChangeType,
) -> Result<CoordinationPlan, convoy::Error> {
    let primary = RepoName::new(primary);

    let affected: Vec<RepoName> = if affected.is_empty() {
        let analysis = app.analyzer().analyze_change_impact(&primary, change_type)?;
        analysis.affected_repositories.into_iter().collect()
    } else {
        affected.iter().map(RepoName::new).collect()
    };

    app.planner()
        .plan_coordinated_change(&primary, description, &affected)
}

/// Print a plan in a readable, reviewable form.
pub fn print_plan(plan: &CoordinationPlan) {
    println!(
        "{} {} ({} phase{}, estimated {} min)",
        "Plan".bold(),
        plan.id.white().bold(),
        plan.execution_phases.len(),
        if plan.execution_phases.len() == 1 { "" } else { "s" },
        plan.estimated_duration.as_secs() / 60
    );
    println!("  change: {}", plan.change_description);
    println!("  primary: {}", plan.primary_repository);
    println!();

    for phase in &plan.execution_phases {
        println!(
            "  {} {}{}:",
            "Phase".bold(),
            phase.phase_number,
            if phase.is_parallel { " (parallel)" } else { "" }
        );
        for action in &phase.actions {
            println!("    {}:", action.repository.to_string().white().bold());
            let commands: Vec<String> = action
                .steps
                .iter()
                .map(|s| format!("{} ({})", s.command, s.name))
                .collect();
            print_list(&commands, "no steps");
        }
    }

    println!();
    println!(
        "  {} {} phase{} with rollback commands prepared",
        "Rollback:".bold(),
        plan.rollback_plan.len(),
        if plan.rollback_plan.len() == 1 { "" } else { "s" }
    );
}
