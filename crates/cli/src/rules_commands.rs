use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use crate::app::App;

#[derive(Subcommand)]
pub enum RulesAction {
    /// Load the rules directory and list the rules that survived validation.
    Check,
    /// Show which workflow a message text would be routed to.
    Route {
        /// Message text to classify.
        text: String,
    },
}

#[derive(Subcommand)]
pub enum WorkflowAction {
    /// List registered workflows in registration order.
    List,
}

pub async fn handle_rules(action: RulesAction, config_path: Option<&Path>) -> Result<()> {
    let app = App::load(config_path).await?;
    match action {
        RulesAction::Check => {
            eprintln!(
                "Rules directory: {}",
                app.config.dispatch.rules_dir.display()
            );
            for (i, rule) in app.rules.rules().iter().enumerate() {
                println!("{:>3}. {rule}", i + 1);
            }
            let report = app.rules_report;
            eprintln!(
                "\n{} rule(s) loaded, {} rejected",
                report.loaded, report.rejected
            );
            if report.rejected > 0 {
                std::process::exit(1);
            }
        },
        RulesAction::Route { text } => {
            let route = app.dispatcher()?.route(&text);
            println!("{route}");
        },
    }
    Ok(())
}

pub async fn handle_workflows(action: WorkflowAction, config_path: Option<&Path>) -> Result<()> {
    let app = App::load(config_path).await?;
    match action {
        WorkflowAction::List => {
            let default = app.dispatcher()?.default_workflow().clone();
            for workflow in app.workflows.list() {
                let pipeline = app.workflows.build(&workflow.to_string())?;
                let marker = if *workflow == default {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "{workflow}{marker}: {}",
                    pipeline.execution_order().join(" → ")
                );
            }
        },
    }
    Ok(())
}
