use std::{io::IsTerminal, path::Path};

use {
    anyhow::{Result, bail},
    clap::Subcommand,
    secrecy::Secret,
    switchyard_config::validate::{self, Diagnostic, Severity},
};

use crate::app::load_config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the config file and report problems.
    Check {
        /// Also print informational diagnostics.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration as TOML with the API key redacted.
    Show,
}

pub fn handle_config(action: ConfigAction, config_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(config_path, verbose),
        ConfigAction::Show => {
            let mut config = load_config(config_path)?;
            if config.llm.api_key.is_some() {
                config.llm.api_key = Some(Secret::new("[REDACTED]".to_string()));
            }
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        },
    }
}

fn check(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate::validate(config_path);
    match &result.config_path {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let ansi = std::io::stderr().is_terminal();
    let shown: Vec<String> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .map(|d| render(d, ansi))
        .collect();
    for line in &shown {
        eprintln!("  {line}");
    }
    if !shown.is_empty() {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors + warnings == 0 {
        eprintln!("No issues found.");
        return Ok(());
    }
    if errors > 0 {
        bail!("{errors} error(s), {warnings} warning(s)");
    }
    eprintln!("{warnings} warning(s)");
    Ok(())
}

fn render(d: &Diagnostic, ansi: bool) -> String {
    let label = if ansi {
        let color = match d.severity {
            Severity::Error => "\x1b[1;31m",
            Severity::Warning => "\x1b[1;33m",
            Severity::Info => "\x1b[1;36m",
        };
        format!("{color}{}\x1b[0m", d.severity)
    } else {
        d.severity.to_string()
    };
    if d.path.is_empty() {
        format!("{label} {}", d.message)
    } else {
        format!("{label} {}: {}", d.path, d.message)
    }
}
