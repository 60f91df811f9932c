use std::path::Path;

use {clap::Subcommand, switchyard_memory::MemoryEntry};

use crate::app::{load_config, open_memory};

#[derive(Subcommand)]
pub enum MemoryAction {
    /// Print the entries stored under a scope key (e.g. `member:alice`,
    /// `group:team-1`, `direct:alice`, `global`).
    Show {
        scope_key: String,
        /// Output entries as JSON for scripting.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete every entry stored under a scope key.
    Clear { scope_key: String },
}

pub async fn handle_memory(action: MemoryAction, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let memory = open_memory(&config).await?;
    match action {
        MemoryAction::Show { scope_key, json } => {
            let entries = memory.query_key(&scope_key).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No entries for {scope_key}.");
            } else {
                print_human(&entries);
            }
        },
        MemoryAction::Clear { scope_key } => {
            memory.clear(&scope_key).await?;
            println!("Cleared {scope_key}.");
        },
    }
    memory.shutdown().await?;
    Ok(())
}

fn print_human(entries: &[MemoryEntry]) {
    for entry in entries {
        let preview: String = entry.content.chars().take(200).collect();
        println!(
            "{} [{}] {}: {preview}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.role,
            entry.sender_id
        );
        if entry.content.chars().count() > 200 {
            println!("  ...");
        }
    }
}
