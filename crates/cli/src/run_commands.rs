//! `switchyard run`: dispatch messages from `--message` or stdin.

use std::{path::Path, sync::Arc};

use {
    clap::Args,
    switchyard_common::InboundMessage,
    switchyard_routing::{DispatchOutcome, Dispatcher, Error as DispatchError},
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        task::JoinSet,
    },
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::app::App;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Dispatch a single message instead of reading stdin.
    #[arg(short, long)]
    pub message: Option<String>,
    /// Sender id for `--message`.
    #[arg(long, default_value = "cli")]
    pub sender: String,
    /// Group id for `--message`; omit for a direct conversation.
    #[arg(long)]
    pub group: Option<String>,
    /// Print one JSON object per result.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            message: None,
            sender: "cli".into(),
            group: None,
            json: false,
        }
    }
}

pub async fn handle_run(args: RunArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let app = App::load(config_path).await?;
    let dispatcher = Arc::new(app.dispatcher()?);
    let shutdown = CancellationToken::new();

    let mut failed = false;
    let result = match &args.message {
        Some(text) => {
            let mut msg = InboundMessage::new(args.sender.as_str(), text.as_str());
            if let Some(group) = &args.group {
                msg = msg.in_group(group.as_str());
            }
            let result = dispatcher.dispatch_with_cancel(msg.clone(), &shutdown).await;
            print_result(&msg, &result, args.json);
            failed = result.is_err();
            Ok(())
        },
        None => read_stdin(&dispatcher, &shutdown, args.json).await,
    };

    // Persist every loaded scope even when the loop ended with an error.
    app.memory.shutdown().await?;
    info!("memory flushed, exiting");
    result?;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// One task per line so slow workflows do not hold up the rest. Ends on EOF
/// or Ctrl-C; in-flight runs are cancelled at their next block on Ctrl-C.
async fn read_stdin(
    dispatcher: &Arc<Dispatcher>,
    shutdown: &CancellationToken,
    json: bool,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let msg = match InboundMessage::parse_line(&line) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "skipping input line");
                        continue;
                    },
                };
                let dispatcher = Arc::clone(dispatcher);
                let cancel = shutdown.clone();
                tasks.spawn(async move {
                    let result = dispatcher.dispatch_with_cancel(msg.clone(), &cancel).await;
                    print_result(&msg, &result, json);
                });
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, cancelling in-flight workflows");
                shutdown.cancel();
                break;
            },
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "dispatch task panicked");
        }
    }
    Ok(())
}

fn print_result(
    msg: &InboundMessage,
    result: &Result<DispatchOutcome, DispatchError>,
    json: bool,
) {
    if json {
        let value = match result {
            Ok(outcome) => serde_json::json!({
                "id": msg.id,
                "sender": msg.sender_id,
                "group": msg.group_id,
                "workflow": outcome.route.workflow.to_string(),
                "matched": outcome.route.matched,
                "reply": outcome.reply(),
            }),
            Err(e) => serde_json::json!({
                "id": msg.id,
                "sender": msg.sender_id,
                "group": msg.group_id,
                "error": e.to_string(),
            }),
        };
        println!("{value}");
        return;
    }

    match result {
        Ok(outcome) => {
            let reply = outcome.reply().unwrap_or_default();
            println!("[{}] {} → {reply}", outcome.route, msg.display_name());
        },
        Err(e) => eprintln!("error for {}: {e}", msg.display_name()),
    }
}
