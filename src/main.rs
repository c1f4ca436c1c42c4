use anyhow::Result;
use clap::Parser;
use file_finder::app::{self, events::UserEvent, state::FinderState};
use file_finder::cli::Cli;
use file_finder::config::settings;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so stdout carries nothing but matching paths.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.effective_config()?;

    let mut initial_state = FinderState::new(config);
    if cli.save {
        initial_state.config_path = cli.config.clone().or_else(settings::get_config_file_path);
    }
    let state = Arc::new(Mutex::new(initial_state));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let forwarder = app::tasks::start_search(event_tx, state.clone());

    let deadline = async {
        match cli.timeout {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let mut deadline_passed = false;

    let mut summary = None;
    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(UserEvent::MatchFound { path, .. }) => println!("{}", path.display()),
                Some(UserEvent::SearchFinished { summary: finished, .. }) => {
                    summary = Some(finished);
                    break;
                }
                Some(UserEvent::SearchStarted { run_id }) => {
                    tracing::debug!("Search run {} accepted.", run_id);
                }
                Some(UserEvent::ShowError(message)) => return Err(anyhow::anyhow!(message)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, cancelling search...");
                app::tasks::cancel_search(&state);
            }
            _ = &mut deadline, if !deadline_passed => {
                deadline_passed = true;
                tracing::info!("Timeout reached, cancelling search...");
                app::tasks::cancel_search(&state);
            }
        }
    }

    forwarder.await?;

    let Some(summary) = summary else {
        tracing::error!("Search ended without a completion event.");
        return Ok(ExitCode::FAILURE);
    };

    if summary.cancelled {
        tracing::warn!("Search cancelled after {} match(es).", summary.match_count);
    } else if !summary.any_match_found {
        tracing::info!("No matching files found.");
    } else {
        tracing::info!(
            "Found {} file(s) ({} examined, {} skipped).",
            summary.match_count,
            summary.files_examined,
            summary.entries_skipped
        );
    }

    Ok(if summary.any_match_found {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
