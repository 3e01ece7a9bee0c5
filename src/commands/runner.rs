//! Drives a [`WorkerController`] run from the terminal.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use crate::engine::{Operation, Report};
use crate::worker::{self, Phase, ProgressEvent, WorkerController};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Start `operation`, show progress until it finishes, forward SIGINT to
/// `cancel`, and return the joined report.
pub fn execute(
    controller: &mut WorkerController,
    operation: Operation,
    show_progress: bool,
) -> Result<Report> {
    let events = controller.subscribe();
    if let Err(e) = worker::install_interrupt_handler() {
        tracing::warn!("Cannot install interrupt handler: {}", e);
    }

    let spinner = if show_progress {
        create_spinner(&format!("{}...", operation))
    } else {
        ProgressBar::hidden()
    };

    controller.start(operation)?;

    loop {
        if worker::take_interrupt() && controller.cancel() {
            spinner.set_message("cancelling...");
        }

        match events.recv_timeout(POLL_INTERVAL) {
            Ok(ProgressEvent::ItemProcessed {
                path,
                processed,
                total_estimate,
                ..
            }) => {
                let count = match total_estimate {
                    Some(total) => format!("{}/{}", processed, total),
                    None => processed.to_string(),
                };
                spinner.set_message(format!("{} {} {}", operation, count, path.display()));
                spinner.tick();
            }
            Ok(ProgressEvent::RuleStarted { rule }) => {
                spinner.set_message(format!("{}: {}", operation, rule));
            }
            Ok(ProgressEvent::Finished { .. }) => break,
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {
                if controller.phase() == Phase::Done {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    spinner.finish_and_clear();
    Ok(controller.join()?)
}

fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(POLL_INTERVAL);
    spinner
}
