//! Supervisor: waits for every launched process and aggregates the result.
//!
//! All children are awaited concurrently; completion order is irrelevant
//! because aggregation works in launch order. A non-zero exit is recorded,
//! never raised.
//!
//! Once the merge process has exited (or was never started) nobody reads
//! the channels any more. Transformers still running at that point would
//! block forever on their channel, so each of them gets a drain: the
//! supervisor opens the channel's read end itself and discards bytes
//! until the transformer exits.
//!
//! The reverse also happens: a transformer that exits before opening its
//! channel leaves the merge process blocked opening it. After each
//! transformer exits, and for as long as the merge process runs, the
//! supervisor closes that channel's write end on the transformer's behalf
//! so the merge process reads EOF instead.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use futures::future::join_all;
use lanemerge_core::outcome::{ProcessOutcome, RunResult, Termination};
use tokio::sync::watch;

use crate::channel;
use crate::launcher::{Launched, ProcessHandle};

/// Wait for every process in `launched` to exit and aggregate their statuses.
///
/// Emits one error record per failing process and a summary record.
pub async fn await_all(launched: Launched) -> RunResult {
    let Launched {
        transformers,
        merger,
        not_started,
    } = launched;

    let (reader_gone_tx, reader_gone_rx) = watch::channel(merger.is_none());

    let merge_wait = async move {
        let mut merger = merger?;
        let status = merger.wait().await;
        reader_gone_tx.send_replace(true);
        let termination = termination(&merger, status);
        Some(merger.into_outcome(termination))
    };

    let transformer_waits = join_all(
        transformers
            .into_iter()
            .map(|handle| wait_transformer(handle, reader_gone_rx.clone())),
    );

    let (merge_outcome, mut outcomes) = tokio::join!(merge_wait, transformer_waits);
    outcomes.extend(not_started);
    outcomes.extend(merge_outcome);

    let result = RunResult::aggregate(outcomes);
    report(&result);
    result
}

async fn wait_transformer(
    mut handle: ProcessHandle,
    reader_gone: watch::Receiver<bool>,
) -> ProcessOutcome {
    let status = tokio::select! {
        status = handle.wait() => status,
        () = until_reader_gone(reader_gone.clone()) => drain_until_exit(&mut handle).await,
    };

    if let Some(path) = handle.channel.as_deref() {
        tokio::select! {
            biased;
            () = until_reader_gone(reader_gone) => {}
            closed = channel::close_writer_side(path) => {
                if let Err(error) = closed {
                    tracing::warn!(
                        index = handle.id.launch_index,
                        channel = %path.display(),
                        error = %error,
                        "Could not close channel for its exited transformer",
                    );
                }
            }
        }
    }

    let termination = termination(&handle, status);
    handle.into_outcome(termination)
}

async fn until_reader_gone(mut reader_gone: watch::Receiver<bool>) {
    // A closed sender means the merge wait finished, which is the same thing.
    let _ = reader_gone.wait_for(|gone| *gone).await;
}

async fn drain_until_exit(handle: &mut ProcessHandle) -> io::Result<ExitStatus> {
    let Some(path) = handle.channel.clone() else {
        return handle.wait().await;
    };

    let mut receiver = match channel::open_drain(&path) {
        Ok(receiver) => receiver,
        Err(error) => {
            tracing::warn!(
                index = handle.id.launch_index,
                channel = %path.display(),
                error = %error,
                "Could not open channel for draining",
            );
            return handle.wait().await;
        }
    };

    tracing::debug!(
        index = handle.id.launch_index,
        channel = %path.display(),
        "Channel has no reader; draining until the transformer exits",
    );

    let mut sink = tokio::io::sink();
    tokio::select! {
        status = handle.wait() => status,
        _ = tokio::io::copy(&mut receiver, &mut sink) => handle.wait().await,
    }
}

fn termination(handle: &ProcessHandle, status: io::Result<ExitStatus>) -> Termination {
    match status {
        Ok(status) => match (status.code(), status.signal()) {
            (Some(code), _) => Termination::Exited(code),
            (None, Some(signal)) => Termination::Signaled(signal),
            (None, None) => Termination::Unobserved,
        },
        Err(error) => {
            tracing::error!(
                role = %handle.id.role,
                index = handle.id.launch_index,
                pid = handle.pid(),
                error = %error,
                "Failed to collect exit status",
            );
            Termination::Unobserved
        }
    }
}

fn report(result: &RunResult) {
    for failure in result.failures() {
        tracing::error!(
            role = %failure.id.role,
            index = failure.id.launch_index,
            pid = failure.pid,
            command = %failure.command,
            exit_code = failure.termination.exit_code(),
            "Child process failed",
        );
    }

    if result.is_success() {
        tracing::info!(processes = result.outcomes().len(), "All child processes succeeded");
    } else {
        tracing::error!(
            exit_code = result.exit_code(),
            failed = result.failed().len(),
            processes = result.outcomes().len(),
            "At least one child failed",
        );
    }
}
