//! Top-level wiring of one orchestrated run.
//!
//! ```text
//! Resolving -> WorkspaceCreated -> ChannelsReady -> Launching
//!           -> AwaitingExit -> CleaningUp -> Terminated
//! ```
//!
//! Once the workspace exists, every path goes through `CleaningUp`.
//! Failures while resolving names or creating the workspace end the run
//! with nothing to clean.

use std::fmt;
use std::path::Path;

use lanemerge_core::error::PipelineResult;
use lanemerge_core::naming::{self, InputSpec};
use lanemerge_core::outcome::RunResult;

use crate::channel;
use crate::config::PipelineConfig;
use crate::launcher::{self, LaunchPlan};
use crate::supervisor;
use crate::workspace::Workspace;

/// Phases of a run, logged at debug level as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Resolving,
    WorkspaceCreated,
    ChannelsReady,
    Launching,
    AwaitingExit,
    CleaningUp,
    Terminated,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::WorkspaceCreated => "workspace_created",
            Self::ChannelsReady => "channels_ready",
            Self::Launching => "launching",
            Self::AwaitingExit => "awaiting_exit",
            Self::CleaningUp => "cleaning_up",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

fn enter(state: RunState) {
    tracing::debug!(state = %state, "Run state");
}

/// Run the pipeline: tag every input and merge them into `output`.
///
/// Returns `Err` only for failures before any process was started
/// (naming, workspace or channel creation). Child failures are reported
/// through the returned [`RunResult`].
///
/// The returned future must be driven to completion. Children are not
/// killed when it is dropped, so cancelling it orphans them while the
/// workspace holding their channels is removed.
pub async fn run<P: AsRef<Path>>(
    config: &PipelineConfig,
    output: &Path,
    inputs: &[P],
) -> PipelineResult<RunResult> {
    enter(RunState::Resolving);
    let specs = naming::resolve_all(inputs)?;

    let workspace = Workspace::acquire(config.workspace_root.as_deref())?;
    enter(RunState::WorkspaceCreated);

    let result = run_in_workspace(config, output, &specs, &workspace).await;

    enter(RunState::CleaningUp);
    // Removal failures are logged by `release` and never replace the result.
    let _ = workspace.release();

    enter(RunState::Terminated);
    result
}

async fn run_in_workspace(
    config: &PipelineConfig,
    output: &Path,
    specs: &[InputSpec],
    workspace: &Workspace,
) -> PipelineResult<RunResult> {
    let channels = channel::create_channels(workspace.path(), specs)?;
    enter(RunState::ChannelsReady);

    let plan = LaunchPlan::build(config, output, specs, &channels);
    enter(RunState::Launching);
    let launched = launcher::launch(plan);

    enter(RunState::AwaitingExit);
    Ok(supervisor::await_all(launched).await)
}
