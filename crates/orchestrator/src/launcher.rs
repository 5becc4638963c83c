//! Process launcher.
//!
//! Starts every transformer, then the merge process, without waiting on
//! any of them. The merge process blocks opening each channel until its
//! transformer is writing, so transformers go first.
//!
//! A spawn failure stops the launch sequence: the failed process is
//! recorded as [`Termination::NotStarted`] and nothing after it starts.
//! Processes already running are handed to the supervisor as usual.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use lanemerge_core::command::{self, CommandLine};
use lanemerge_core::error::PipelineError;
use lanemerge_core::naming::InputSpec;
use lanemerge_core::outcome::{ProcessId, ProcessOutcome, Role, Termination};
use tokio::process::{Child, Command};

use crate::channel::Channel;
use crate::config::PipelineConfig;

/// A process that has been planned but not started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedProcess {
    pub id: ProcessId,
    pub command: CommandLine,
    /// Channel this process writes to (transformers only).
    pub channel: Option<PathBuf>,
}

/// Every process of a run, in launch order.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub transformers: Vec<PlannedProcess>,
    pub merger: PlannedProcess,
}

impl LaunchPlan {
    /// Plan one transformer per input plus the merge process.
    ///
    /// `specs` and `channels` are paired by position.
    pub fn build(
        config: &PipelineConfig,
        output: &Path,
        specs: &[InputSpec],
        channels: &[Channel],
    ) -> Self {
        let transformers: Vec<PlannedProcess> = specs
            .iter()
            .zip(channels)
            .enumerate()
            .map(|(launch_index, (spec, channel))| PlannedProcess {
                id: ProcessId {
                    launch_index,
                    role: Role::Transformer,
                },
                command: command::transformer_command(
                    &config.transformer,
                    &config.tags,
                    spec,
                    &channel.path,
                ),
                channel: Some(channel.path.clone()),
            })
            .collect();

        let channel_paths: Vec<&Path> = channels.iter().map(|c| c.path.as_path()).collect();
        let merger = PlannedProcess {
            id: ProcessId {
                launch_index: transformers.len(),
                role: Role::Merger,
            },
            command: command::merge_command(&config.merger, output, &channel_paths),
            channel: None,
        };

        Self {
            transformers,
            merger,
        }
    }
}

/// A started child process. Owned by the supervisor until it exits.
#[derive(Debug)]
pub struct ProcessHandle {
    pub id: ProcessId,
    pub command: CommandLine,
    pub channel: Option<PathBuf>,
    pid: Option<u32>,
    child: Child,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the process to exit. Cancel-safe.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Turn the handle into its final outcome.
    pub fn into_outcome(self, termination: Termination) -> ProcessOutcome {
        ProcessOutcome {
            id: self.id,
            command: self.command,
            pid: self.pid,
            termination,
        }
    }
}

/// Result of the launch sequence.
#[derive(Debug, Default)]
pub struct Launched {
    /// Transformers that started, in launch order.
    pub transformers: Vec<ProcessHandle>,
    /// The merge process, if the sequence got that far and it started.
    pub merger: Option<ProcessHandle>,
    /// The process whose spawn failed and aborted the sequence.
    pub not_started: Option<ProcessOutcome>,
}

impl Launched {
    pub fn is_complete(&self) -> bool {
        self.not_started.is_none()
    }
}

/// Start every planned process in order, stopping at the first spawn failure.
pub fn launch(plan: LaunchPlan) -> Launched {
    let mut launched = Launched {
        transformers: Vec::with_capacity(plan.transformers.len()),
        ..Default::default()
    };

    for planned in plan.transformers {
        match start(planned) {
            Ok(handle) => launched.transformers.push(handle),
            Err(not_started) => {
                launched.not_started = Some(not_started);
                return launched;
            }
        }
    }

    match start(plan.merger) {
        Ok(handle) => launched.merger = Some(handle),
        Err(not_started) => launched.not_started = Some(not_started),
    }
    launched
}

fn start(planned: PlannedProcess) -> Result<ProcessHandle, ProcessOutcome> {
    let PlannedProcess {
        id,
        command,
        channel,
    } = planned;

    tracing::info!(
        role = %id.role,
        index = id.launch_index,
        command = %command,
        "Launching process",
    );

    match spawn(&command) {
        Ok(child) => {
            let pid = child.id();
            tracing::debug!(role = %id.role, index = id.launch_index, pid, "Process started");
            Ok(ProcessHandle {
                id,
                command,
                channel,
                pid,
                child,
            })
        }
        Err(source) => {
            let err = PipelineError::Launch {
                program: command.program.to_string_lossy().into_owned(),
                source,
            };
            // The supervisor reports the failure itself; this only adds the cause.
            tracing::warn!(
                role = %id.role,
                index = id.launch_index,
                error = %err,
                "Launch failed; no further processes will be started",
            );
            Err(ProcessOutcome {
                id,
                command,
                pid: None,
                termination: Termination::NotStarted,
            })
        }
    }
}

fn spawn(command: &CommandLine) -> io::Result<Child> {
    Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .spawn()
}

#[cfg(test)]
mod tests {
    use lanemerge_core::command::CommandTemplate;
    use lanemerge_core::naming::resolve_all;

    use super::*;
    use crate::config::{LogFormat, PipelineConfig};

    fn config(transformer: &str, merger: &str) -> PipelineConfig {
        PipelineConfig {
            transformer: CommandTemplate::parse("t", transformer).expect("valid"),
            merger: CommandTemplate::parse("m", merger).expect("valid"),
            tags: Default::default(),
            workspace_root: None,
            log_format: LogFormat::Text,
        }
    }

    fn channels_for(specs: &[InputSpec]) -> Vec<Channel> {
        specs
            .iter()
            .map(|s| Channel {
                id: s.base_name.clone(),
                path: PathBuf::from("/ws").join(&s.base_name),
            })
            .collect()
    }

    #[test]
    fn plan_orders_transformers_before_merger() {
        let specs = resolve_all(&["a_L001_R1_001.bam", "a_L002_R1_001.bam"]).expect("valid");
        let channels = channels_for(&specs);
        let plan = LaunchPlan::build(
            &config("tagger", "merger"),
            Path::new("out.bam"),
            &specs,
            &channels,
        );

        let indices: Vec<usize> = plan.transformers.iter().map(|p| p.id.launch_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert!(plan.transformers.iter().all(|p| p.id.role == Role::Transformer));
        assert_eq!(plan.merger.id.launch_index, 2);
        assert_eq!(plan.merger.id.role, Role::Merger);
        assert_eq!(
            plan.merger.command.to_string(),
            "merger out.bam /ws/a_L001_R1_001.bam /ws/a_L002_R1_001.bam"
        );
        assert_eq!(
            plan.transformers[1].channel.as_deref(),
            Some(Path::new("/ws/a_L002_R1_001.bam"))
        );
        assert_eq!(plan.merger.channel, None);
    }

    #[tokio::test]
    async fn spawn_failure_stops_the_sequence() {
        let specs = resolve_all(&["a_L001_R1_001.bam", "a_L002_R1_001.bam"]).expect("valid");
        let channels = channels_for(&specs);
        let plan = LaunchPlan::build(
            &config("/nonexistent/tagger", "true"),
            Path::new("out"),
            &specs,
            &channels,
        );

        let launched = launch(plan);

        assert!(!launched.is_complete());
        assert!(launched.transformers.is_empty());
        assert!(launched.merger.is_none());
        let not_started = launched.not_started.expect("first transformer failed");
        assert_eq!(not_started.id.launch_index, 0);
        assert_eq!(not_started.termination, Termination::NotStarted);
        assert_eq!(not_started.pid, None);
    }

    #[tokio::test]
    async fn launches_everything_when_spawns_succeed() {
        let specs = resolve_all(&["a_L001_R1_001.bam"]).expect("valid");
        let channels = channels_for(&specs);
        let plan = LaunchPlan::build(&config("true", "true"), Path::new("out"), &specs, &channels);

        let mut launched = launch(plan);

        assert!(launched.is_complete());
        assert_eq!(launched.transformers.len(), 1);
        let mut merger = launched.merger.take().expect("merger started");
        assert!(merger.pid().is_some());
        assert!(merger.wait().await.expect("wait").success());
        for handle in &mut launched.transformers {
            assert!(handle.wait().await.expect("wait").success());
        }
    }
}
