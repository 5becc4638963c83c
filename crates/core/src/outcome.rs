//! Process roles, terminations and run-level aggregation.

use std::collections::BTreeSet;
use std::fmt;

use crate::command::CommandLine;

/// Exit code recorded for a process that could not be started.
pub const NOT_STARTED_EXIT_CODE: i32 = 127;

/// Exit code recorded when a child's status could not be collected.
pub const UNOBSERVED_EXIT_CODE: i32 = 1;

/// Offset added to a signal number, following the shell convention.
const SIGNAL_EXIT_BASE: i32 = 128;

/// What a launched process does in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Transformer,
    Merger,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transformer => f.write_str("transformer"),
            Self::Merger => f.write_str("merger"),
        }
    }
}

/// Identity of one process within a run: its position in launch order
/// plus its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId {
    pub launch_index: usize,
    pub role: Role,
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Normal exit with the given status code.
    Exited(i32),
    /// Killed by the given signal.
    Signaled(i32),
    /// The process could not be spawned.
    NotStarted,
    /// Waiting on the process failed, so its status is unknown.
    Unobserved,
}

impl Termination {
    /// Exit code this termination contributes to the aggregate.
    pub fn exit_code(&self) -> i32 {
        match *self {
            Self::Exited(code) => code,
            Self::Signaled(signal) => SIGNAL_EXIT_BASE + signal,
            Self::NotStarted => NOT_STARTED_EXIT_CODE,
            Self::Unobserved => UNOBSERVED_EXIT_CODE,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

/// Final record for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub id: ProcessId,
    pub command: CommandLine,
    /// OS process id, if the process was started.
    pub pid: Option<u32>,
    pub termination: Termination,
}

/// Aggregate result of a run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    exit_code: i32,
    failed: BTreeSet<ProcessId>,
    outcomes: Vec<ProcessOutcome>,
}

impl RunResult {
    /// Aggregate per-process outcomes.
    ///
    /// The aggregate code is 0 only if every process succeeded. Otherwise
    /// it is the code of the failing process latest in launch order,
    /// regardless of the order in which processes actually exited.
    pub fn aggregate(mut outcomes: Vec<ProcessOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.id.launch_index);

        let mut exit_code = 0;
        let mut failed = BTreeSet::new();
        for outcome in &outcomes {
            let code = outcome.termination.exit_code();
            if code != 0 {
                exit_code = code;
                failed.insert(outcome.id);
            }
        }

        Self {
            exit_code,
            failed,
            outcomes,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Processes that exited non-zero, in launch order.
    pub fn failed(&self) -> &BTreeSet<ProcessId> {
        &self.failed
    }

    /// Every outcome, in launch order.
    pub fn outcomes(&self) -> &[ProcessOutcome] {
        &self.outcomes
    }

    /// Outcomes of failed processes, in launch order.
    pub fn failures(&self) -> impl Iterator<Item = &ProcessOutcome> {
        self.outcomes
            .iter()
            .filter(|o| !o.termination.is_success())
    }

    /// Aggregate code narrowed to a process exit status.
    ///
    /// Codes outside `0..=255` become 1 so a failure never reads as success.
    pub fn process_exit_code(&self) -> u8 {
        u8::try_from(self.exit_code).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    fn outcome(launch_index: usize, role: Role, termination: Termination) -> ProcessOutcome {
        ProcessOutcome {
            id: ProcessId { launch_index, role },
            command: CommandLine {
                program: OsString::from(format!("tool{launch_index}")),
                args: vec![],
            },
            pid: Some(1000 + launch_index as u32),
            termination,
        }
    }

    #[test]
    fn all_zero_is_success() {
        let result = RunResult::aggregate(vec![
            outcome(0, Role::Transformer, Termination::Exited(0)),
            outcome(1, Role::Transformer, Termination::Exited(0)),
            outcome(2, Role::Merger, Termination::Exited(0)),
        ]);
        assert!(result.is_success());
        assert_eq!(result.exit_code(), 0);
        assert!(result.failed().is_empty());
        assert_eq!(result.failures().count(), 0);
    }

    #[test]
    fn single_failure_sets_code() {
        let result = RunResult::aggregate(vec![
            outcome(0, Role::Transformer, Termination::Exited(0)),
            outcome(1, Role::Transformer, Termination::Exited(3)),
            outcome(2, Role::Transformer, Termination::Exited(0)),
            outcome(3, Role::Merger, Termination::Exited(0)),
        ]);
        assert_eq!(result.exit_code(), 3);
        assert_eq!(result.failed().len(), 1);
        assert_eq!(result.failures().count(), 1);
    }

    #[test]
    fn later_launched_failure_wins() {
        let result = RunResult::aggregate(vec![
            outcome(0, Role::Transformer, Termination::Exited(2)),
            outcome(1, Role::Transformer, Termination::Exited(5)),
            outcome(2, Role::Merger, Termination::Exited(0)),
        ]);
        assert_eq!(result.exit_code(), 5);

        let reversed = RunResult::aggregate(vec![
            outcome(0, Role::Transformer, Termination::Exited(5)),
            outcome(1, Role::Transformer, Termination::Exited(2)),
            outcome(2, Role::Merger, Termination::Exited(0)),
        ]);
        assert_eq!(reversed.exit_code(), 2);
    }

    #[test]
    fn completion_order_does_not_matter() {
        // Outcomes arrive in exit order; launch order decides.
        let result = RunResult::aggregate(vec![
            outcome(2, Role::Merger, Termination::Exited(0)),
            outcome(1, Role::Transformer, Termination::Exited(5)),
            outcome(0, Role::Transformer, Termination::Exited(2)),
        ]);
        assert_eq!(result.exit_code(), 5);
        let order: Vec<usize> = result.outcomes().iter().map(|o| o.id.launch_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn merger_failure_after_transformer_failure_wins() {
        let result = RunResult::aggregate(vec![
            outcome(0, Role::Transformer, Termination::Exited(2)),
            outcome(1, Role::Merger, Termination::Exited(1)),
        ]);
        assert_eq!(result.exit_code(), 1);
        assert_eq!(result.failed().len(), 2);
    }

    #[test]
    fn not_started_contributes_127() {
        let result = RunResult::aggregate(vec![
            outcome(0, Role::Transformer, Termination::Exited(0)),
            outcome(1, Role::Merger, Termination::NotStarted),
        ]);
        assert_eq!(result.exit_code(), NOT_STARTED_EXIT_CODE);
        assert!(result.failed().contains(&ProcessId {
            launch_index: 1,
            role: Role::Merger,
        }));
    }

    #[test]
    fn signaled_follows_shell_convention() {
        assert_eq!(Termination::Signaled(9).exit_code(), 137);
        assert_eq!(Termination::Signaled(13).exit_code(), 141);
        assert!(!Termination::Signaled(15).is_success());
    }

    #[test]
    fn unobserved_is_a_failure() {
        assert_eq!(Termination::Unobserved.exit_code(), UNOBSERVED_EXIT_CODE);
        assert!(!Termination::Unobserved.is_success());
    }

    #[test]
    fn process_exit_code_narrows_out_of_range() {
        let ok = RunResult::aggregate(vec![outcome(0, Role::Merger, Termination::Exited(0))]);
        assert_eq!(ok.process_exit_code(), 0);

        let failed = RunResult::aggregate(vec![outcome(0, Role::Merger, Termination::Exited(42))]);
        assert_eq!(failed.process_exit_code(), 42);

        let odd = RunResult::aggregate(vec![outcome(0, Role::Merger, Termination::Exited(-1))]);
        assert_eq!(odd.process_exit_code(), 1);
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::Transformer.to_string(), "transformer");
        assert_eq!(Role::Merger.to_string(), "merger");
    }
}
