//! `lanemerge-core` -- pure domain logic for the lane merge orchestrator.
//!
//! Naming convention parsing, command-line construction and exit status
//! aggregation. Nothing here touches processes or the filesystem; the
//! side effects live in the `lanemerge` crate.

pub mod command;
pub mod error;
pub mod naming;
pub mod outcome;
