//! `lanemerge` library crate.
//!
//! Process, pipe and workspace handling for the `orchestrate` binary.
//! Re-exports internal modules for integration testing; the binary
//! entrypoint lives in `main.rs`.

pub mod channel;
pub mod config;
pub mod launcher;
pub mod run;
pub mod supervisor;
pub mod workspace;

pub use run::run;

#[cfg(not(unix))]
compile_error!("lanemerge requires a Unix platform: channels are named pipes");
