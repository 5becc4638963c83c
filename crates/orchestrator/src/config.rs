use std::path::PathBuf;

use lanemerge_core::command::{CommandTemplate, ReadGroupTags};
use lanemerge_core::error::{PipelineError, PipelineResult};

const DEFAULT_TRANSFORMER: &str = "picard AddOrReplaceReadGroups";
const DEFAULT_MERGER: &str = "samtools merge -f";

/// Highest compression level the transformer accepts.
const MAX_COMPRESSION_LEVEL: u8 = 9;

/// Log output format for the diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-input transformer program and leading arguments.
    pub transformer: CommandTemplate,
    /// Merge program and leading arguments.
    pub merger: CommandTemplate,
    /// Read-group fields common to every input.
    pub tags: ReadGroupTags,
    /// Parent directory for run workspaces (system temp dir if `None`).
    pub workspace_root: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                         |
    /// |-------------------------------|---------------------------------|
    /// | `LANEMERGE_TRANSFORMER`       | `picard AddOrReplaceReadGroups` |
    /// | `LANEMERGE_MERGER`            | `samtools merge -f`             |
    /// | `LANEMERGE_PLATFORM`          | `illumina`                      |
    /// | `LANEMERGE_PLATFORM_UNIT`     | `unit1`                         |
    /// | `LANEMERGE_COMPRESSION_LEVEL` | `0`                             |
    /// | `LANEMERGE_WORKDIR`           | system temp dir                 |
    /// | `LANEMERGE_LOG_FORMAT`        | `text`                          |
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PipelineResult<Self> {
        let transformer = CommandTemplate::parse(
            "LANEMERGE_TRANSFORMER",
            &lookup("LANEMERGE_TRANSFORMER").unwrap_or_else(|| DEFAULT_TRANSFORMER.into()),
        )?;
        let merger = CommandTemplate::parse(
            "LANEMERGE_MERGER",
            &lookup("LANEMERGE_MERGER").unwrap_or_else(|| DEFAULT_MERGER.into()),
        )?;

        let defaults = ReadGroupTags::default();
        let platform = lookup("LANEMERGE_PLATFORM").unwrap_or(defaults.platform);
        let platform_unit = lookup("LANEMERGE_PLATFORM_UNIT").unwrap_or(defaults.platform_unit);

        let compression_level = match lookup("LANEMERGE_COMPRESSION_LEVEL") {
            Some(raw) => raw
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|level| *level <= MAX_COMPRESSION_LEVEL)
                .ok_or_else(|| {
                    PipelineError::Config(format!(
                        "LANEMERGE_COMPRESSION_LEVEL must be 0..={MAX_COMPRESSION_LEVEL}, got '{raw}'"
                    ))
                })?,
            None => defaults.compression_level,
        };

        let workspace_root = lookup("LANEMERGE_WORKDIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let log_format = match lookup("LANEMERGE_LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(PipelineError::Config(format!(
                    "LANEMERGE_LOG_FORMAT must be 'text' or 'json', got '{other}'"
                )))
            }
        };

        Ok(Self {
            transformer,
            merger,
            tags: ReadGroupTags {
                platform,
                platform_unit,
                compression_level,
            },
            workspace_root,
            log_format,
        })
    }
}
