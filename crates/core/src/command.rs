//! Command-line construction for transformer and merge processes.
//!
//! Both external tools are opaque; only their argument contracts live
//! here. Arguments are kept as [`OsString`]s so paths that are not valid
//! UTF-8 reach the child untouched.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::naming::InputSpec;

/// A program plus leading arguments, e.g. `samtools merge -f`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTemplate {
    /// Split a whitespace-separated template string.
    ///
    /// `name` identifies the setting in the error message.
    pub fn parse(name: &str, template: &str) -> PipelineResult<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| PipelineError::Config(format!("{name} must name a program")))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn start(&self) -> CommandLine {
        CommandLine {
            program: OsString::from(&self.program),
            args: self.args.iter().map(OsString::from).collect(),
        }
    }
}

/// Fixed read-group fields stamped on every transformed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadGroupTags {
    /// Sequencing platform (`RGPL`).
    pub platform: String,
    /// Platform unit (`RGPU`).
    pub platform_unit: String,
    /// Output compression level, 0..=9.
    pub compression_level: u8,
}

impl Default for ReadGroupTags {
    fn default() -> Self {
        Self {
            platform: "illumina".to_string(),
            platform_unit: "unit1".to_string(),
            compression_level: 0,
        }
    }
}

/// A fully built argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl CommandLine {
    /// Program followed by its arguments.
    pub fn argv(&self) -> impl Iterator<Item = &OsStr> {
        std::iter::once(self.program.as_os_str()).chain(self.args.iter().map(OsString::as_os_str))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in self.argv() {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{}", part.to_string_lossy())?;
        }
        Ok(())
    }
}

/// `KEY=value` argument whose value may be a non-UTF-8 path.
fn keyed(key: &str, value: impl AsRef<OsStr>) -> OsString {
    let mut arg = OsString::from(key);
    arg.push("=");
    arg.push(value);
    arg
}

/// Build the transformer command for one input.
///
/// The transformer reads `spec.path`, writes to `channel`, and tags
/// records with the input's group and sub ids.
pub fn transformer_command(
    template: &CommandTemplate,
    tags: &ReadGroupTags,
    spec: &InputSpec,
    channel: &Path,
) -> CommandLine {
    let mut command = template.start();
    command.args.extend([
        keyed("I", &spec.path),
        keyed("O", channel),
        keyed("RGID", &spec.sub_id),
        keyed("RGSM", &spec.group_id),
        keyed("RGPL", &tags.platform),
        keyed("RGLB", &spec.group_id),
        keyed("RGPU", &tags.platform_unit),
        keyed("COMPRESSION_LEVEL", tags.compression_level.to_string()),
    ]);
    command
}

/// Build the merge command: output path first, then every channel in
/// input order.
pub fn merge_command<P: AsRef<Path>>(
    template: &CommandTemplate,
    output: &Path,
    channels: &[P],
) -> CommandLine {
    let mut command = template.start();
    command.args.push(output.as_os_str().to_owned());
    command
        .args
        .extend(channels.iter().map(|c| c.as_ref().as_os_str().to_owned()));
    command
}
