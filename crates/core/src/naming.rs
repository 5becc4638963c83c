//! Input naming convention resolver.
//!
//! Lane files are named `{group}_{sub}_{read}_{chunk}.{ext}`, e.g.
//! `alpha_L001_R1_001.bam`. The group part may itself contain
//! underscores; the last three components are always the sub-id (lane),
//! the read number and the chunk number.

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// Component delimiter in input base names.
pub const DELIMITER: &str = "_";

/// Minimum number of delimiter-separated components in a valid base name.
pub const MIN_COMPONENTS: usize = 4;

/// Number of trailing components reserved for sub-id, read and chunk.
const RESERVED_TRAILING: usize = 3;

/// One input file with the identifiers derived from its base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    /// Path as given on the command line.
    pub path: PathBuf,
    /// Base name of `path`; also names the input's channel.
    pub base_name: String,
    /// Everything before the last three components, rejoined with `_`.
    pub group_id: String,
    /// Third-from-last component.
    pub sub_id: String,
}

/// Derive the [`InputSpec`] for a single input path.
///
/// # Examples
///
/// ```
/// use lanemerge_core::naming::resolve;
///
/// let spec = resolve("runs/alpha_L001_R1_001.dat").unwrap();
/// assert_eq!(spec.group_id, "alpha");
/// assert_eq!(spec.sub_id, "L001");
/// ```
pub fn resolve(path: impl AsRef<Path>) -> PipelineResult<InputSpec> {
    let path = path.as_ref();
    let format_error = || PipelineError::Format {
        path: path.display().to_string(),
    };

    let base_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(format_error)?;

    let components: Vec<&str> = base_name.split(DELIMITER).collect();
    if components.len() < MIN_COMPONENTS {
        return Err(format_error());
    }

    let split = components.len() - RESERVED_TRAILING;
    let group_id = components[..split].join(DELIMITER);
    let sub_id = components[split].to_string();

    Ok(InputSpec {
        path: path.to_path_buf(),
        base_name: base_name.to_string(),
        group_id,
        sub_id,
    })
}

/// Resolve every input up front, failing on the first non-conforming name.
///
/// Runs before any side effect so a naming error leaves nothing to clean up.
pub fn resolve_all<P: AsRef<Path>>(paths: &[P]) -> PipelineResult<Vec<InputSpec>> {
    paths.iter().map(|path| resolve(path)).collect()
}
