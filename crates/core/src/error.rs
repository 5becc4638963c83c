use std::path::PathBuf;

/// Expected shape of an input base name, quoted in naming errors.
pub const EXPECTED_NAME_FORMAT: &str = "samplename_L???_R?_001.<ext>";

/// Errors that abort a run, or that are recorded against a single process.
///
/// Non-zero child exits are not errors; they are carried as
/// [`Termination`](crate::outcome::Termination) values.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Filename {path} is not in the expected {} format", EXPECTED_NAME_FORMAT)]
    Format { path: String },

    #[error("Failed to {action} {}: {source}", .path.display())]
    Resource {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for fallible pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = PipelineError::Format {
            path: "/data/sample.bam".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Filename /data/sample.bam is not in the expected samplename_L???_R?_001.<ext> format"
        );
    }

    #[test]
    fn display_resource() {
        let err = PipelineError::Resource {
            action: "create channel",
            path: PathBuf::from("/tmp/ws/a_L001_R1_001.bam"),
            source: std::io::Error::from(std::io::ErrorKind::AlreadyExists),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to create channel /tmp/ws/a_L001_R1_001.bam: "));
    }

    #[test]
    fn display_config() {
        let err = PipelineError::Config("LANEMERGE_MERGER is empty".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: LANEMERGE_MERGER is empty"
        );
    }

    #[test]
    fn launch_error_exposes_io_source() {
        let err = PipelineError::Launch {
            program: "picard".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn format_error_has_no_source() {
        let err = PipelineError::Format {
            path: "x".to_string(),
        };
        assert!(std::error::Error::source(&err).is_none());
    }
}
