//! `orchestrate` -- tag lane files and merge them through named pipes.
//!
//! Each input is rewritten by its own transformer process straight into a
//! FIFO; a single merge process reads every FIFO and writes the combined
//! output. The exit code is 0 when every process succeeded, the code of
//! the latest-launched failing process otherwise, and 1 when the run was
//! refused before anything was launched.
//!
//! Configuration comes from the environment (and `.env`); see
//! [`PipelineConfig::from_env`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lanemerge::config::{LogFormat, PipelineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for usage errors and failures before any process started.
const PRE_LAUNCH_EXIT_CODE: u8 = 1;

/// Log filter used when `RUST_LOG` is unset. Successful runs stay silent.
const DEFAULT_LOG_FILTER: &str = "lanemerge=warn,lanemerge_core=warn,orchestrate=warn";

#[derive(Parser, Debug)]
#[command(name = "orchestrate", version)]
#[command(about = "Tag lane files and merge them through named pipes", long_about = None)]
struct Cli {
    /// Merged output file.
    output: PathBuf,

    /// Lane files named `samplename_L???_R?_001.<ext>`.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and are not failures.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(PRE_LAUNCH_EXIT_CODE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = PipelineConfig::from_env();
    init_tracing(
        config
            .as_ref()
            .map(|config| config.log_format)
            .unwrap_or_default(),
    );

    let config = match config {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Refusing to start");
            return ExitCode::from(PRE_LAUNCH_EXIT_CODE);
        }
    };

    tracing::debug!(
        output = %cli.output.display(),
        inputs = cli.inputs.len(),
        transformer = %config.transformer.program,
        merger = %config.merger.program,
        "Starting run",
    );

    match lanemerge::run(&config, &cli.output, cli.inputs.as_slice()).await {
        Ok(result) => ExitCode::from(result.process_exit_code()),
        Err(err) => {
            tracing::error!(error = %err, "Run aborted before launch");
            ExitCode::from(PRE_LAUNCH_EXIT_CODE)
        }
    }
}
