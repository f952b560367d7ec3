//! Log output: stdout plus an optional log file, text or JSON.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Args, ValueEnum};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "info,linkpulse_health=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// File that receives a copy of the log. Recreated on every start.
    #[arg(long, default_value = "status_checker.log")]
    pub log_file: PathBuf,

    /// Log to stdout only.
    #[arg(long)]
    pub no_log_file: bool,

    /// Log line format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl LogArgs {
    pub fn file(&self) -> Option<&Path> {
        (!self.no_log_file).then_some(self.log_file.as_path())
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter.
pub fn init(args: &LogArgs) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let mut layers = vec![layer(args.log_format, io::stdout, true)];
    if let Some(path) = args.file() {
        let file = recreate_log_file(path)?;
        layers.push(layer(args.log_format, Mutex::new(file), false));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;
    Ok(())
}

fn layer<W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    match format {
        LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(ansi).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(ansi)
            .boxed(),
    }
}

/// Remove any previous log and start a fresh one.
fn recreate_log_file(path: &Path) -> io::Result<File> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    File::create(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn recreate_discards_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status_checker.log");
        std::fs::write(&path, "old run\n").unwrap();

        let mut file = recreate_log_file(&path).unwrap();
        writeln!(file, "new run").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new run\n");
    }

    #[test]
    fn recreate_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.log");
        recreate_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn default_filter_shows_checker_debug_only() {
        let subscriber = tracing_subscriber::registry().with(EnvFilter::new(DEFAULT_FILTER));
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "linkpulse_health::recurrence", tracing::Level::DEBUG));
            assert!(tracing::enabled!(target: "linkpulsed", tracing::Level::INFO));
            assert!(!tracing::enabled!(target: "linkpulsed", tracing::Level::DEBUG));
            assert!(!tracing::enabled!(target: "reqwest::connect", tracing::Level::DEBUG));
        });
    }

    #[test]
    fn recreate_fails_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x.log");
        assert!(recreate_log_file(&path).is_err());
    }
}
