pub mod utils;

use std::path::PathBuf;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub const LOG_FILE_NAME: &str = "backuper.log";

/// How the process should log, taken from the global CLI flags
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub json: bool,
    pub log_dir: Option<PathBuf>,
}

impl LogOptions {
    fn default_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.default_level().into())
            .from_env_lossy()
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize logging, panic handler, and build info reporting.
/// Returns guards that must be kept alive for the duration of the program.
pub fn init_logging(options: &LogOptions) -> Vec<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::fmt::format::FmtSpan;

    let mut guards = Vec::new();
    let mut layers: Vec<BoxedLayer> = Vec::new();

    // Stderr layer; stdout carries command output
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    guards.push(stderr_guard);

    let stderr_layer = if options.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(stderr_writer)
            .with_filter(options.env_filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(stderr_writer)
            .with_filter(options.env_filter())
            .boxed()
    };
    layers.push(stderr_layer);

    // File layer (if log_dir is set)
    if let Some(log_dir) = &options.log_dir {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Failed to create log directory {:?}: {}",
                log_dir, e
            );
        }

        let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
        let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        guards.push(file_guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(options.env_filter())
            .boxed();
        layers.push(file_layer);
    }

    tracing_subscriber::registry().with(layers).init();

    utils::register_panic_logger();
    utils::report_build_info();

    guards
}
