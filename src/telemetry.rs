use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{writer::BoxMakeWriter, Layer},
    layer::SubscriberExt,
    EnvFilter, Registry,
};

/// Keeps the non-blocking writers flushing; drop only at shutdown.
pub struct LogGuards {
    _file: WorkerGuard,
    _stdout: WorkerGuard,
}

/// Installs the global subscriber: JSON lines into `log_file`, plain text on
/// stdout. The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init(log_file: &str) -> Result<LogGuards, tracing::subscriber::SetGlobalDefaultError> {
    let file_appender = tracing_appender::rolling::never(".", log_file);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = Layer::new()
        .json()
        .with_writer(BoxMakeWriter::new(move || file_writer.clone()));
    let stdout_layer = Layer::new().with_writer(BoxMakeWriter::new(move || stdout_writer.clone()));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(LogGuards {
        _file: file_guard,
        _stdout: stdout_guard,
    })
}
