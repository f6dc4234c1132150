use nexus_extensibility::extensibility::{LogLevel, Logger};
use tracing::{debug, error, info, trace, warn};

/// Forwards data source log messages into the host's tracing pipeline,
/// tagged with the source type.
pub struct SourceLogger {
    source_type: String,
}

impl SourceLogger {
    /// Creates a logger for the given source type.
    pub fn new(source_type: impl Into<String>) -> Self {
        SourceLogger {
            source_type: source_type.into(),
        }
    }
}

impl Logger for SourceLogger {
    fn log(&self, log_level: LogLevel, message: &str) {
        match log_level {
            LogLevel::Trace => trace!(source_type = %self.source_type, "{message}"),
            LogLevel::Debug => debug!(source_type = %self.source_type, "{message}"),
            LogLevel::Information => info!(source_type = %self.source_type, "{message}"),
            LogLevel::Warning => warn!(source_type = %self.source_type, "{message}"),
            LogLevel::Error | LogLevel::Critical => {
                error!(source_type = %self.source_type, "{message}")
            }
        }
    }
}
