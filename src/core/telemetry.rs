use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Where log lines go. The bridge reserves stdout for directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogSink {
    Stdout,
    Stderr,
}

pub(crate) fn init_tracing(settings: &Settings, sink: LogSink) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.telemetry().log_level.clone()));

    let builder = fmt().with_env_filter(filter).with_target(false);

    let result = match (settings.telemetry().json, sink) {
        (true, LogSink::Stdout) => builder
            .json()
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .try_init(),
        (true, LogSink::Stderr) => builder
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .try_init(),
        (false, LogSink::Stdout) => {
            builder.with_span_events(fmt::format::FmtSpan::CLOSE).try_init()
        }
        (false, LogSink::Stderr) => builder
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .try_init(),
    };

    result.map_err(|err| anyhow::anyhow!(err.to_string()))
}
