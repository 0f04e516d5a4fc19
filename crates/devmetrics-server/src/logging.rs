use slog::{o, Drain};

use crate::settings::LogFormat;

/// Builds the root logger per `LogFormat`: `slog-term` for a human-readable TTY stream,
/// `slog-json` for machine consumption, both wrapped in `slog-async` so logging never blocks
/// a request-handling task (spec §6a).
pub fn build_logger(format: LogFormat) -> slog::Logger {
    let use_json = match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !atty_stderr(),
    };

    if use_json {
        let drain = slog_json::Json::default(std::io::stderr()).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, o!("service" => "devmetrics-server"))
    } else {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, o!("service" => "devmetrics-server"))
    }
}

fn atty_stderr() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}
