use slog::{o, Drain};

use crate::settings::LogFormat;

/// Builds the root logger per `LogFormat`, mirroring the collector's own logging stack
/// (`slog` + `slog-term`/`slog-json` + `slog-async`).
pub fn build_logger(format: LogFormat) -> slog::Logger {
    let use_json = match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !atty_stderr(),
    };

    if use_json {
        let drain = slog_json::Json::default(std::io::stderr()).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, o!("service" => "devmetrics-agent"))
    } else {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, o!("service" => "devmetrics-agent"))
    }
}

fn atty_stderr() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}
