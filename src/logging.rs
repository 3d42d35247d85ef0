use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Parse a configured level name, falling back to `Info`
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Initialize logging for command line tools: `LEVEL [target] message` on stdout.
///
/// `RUST_LOG` still overrides the configured level. Safe to call more than once.
pub fn init(level: &str) {
    let _ = Builder::new()
        .filter_level(parse_level(level))
        .filter_module("sqlx", LevelFilter::Warn) // Suppress sqlx Debug logs
        .parse_default_env()
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}
