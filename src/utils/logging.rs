//! Logging configuration for the signal and risk core.
//!
//! Records carry the module they came from with the crate prefix dropped, so a cycle
//! reads as `engine`, `risk`, `strategy::ensemble` lines side by side.

use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::{info, LevelFilter};
use std::io::Write;

use crate::config::AppConfig;

const CRATE_PREFIX: &str = "statarb::";

/// Module path of a record relative to the crate root.
fn short_target(target: &str) -> &str {
    match target {
        | "statarb" => "core",
        | t => t.strip_prefix(CRATE_PREFIX).unwrap_or(t),
    }
}

/// Initialize the logging system. `STAT_ARB_LOG` overrides `level`.
pub fn init_logging(level: &str) {
    let env = Env::default()
        .filter_or("STAT_ARB_LOG", level)
        .write_style_or("STAT_ARB_LOG_STYLE", "auto");

    Builder::from_env(env)
        .format(|buf, record| {
            let level_color = match record.level() {
                | log::Level::Error => "\x1b[31m",
                | log::Level::Warn => "\x1b[33m",
                | log::Level::Info => "\x1b[32m",
                | log::Level::Debug => "\x1b[36m",
                | log::Level::Trace => "\x1b[35m",
            };

            writeln!(
                buf,
                "{} {}{:5}\x1b[0m {:>18} | {}",
                Local::now().format("%H:%M:%S%.3f"),
                level_color,
                record.level(),
                short_target(record.target()),
                record.args()
            )
        })
        .target(Target::Stdout)
        .try_init()
        .ok();

    info!("stat-arb core logging at {}", level);
}

/// Initialize logging from the `[app]` section of the configuration.
pub fn init_from_config(app: &AppConfig) {
    init_logging(&app.log_level);
}

/// Initialize test logging (for use in tests)
pub fn init_test_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(LevelFilter::Debug)
        .try_init();
}
