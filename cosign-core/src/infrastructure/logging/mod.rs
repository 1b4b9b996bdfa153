//! Logging through the `log` facade, configured with `log4rs`.

mod consts;

pub use consts::*;

use crate::foundation::{CosignError, Result};
use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        rolling_file::{
            policy::compound::{roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy},
            RollingFileAppender,
        },
    },
    config::{Appender, Logger, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::io::IsTerminal;
use std::path::Path;

const CONSOLE_APPENDER: &str = "stderr";
const LOG_FILE_APPENDER: &str = "log_file";
const ERR_LOG_FILE_APPENDER: &str = "err_log_file";

/// Initializes the global logger.
///
/// `filters` follows the `info,cosign_core=debug,root=warn` form:
/// - a bare level sets the level of the whitelisted workspace crates (default INFO);
/// - `<module>=<level>` opts a module in, or overrides a whitelisted crate;
/// - `root=<level>` opts in every third-party crate.
///
/// With `log_dir` set, a size-rolled log file and a warn+ error file are written there.
/// A logger that is already installed is left in place.
pub fn init_logger(log_dir: Option<&str>, filters: &str) -> Result<()> {
    let app_level = parse_app_level(filters);
    let root_level = parse_root_override(filters).unwrap_or(LevelFilter::Off);
    let module_levels = parse_module_levels(filters);

    let console_pattern = if std::io::stderr().is_terminal() { LOG_LINE_PATTERN_COLORED } else { LOG_LINE_PATTERN };
    let console = ConsoleAppender::builder().target(Target::Stderr).encoder(Box::new(PatternEncoder::new(console_pattern))).build();

    let mut builder = Config::builder().appender(Appender::builder().build(CONSOLE_APPENDER, Box::new(console)));
    let mut appenders = vec![CONSOLE_APPENDER.to_string()];

    if let Some(dir) = log_dir.map(str::trim).filter(|dir| !dir.is_empty()) {
        let dir = Path::new(dir);
        builder = builder.appender(Appender::builder().build(LOG_FILE_APPENDER, Box::new(rolling_appender(dir, LOG_FILE_NAME)?)));
        builder = builder.appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Warn)))
                .build(ERR_LOG_FILE_APPENDER, Box::new(rolling_appender(dir, ERR_LOG_FILE_NAME)?)),
        );
        appenders.push(LOG_FILE_APPENDER.to_string());
        appenders.push(ERR_LOG_FILE_APPENDER.to_string());
    }

    for crate_name in WHITELISTED_CRATES {
        if !module_levels.iter().any(|(module, _)| module == crate_name) {
            builder = builder.logger(Logger::builder().appenders(appenders.clone()).additive(false).build(*crate_name, app_level));
        }
    }
    for (module, level) in &module_levels {
        builder = builder.logger(Logger::builder().appenders(appenders.clone()).additive(false).build(module, *level));
    }

    let config = builder
        .build(Root::builder().appenders(appenders).build(root_level))
        .map_err(|err| CosignError::ConfigError(format!("invalid logger configuration: {}", err)))?;
    if log4rs::init_config(config).is_err() {
        log::debug!("logger already initialized, keeping existing configuration");
    }
    Ok(())
}

fn rolling_appender(dir: &Path, file_name: &str) -> Result<RollingFileAppender> {
    let archive_pattern = dir.join(format!("{file_name}.{{}}.gz"));
    let archive_pattern =
        archive_pattern.to_str().ok_or_else(|| CosignError::ConfigError(format!("non-utf8 log directory: {}", dir.display())))?;
    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(archive_pattern, LOG_FILE_MAX_ROLLS)
        .map_err(|err| CosignError::ConfigError(format!("log roller for {}: {}", file_name, err)))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(LOG_FILE_MAX_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_LINE_PATTERN)))
        .build(dir.join(file_name), Box::new(policy))
        .map_err(|err| CosignError::ConfigError(format!("log file {}: {}", file_name, err)))
}

fn filter_parts(filters: &str) -> impl Iterator<Item = &str> {
    filters.split(',').map(str::trim).filter(|part| !part.is_empty())
}

fn parse_app_level(filters: &str) -> LevelFilter {
    filter_parts(filters).filter(|part| !part.contains('=')).find_map(|part| part.parse().ok()).unwrap_or(LevelFilter::Info)
}

fn parse_root_override(filters: &str) -> Option<LevelFilter> {
    filter_parts(filters)
        .filter_map(|part| part.split_once('='))
        .filter(|(module, _)| module.trim() == "root")
        .find_map(|(_, level)| level.trim().parse().ok())
}

fn parse_module_levels(filters: &str) -> Vec<(String, LevelFilter)> {
    filter_parts(filters)
        .filter_map(|part| part.split_once('='))
        .map(|(module, level)| (module.trim(), level.trim()))
        .filter(|(module, level)| !module.is_empty() && !level.is_empty() && *module != "root")
        .filter_map(|(module, level)| level.parse().ok().map(|level| (module.to_string(), level)))
        .collect()
}
