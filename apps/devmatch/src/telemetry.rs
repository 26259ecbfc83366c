//! Logging for the `devmatch` binary.

pub mod logging {
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use std::sync::OnceLock;

    use clap::ValueEnum;
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::EnvFilter;

    /// Replaces the computed filter entirely (`EnvFilter` syntax).
    pub const FILTER_ENV: &str = "DEVMATCH_LOG_FILTER";
    /// Lets dependencies log below `info` as well.
    pub const TRACE_DEPS_ENV: &str = "DEVMATCH_TRACE_DEPS";

    const OWN_TARGETS: &[&str] = &["devmatch", "devmatch_client_core", "devmatch_api"];

    #[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
    pub enum LogLevel {
        Error,
        #[default]
        Warn,
        Info,
        Debug,
        Trace,
    }

    impl LogLevel {
        pub fn as_str(self) -> &'static str {
            match self {
                LogLevel::Error => "error",
                LogLevel::Warn => "warn",
                LogLevel::Info => "info",
                LogLevel::Debug => "debug",
                LogLevel::Trace => "trace",
            }
        }
    }

    #[derive(Clone, Debug, Default)]
    pub struct LogConfig {
        pub level: LogLevel,
        /// Append to this file instead of writing to stderr.
        pub file: Option<PathBuf>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum InitError {
        #[error("failed to open log file {path:?}: {source}")]
        Io {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("failed to configure logger: {0}")]
        Configure(String),
    }

    // Holding the guard keeps the non-blocking writer flushing until exit.
    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    /// Installs the global subscriber. Once one is installed, later calls
    /// return without touching it.
    pub fn init(config: &LogConfig) -> Result<(), InitError> {
        if GUARD.get().is_some() {
            return Ok(());
        }

        let filter = match std::env::var(FILTER_ENV) {
            Ok(custom) if !custom.trim().is_empty() => custom,
            _ => directives(config.level, dependency_traces_requested()),
        };

        let (writer, guard) = match &config.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| InitError::Io {
                        path: path.clone(),
                        source,
                    })?;
                tracing_appender::non_blocking(file)
            }
            None => tracing_appender::non_blocking(std::io::stderr()),
        };

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(&filter))
            .with_target(config.level >= LogLevel::Debug)
            .with_ansi(config.file.is_none())
            .with_writer(writer)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|err| InitError::Configure(err.to_string()))?;

        let _ = GUARD.set(guard);
        tracing::debug!(%filter, "logging initialised");
        Ok(())
    }

    fn dependency_traces_requested() -> bool {
        std::env::var(TRACE_DEPS_ENV).is_ok_and(|value| !value.is_empty() && value != "0")
    }

    /// Our own crates log at `level`. Everything else is capped at `info`
    /// unless dependency traces were asked for.
    fn directives(level: LogLevel, dependency_traces: bool) -> String {
        let global = if dependency_traces {
            level
        } else {
            level.min(LogLevel::Info)
        };
        let mut filter = global.as_str().to_string();
        if level > global {
            for target in OWN_TARGETS {
                filter.push_str(&format!(",{target}={}", level.as_str()));
            }
        }
        filter
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn quiet_levels_apply_everywhere() {
            assert_eq!(directives(LogLevel::Error, false), "error");
            assert_eq!(directives(LogLevel::Warn, false), "warn");
            assert_eq!(directives(LogLevel::Info, false), "info");
            assert_eq!(LogLevel::default(), LogLevel::Warn);
        }

        #[test]
        fn verbose_levels_only_reach_our_crates() {
            assert_eq!(
                directives(LogLevel::Debug, false),
                "info,devmatch=debug,devmatch_client_core=debug,devmatch_api=debug"
            );
            assert!(directives(LogLevel::Trace, false).starts_with("info,devmatch=trace"));
        }

        #[test]
        fn dependency_traces_lift_the_cap() {
            assert_eq!(directives(LogLevel::Trace, true), "trace");
        }
    }
}
