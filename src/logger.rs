use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::prelude::*;

/// Level used when `RUST_LOG` is unset
fn base_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// A non-empty `RUST_LOG` value wins; otherwise the base level applies
pub fn filter_for(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    match rust_log.map(str::trim).filter(|directives| !directives.is_empty()) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new(base_directive(verbose)),
    }
}

/// Build the filter used by `init_logger`
pub fn build_filter(verbose: bool) -> EnvFilter {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_for(rust_log.as_deref(), verbose)
}

/// Install the global subscriber: no timestamps, level and target kept.
///
/// Calling it twice is harmless; the second install is ignored.
pub fn init_logger(verbose: bool) {
    struct EmptyTime;
    impl FormatTime for EmptyTime {
        fn format_time(&self, _: &mut format::Writer<'_>) -> std::fmt::Result {
            Ok(())
        }
    }

    let format = format()
        .with_timer(EmptyTime)
        .with_level(true)
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(std::io::stderr)
                .with_filter(build_filter(verbose)),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_verbose_lowers_level() {
        assert_eq!(base_directive(false), "info");
        assert_eq!(base_directive(true), "debug");
        init_logger(true);
        init_logger(false);
    }

    #[test]
    fn test_rust_log_overrides_base_level() {
        assert_eq!(filter_for(None, false).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(filter_for(Some("  "), true).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(filter_for(Some("debug"), false).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(filter_for(Some("warn"), true).max_level_hint(), Some(LevelFilter::WARN));
    }
}
