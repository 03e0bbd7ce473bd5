//! Logging to stderr.

use anyhow::Context as _;

/// A [`clap::Args`] struct for options controlling log output to stderr.
#[derive(Clone, Debug, clap::Args)]
#[expect(clippy::module_name_repetitions)]
pub(crate) struct LoggingArgs {
    /// Additional logging to stderr.
    #[arg(long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Remove timestamps from logs so that they are closer to deterministic.
    /// (Note that some logs will still contain timing data.)
    #[arg(long = "simplify-log-format", hide = true)]
    pub simplify_log_format: bool,
}

/// Install a [`log`] global logger based on user-provided `options`.
pub(crate) fn install(options: &LoggingArgs) -> Result<(), anyhow::Error> {
    use log::LevelFilter::{Error, Info, Off, Trace};

    let &LoggingArgs {
        verbose,
        simplify_log_format,
    } = options;

    let logger = *simplelog::WriteLogger::new(
        match verbose {
            false => Info,
            true => Trace,
        },
        // Target filtering is done by `FilteredLogger` instead.
        simplelog::ConfigBuilder::new()
            .set_target_level(Off)
            .set_location_level(Off)
            .set_time_level(if simplify_log_format { Off } else { Error })
            .build(),
        std::io::stderr(),
    );
    let max_level = simplelog::SharedLogger::level(&logger);

    log::set_boxed_logger(Box::new(FilteredLogger { inner: logger }))
        .context("failed to initialize logging")?;
    log::set_max_level(max_level);
    Ok(())
}

/// [`log::Log`] implementation that [`install()`] registers globally.
struct FilteredLogger {
    inner: simplelog::WriteLogger<std::io::Stderr>,
}

impl log::Log for FilteredLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        preview_lighting::util::log::standard_filter(metadata)
            && log::Log::enabled(&self.inner, metadata)
    }

    fn log(&self, record: &log::Record<'_>) {
        if !preview_lighting::util::log::standard_filter(record.metadata()) {
            return;
        }
        log::Log::log(&self.inner, record);
    }

    fn flush(&self) {
        log::Log::flush(&self.inner);
    }
}
