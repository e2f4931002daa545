//! [`log`] backend that writes into any [`fmt::Write`] sink.
//!
//! The allocator only emits messages through the `log` macros. The kernel
//! decides where they end up, usually by installing a [`Logger`] that wraps
//! its UART driver.

use core::fmt::{self, Write};
use spin::Mutex;

/// A logger that prints every record as a single line into `W`.
pub struct Logger<W> {
    sink: Mutex<W>,
}

impl<W> Logger<W> {
    /// Create a new logger that writes into the given sink.
    pub const fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Consume the logger and return the sink.
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }
}

impl<W: fmt::Write + Send> log::Log for Logger<W> {
    #[allow(unused_variables)]
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        #[cfg(any(debug_assertions, feature = "logging"))]
        return true;
        #[cfg(all(not(debug_assertions), not(feature = "logging")))]
        return metadata.level() <= log::Level::Info;
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            let mod_path = record
                .module_path_static()
                .or_else(|| record.module_path())
                .unwrap_or("<n/a>");

            // a failing sink has nowhere to report to
            let _ = writeln!(
                self.sink.lock(),
                "[ {:>5} ] [{}] {}",
                record.level(),
                mod_path,
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

/// Install the given logger as the global logger.
pub fn init_logging<W: fmt::Write + Send + 'static>(
    logger: &'static Logger<W>,
) -> Result<(), log::SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
