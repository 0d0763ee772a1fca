//! `log` crate backend. Every record goes out the serial port from the
//! first instruction; once the terminal service is up (see
//! [`mark_terminal_ready`]), `warn!`/`error!` records are additionally
//! mirrored to the foreground terminal, so a misbehaving driver doesn't
//! only show up on a debugger's serial console.

use core::sync::atomic::{AtomicBool, Ordering};

use log::{Level, LevelFilter, Metadata, Record};

static TERMINAL_READY: AtomicBool = AtomicBool::new(false);

struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        crate::serial_println!("[{:<5} {}] {}", record.level(), record.target(), record.args());

        if record.level() <= Level::Warn && TERMINAL_READY.load(Ordering::Acquire) {
            crate::println!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

/// Installs the global logger. Must run exactly once, before anything
/// calls `log::error!`/`warn!`/etc (including the `log_error!` etc.
/// aliases re-exported at the crate root).
pub fn init() {
    log::set_logger(&LOGGER).expect("logger already initialized");
    log::set_max_level(LevelFilter::Trace);
}

/// Called once `drivers::terminal` is safe to write to, so that
/// `warn!`/`error!` records start mirroring to the foreground terminal.
pub fn mark_terminal_ready() {
    TERMINAL_READY.store(true, Ordering::Release);
}
