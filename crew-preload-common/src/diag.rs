//! Diagnostics: written to stderr only when verbose, prefixed with pid and
//! component tag. We want `log`'s ergonomics (`debug!`/`warn!`/`error!`)
//! without `env_logger`'s default formatting, since the wire format here is
//! fixed, so a minimal `log::Log` is installed in its place.

use std::io::Write;
use std::sync::Once;

use log::{LevelFilter, Log, Metadata, Record};

use crate::config::constants::PROMPT_NAME;

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let pid = unsafe { libc::getpid() };
        let _ = writeln!(
            std::io::stderr(),
            "[PID {}] {}: {}",
            pid,
            PROMPT_NAME,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: StderrLogger = StderrLogger;
static INSTALL: Once = Once::new();

/// Install the stderr logger at `Debug` level. Idempotent: called from
/// `state()` only when `verbose` is set, and `Once` absorbs repeat calls
/// from a losing racer in the exactly-once init.
pub fn install() {
    INSTALL.call_once(|| {
        // `set_logger` fails if a logger is already installed by the host
        // process; that's fine, we just keep using whatever is there.
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Debug);
    });
}
