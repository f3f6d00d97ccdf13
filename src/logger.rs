//! System event sink.
//!
//! The distilled spec's `logger` construction option (`debug`/`info`/`error`)
//! is realized as a small trait object rather than a concrete type so a
//! host embedding this crate can route events wherever it likes; the
//! default implementation bridges straight to the `log` facade, the
//! convention `cswinter-LocustDB` (the other embedded-database repo in
//! this corpus) uses.

use std::sync::Arc;

/// A pluggable event sink. Mirrors the distilled spec's three log levels;
/// there is no `warn` level in the source interface, so none is added
/// here.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Bridges to the `log` crate's global facade.
pub struct LogFacadeLogger;

impl Logger for LogFacadeLogger {
    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }

    fn info(&self, message: &str) {
        log::info!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }
}

/// A logger that discards every event, matching the distilled spec's
/// `void` default for hosts that don't want logging.
pub struct NullLogger;

impl Logger for NullLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(LogFacadeLogger)
}
