use std::rc::Rc;

/// A single diagnostic sink: takes a formatted message, does whatever the
/// host wants with it (print, forward to a GUI console, drop it).
pub type LogFn = Rc<dyn Fn(&str)>;

/// Injectable logger used by every subsystem that can observe a diagnostic
/// condition (unmapped bus access, unsupported cartridge header, a write
/// that the hardware would ignore). Each callback is independently
/// optional; a missing callback silently drops messages at that level.
#[derive(Clone)]
pub struct Logger {
    error: Option<LogFn>,
    warn: Option<LogFn>,
    info: Option<LogFn>,
}

impl Logger {
    /// A logger with every callback wired to the `log` crate's macros.
    /// This is what a host gets if it doesn't provide its own sinks.
    pub fn log_crate() -> Self {
        Logger {
            error: Some(Rc::new(|msg: &str| error!("{}", msg))),
            warn: Some(Rc::new(|msg: &str| warn!("{}", msg))),
            info: Some(Rc::new(|msg: &str| info!("{}", msg))),
        }
    }

    /// A logger that drops every message. Useful for tests and for hosts
    /// that have no diagnostic sink to offer.
    pub fn null() -> Self {
        Logger {
            error: None,
            warn: None,
            info: None,
        }
    }

    /// Builds a logger from explicit callbacks, any of which may be `None`.
    pub fn with_callbacks(
        error: Option<LogFn>,
        warn: Option<LogFn>,
        info: Option<LogFn>,
    ) -> Self {
        Logger { error, warn, info }
    }

    pub fn error(&self, msg: &str) {
        if let Some(f) = &self.error {
            f(msg);
        }
    }

    pub fn warn(&self, msg: &str) {
        if let Some(f) = &self.warn {
            f(msg);
        }
    }

    pub fn info(&self, msg: &str) {
        if let Some(f) = &self.info {
            f(msg);
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::log_crate()
    }
}
