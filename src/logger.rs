//! Injectable logging. A `SearchIndex` logs lifecycle and diagnostic
//! events (document replacement, vacuum progress, unknown options) through
//! a `Logger` trait object rather than calling the `log` crate's macros
//! directly, so embedders can route events wherever they like.

/// Severity of a logged event, independent of any particular logging
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, code: &str, message: &str);
}

/// Forwards every event to the `log` crate's leveled macros, tagging the
/// message with `code` so it can be filtered or matched on downstream.
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, level: LogLevel, code: &str, message: &str) {
        match level {
            LogLevel::Debug => log::debug!("[{}] {}", code, message),
            LogLevel::Info => log::info!("[{}] {}", code, message),
            LogLevel::Warn => log::warn!("[{}] {}", code, message),
            LogLevel::Error => log::error!("[{}] {}", code, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingLogger {
        pub events: Mutex<Vec<(LogLevel, String, String)>>,
    }

    impl Logger for RecordingLogger {
        fn log(&self, level: LogLevel, code: &str, message: &str) {
            self.events
                .lock()
                .unwrap()
                .push((level, code.to_owned(), message.to_owned()));
        }
    }

    #[test]
    fn recording_logger_captures_events_in_order() {
        let logger = RecordingLogger::default();
        logger.log(LogLevel::Warn, "version_conflict", "doc replaced");
        logger.log(LogLevel::Debug, "vacuum", "reclaimed 3 short ids");

        let events = logger.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, LogLevel::Warn);
        assert_eq!(events[0].1, "version_conflict");
        assert_eq!(events[1].0, LogLevel::Debug);
    }
}
