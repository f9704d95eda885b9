//! Minimal structured logging on top of the serial debug port.
//!
//! Mirrors the shape of a `log`-style facade (level, target, message)
//! without pulling in the `log` crate, since the kernel has no allocator
//! to back a logger registry and only ever has one sink (serial).

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }
}

#[doc(hidden)]
pub fn _log(level: Level, target: &str, args: fmt::Arguments) {
    crate::debugln!("[{}] {}: {}", level.as_str(), target, args);
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::_log($crate::logging::Level::Error, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::_log($crate::logging::Level::Warn, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::_log($crate::logging::Level::Info, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::_log($crate::logging::Level::Debug, module_path!(), format_args!($($arg)*))
    };
}
