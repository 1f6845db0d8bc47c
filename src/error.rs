use std::io;

use crate::mode::Mode;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a wallpaper operation.
///
/// OS-level failures are passed through as they were reported; nothing in
/// this crate retries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The path has no representation in the string form the OS call needs.
    #[error("[encoding] {path}: {reason}")]
    Encoding { path: String, reason: &'static str },

    /// Registry, filesystem or process-spawn failure.
    #[error("[io] {0}")]
    Io(#[from] io::Error),

    #[error("[command] {program} exited with {code}: {stderr}", code = status_text(.status))]
    CommandFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("[command] {program} was not found on PATH")]
    HelperNotFound { program: String },

    /// Returned before anything is written.
    #[error("[mode] {mode} is not supported on {desktop}")]
    UnsupportedMode { mode: Mode, desktop: String },

    #[error("[mode] invalid wallpaper mode {0:?}, use center, crop, fit, span, stretch or tile")]
    InvalidMode(String),

    #[error("[desktop] unsupported desktop environment: {0}")]
    UnsupportedDesktop(String),

    #[error("[desktop] {desktop} has no wallpaper set")]
    NoWallpaper { desktop: String },

    #[error("[download] {0}")]
    Download(#[from] reqwest::Error),

    #[error("[download] {url} returned {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("[download] invalid url {0:?}")]
    InvalidUrl(String),
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl Error {
    pub(crate) fn encoding(path: &str, reason: &'static str) -> Error {
        Error::Encoding { path: path.to_string(), reason }
    }

    pub(crate) fn unsupported_mode(mode: Mode, desktop: impl Into<String>) -> Error {
        Error::UnsupportedMode { mode, desktop: desktop.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_reports_status() {
        let err = Error::CommandFailed {
            program: "gsettings".to_string(),
            status: Some(1),
            stderr: "No such schema".to_string(),
        };
        assert_eq!(err.to_string(), "[command] gsettings exited with status 1: No such schema");
    }

    #[test]
    fn unsupported_mode_names_mode_and_desktop() {
        let err = Error::unsupported_mode(Mode::Span, "KDE Plasma");
        assert_eq!(err.to_string(), "[mode] span is not supported on KDE Plasma");
    }

    #[test]
    fn io_errors_convert_unmodified() {
        let err: Error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied").into();
        match err {
            Error::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("unexpected {:?}", other),
        }
    }
}
