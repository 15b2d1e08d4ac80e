// SPDX-License-Identifier: MIT
//
// Error type shared by the drivers, the terminal layer and configuration.
//
// Protocol-level failures (a terminal that answers with the wrong
// terminator, a query that times out) are not errors here: they travel as
// data inside `AnsiResponse`. This enum is for things the caller cannot
// paper over: broken pipes, failing console APIs, bad config files.

use thiserror::Error;

/// Errors raised by console drivers and terminal setup.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading from or writing to the terminal failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A native console call failed.
    #[error("{call} failed with OS error {code}")]
    Os {
        /// Name of the failing API call.
        call: &'static str,
        /// Platform error code (`GetLastError` / `errno`).
        code: u32,
    },

    /// The operation has no meaning for this backend.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// A configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_error_names_the_call() {
        let err = Error::Os {
            call: "WriteConsoleOutputW",
            code: 6,
        };
        assert_eq!(err.to_string(), "WriteConsoleOutputW failed with OS error 6");
    }

    #[test]
    fn io_converts_with_question_mark() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(Error::Io(_))));
    }
}
