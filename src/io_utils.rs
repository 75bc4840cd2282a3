//! Error reporting for the command line tools.

use std::fmt;
use std::io;
use std::path::Path;

use crate::OtaError;

/// Message printed by a binary before it exits non-zero.
#[derive(Debug)]
pub struct CliError {
    pub msg: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CliError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            source: None,
        }
    }

    /// A failed open/read/create of `path`, with a hint for the common cases.
    pub fn file(operation: &str, path: &Path, err: io::Error) -> Self {
        Self {
            msg: format!(
                "{operation} '{}' failed: {err}. {}",
                path.display(),
                file_hint(&err)
            ),
            source: Some(Box::new(err)),
        }
    }

    /// A conversion failure, prefixed with what the tool was doing.
    pub fn conversion(context: &str, err: OtaError) -> Self {
        Self {
            msg: format!("{context}: {}", cli_hint(&err)),
            source: Some(Box::new(err)),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.msg.fmt(f)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// ENOSPC on Linux.
const NO_SPACE: i32 = 28;

fn file_hint(err: &io::Error) -> &'static str {
    if err.raw_os_error() == Some(NO_SPACE) {
        return "The image needs room for every block in the transfer list; free some space.";
    }
    match err.kind() {
        io::ErrorKind::NotFound => {
            "Check the path; OTA packages ship these as <partition>.transfer.list and <partition>.new.dat[.br]."
        }
        io::ErrorKind::PermissionDenied => {
            "Check that the inputs are readable and the image directory is writable."
        }
        io::ErrorKind::InvalidData => "The transfer list must be UTF-8 text.",
        _ => "Check the file and try again.",
    }
}

/// Return an actionable hint for an error variant.
pub fn cli_hint(err: &OtaError) -> String {
    use OtaError::*;
    match err {
        MalformedRangeCount(_) | NonIntegerToken { .. } | EmptyRange { .. } => {
            format!("{err}. The range set is malformed.")
        }
        BlockOutOfRange { .. } => format!("{err}. No image can be that large."),
        InvalidHeader { .. } | InvalidCommandLine { .. } | UnknownCommand { .. } => {
            format!("{err}. Verify the transfer list is intact.")
        }
        AtLine { line, source } => format!("line {line}: {}", cli_hint(source)),
        UnsupportedVersion(_) => format!("{err}. Drop --strict-version to try anyway."),
        BlockCountMismatch { .. } => format!("{err}. The transfer list is inconsistent."),
        ShortRead { .. } | TruncatedStream { .. } => format!(
            "{err}. The data file is truncated, corrupt, or belongs to another transfer list."
        ),
        Io(io) => format!("{io}"),
    }
}
