use thiserror::Error;

/// Every failure the converter can report. All of them abort the run.
#[derive(Error, Debug)]
pub enum OtaError {
    /// Range count is zero, odd, or disagrees with the number of tokens.
    #[error("malformed range count in '{0}'")]
    MalformedRangeCount(String),

    /// A range token is not a non-negative integer.
    #[error("non-integer token '{token}' in '{text}'")]
    NonIntegerToken { token: String, text: String },

    /// A range whose begin is not below its end.
    #[error("empty range {begin}..{end} in '{text}'")]
    EmptyRange { begin: u64, end: u64, text: String },

    /// Block index whose byte offset does not fit in 64 bits.
    #[error("block {block} out of range in '{text}'")]
    BlockOutOfRange { block: u64, text: String },

    /// Version or block count line is missing or not an integer.
    #[error("invalid header at line {line}: '{text}'")]
    InvalidHeader { line: usize, text: String },

    /// A body line that does not split into a command and a range set.
    #[error("invalid command line {line}: '{text}'")]
    InvalidCommandLine { line: usize, text: String },

    /// Command name other than erase, zero or new.
    #[error("unknown command '{name}' at line {line}")]
    UnknownCommand { line: usize, name: String },

    /// Failure while parsing or applying a command, tagged with its line.
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<OtaError>,
    },

    /// Only raised when strict version checking is enabled.
    #[error("unsupported transfer list version {0}")]
    UnsupportedVersion(u64),

    /// Commands reference fewer blocks than the header declares.
    #[error("commands cover {required} blocks but header declares {declared}")]
    BlockCountMismatch { required: u64, declared: u64 },

    /// The data source ran dry before a pull could be satisfied.
    #[error("short read: wanted {wanted} bytes, only {available} available")]
    ShortRead { wanted: usize, available: usize },

    /// A `new` command could not be filled from the data stream.
    #[error("data stream truncated while filling blocks {begin}..{end}: {source}")]
    TruncatedStream {
        begin: u64,
        end: u64,
        #[source]
        source: Box<OtaError>,
    },

    /// Propagated I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OtaError {
    /// Strip line context and return the underlying error.
    pub fn root(&self) -> &OtaError {
        match self {
            OtaError::AtLine { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, OtaError>;
