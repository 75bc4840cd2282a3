//! Rebuild raw partition images from Android OTA block transfer lists.
//!
//! A transfer list names, block range by block range, which parts of the
//! image are zeroed, erased, or filled from the companion `new.dat` stream
//! (optionally brotli compressed). [`convert`] parses the list, sizes the
//! image, and replays every command in order.

use std::io::Read;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

pub mod command_log;
pub mod config;
pub mod error;
pub mod image_writer;
pub mod io_utils;
pub mod range_set;
pub mod stream_carry;

pub use command_log::{Command, CommandKind, CommandLog, KindTally, TransferSummary};
pub use config::{Codec, Compression, Config, EraseMode};
pub use error::{OtaError, Result};
pub use image_writer::{image_len, ImageSink, ImageWriter};
pub use range_set::{Range, RangeSet};
pub use stream_carry::{BrotliChunks, ChunkSource, MemoryChunks, PlainChunks, StreamCarry};

/// Size of one image block in bytes.
pub const BLOCK_SIZE: usize = 4096;
/// Read and write granularity for the data stream.
pub const BUF_SIZE: usize = 1024 * BLOCK_SIZE;

/// Outcome of a finished (or dry) conversion.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    #[serde(flatten)]
    pub summary: TransferSummary,
    pub image_bytes: u64,
    pub bytes_consumed: u64,
    /// Decoded bytes left in the data stream after the last command.
    pub trailing_bytes: u64,
    pub dry_run: bool,
    pub elapsed_ms: u64,
}

/// Parse the transfer list and check it against `config`.
///
/// Returns the log together with the number of blocks the image needs.
pub fn load_transfer_list(text: &str, config: &Config) -> Result<(CommandLog, u64)> {
    let log = CommandLog::parse(text)?;
    info!(version = log.version, blocks = log.total_blocks, "transfer list header");
    if config.strict_version {
        log.check_version()?;
    }
    let required = log.validate()?;
    info!(
        commands = log.commands().len(),
        required_blocks = required,
        "transfer list parsed"
    );
    Ok((log, required))
}

/// Replay `log` into `sink`, drawing `new` data from `source`.
pub fn apply_log<W, S>(
    log: &CommandLog,
    block_count: u64,
    source: S,
    sink: W,
    config: &Config,
) -> Result<(W, u64, u64)>
where
    W: ImageSink,
    S: ChunkSource,
{
    let mut writer = ImageWriter::new(sink, block_count)?.with_erase_mode(config.erase_mode);
    if config.progress {
        let touched = log
            .commands()
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.ranges.blocks()));
        writer = writer.with_progress(progress_bar(touched));
    }
    info!(bytes = image_len(block_count)?, "image sized");

    let mut stream = StreamCarry::new(source);
    for command in log.commands() {
        writer
            .apply(command, &mut stream)
            .map_err(|e| OtaError::AtLine {
                line: command.line,
                source: Box::new(e),
            })?;
    }

    let consumed = stream.bytes_pulled();
    let trailing = stream.finish()?;
    if trailing > 0 {
        warn!(trailing, "data stream has unused bytes after the last command");
    }
    Ok((writer.into_inner()?, consumed, trailing))
}

/// Full conversion: transfer list text plus data source into `sink`.
pub fn convert<W, S>(text: &str, source: S, sink: W, config: &Config) -> Result<(W, TransferReport)>
where
    W: ImageSink,
    S: ChunkSource,
{
    let start = Instant::now();
    let (log, required) = load_transfer_list(text, config)?;
    let (sink, consumed, trailing) = apply_log(&log, required, source, sink, config)?;
    let report = TransferReport {
        summary: log.summary(),
        image_bytes: image_len(required)?,
        bytes_consumed: consumed,
        trailing_bytes: trailing,
        dry_run: false,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    info!(elapsed_ms = report.elapsed_ms, "transfer complete");
    Ok((sink, report))
}

/// Wrap a raw data reader in the decoder for `codec`.
///
/// Use [`Compression::resolve`] to pick the codec from the data file name.
pub fn open_source<'a, R: Read + 'a>(reader: R, codec: Codec) -> Box<dyn ChunkSource + 'a> {
    match codec {
        Codec::Brotli => Box::new(BrotliChunks::new(reader)),
        Codec::Plain => Box::new(PlainChunks::new(reader)),
    }
}

/// Parse and validate only. Nothing is read from the data stream.
pub fn inspect(text: &str, config: &Config) -> Result<TransferReport> {
    let start = Instant::now();
    let (log, required) = load_transfer_list(text, config)?;
    Ok(TransferReport {
        summary: log.summary(),
        image_bytes: image_len(required)?,
        bytes_consumed: 0,
        trailing_bytes: 0,
        dry_run: true,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}

fn progress_bar(blocks: u64) -> ProgressBar {
    let bar = ProgressBar::new(blocks);
    if let Ok(style) =
        ProgressStyle::with_template("{bar:40} {pos}/{len} blocks [{elapsed_precise}] {msg}")
    {
        bar.set_style(style);
    }
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn convert_in_memory() {
        let payload = vec![0x5Au8; 2 * BLOCK_SIZE];
        let source = MemoryChunks::new([payload[..1000].to_vec(), payload[1000..].to_vec()]);
        let (sink, report) = convert(
            "4\n3\n0\n0\nzero 2,0,1\nnew 2,1,3\n",
            source,
            Cursor::new(Vec::new()),
            &Config::default(),
        )
        .unwrap();
        let image = sink.into_inner();
        assert_eq!(image.len(), 3 * BLOCK_SIZE);
        assert!(image[..BLOCK_SIZE].iter().all(|&b| b == 0));
        assert_eq!(&image[BLOCK_SIZE..], &payload[..]);
        assert_eq!(report.bytes_consumed, payload.len() as u64);
        assert_eq!(report.trailing_bytes, 0);
    }

    #[test]
    fn inspect_reports_without_data() {
        let report = inspect("4\n2\n0\n0\nnew 2,0,2\n", &Config::default()).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.image_bytes, 2 * BLOCK_SIZE as u64);
        assert_eq!(report.summary.new.blocks, 2);
    }

    #[test]
    fn huge_block_index_is_an_error() {
        let err = inspect("4\n1\n0\n0\nzero 2,0,18446744073709551615\n", &Config::default())
            .unwrap_err();
        assert!(matches!(err, OtaError::AtLine { line: 5, .. }));
        assert!(matches!(err.root(), OtaError::BlockOutOfRange { .. }));
    }

    #[test]
    fn apply_errors_name_the_command_line() {
        let err = convert(
            "4\n2\n0\n0\nzero 2,0,1\nnew 2,0,2\n",
            MemoryChunks::new([vec![1u8; 10]]),
            Cursor::new(Vec::new()),
            &Config::default(),
        )
        .unwrap_err();
        assert!(matches!(err, OtaError::AtLine { line: 6, .. }));
        assert!(matches!(err.root(), OtaError::TruncatedStream { begin: 0, end: 2, .. }));
    }

    #[test]
    fn strict_version_rejects_old_lists() {
        let config = Config {
            strict_version: true,
            ..Config::default()
        };
        let err = load_transfer_list("1\n0\n0\n0\n", &config).unwrap_err();
        assert!(matches!(err, OtaError::UnsupportedVersion(1)));
    }
}
