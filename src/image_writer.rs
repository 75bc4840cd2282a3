use std::fs::File;
use std::io::{self, Cursor, Seek, SeekFrom, Write};

use indicatif::ProgressBar;
use tracing::debug;

use crate::command_log::{Command, CommandKind};
use crate::config::EraseMode;
use crate::error::{OtaError, Result};
use crate::range_set::Range;
use crate::stream_carry::{ChunkSource, StreamCarry};
use crate::{BLOCK_SIZE, BUF_SIZE};

static ZERO_BLOCK: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Byte length of an image holding `blocks` blocks.
pub fn image_len(blocks: u64) -> Result<u64> {
    blocks
        .checked_mul(BLOCK_SIZE as u64)
        .ok_or_else(|| OtaError::BlockOutOfRange {
            block: blocks,
            text: format!("image of {blocks} blocks"),
        })
}

/// Random-access destination for the reconstructed image.
pub trait ImageSink: Write + Seek {
    /// Resize to exactly `len` bytes. Newly added space must read as zero.
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl ImageSink for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

impl ImageSink for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "image too large"))?;
        self.get_mut().resize(len, 0);
        Ok(())
    }
}

impl<T: ImageSink + ?Sized> ImageSink for &mut T {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        (**self).set_len(len)
    }
}

/// Applies transfer commands to a pre-sized image.
pub struct ImageWriter<W: ImageSink> {
    sink: W,
    erase_mode: EraseMode,
    progress: Option<ProgressBar>,
    blocks_written: u64,
}

impl<W: ImageSink> ImageWriter<W> {
    /// Size the sink to `block_count` blocks before anything is written.
    pub fn new(mut sink: W, block_count: u64) -> Result<Self> {
        sink.set_len(image_len(block_count)?)?;
        Ok(Self {
            sink,
            erase_mode: EraseMode::default(),
            progress: None,
            blocks_written: 0,
        })
    }

    pub fn with_erase_mode(mut self, mode: EraseMode) -> Self {
        self.erase_mode = mode;
        self
    }

    /// Advance `bar` by the number of blocks each command touches.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Blocks written so far by `zero` and `new` commands.
    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    /// Apply one command. Ranges are handled strictly in listed order.
    pub fn apply<S: ChunkSource>(
        &mut self,
        command: &Command,
        stream: &mut StreamCarry<S>,
    ) -> Result<()> {
        debug!(
            line = command.line,
            kind = %command.kind,
            ranges = %command.ranges,
            blocks = command.ranges.blocks(),
            "apply"
        );
        for range in &command.ranges {
            match (command.kind, self.erase_mode) {
                (CommandKind::Erase, EraseMode::Skip) => {}
                (CommandKind::Erase, EraseMode::Zero) | (CommandKind::Zero, _) => {
                    self.zero_range(range)?
                }
                (CommandKind::New, _) => self.copy_range(range, stream)?,
            }
            if let Some(bar) = &self.progress {
                bar.inc(range.blocks());
            }
        }
        Ok(())
    }

    fn zero_range(&mut self, range: &Range) -> Result<()> {
        self.sink.seek(SeekFrom::Start(range.byte_start()))?;
        for _ in range.begin..range.end {
            self.sink.write_all(&ZERO_BLOCK)?;
        }
        self.blocks_written += range.blocks();
        Ok(())
    }

    fn copy_range<S: ChunkSource>(
        &mut self,
        range: &Range,
        stream: &mut StreamCarry<S>,
    ) -> Result<()> {
        self.sink.seek(SeekFrom::Start(range.byte_start()))?;
        let mut remaining = range.byte_len();
        while remaining > 0 {
            let n = remaining.min(BUF_SIZE as u64) as usize;
            let data = stream.pull(n).map_err(|e| match e {
                OtaError::ShortRead { .. } => OtaError::TruncatedStream {
                    begin: range.begin,
                    end: range.end,
                    source: Box::new(e),
                },
                other => other,
            })?;
            self.sink.write_all(&data)?;
            remaining -= n as u64;
        }
        self.blocks_written += range.blocks();
        Ok(())
    }

    /// Flush and hand back the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.sink.flush()?;
        if let Some(bar) = self.progress.take() {
            bar.finish_and_clear();
        }
        Ok(self.sink)
    }
}
