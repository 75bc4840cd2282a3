use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::error::{OtaError, Result};
use crate::range_set::RangeSet;

/// Transfer list versions emitted by known OTA generators.
pub const KNOWN_VERSIONS: std::ops::RangeInclusive<u64> = 1..=4;
/// Versions accepted when strict checking is on.
pub const STRICT_VERSIONS: [u64; 2] = [3, 4];

/// Number of lines preceding the first command.
const HEADER_LINES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Erase,
    Zero,
    New,
}

impl CommandKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "erase" => Some(CommandKind::Erase),
            "zero" => Some(CommandKind::Zero),
            "new" => Some(CommandKind::New),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Erase => "erase",
            CommandKind::Zero => "zero",
            CommandKind::New => "new",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One line of the transfer list body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub ranges: RangeSet,
    /// 1-based line number in the transfer list.
    pub line: usize,
}

/// Parsed transfer list: header plus the ordered command sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLog {
    pub version: u64,
    pub total_blocks: u64,
    commands: Vec<Command>,
}

impl CommandLog {
    /// Parse a whole transfer list.
    ///
    /// Lines three and four are reserved by the format and skipped without
    /// inspection. Blank lines in the body are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let version = parse_header(lines.next(), 1)?;
        let total_blocks = parse_header(lines.next(), 2)?;
        if !KNOWN_VERSIONS.contains(&version) {
            warn!(version, "unrecognised transfer list version");
        }

        let mut commands = Vec::new();
        for (idx, raw) in lines.enumerate().skip(HEADER_LINES - 2) {
            let line = idx + 3;
            if raw.trim().is_empty() {
                continue;
            }
            commands.push(parse_command(raw, line)?);
        }

        Ok(Self {
            version,
            total_blocks,
            commands,
        })
    }

    /// Reject versions outside the set the native tooling supports.
    pub fn check_version(&self) -> Result<()> {
        if STRICT_VERSIONS.contains(&self.version) {
            Ok(())
        } else {
            Err(OtaError::UnsupportedVersion(self.version))
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of blocks the image must hold: the largest `end` referenced
    /// by any command.
    pub fn required_block_count(&self) -> u64 {
        self.commands
            .iter()
            .map(|c| c.ranges.max_end())
            .max()
            .unwrap_or(0)
    }

    /// Check the scanned size against the header's declared block count.
    pub fn validate(&self) -> Result<u64> {
        let required = self.required_block_count();
        if required < self.total_blocks {
            return Err(OtaError::BlockCountMismatch {
                required,
                declared: self.total_blocks,
            });
        }
        Ok(required)
    }

    /// Per-kind command and block totals.
    pub fn summary(&self) -> TransferSummary {
        let mut summary = TransferSummary {
            version: self.version,
            declared_blocks: self.total_blocks,
            required_blocks: self.required_block_count(),
            ..TransferSummary::default()
        };
        for cmd in &self.commands {
            let tally = match cmd.kind {
                CommandKind::Erase => &mut summary.erase,
                CommandKind::Zero => &mut summary.zero,
                CommandKind::New => &mut summary.new,
            };
            tally.commands += 1;
            tally.blocks = tally.blocks.saturating_add(cmd.ranges.blocks());
        }
        summary
    }
}

fn parse_header(line: Option<&str>, number: usize) -> Result<u64> {
    let text = line.unwrap_or_default();
    text.trim().parse().map_err(|_| OtaError::InvalidHeader {
        line: number,
        text: text.to_string(),
    })
}

fn parse_command(raw: &str, line: usize) -> Result<Command> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    let &[name, ranges] = fields.as_slice() else {
        return Err(OtaError::InvalidCommandLine {
            line,
            text: raw.to_string(),
        });
    };
    let kind = CommandKind::from_name(name).ok_or_else(|| OtaError::UnknownCommand {
        line,
        name: name.to_string(),
    })?;
    let ranges = RangeSet::parse(ranges).map_err(|e| OtaError::AtLine {
        line,
        source: Box::new(e),
    })?;
    Ok(Command { kind, ranges, line })
}

/// Count of commands and blocks for one command kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindTally {
    pub commands: usize,
    pub blocks: u64,
}

/// Overview of a transfer list, printed by the CLI tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub version: u64,
    pub declared_blocks: u64,
    pub required_blocks: u64,
    pub erase: KindTally,
    pub zero: KindTally,
    pub new: KindTally,
}

impl TransferSummary {
    pub fn image_bytes(&self) -> u64 {
        self.required_blocks.saturating_mul(crate::BLOCK_SIZE as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "4\n6\n0\n0\nerase 2,0,6\nzero 2,0,1\nnew 4,1,3,5,6\n";

    #[test]
    fn parses_header_and_body() {
        let log = CommandLog::parse(LIST).unwrap();
        assert_eq!(log.version, 4);
        assert_eq!(log.total_blocks, 6);
        let kinds: Vec<_> = log.commands().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            [CommandKind::Erase, CommandKind::Zero, CommandKind::New]
        );
        assert_eq!(log.commands()[2].line, 7);
        assert_eq!(log.required_block_count(), 6);
        assert_eq!(log.validate().unwrap(), 6);
    }

    #[test]
    fn reserved_lines_are_not_inspected() {
        let log = CommandLog::parse("3\n1\nanything here\n\u{1F4A9}\nnew 2,0,1\n").unwrap();
        assert_eq!(log.commands().len(), 1);
    }

    #[test]
    fn header_only_log_is_empty() {
        let log = CommandLog::parse("1\n0\n0\n0\n").unwrap();
        assert!(log.commands().is_empty());
        assert_eq!(log.required_block_count(), 0);
    }

    #[test]
    fn invalid_header() {
        assert!(matches!(
            CommandLog::parse("x\n4\n0\n0\n"),
            Err(OtaError::InvalidHeader { line: 1, .. })
        ));
        assert!(matches!(
            CommandLog::parse("1\n"),
            Err(OtaError::InvalidHeader { line: 2, .. })
        ));
    }

    #[test]
    fn invalid_command_line() {
        assert!(matches!(
            CommandLog::parse("1\n1\n0\n0\nnew\n"),
            Err(OtaError::InvalidCommandLine { line: 5, .. })
        ));
        assert!(matches!(
            CommandLog::parse("1\n1\n0\n0\nnew 2,0,1 extra\n"),
            Err(OtaError::InvalidCommandLine { line: 5, .. })
        ));
    }

    #[test]
    fn unknown_command() {
        let err = CommandLog::parse("1\n1\n0\n0\nbsdiff 2,0,1\n").unwrap_err();
        assert!(matches!(err, OtaError::UnknownCommand { ref name, line: 5 } if name == "bsdiff"));
    }

    #[test]
    fn range_errors_carry_line() {
        let err = CommandLog::parse("1\n1\n0\n0\nzero 2,0,1\nnew 3,0,1,2\n").unwrap_err();
        assert!(matches!(err, OtaError::AtLine { line: 6, .. }));
        assert!(matches!(err.root(), OtaError::MalformedRangeCount(_)));
    }

    #[test]
    fn block_count_mismatch() {
        let log = CommandLog::parse("1\n4\n0\n0\nzero 2,0,1\nnew 2,1,3\n").unwrap();
        assert!(matches!(
            log.validate(),
            Err(OtaError::BlockCountMismatch { required: 3, declared: 4 })
        ));
    }

    #[test]
    fn strict_version() {
        assert!(CommandLog::parse("4\n0\n0\n0\n").unwrap().check_version().is_ok());
        assert!(matches!(
            CommandLog::parse("2\n0\n0\n0\n").unwrap().check_version(),
            Err(OtaError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn summary_counts() {
        let summary = CommandLog::parse(LIST).unwrap().summary();
        assert_eq!(summary.erase, KindTally { commands: 1, blocks: 6 });
        assert_eq!(summary.zero, KindTally { commands: 1, blocks: 1 });
        assert_eq!(summary.new, KindTally { commands: 1, blocks: 3 });
        assert_eq!(summary.image_bytes(), 6 * 4096);
    }
}
