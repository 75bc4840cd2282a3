use std::fmt;
use std::str::FromStr;

use crate::error::{OtaError, Result};
use crate::BLOCK_SIZE;

/// Largest block index whose byte offset still fits in a `u64`.
pub const MAX_BLOCK: u64 = u64::MAX / BLOCK_SIZE as u64;

/// Half-open run of blocks `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub begin: u64,
    pub end: u64,
}

impl Range {
    /// Number of blocks covered.
    pub fn blocks(&self) -> u64 {
        self.end - self.begin
    }

    /// Absolute byte offset of the first block.
    pub fn byte_start(&self) -> u64 {
        self.begin * BLOCK_SIZE as u64
    }

    pub fn byte_len(&self) -> u64 {
        self.blocks() * BLOCK_SIZE as u64
    }
}

/// Block ranges targeted by one transfer command, in the order listed.
///
/// Order matters: `new` commands consume the data stream range by range, so
/// the set is never sorted or merged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RangeSet {
    ranges: Vec<Range>,
}

impl RangeSet {
    /// Parse the `N,b0,e0,...` encoding used by transfer lists.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let mut tokens = text.split(',');
        let count_token = tokens.next().unwrap_or_default();
        let values: Vec<&str> = tokens.collect();

        let count: usize = count_token
            .parse()
            .map_err(|_| OtaError::MalformedRangeCount(text.to_string()))?;
        if count == 0 || count % 2 != 0 || count != values.len() {
            return Err(OtaError::MalformedRangeCount(text.to_string()));
        }

        let mut ranges = Vec::with_capacity(count / 2);
        for pair in values.chunks_exact(2) {
            let begin = parse_block(pair[0], text)?;
            let end = parse_block(pair[1], text)?;
            if end > MAX_BLOCK {
                return Err(OtaError::BlockOutOfRange {
                    block: end,
                    text: text.to_string(),
                });
            }
            if begin >= end {
                return Err(OtaError::EmptyRange {
                    begin,
                    end,
                    text: text.to_string(),
                });
            }
            ranges.push(Range { begin, end });
        }
        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range> {
        self.ranges.iter()
    }

    /// Largest `end` in the set, or 0 for an empty set.
    pub fn max_end(&self) -> u64 {
        self.ranges.iter().map(|r| r.end).max().unwrap_or(0)
    }

    /// Total number of blocks covered by all ranges.
    pub fn blocks(&self) -> u64 {
        self.ranges
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.blocks()))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

fn parse_block(token: &str, text: &str) -> Result<u64> {
    token.trim().parse().map_err(|_| OtaError::NonIntegerToken {
        token: token.to_string(),
        text: text.to_string(),
    })
}

impl FromStr for RangeSet {
    type Err = OtaError;

    fn from_str(s: &str) -> Result<Self> {
        RangeSet::parse(s)
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ranges.len() * 2)?;
        for r in &self.ranges {
            write!(f, ",{},{}", r.begin, r.end)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a RangeSet {
    type Item = &'a Range;
    type IntoIter = std::slice::Iter<'a, Range>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}
