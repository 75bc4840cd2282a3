use std::path::Path;

use clap::ValueEnum;

/// How the data file is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Compression {
    /// Brotli when the file name ends in `.br`, raw otherwise.
    #[default]
    Auto,
    Brotli,
    None,
}

/// Decoder actually used for a data stream, after `Auto` is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Brotli,
    Plain,
}

impl Compression {
    /// Settle `Auto` using the data file name.
    pub fn resolve(self, data_path: &Path) -> Codec {
        match self {
            Compression::Auto => {
                let is_br = data_path
                    .extension()
                    .and_then(|s| s.to_str())
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("br"));
                if is_br {
                    Codec::Brotli
                } else {
                    Codec::Plain
                }
            }
            Compression::Brotli => Codec::Brotli,
            Compression::None => Codec::Plain,
        }
    }
}

/// What an `erase` command does to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EraseMode {
    /// Leave the blocks untouched.
    #[default]
    Skip,
    /// Explicitly zero-fill the erased blocks.
    Zero,
}

/// Runtime options for a conversion.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub compression: Compression,
    pub erase_mode: EraseMode,
    /// Fail on transfer list versions other than 3 and 4.
    pub strict_version: bool,
    /// Parse and validate only; no data is read and no image is written.
    pub dry_run: bool,
    /// Draw a progress bar on stderr while writing.
    pub progress: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_uses_suffix() {
        assert_eq!(
            Compression::Auto.resolve(Path::new("system.new.dat.br")),
            Codec::Brotli
        );
        assert_eq!(
            Compression::Auto.resolve(Path::new("system.new.dat")),
            Codec::Plain
        );
        assert_eq!(
            Compression::Brotli.resolve(Path::new("system.new.dat")),
            Codec::Brotli
        );
        assert_eq!(
            Compression::None.resolve(Path::new("system.new.dat.br")),
            Codec::Plain
        );
    }
}
