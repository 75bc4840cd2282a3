use clap::Parser;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ota_converter::{
    convert, inspect, io_utils::CliError, open_source, Compression, Config, EraseMode,
    TransferReport,
};

/// Rebuild a partition image from an OTA transfer list and its new.dat stream.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Transfer list, e.g. system.transfer.list
    transfer_list: PathBuf,
    /// Data stream, e.g. system.new.dat or system.new.dat.br
    new_data: PathBuf,
    /// Output image path
    output: PathBuf,
    /// Data stream encoding; `auto` picks brotli for a .br suffix
    #[arg(long, value_enum, default_value_t = Compression::Auto)]
    compression: Compression,
    /// What `erase` commands do to the image
    #[arg(long, value_enum, default_value_t = EraseMode::Skip)]
    erase: EraseMode,
    /// Refuse transfer list versions other than 3 and 4
    #[arg(long)]
    strict_version: bool,
    /// Parse and validate the transfer list without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Print a JSON report on stdout
    #[arg(long)]
    json: bool,
    /// Show a progress bar
    #[arg(long)]
    progress: bool,
    /// Log every command
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config {
        compression: args.compression,
        erase_mode: args.erase,
        strict_version: args.strict_version,
        dry_run: args.dry_run,
        progress: args.progress,
    };

    let text = fs::read_to_string(&args.transfer_list)
        .map_err(|e| CliError::file("reading transfer list", &args.transfer_list, e))?;

    let report = if config.dry_run {
        inspect(&text, &config).map_err(|e| CliError::conversion("invalid transfer list", e))?
    } else {
        let data = File::open(&args.new_data)
            .map_err(|e| CliError::file("opening data file", &args.new_data, e))?;
        let image = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&args.output)
            .map_err(|e| CliError::file("creating image", &args.output, e))?;
        let codec = config.compression.resolve(&args.new_data);
        tracing::info!(?codec, path = %args.new_data.display(), "data stream");
        let source = open_source(data, codec);
        let (_, report) = convert(&text, source, image, &config)
            .map_err(|e| CliError::conversion("conversion failed", e))?;
        report
    };

    print_report(&report, args.json)
}

fn print_report(report: &TransferReport, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let out = serde_json::to_string_pretty(report)
            .map_err(|e| CliError::new(format!("failed to encode report: {e}")))?;
        println!("{out}");
        return Ok(());
    }
    let s = &report.summary;
    eprintln!("version: {}", s.version);
    eprintln!(
        "blocks: {} ({} bytes)",
        s.required_blocks, report.image_bytes
    );
    eprintln!(
        "commands: erase {}, zero {}, new {}",
        s.erase.commands, s.zero.commands, s.new.commands
    );
    if report.dry_run {
        eprintln!("(dry run) image not written");
    } else {
        eprintln!(
            "wrote {} bytes of new data in {} ms",
            report.bytes_consumed, report.elapsed_ms
        );
    }
    Ok(())
}
