//! Print per-command block totals for a transfer list. Used for inspecting
//! OTA packages before converting them.

use std::{env, fs, path::Path};

use ota_converter::io_utils::CliError;
use ota_converter::{CommandLog, KindTally, BLOCK_SIZE};

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        return Err(CliError::new(format!("Usage: {} <transfer_list>", args[0])).into());
    }

    let path = Path::new(&args[1]);
    let text = fs::read_to_string(path).map_err(|e| CliError::file("reading transfer list", path, e))?;
    let log = CommandLog::parse(&text).map_err(|e| CliError::conversion("invalid transfer list", e))?;
    let summary = log.summary();

    println!("version: {}", summary.version);
    println!("declared blocks: {}", summary.declared_blocks);
    println!(
        "required blocks: {} ({} bytes)",
        summary.required_blocks,
        summary.required_blocks * BLOCK_SIZE as u64
    );
    for (name, tally) in [
        ("erase", summary.erase),
        ("zero", summary.zero),
        ("new", summary.new),
    ] {
        print_tally(name, &tally);
    }
    if let Err(e) = log.validate() {
        println!("warning: {e}");
    }
    Ok(())
}

fn print_tally(name: &str, tally: &KindTally) {
    println!("{name:>5}: {} commands, {} blocks", tally.commands, tally.blocks);
}
