use honggfuzz::fuzz;
use ota_converter::CommandLog;

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            if let Ok(text) = std::str::from_utf8(data) {
                if let Ok(log) = CommandLog::parse(text) {
                    let required = log.required_block_count();
                    assert!(log.commands().iter().all(|c| c.ranges.max_end() <= required));
                    let _ = log.validate();
                }
            }
        });
    }
}
