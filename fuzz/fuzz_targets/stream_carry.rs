use honggfuzz::fuzz;
use ota_converter::{MemoryChunks, StreamCarry};

// First byte picks the chunk size, second the pull size; the rest is payload.
fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            if data.len() < 2 {
                return;
            }
            let chunk = data[0] as usize + 1;
            let pull = data[1] as usize + 1;
            let payload = &data[2..];
            let parts: Vec<Vec<u8>> = payload.chunks(chunk).map(<[u8]>::to_vec).collect();
            let mut stream = StreamCarry::new(MemoryChunks::new(parts));
            let mut out = Vec::new();
            let mut left = payload.len();
            while left > 0 {
                let n = pull.min(left);
                out.extend(stream.pull(n).unwrap());
                left -= n;
            }
            assert_eq!(out, payload);
            assert!(stream.pull(1).is_err());
        });
    }
}
