use ota_converter::{MemoryChunks, OtaError, StreamCarry};
use proptest::prelude::*;
use quickcheck::quickcheck;

/// Split `data` at the cut points derived from `cuts`.
fn partition(data: &[u8], cuts: &[u16]) -> Vec<Vec<u8>> {
    let mut parts = Vec::new();
    let mut at = 0;
    for &c in cuts {
        if at >= data.len() {
            break;
        }
        let end = (at + c as usize % 97).min(data.len());
        parts.push(data[at..end].to_vec());
        at = end;
    }
    parts.push(data[at..].to_vec());
    parts
}

/// Turn arbitrary request sizes into a sequence that sums to `total`.
fn requests(total: usize, sizes: &[u16]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut left = total;
    for &s in sizes {
        if left == 0 {
            break;
        }
        let n = (s as usize % 131).min(left);
        out.push(n);
        left -= n;
    }
    if left > 0 {
        out.push(left);
    }
    out
}

quickcheck! {
    fn pulls_reassemble_source(data: Vec<u8>, cuts: Vec<u16>, sizes: Vec<u16>) -> bool {
        let mut stream = StreamCarry::new(MemoryChunks::new(partition(&data, &cuts)));
        let mut out = Vec::with_capacity(data.len());
        for n in requests(data.len(), &sizes) {
            match stream.pull(n) {
                Ok(bytes) if bytes.len() == n => out.extend(bytes),
                _ => return false,
            }
        }
        out == data && stream.bytes_pulled() == data.len() as u64 && stream.finish().unwrap() == 0
    }
}

proptest! {
    #[test]
    fn over_pull_is_short_read(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        cuts in proptest::collection::vec(any::<u16>(), 0..16),
        extra in 1usize..64,
    ) {
        let mut stream = StreamCarry::new(MemoryChunks::new(partition(&data, &cuts)));
        let wanted = data.len() + extra;
        let short_read = matches!(
            stream.pull(wanted),
            Err(OtaError::ShortRead { available, .. }) if available == data.len()
        );
        prop_assert!(short_read);
    }
}

#[test]
fn many_tiny_chunks_one_large_pull() {
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
    let parts: Vec<Vec<u8>> = data.chunks(3).map(<[u8]>::to_vec).collect();
    let mut stream = StreamCarry::new(MemoryChunks::new(parts));
    assert_eq!(stream.pull(9_999).unwrap(), data[..9_999]);
    assert_eq!(stream.carried(), 0);
    assert_eq!(stream.pull(1).unwrap(), data[9_999..]);
}
