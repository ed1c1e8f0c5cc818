#![no_main]

use libfuzzer_sys::fuzz_target;
use mzcodec::xml::{SaxReader, TreeBuilder};

fuzz_target!(|data: &[u8]| {
    // Malformed input must come back as an error, never a panic
    let mut reader = SaxReader::new(data);
    for _ in 0..16 {
        let mut tree = TreeBuilder::new();
        match reader.parse(&mut tree) {
            Ok(_) if tree.is_finished() => {}
            _ => break,
        }
    }

    let _ = mzcodec::xml::unescape(&String::from_utf8_lossy(data));
    let _ = mzcodec::xml::decode_id(&String::from_utf8_lossy(data));
});
