#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use mzcodec::indexed::{IndexedMzMLReader, MzMLReader};
use mzcodec::model::BinaryReadMode;

fuzz_target!(|data: &[u8]| {
    let _ = MzMLReader::new(data).read_document(BinaryReadMode::Eager);

    // A corrupt trailer or bogus offsets must degrade, not panic
    if let Ok(mut reader) = IndexedMzMLReader::open_with_scan(Cursor::new(data)) {
        for ordinal in 0..4 {
            let _ = reader.fetch_spectrum(ordinal, true);
            let _ = reader.fetch_chromatogram(ordinal, false);
        }
        let _ = reader.verify();
    }
});
