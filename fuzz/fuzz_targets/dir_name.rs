//! Fuzz target for image directory name parsing.
//!
//! Arbitrary names must never panic. Whatever parses must survive a trip
//! through the canonical `YYYY-MM-DD_HH-MM-SS-ffffff` spelling.

#![no_main]

use chrono::Timelike;
use libfuzzer_sys::fuzz_target;
use trace_daq::correlation::{format_exact_name, parse_dir_name};

fuzz_target!(|name: &str| {
    if let Some(ts) = parse_dir_name(name) {
        let canonical = format!("{}-{:06}", format_exact_name(ts), ts.nanosecond() / 1000);
        assert_eq!(parse_dir_name(&canonical), Some(ts));
    }
});
