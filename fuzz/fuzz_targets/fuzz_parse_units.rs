#![no_main]

use libfuzzer_sys::fuzz_target;

use delay_engine::{format_units, parse_units};

fuzz_target!(|data: (&str, u8)| {
    let (input, decimals) = data;
    let decimals = decimals % 39;
    if let Ok(value) = parse_units(input, decimals) {
        let rendered = format_units(value, decimals);
        assert_eq!(parse_units(&rendered, decimals), Ok(value));
    }
});
