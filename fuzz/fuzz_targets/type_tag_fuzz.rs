//! Type tag + unflatten fuzz target: the first line of the input is a tag, the rest is a buffer.
//! Neither parsing nor unflattening may panic; every parsed tag must reprint to an equal type.
//! Build with: cargo fuzz run type_tag_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let split = data.iter().position(|&b| b == b'\n').unwrap_or(data.len());
    let tag = match std::str::from_utf8(&data[..split]) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(ty) = labrad_types::parse_type(tag) {
        let reparsed = labrad_types::parse_type(&ty.to_string()).expect("canonical tag parses");
        assert_eq!(reparsed, ty);
        let body = data.get(split + 1..).unwrap_or(&[]);
        let _ = labrad_types::unflatten(body, &ty);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run type_tag_fuzz");
}
