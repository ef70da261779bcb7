#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_registry::NormalizedKey;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // Parsing is total and deterministic.
    let key = NormalizedKey::from_type_name(raw);
    assert_eq!(key, NormalizedKey::from_type_name(raw));

    // Rendering never panics either.
    let _ = key.to_string();
});
