#![no_main]

use libfuzzer_sys::fuzz_target;
use ferrous_registry::Key;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let text = String::from_utf8_lossy(&data[1..]).into_owned();

    match data[0] % 3 {
        0 if text.is_ascii() => {
            // Case folding
            assert_eq!(
                Key::name(text.to_uppercase()).normalize(),
                Key::name(text.to_lowercase()).normalize()
            );
        }
        1 => {
            // Generic keys over name arguments
            let args: Vec<Key> = text.split(',').map(Key::name).collect();
            let key = Key::generic("origin", args.clone());
            assert_eq!(key.normalize(), Key::generic("ORIGIN", args).normalize());
        }
        2 => {
            // Opaque keys never collide with names
            assert_ne!(Key::opaque(&text).normalize(), Key::name(text).normalize());
        }
        _ => {}
    }
});
