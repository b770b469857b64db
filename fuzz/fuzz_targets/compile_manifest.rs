#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(manifest) = text.parse::<flashblock::Manifest>() else {
        return;
    };
    if let Ok(declaration) = manifest.into_declaration() {
        let _ = flashblock::compile(&declaration);
    }
});
