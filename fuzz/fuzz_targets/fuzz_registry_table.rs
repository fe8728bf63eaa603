#![no_main]
use cage_core::registry::{parse_table, render_table};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(rows) = parse_table(data) else {
        return;
    };
    // Whatever parses must survive a write and re-read unchanged.
    let bytes = render_table(&rows).expect("render");
    let text = String::from_utf8(bytes).expect("utf8");
    let again = parse_table(&text).expect("reparse");
    assert_eq!(rows.len(), again.len());
    for (a, b) in rows.iter().zip(&again) {
        assert_eq!(a.tag, b.tag);
        assert_eq!(a.day_index, b.day_index);
        assert_eq!(a.required_drug_drops_today, b.required_drug_drops_today);
    }
});
