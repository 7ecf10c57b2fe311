//! Fuzz target: `ConfigStore` section parsing
//!
//! Places arbitrary bytes in `/config/state.json` and drives the store
//! through the same calls the automation makes on every poll.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - `read` either parses or reports `NotFound`
//! - After `read_flag` the section always parses
//!
//! cargo fuzz run fuzz_section_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use microbox::adapters::fs::MemFs;
use microbox::app::ports::FilesystemPort;
use microbox::error::StoreError;
use microbox::store::{ConfigStore, KEY_AUTO_WATERING, Section, StoreDefaults, classify};
use microbox::sync::LockPolicy;

fuzz_target!(|data: &[u8]| {
    let _ = classify(data);

    let mut fs = MemFs::new();
    if fs.write(Section::State.path(), data).is_err() {
        return;
    }
    let store = ConfigStore::new(fs, StoreDefaults::default(), LockPolicy::FailFast);

    match store.read(Section::State) {
        Ok(_) | Err(StoreError::NotFound(_)) => {}
        Err(e) => panic!("unexpected store error: {:?}", e),
    }

    assert!(store.read_flag(Section::State, KEY_AUTO_WATERING).is_ok());
    assert!(store.read(Section::State).is_ok(), "flag read must repair the section");
    let _ = store.last_watering();
});
