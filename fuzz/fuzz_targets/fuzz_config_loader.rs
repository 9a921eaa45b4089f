#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary text through the rig config loader must never panic.
    // Malformed TOML surfaces as a parse error and schema-valid but
    // nonsensical rigs are rejected by validate(); both are fine.
    match barkeep_config::load_toml(data) {
        Ok(cfg) => {
            let _ = cfg.validate();
        }
        Err(_e) => {
            // parse error is acceptable
        }
    }
});
