//! Fuzz target: `SystemConfig::from_blob`
//!
//! A stored blob can be truncated by a power cut mid-write.  Decoding must
//! fail cleanly, and any blob that decodes and validates must re-encode to
//! something that decodes to the same config.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use burnie::config::SystemConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(cfg) = SystemConfig::from_blob(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    let bytes = cfg.to_blob().expect("valid config must encode");
    let again = SystemConfig::from_blob(&bytes).expect("re-encoded blob must decode");
    assert_eq!(again, cfg);
});
