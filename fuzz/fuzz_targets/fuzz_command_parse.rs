//! Fuzz target: `AppCommand::parse`
//!
//! Console lines come straight from a person at a serial terminal.  The
//! parser must never panic, and anything it accepts must be in range.
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use burnie::app::commands::AppCommand;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    match AppCommand::parse(line) {
        Some(AppCommand::MoveTo(p)) => assert!(p.is_finite(), "non-finite move target"),
        Some(AppCommand::SetClosingDuration(secs)) => assert_eq!(secs % 60, 0),
        _ => {}
    }
});
