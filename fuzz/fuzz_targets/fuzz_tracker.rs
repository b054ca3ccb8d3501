//! Fuzz target: `PositionTracker::update`
//!
//! Feeds arbitrary encoder readings (noise, glitches, dropped samples) and
//! checks the revolution counter and plans stay sane.
//!
//! cargo fuzz run fuzz_tracker

#![no_main]

use burnie::config::Calibration;
use burnie::control::tracker::PositionTracker;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let cal = Calibration::default();
    let mut tracker = PositionTracker::new(cal, 200);
    let full = tracker.full_travel_steps();

    for pair in data.chunks_exact(2) {
        tracker.update(u16::from_le_bytes([pair[0], pair[1]]));
        assert!(tracker.current_revolution() <= cal.zero_crossing_count);

        let p = tracker.clamped_position();
        assert!((0.0..=1.0).contains(&p));
        // A move to either stop never asks for more than a little past full travel.
        assert!(tracker.plan_move(0.0).steps <= full * 2);
        assert!(tracker.plan_move(1.0).steps <= full * 2);
    }
});
