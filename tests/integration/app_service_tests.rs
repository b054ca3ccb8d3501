//! Integration tests for the AppService → machine → hardware pipeline.
//!
//! These run on the host (x86_64) against the simulated vent and a
//! hand-driven clock, and play out whole burns: closing along the curve,
//! a person grabbing the handle, external move requests, reopening for a
//! new fire.

use burnie::adapters::sim::{SimClock, SimulatedVent};
use burnie::app::commands::AppCommand;
use burnie::app::events::AppEvent;
use burnie::app::ports::{ConfigPort, MagnetStatus};
use burnie::app::service::AppService;
use burnie::config::SystemConfig;
use burnie::control::tracker::StepDirection;
use burnie::fsm::context::Indicator;
use burnie::fsm::states::VentStateId;
use burnie::telemetry::stovelink::{PacketHeader, StoveLinkEncoder, FRAME_PIXELS};

use super::mock_hw::{HwCall, MockNvs, RecordingSink, RecordingVent};

const TICK: f64 = 0.2;

struct Bench {
    vent: SimulatedVent,
    hw: RecordingVent,
    clock: SimClock,
    app: AppService,
    sink: RecordingSink,
}

impl Bench {
    fn new(config: SystemConfig) -> Self {
        let vent = SimulatedVent::new(config.calibration, config.motor.steps_per_revolution);
        Self::with_vent(config, vent)
    }

    fn with_vent(config: SystemConfig, vent: SimulatedVent) -> Self {
        let hw = RecordingVent::new(vent.clone());
        let clock = SimClock::new(100.0);
        let app = AppService::new(config, Box::new(hw.clone()), Box::new(clock.clone())).unwrap();
        let mut bench = Self {
            vent,
            hw,
            clock,
            app,
            sink: RecordingSink::new(),
        };
        bench.app.start(&mut bench.sink).unwrap();
        bench
    }

    fn command(&mut self, cmd: AppCommand) {
        self.app.handle_command(cmd, &mut self.sink).unwrap();
    }

    fn tick(&mut self) {
        self.clock.advance(TICK);
        self.app.tick(&mut self.sink).unwrap();
    }

    fn run_for(&mut self, secs: f64) {
        let ticks = (secs / TICK).round() as usize;
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn run_until(&mut self, path: &str, max_secs: f64) {
        let ticks = (max_secs / TICK).round() as usize;
        for _ in 0..ticks {
            if self.path() == path {
                return;
            }
            self.tick();
        }
        assert_eq!(self.path(), path, "never reached {path}");
    }

    fn path(&self) -> String {
        self.app.state_path().as_str().to_owned()
    }

    /// A person turning the handle: small increments, one per tick.
    fn hand_move_to(&mut self, target: f32, per_tick: f32) {
        while (self.vent.position() - target).abs() > per_tick {
            let step = (target - self.vent.position()).clamp(-per_tick, per_tick);
            self.vent.nudge(step);
            self.tick();
        }
        self.vent.set_position(target);
        self.tick();
    }

    fn trajectory_target(&self) -> f32 {
        let ctx = self.app.context();
        ctx.trajectory.position(ctx.now())
    }
}

fn bench() -> Bench {
    Bench::new(SystemConfig::default())
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn starts_idle_with_motor_released() {
    let b = bench();
    assert_eq!(b.app.current_state(), Some(VentStateId::Idle));
    assert_eq!(b.hw.calls(), vec![HwCall::Release]);
    assert!(matches!(b.sink.events.first(), Some(AppEvent::Started(s)) if s.as_str() == "idle"));
}

#[test]
fn weak_magnet_still_starts() {
    let config = SystemConfig::default();
    let vent = SimulatedVent::new(config.calibration, config.motor.steps_per_revolution);
    vent.set_magnet(MagnetStatus {
        detected: true,
        too_weak: true,
        too_strong: false,
    });
    let b = Bench::with_vent(config, vent);
    assert_eq!(b.path(), "idle");
}

// ── Closing cycle ─────────────────────────────────────────────

#[test]
fn full_cycle_ends_closed() {
    let mut b = bench();
    b.command(AppCommand::StartClosing);
    assert_eq!(b.path(), "vent_closer/monitoring");

    b.run_for(1900.0);

    assert_eq!(b.path(), "vent_closer/closed");
    assert!(b.vent.position() > 0.99, "vent at {}", b.vent.position());
    assert!(b.app.context().cycle_closed);
    assert_eq!(b.hw.last_indicator(), Some(Indicator::Closed));
    // Closing only ever turns the motor one way when nobody interferes.
    assert_eq!(b.hw.steps_in(StepDirection::Forward), 0);

    let t = b.app.build_telemetry();
    assert!(t.cycle_closed);
    assert_eq!(t.valve_steps, 0);
}

#[test]
fn vent_tracks_the_curve_mid_cycle() {
    let mut b = bench();
    b.command(AppCommand::StartClosing);
    b.run_for(900.0);
    // Halfway through a 30 minute burn; allowed to lag by the deadband.
    let position = b.vent.position();
    assert!((0.48..=0.51).contains(&position), "vent at {position}");

    let transitions = b.sink.transitions();
    assert!(transitions.iter().any(|p| p == "vent_closer/closing"));
    assert!(transitions.iter().all(|p| p != "vent_closer/override"));
}

#[test]
fn manual_opening_keeps_closing_rate() {
    let mut b = bench();
    b.command(AppCommand::StartClosing);
    b.run_for(600.0);
    b.run_until("vent_closer/monitoring", 10.0);

    b.hand_move_to(0.1, 0.015);
    assert_eq!(b.path(), "vent_closer/override");
    assert_eq!(b.hw.last_indicator(), Some(Indicator::Reopened));

    b.run_until("vent_closer/monitoring", 10.0);
    assert!((b.trajectory_target() - 0.1).abs() < 0.01);

    // Same slope as before: another half of the range closes half the vent.
    b.run_for(900.0);
    let position = b.vent.position();
    assert!((position - 0.6).abs() < 0.02, "vent at {position}");
}

#[test]
fn move_rejected_while_hand_is_on_the_vent() {
    let mut b = bench();
    b.command(AppCommand::StartClosing);
    b.vent.nudge(0.03);
    b.tick();
    assert_eq!(b.path(), "vent_closer/override");

    b.command(AppCommand::MoveTo(0.5));
    assert_eq!(b.sink.events.last(), Some(&AppEvent::MoveRejected(0.5)));
    assert_eq!(b.path(), "vent_closer/override");
}

#[test]
fn move_during_cycle_resumes_from_new_position() {
    let mut b = bench();
    b.command(AppCommand::StartClosing);
    b.run_for(300.0);
    b.run_until("vent_closer/monitoring", 10.0);
    let elapsed_before = b.app.build_telemetry().combustion_secs;

    b.command(AppCommand::MoveTo(0.05));
    assert_eq!(b.path(), "move_vent");
    assert!(b.sink.events.iter().any(|e| *e == AppEvent::MoveAccepted(0.05)));

    b.run_until("vent_closer/monitoring", 20.0);
    assert!((b.vent.position() - 0.05).abs() < 0.01);
    assert!((b.trajectory_target() - 0.05).abs() < 0.01);
    // Same burn, not a new one.
    assert!(b.app.build_telemetry().combustion_secs > elapsed_before);
    assert!(b.hw.steps_in(StepDirection::Forward) > 0);
}

#[test]
fn stop_abandons_move_and_releases() {
    let mut b = bench();
    b.command(AppCommand::MoveTo(0.9));
    b.tick();
    b.tick();
    assert_eq!(b.app.current_state(), Some(VentStateId::MoveVent));

    b.command(AppCommand::Stop);
    assert_eq!(b.path(), "idle");
    assert_eq!(b.hw.last_call(), Some(HwCall::Indicator(Indicator::Off)));
    assert!(b.hw.calls().contains(&HwCall::Release));
    let parked = b.vent.position();
    b.run_for(5.0);
    assert_eq!(b.vent.position(), parked);
}

#[test]
fn valve_steps_command_moves_from_closed_end() {
    let mut b = bench();
    let full = b.app.context().tracker.full_travel_steps();
    b.command(AppCommand::MoveToSteps(full / 4));
    b.run_until("idle", 30.0);
    assert!((b.vent.position() - 0.75).abs() < 0.01);
    let reported = b.app.valve_steps();
    assert!(reported.abs_diff(full / 4) <= 5, "reported {reported}");
}

// ── Reopening for a new fire ──────────────────────────────────

#[test]
fn slow_reopen_after_close_starts_new_burn() {
    let mut b = bench();
    b.command(AppCommand::StartClosing);
    b.run_for(1900.0);
    assert_eq!(b.path(), "vent_closer/closed");

    b.hand_move_to(0.1, 0.015);
    b.run_until("vent_closer/monitoring", 10.0);

    let t = b.app.build_telemetry();
    assert!(!t.cycle_closed);
    assert!(t.combustion_secs < 60.0, "burn clock {}", t.combustion_secs);
}

#[test]
fn yanking_closed_vent_open_starts_new_burn() {
    let mut b = bench();
    b.command(AppCommand::StartClosing);
    b.run_for(1900.0);
    assert_eq!(b.path(), "vent_closer/closed");

    b.hand_move_to(0.1, 0.03);
    assert_eq!(b.path(), "vent_closer/override");
    b.run_until("vent_closer/monitoring", 10.0);

    let t = b.app.build_telemetry();
    assert!(!t.cycle_closed);
    assert!(t.combustion_secs < 10.0, "burn clock {}", t.combustion_secs);
    assert!((b.trajectory_target() - 0.1).abs() < 0.01);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn closing_duration_change_persists() {
    let mut b = bench();
    let mut nvs = MockNvs::default();
    b.command(AppCommand::SetClosingDuration(900));
    assert!(b.app.is_config_dirty());

    b.run_for(6.0);
    assert!(b.app.auto_save_if_needed(&mut nvs));
    assert_eq!(nvs.saves, 1);

    let restored = nvs.load().unwrap();
    assert_eq!(restored.closing_duration_secs, 900);
    let b2 = Bench::new(restored);
    assert_eq!(b2.app.context().trajectory.time_range(), 900.0);
}

#[test]
fn failed_save_stays_dirty() {
    let mut b = bench();
    let mut nvs = MockNvs {
        fail: true,
        ..MockNvs::default()
    };
    b.command(AppCommand::SetClosingDuration(1200));
    b.run_for(6.0);
    assert!(!b.app.auto_save_if_needed(&mut nvs));
    assert!(b.app.is_config_dirty());
}

// ── Self-test ─────────────────────────────────────────────────

#[test]
fn self_test_swings_both_ways_until_stopped() {
    let mut b = bench();
    b.vent.set_position(0.5);
    b.tick();
    b.command(AppCommand::SelfTest);
    assert_eq!(b.path(), "self_test/switch");
    assert_eq!(b.hw.last_indicator(), Some(Indicator::Moving));

    b.run_for(4.0);
    assert!(b.path().starts_with("self_test/"));
    assert!(b.hw.steps_in(StepDirection::Backward) > 0);

    b.command(AppCommand::MoveTo(0.2));
    assert_eq!(b.sink.events.last(), Some(&AppEvent::MoveRejected(0.2)));

    b.run_for(8.0);
    assert!(b.hw.steps_in(StepDirection::Forward) > 0);
    assert!(b.app.context().self_test.completed_moves >= 3);

    b.command(AppCommand::Stop);
    assert_eq!(b.path(), "idle");
    assert!(b.hw.calls().contains(&HwCall::Release));
}

#[test]
fn self_test_replaces_a_running_cycle() {
    let mut b = bench();
    b.command(AppCommand::StartClosing);
    b.run_for(60.0);
    b.command(AppCommand::SelfTest);
    assert_eq!(b.app.current_state(), Some(VentStateId::SelfTest));
    assert_eq!(b.app.context().self_test.completed_moves, 0);
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_reports_magnet_changes() {
    let mut b = bench();
    b.run_for(10.0);
    let last_magnet = |b: &Bench| {
        b.sink.events.iter().rev().find_map(|e| match e {
            AppEvent::Telemetry(t) => Some(t.magnet),
            _ => None,
        })
    };
    assert!(last_magnet(&b).unwrap().is_ok());

    let weak = MagnetStatus {
        detected: true,
        too_weak: true,
        too_strong: false,
    };
    b.vent.set_magnet(weak);
    b.run_for(10.0);
    assert_eq!(last_magnet(&b), Some(weak));
    assert_eq!(b.app.build_telemetry().magnet, weak);
}

#[test]
fn telemetry_snapshot_feeds_stovelink() {
    let mut b = bench();
    b.command(AppCommand::StartClosing);
    b.run_for(900.0);

    let t = b.app.build_telemetry();
    let frame = vec![250.0_f32; FRAME_PIXELS];
    let packet = StoveLinkEncoder::new()
        .encode(&frame, t.position, t.combustion_secs, 900_000)
        .unwrap();
    let header = PacketHeader::parse(&packet).unwrap();
    assert!((header.open_percent - 50.0).abs() < 2.0);
    assert!((899..=900).contains(&header.combustion_secs));

    let periodic = b.sink.count(|e| matches!(e, AppEvent::Telemetry(_)));
    assert_eq!(periodic, 90);
}
